//! Multi-process architecture for site isolation
//!
//! - Sites and site instances: the partitions render surfaces live in
//! - Process manager: site instance allocation and renderer bookkeeping
//! - IPC: messages from the browser side to render surfaces

pub mod ipc;
pub mod manager;
pub mod site;

pub use ipc::{IpcMessage, NavigateParams, Outbox, ResourceAction, RoutingId, SurfaceMessage};
pub use manager::{ProcessId, ProcessInfo, ProcessManager, ProcessState};
pub use site::{BrowsingInstanceId, PrivilegeTier, Site, SiteInstance, SiteInstanceId};

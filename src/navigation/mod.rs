//! Navigation core
//!
//! Session history, the surfaces of a tab and the protocol that moves a tab
//! from one partition to another.

pub mod controller;
pub mod entry;
pub mod interstitial;
pub mod manager;
pub mod observer;
pub mod pending;
pub mod resolver;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{CommitDetails, CommitKind, CommitParams, NavigationController};
pub use entry::{EntryId, NavigationEntry, PageType, Transition};
pub use interstitial::{
    Decision, InterstitialDelegate, InterstitialOverlay, InterstitialStack, OverlayHost, OverlayId,
    OverlayState,
};
pub use manager::{CommitDisposition, ManagerDelegate, SurfaceManager};
pub use observer::{ObserverList, SurfaceEvent};
pub use pending::{HandshakePhase, PendingNavigation, PendingNavigationTracker, UnloadAck};
pub use resolver::{PartitionView, SitePartitionResolver};
pub use surface::{RenderSurface, SurfaceId, SurfaceSpawn, SurfaceState};

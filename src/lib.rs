//! # Binix Nav - Cross-Site Navigation for Binix Tabs
//!
//! Decides which render surface and which site partition load each
//! navigation of a tab, and swaps surfaces when a navigation crosses sites.
//!
//! ## Architecture
//!
//! - **process**: site instances, renderer process bookkeeping and the
//!   messages sent to render surfaces
//! - **navigation**: session history, the partition resolver, the pending
//!   cross-site handshake, the surface manager and interstitial overlays
//! - **tab**: a tab wiring history, surfaces and overlays together
//! - **context**: state shared by every tab of a browser session
//! - **config**: policy and limits
//! - **utils**: shared error types

pub mod config;
pub mod context;
pub mod navigation;
pub mod process;
pub mod tab;
pub mod utils;

// Re-export main types for convenience
pub use config::NavigationConfig;
pub use context::BrowserContext;
pub use navigation::{
    CommitDetails, CommitKind, CommitParams, InterstitialDelegate, NavigationController,
    NavigationEntry, SurfaceEvent, SurfaceId, SurfaceManager, Transition,
};
pub use process::{IpcMessage, ProcessManager, SiteInstanceId, SurfaceMessage};
pub use tab::{Tab, TabId, TabManager};
pub use utils::error::{NavError, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Binix Nav";

/// Default policy values
pub mod defaults {
    /// Scheme of internal UI pages
    pub const INTERNAL_UI_SCHEME: &str = "chrome";
    /// Internal UI hosts that get privileged bindings
    pub const INTERNAL_UI_HOSTS: &[&str] =
        &["newtab", "settings", "history", "downloads", "extensions"];
    /// Session history entries kept per tab
    pub const MAX_HISTORY_ENTRIES: usize = 50;
    /// Renderer processes across all tabs
    pub const MAX_RENDERER_PROCESSES: usize = 20;
    /// Longest URL accepted for navigation
    pub const MAX_URL_CHARS: usize = 2 * 1024 * 1024;
    /// Session flush timeout in milliseconds
    pub const END_SESSION_TIMEOUT_MS: u64 = 10_000;
}

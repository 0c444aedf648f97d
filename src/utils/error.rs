//! Error types for binix-nav

use thiserror::Error;

use crate::process::SiteInstanceId;

/// Main error type for navigation operations
#[derive(Debug, Error)]
pub enum NavError {
    /// A render surface could not be created for a partition
    #[error("failed to create render surface for {partition}: {reason}")]
    SurfaceCreation {
        partition: SiteInstanceId,
        reason: String,
    },
    /// The renderer process cap was hit
    #[error("renderer process limit of {0} reached")]
    ProcessLimitReached(usize),
    /// The site instance is not known to the process manager
    #[error("unknown site instance {0}")]
    UnknownSiteInstance(SiteInstanceId),
    /// URL longer than the configured maximum
    #[error("URL of {length} characters exceeds the limit of {limit}")]
    UrlTooLong { length: usize, limit: usize },
    /// URL parsing failed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// History index or offset out of range
    #[error("no history entry at index {0}")]
    NoSuchEntry(isize),
    /// Nothing to navigate to
    #[error("no pending navigation entry")]
    NoPendingEntry,
    /// The tab id is not open in the browser context
    #[error("unknown tab {0}")]
    UnknownTab(u64),
    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for navigation operations
pub type Result<T> = std::result::Result<T, NavError>;

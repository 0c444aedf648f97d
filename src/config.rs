//! Navigation configuration
//!
//! Loaded from JSON (`NavigationConfig::from_json`/`from_file`) or from the
//! environment. Missing fields fall back to the defaults in
//! [`crate::defaults`].

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::defaults;
use crate::utils::error::Result;

/// Environment variable naming a JSON config file
pub const CONFIG_PATH_ENV: &str = "BINIX_NAV_CONFIG";
/// Environment variable overriding `process_per_tab`
pub const PROCESS_PER_TAB_ENV: &str = "BINIX_PROCESS_PER_TAB";

/// Policy and limits for cross-site navigation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Keep every navigation of a tab in its first partition unless
    /// privileges differ
    pub process_per_tab: bool,
    /// Scheme of internal UI pages
    pub internal_ui_scheme: String,
    /// Hosts under `internal_ui_scheme` that need privileged bindings
    pub internal_ui_hosts: Vec<String>,
    /// Session history cap per tab
    pub max_history_entries: usize,
    /// Renderer process cap shared by all tabs
    pub max_renderer_processes: usize,
    /// Longest URL accepted for navigation
    pub max_url_chars: usize,
    /// How long `BrowserContext::end_session` waits for the flush
    pub end_session_timeout_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            process_per_tab: false,
            internal_ui_scheme: defaults::INTERNAL_UI_SCHEME.to_string(),
            internal_ui_hosts: defaults::INTERNAL_UI_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            max_history_entries: defaults::MAX_HISTORY_ENTRIES,
            max_renderer_processes: defaults::MAX_RENDERER_PROCESSES,
            max_url_chars: defaults::MAX_URL_CHARS,
            end_session_timeout_ms: defaults::END_SESSION_TIMEOUT_MS,
        }
    }
}

impl NavigationConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading navigation config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Build a configuration from `BINIX_NAV_CONFIG` and
    /// `BINIX_PROCESS_PER_TAB`
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(value) = env::var(PROCESS_PER_TAB_ENV) {
            match parse_flag(&value) {
                Some(flag) => config.process_per_tab = flag,
                None => warn!("Ignoring {}={:?}: not a boolean", PROCESS_PER_TAB_ENV, value),
            }
        }

        Ok(config)
    }

    /// Set the process-per-tab policy
    pub fn with_process_per_tab(mut self, enabled: bool) -> Self {
        self.process_per_tab = enabled;
        self
    }

    /// Set the renderer process cap
    pub fn with_max_renderer_processes(mut self, max: usize) -> Self {
        self.max_renderer_processes = max;
        self
    }

    /// Set the session history cap
    pub fn with_max_history_entries(mut self, max: usize) -> Self {
        self.max_history_entries = max;
        self
    }

    /// Timeout for the end-session flush
    pub fn end_session_timeout(&self) -> Duration {
        Duration::from_millis(self.end_session_timeout_ms)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! Tab management

mod contents;
mod delegate;

use std::fmt;
use std::sync::Arc;

use log::debug;

pub use contents::Tab;
pub use delegate::{TabDelegate, TabStatus};

use crate::config::NavigationConfig;
use crate::process::{ProcessManager, SiteInstanceId};
use crate::utils::error::Result;

/// Unique tab identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(u64);

impl TabId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Tab manager
pub struct TabManager {
    tabs: Vec<Tab>,
    active_tab: Option<TabId>,
    next_id: u64,
}

impl TabManager {
    /// Create a new tab manager
    pub fn new() -> Self {
        Self {
            tabs: Vec::new(),
            active_tab: None,
            next_id: 1,
        }
    }

    /// Create a new tab whose first surface lives in `partition`
    pub fn create_tab(
        &mut self,
        config: Arc<NavigationConfig>,
        partition: SiteInstanceId,
        processes: &mut ProcessManager,
    ) -> Result<TabId> {
        let id = TabId::new(self.next_id);
        let tab = Tab::new(id, config, partition, processes)?;
        self.next_id += 1;
        self.tabs.push(tab);

        if self.active_tab.is_none() {
            self.active_tab = Some(id);
        }

        Ok(id)
    }

    /// Remove a tab. The caller closes it.
    pub fn remove_tab(&mut self, id: TabId) -> Option<Tab> {
        let index = self.tabs.iter().position(|t| t.id() == id)?;
        let tab = self.tabs.remove(index);

        if self.active_tab == Some(id) {
            self.active_tab = self.tabs.first().map(|t| t.id());
            debug!("Active tab is now {:?}", self.active_tab);
        }
        Some(tab)
    }

    /// Remove every tab
    pub fn drain(&mut self) -> Vec<Tab> {
        self.active_tab = None;
        std::mem::take(&mut self.tabs)
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id() == id)
    }

    pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id() == id)
    }

    /// Get the active tab
    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab.and_then(|id| self.get(id))
    }

    /// Get mutable reference to active tab
    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        self.active_tab.and_then(|id| self.get_mut(id))
    }

    /// Set the active tab
    pub fn set_active(&mut self, id: TabId) -> bool {
        if self.tabs.iter().any(|t| t.id() == id) {
            self.active_tab = Some(id);
            true
        } else {
            false
        }
    }

    /// Get all tabs
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Get tab count
    pub fn count(&self) -> usize {
        self.tabs.len()
    }
}

impl Default for TabManager {
    fn default() -> Self {
        Self::new()
    }
}

//! Browser context
//!
//! Owns what the tabs of one browser share: the configuration, the renderer
//! process bookkeeping and the tab list. Created and torn down explicitly.

use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::thread;

use log::{debug, info, warn};

use crate::config::NavigationConfig;
use crate::process::{IpcMessage, ProcessManager};
use crate::tab::{Tab, TabId, TabManager};
use crate::utils::error::{NavError, Result};

/// Shared state of a browser session
pub struct BrowserContext {
    config: Arc<NavigationConfig>,
    processes: ProcessManager,
    tabs: TabManager,
    module_refs: usize,
    quit_requested: bool,
}

impl BrowserContext {
    pub fn new(config: NavigationConfig) -> Self {
        let processes = ProcessManager::with_max_renderers(config.max_renderer_processes);
        info!(
            "Browser context created (process per tab: {})",
            config.process_per_tab
        );
        Self {
            config: Arc::new(config),
            processes,
            tabs: TabManager::new(),
            module_refs: 0,
            quit_requested: false,
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.get(id)
    }

    /// Open a tab in a new browsing instance
    pub fn open_tab(&mut self) -> Result<TabId> {
        let partition = self.processes.create_site_instance();
        self.tabs
            .create_tab(Arc::clone(&self.config), partition, &mut self.processes)
    }

    /// Open a tab sharing the current partition of `source`, as a page
    /// opened by script would
    pub fn open_related_tab(&mut self, source: TabId) -> Result<TabId> {
        let partition = self
            .tabs
            .get(source)
            .map(|t| t.partition())
            .ok_or(NavError::UnknownTab(source.get()))?;
        self.tabs
            .create_tab(Arc::clone(&self.config), partition, &mut self.processes)
    }

    /// Close a tab and return its last messages
    pub fn close_tab(&mut self, id: TabId) -> Result<Vec<IpcMessage>> {
        let tab = self
            .tabs
            .remove_tab(id)
            .ok_or(NavError::UnknownTab(id.get()))?;
        Ok(tab.close(&mut self.processes))
    }

    /// Run `f` against a tab and the shared process manager
    pub fn with_tab<R>(
        &mut self,
        id: TabId,
        f: impl FnOnce(&mut Tab, &mut ProcessManager) -> R,
    ) -> Result<R> {
        let tab = self
            .tabs
            .get_mut(id)
            .ok_or(NavError::UnknownTab(id.get()))?;
        Ok(f(tab, &mut self.processes))
    }

    /// A module (window, download, extension host) keeps the browser alive
    pub fn add_ref_module(&mut self) -> usize {
        self.module_refs += 1;
        self.quit_requested = false;
        self.module_refs
    }

    /// Drop a module reference. Returns `true` when the last one went away
    /// and the browser should quit.
    pub fn release_module(&mut self) -> bool {
        if self.module_refs == 0 {
            warn!("release_module without a matching add_ref_module");
            return false;
        }
        self.module_refs -= 1;
        if self.module_refs == 0 {
            info!("Last module released, quitting");
            self.quit_requested = true;
        }
        self.quit_requested
    }

    pub fn module_refs(&self) -> usize {
        self.module_refs
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Run `flush` on a worker thread and wait for it at most the configured
    /// session-end timeout. Returns whether it finished in time.
    pub fn end_session<F>(&mut self, flush: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let timeout = self.config.end_session_timeout();
        let (tx, rx) = channel();
        let worker = thread::spawn(move || {
            flush();
            let _ = tx.send(());
        });

        match rx.recv_timeout(timeout) {
            Ok(()) => {
                let _ = worker.join();
                debug!("Session flushed");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Session flush did not finish within {:?}", timeout);
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Session flush worker exited without finishing");
                false
            }
        }
    }

    /// Close every tab and drop dead process records
    pub fn shutdown(mut self) -> Vec<IpcMessage> {
        let mut messages = Vec::new();
        for tab in self.tabs.drain() {
            messages.extend(tab.close(&mut self.processes));
        }
        self.processes.cleanup();
        info!(
            "Browser context shut down, {} processes left",
            self.processes.process_count()
        );
        messages
    }
}

impl Default for BrowserContext {
    fn default() -> Self {
        Self::new(NavigationConfig::default())
    }
}

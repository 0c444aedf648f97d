//! A tab: session history, surfaces and the interstitial slot
//!
//! Every operation that may talk to renderers takes the shared
//! [`ProcessManager`]. Messages for surfaces are queued in the tab's outbox
//! and collected with [`Tab::take_messages`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use log::{debug, info, warn};
use url::Url;

use super::TabId;
use super::delegate::{TabDelegate, TabStatus};
use crate::config::NavigationConfig;
use crate::navigation::{
    CommitDetails, CommitDisposition, CommitParams, InterstitialDelegate, InterstitialStack,
    NavigationController, OverlayHost, OverlayId, SurfaceEvent, SurfaceId, SurfaceManager,
    Transition,
};
use crate::process::{
    IpcMessage, NavigateParams, Outbox, ProcessId, ProcessManager, SiteInstanceId, SurfaceMessage,
};
use crate::utils::error::{NavError, Result};

/// A browser tab
pub struct Tab {
    id: TabId,
    controller: NavigationController,
    manager: SurfaceManager,
    interstitial: InterstitialStack,
    outbox: Outbox,
    status: TabStatus,
    loading: bool,
    /// Partitions held for committed history entries
    history_holds: HashSet<SiteInstanceId>,
}

/// Disjoint borrows of a tab for one operation
struct Parts<'a> {
    controller: &'a mut NavigationController,
    manager: &'a mut SurfaceManager,
    interstitial: &'a mut InterstitialStack,
    delegate: TabDelegate<'a>,
}

impl Parts<'_> {
    fn host(&mut self) -> (&mut InterstitialStack, OverlayHost<'_>) {
        let host = OverlayHost {
            controller: &mut *self.controller,
            manager: &mut *self.manager,
            delegate: &mut self.delegate,
        };
        (&mut *self.interstitial, host)
    }
}

impl Tab {
    /// Create a tab whose first surface lives in `partition`
    pub fn new(
        id: TabId,
        config: Arc<NavigationConfig>,
        partition: SiteInstanceId,
        processes: &mut ProcessManager,
    ) -> Result<Self> {
        let mut outbox = Outbox::new();
        let mut status = TabStatus::default();
        let manager = {
            let mut delegate = TabDelegate::new(processes, &mut outbox, &mut status, None);
            SurfaceManager::init(&config, partition, &mut delegate)?
        };
        info!("Opened {} in {}", id, partition);

        Ok(Self {
            id,
            controller: NavigationController::new(config),
            manager,
            interstitial: InterstitialStack::new(),
            outbox,
            status,
            loading: false,
            history_holds: HashSet::new(),
        })
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn manager(&self) -> &SurfaceManager {
        &self.manager
    }

    pub fn interstitial(&self) -> &InterstitialStack {
        &self.interstitial
    }

    pub fn status(&self) -> &TabStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn current_surface(&self) -> SurfaceId {
        self.manager.current_surface()
    }

    pub fn pending_surface(&self) -> Option<SurfaceId> {
        self.manager.pending_surface()
    }

    /// Partition of the current surface
    pub fn partition(&self) -> SiteInstanceId {
        self.manager.current_partition()
    }

    /// URL shown in the location bar
    pub fn url(&self) -> Option<&Url> {
        self.controller.visible_entry().map(|e| e.url())
    }

    /// Title shown on the tab strip
    pub fn title(&self) -> &str {
        self.controller
            .visible_entry()
            .map(|e| {
                if e.title().is_empty() {
                    e.url().as_str()
                } else {
                    e.title()
                }
            })
            .unwrap_or("New Tab")
    }

    pub fn subscribe(&mut self) -> Receiver<SurfaceEvent> {
        self.manager.subscribe()
    }

    /// Queued messages for surfaces, oldest first
    pub fn take_messages(&mut self) -> Vec<IpcMessage> {
        self.outbox.take()
    }

    /// Navigate to `url`. Returns the surface that will load it.
    pub fn load_url(
        &mut self,
        url: &str,
        transition: Transition,
        processes: &mut ProcessManager,
    ) -> Result<SurfaceId> {
        let url = Url::parse(url)?;
        self.controller.load_url(url, transition)?;
        self.navigate_to_pending(processes)
    }

    /// Go one entry back. `None` when only a transient entry was dropped.
    pub fn go_back(&mut self, processes: &mut ProcessManager) -> Result<Option<SurfaceId>> {
        match self.controller.go_back()? {
            Some(_) => self.navigate_to_pending(processes).map(Some),
            None => Ok(None),
        }
    }

    pub fn go_forward(&mut self, processes: &mut ProcessManager) -> Result<Option<SurfaceId>> {
        match self.controller.go_forward()? {
            Some(_) => self.navigate_to_pending(processes).map(Some),
            None => Ok(None),
        }
    }

    pub fn go_to_index(
        &mut self,
        index: usize,
        processes: &mut ProcessManager,
    ) -> Result<Option<SurfaceId>> {
        match self.controller.go_to_index(index)? {
            Some(_) => self.navigate_to_pending(processes).map(Some),
            None => Ok(None),
        }
    }

    /// Load the last committed entry again
    pub fn reload(&mut self, processes: &mut ProcessManager) -> Result<SurfaceId> {
        self.controller.reload()?;
        self.navigate_to_pending(processes)
    }

    fn navigate_to_pending(&mut self, processes: &mut ProcessManager) -> Result<SurfaceId> {
        let entry = self
            .controller
            .pending_entry()
            .cloned()
            .ok_or(NavError::NoPendingEntry)?;
        let transition = match self.controller.pending_entry_index() {
            Some(index) if Some(index) == self.controller.last_committed_index() => {
                Transition::Reload
            }
            Some(_) => Transition::ForwardBack,
            None => entry.transition(),
        };

        let result = {
            let mut parts = self.parts(processes);
            let result = parts.manager.navigate(&entry, &mut parts.delegate);
            if let Ok(surface) = result {
                let params = NavigateParams {
                    entry: Some(entry.id()),
                    url: entry.url().clone(),
                    page_id: entry.page_id(),
                    transition,
                };
                parts.manager.send_navigate(surface, params, &mut parts.delegate);
                let (stack, mut host) = parts.host();
                stack.on_navigation_pending(&mut host);
            }
            result
        };

        match result {
            Ok(surface) => {
                self.loading = true;
                Ok(surface)
            }
            Err(e) => {
                warn!("{} could not navigate to {}: {}", self.id, entry.url(), e);
                self.controller.discard_non_committed_entries();
                Err(e)
            }
        }
    }

    /// Stop loading everywhere
    pub fn stop(&mut self, processes: &mut ProcessManager) {
        let mut parts = self.parts(processes);
        parts.manager.stop(&mut parts.delegate);
        self.loading = false;
    }

    /// A surface committed a load. Returns how the history changed, or
    /// `None` when the commit was dropped or belonged to an interstitial.
    ///
    /// # Panics
    ///
    /// Panics when `surface` is not a surface of this tab.
    pub fn did_navigate(
        &mut self,
        surface: SurfaceId,
        params: CommitParams,
        processes: &mut ProcessManager,
    ) -> Option<CommitDetails> {
        let id = self.id;
        let is_main_frame = params.transition.is_main_frame();
        let mut parts = self.parts(processes);

        if parts.interstitial.owns_surface(surface) {
            let (stack, mut host) = parts.host();
            stack.did_navigate(surface, is_main_frame, &mut host);
            return None;
        }

        let disposition = parts
            .manager
            .filter_commit(surface, is_main_frame, &mut parts.delegate);
        if disposition == CommitDisposition::Drop {
            debug!("{} dropped commit of {} from {}", id, params.url, surface);
            return None;
        }
        if is_main_frame {
            parts
                .manager
                .did_navigate_main_frame(surface, &params.url, &mut parts.delegate);
        }

        let partition = parts
            .manager
            .surface(surface)
            .map_or_else(|| parts.manager.current_partition(), |s| s.partition());
        let details = parts.controller.commit(&params, partition);

        if is_main_frame {
            let (stack, mut host) = parts.host();
            stack.on_main_frame_committed(&mut host);
        }

        if details.pruned > 0 {
            let mut keep: HashSet<SiteInstanceId> =
                parts.controller.referenced_partitions().collect();
            keep.insert(parts.manager.current_partition());
            if let Some(pending) = parts.manager.tracker().pending() {
                keep.insert(pending.partition);
            }
            let dropped = parts
                .manager
                .prune_swapped_out(|p| keep.contains(&p), &mut parts.delegate);
            if dropped > 0 {
                debug!("{} dropped {} swapped-out surfaces with their history", id, dropped);
            }
        }

        self.sync_history_holds(processes);
        if is_main_frame {
            self.loading = false;
        }
        Some(details)
    }

    /// Hold every partition the history references and let go of the rest
    fn sync_history_holds(&mut self, processes: &mut ProcessManager) {
        let referenced: HashSet<SiteInstanceId> = self.controller.referenced_partitions().collect();
        for partition in referenced.difference(&self.history_holds) {
            processes.retain_site_instance(*partition);
        }
        for partition in self.history_holds.difference(&referenced) {
            processes.release_site_instance(*partition);
        }
        self.history_holds = referenced;
    }

    /// Ask the page whether it may close
    pub fn request_close(&mut self, processes: &mut ProcessManager) {
        self.status.close_approved = false;
        let current = self.manager.current_surface();
        let mut parts = self.parts(processes);
        parts.manager.send_to(
            current,
            SurfaceMessage::FireBeforeUnload {
                for_cross_site: false,
            },
            &mut parts.delegate,
        );
    }

    /// Beforeunload answer from the current surface
    pub fn should_close_ack(
        &mut self,
        for_cross_site: bool,
        proceed: bool,
        processes: &mut ProcessManager,
    ) {
        let mut parts = self.parts(processes);
        parts
            .manager
            .should_close_page(for_cross_site, proceed, &mut parts.delegate);
    }

    /// The pending surface received the response with `request_id`
    pub fn cross_site_response(&mut self, request_id: u64, processes: &mut ProcessManager) {
        let mut parts = self.parts(processes);
        parts
            .manager
            .on_cross_site_response(request_id, &mut parts.delegate);
    }

    pub fn swap_out_ack(&mut self, surface: SurfaceId, processes: &mut ProcessManager) {
        let mut parts = self.parts(processes);
        parts.manager.on_swap_out_ack(surface, &mut parts.delegate);
    }

    /// The renderer behind `surface` went away
    pub fn render_view_gone(&mut self, surface: SurfaceId, processes: &mut ProcessManager) {
        if let Some(process) = self.manager.surface(surface).map(|s| s.process()) {
            processes.mark_crashed(process);
        }

        let mut parts = self.parts(processes);
        if parts.interstitial.owns_surface(surface) {
            let (stack, mut host) = parts.host();
            stack.on_surface_gone(surface, &mut host);
            return;
        }

        let was_current = surface == parts.manager.current_surface();
        parts.manager.render_view_gone(surface, &mut parts.delegate);
        if was_current {
            let (stack, mut host) = parts.host();
            stack.on_current_surface_gone(&mut host);
            self.loading = false;
        }
    }

    /// A renderer process is shutting down
    pub fn renderer_process_closing(&mut self, process: ProcessId, processes: &mut ProcessManager) {
        let mut parts = self.parts(processes);
        parts
            .manager
            .renderer_process_closing(process, &mut parts.delegate);
    }

    /// Show an interstitial over the current page
    pub fn show_interstitial(
        &mut self,
        url: &str,
        new_navigation: bool,
        content: Box<dyn InterstitialDelegate>,
        processes: &mut ProcessManager,
    ) -> Result<OverlayId> {
        let url = Url::parse(url)?;
        let mut parts = self.parts(processes);
        let (stack, mut host) = parts.host();
        stack.show(url, new_navigation, content, &mut host)
    }

    pub fn interstitial_proceed(&mut self, processes: &mut ProcessManager) -> bool {
        let mut parts = self.parts(processes);
        let (stack, mut host) = parts.host();
        stack.proceed(&mut host)
    }

    pub fn interstitial_dont_proceed(&mut self, processes: &mut ProcessManager) -> bool {
        let declined = {
            let mut parts = self.parts(processes);
            let (stack, mut host) = parts.host();
            stack.dont_proceed(&mut host)
        };
        if self.interstitial.take_reload_request() {
            if let Err(e) = self.reload(processes) {
                warn!("{} could not reload after interstitial: {}", self.id, e);
            }
        }
        declined
    }

    /// Command sent by the interstitial page
    pub fn interstitial_command(&mut self, command: &str) -> bool {
        self.interstitial.command(command)
    }

    /// Title reported by a surface
    pub fn update_title(&mut self, surface: SurfaceId, title: &str) -> bool {
        if self.interstitial.update_title(surface, title, &mut self.controller) {
            return true;
        }
        if surface != self.manager.current_surface() {
            debug!("Ignoring title from non-current {}", surface);
            return false;
        }
        match self.controller.last_committed_entry_mut() {
            Some(entry) => {
                entry.set_title(title);
                true
            }
            None => false,
        }
    }

    /// Close the tab, tearing down every surface. Returns the messages
    /// still queued, shutdowns included.
    pub fn close(self, processes: &mut ProcessManager) -> Vec<IpcMessage> {
        let Tab {
            id,
            mut controller,
            mut manager,
            mut interstitial,
            mut outbox,
            mut status,
            history_holds,
            ..
        } = self;

        let committed = controller.last_committed_entry().cloned();
        let mut delegate = TabDelegate::new(processes, &mut outbox, &mut status, committed);
        {
            let mut host = OverlayHost {
                controller: &mut controller,
                manager: &mut manager,
                delegate: &mut delegate,
            };
            interstitial.close(&mut host);
        }
        manager.shutdown(&mut delegate);
        for partition in history_holds {
            processes.release_site_instance(partition);
        }

        info!("Closed {}", id);
        outbox.take()
    }

    fn parts<'a>(&'a mut self, processes: &'a mut ProcessManager) -> Parts<'a> {
        let committed = self.controller.last_committed_entry().cloned();
        Parts {
            controller: &mut self.controller,
            manager: &mut self.manager,
            interstitial: &mut self.interstitial,
            delegate: TabDelegate::new(processes, &mut self.outbox, &mut self.status, committed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{CommitKind, Decision, SurfaceState};

    struct Warning;

    impl InterstitialDelegate for Warning {
        fn html_contents(&self) -> String {
            "<h1>Unsafe</h1>".to_string()
        }
    }

    fn setup_with(config: NavigationConfig) -> (Tab, ProcessManager) {
        let mut processes = ProcessManager::new();
        let partition = processes.create_site_instance();
        let tab = Tab::new(TabId::new(1), Arc::new(config), partition, &mut processes).unwrap();
        (tab, processes)
    }

    fn setup() -> (Tab, ProcessManager) {
        setup_with(NavigationConfig::default())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    /// Load `u` and run the whole handshake up to the commit
    fn navigate(tab: &mut Tab, p: &mut ProcessManager, u: &str, page_id: i32) -> SurfaceId {
        let surface = tab.load_url(u, Transition::Typed, p).unwrap();
        if tab.manager().cross_navigation_pending() {
            let current = tab.current_surface();
            tab.should_close_ack(true, true, p);
            tab.cross_site_response(1, p);
            tab.swap_out_ack(current, p);
        }
        tab.did_navigate(surface, CommitParams::main_frame(url(u), page_id), p)
            .unwrap();
        surface
    }

    #[test]
    fn test_simple_navigation() {
        let (mut tab, mut p) = setup();
        let initial = tab.current_surface();
        assert_eq!(tab.title(), "New Tab");

        let surface = tab.load_url("http://www.google.com", Transition::Typed, &mut p).unwrap();
        assert_eq!(surface, initial);
        assert!(tab.is_loading());
        assert_eq!(tab.url().unwrap().as_str(), "http://www.google.com/");

        let details = tab
            .did_navigate(
                surface,
                CommitParams::main_frame(url("http://www.google.com"), 1),
                &mut p,
            )
            .unwrap();
        assert_eq!(details.kind, CommitKind::NewPage);
        assert!(!tab.is_loading());
        assert_eq!(tab.controller().entry_count(), 1);
        assert!(tab.controller().pending_entry().is_none());

        let messages = tab.take_messages();
        assert!(messages
            .iter()
            .any(|m| matches!(m.message, SurfaceMessage::Navigate(_))));
        assert!(tab.take_messages().is_empty());
    }

    #[test]
    fn test_invalid_and_long_urls() {
        let (mut tab, mut p) = setup_with(NavigationConfig {
            max_url_chars: 32,
            ..NavigationConfig::default()
        });
        assert!(matches!(
            tab.load_url("not a url", Transition::Typed, &mut p),
            Err(NavError::InvalidUrl(_))
        ));
        let long = format!("http://www.google.com/{}", "a".repeat(64));
        assert!(matches!(
            tab.load_url(&long, Transition::Typed, &mut p),
            Err(NavError::UrlTooLong { .. })
        ));
        assert!(tab.controller().pending_entry().is_none());
    }

    #[test]
    fn test_cross_site_swap() {
        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        let yahoo = navigate(&mut tab, &mut p, "http://www.yahoo.com", 1);

        assert_ne!(google, yahoo);
        assert_eq!(tab.current_surface(), yahoo);
        assert_eq!(tab.status().swaps, 1);
        assert!(tab.manager().is_swapped_out(google));
        assert_eq!(tab.controller().entry_count(), 2);
    }

    #[test]
    fn test_back_reuses_partition() {
        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        let google_partition = tab.partition();
        navigate(&mut tab, &mut p, "http://www.yahoo.com", 1);

        let back = tab.go_back(&mut p).unwrap().unwrap();
        assert_eq!(back, google);
        let held = tab.manager().surface(google).unwrap().held_navigation().cloned();
        assert_eq!(held.unwrap().transition, Transition::ForwardBack);

        let current = tab.current_surface();
        tab.should_close_ack(true, true, &mut p);
        tab.cross_site_response(2, &mut p);
        tab.swap_out_ack(current, &mut p);
        let details = tab
            .did_navigate(google, CommitParams::main_frame(url("http://www.google.com"), 1), &mut p)
            .unwrap();
        assert_eq!(details.kind, CommitKind::ExistingPage);
        assert_eq!(tab.partition(), google_partition);
        assert_eq!(tab.controller().last_committed_index(), Some(0));
        assert!(tab.controller().can_go_forward());
    }

    #[test]
    fn test_failed_navigation_discards_pending_entry() {
        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        tab.render_view_gone(google, &mut p);
        p.set_max_renderers(0);

        assert!(tab.load_url("http://www.google.com/a", Transition::Typed, &mut p).is_err());
        assert!(tab.controller().pending_entry().is_none());
        assert_eq!(
            tab.manager().surface(google).unwrap().state(),
            SurfaceState::Crashed
        );
    }

    #[test]
    fn test_history_pruning_drops_swapped_out_surfaces() {
        let (mut tab, mut p) = setup_with(NavigationConfig::default().with_max_history_entries(2));
        navigate(&mut tab, &mut p, "http://www.google.com", 1);
        navigate(&mut tab, &mut p, "http://www.yahoo.com", 1);
        assert_eq!(tab.manager().swapped_out_count(), 1);

        navigate(&mut tab, &mut p, "http://www.bing.com", 1);
        assert_eq!(tab.controller().entry_count(), 2);
        // Only yahoo's surface is still referenced by history
        assert_eq!(tab.manager().swapped_out_count(), 1);
    }

    #[test]
    fn test_update_title() {
        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        assert_eq!(tab.title(), "http://www.google.com/");
        assert!(tab.update_title(google, "Google"));
        assert_eq!(tab.title(), "Google");
        assert!(!tab.update_title(SurfaceId::new(99), "Other"));
    }

    #[test]
    fn test_interstitial_commit_is_not_history() {
        let (mut tab, mut p) = setup();
        navigate(&mut tab, &mut p, "http://www.google.com", 1);

        tab.show_interstitial("http://interstitial", true, Box::new(Warning), &mut p)
            .unwrap();
        let overlay = tab.interstitial().active().unwrap().surface().unwrap();
        let details = tab.did_navigate(
            overlay,
            CommitParams::main_frame(url("http://interstitial"), 1),
            &mut p,
        );
        assert!(details.is_none());
        assert!(tab.interstitial().is_showing());
        assert_eq!(tab.controller().entry_count(), 2);
        assert_eq!(tab.controller().last_committed_index(), Some(0));
    }

    #[test]
    fn test_navigation_commit_removes_interstitial() {
        let (mut tab, mut p) = setup();
        navigate(&mut tab, &mut p, "http://www.google.com", 1);
        let events = tab.subscribe();
        tab.show_interstitial("http://interstitial", true, Box::new(Warning), &mut p)
            .unwrap();
        let overlay = tab.interstitial().active().unwrap().surface().unwrap();
        tab.did_navigate(overlay, CommitParams::main_frame(url("http://interstitial"), 1), &mut p);

        navigate(&mut tab, &mut p, "http://www.google.com/next", 2);
        assert!(tab.interstitial().active().is_none());
        assert!(events.try_iter().any(|e| matches!(
            e,
            SurfaceEvent::InterstitialDetached {
                decision: Decision::DontProceed,
                ..
            }
        )));
    }

    #[test]
    fn test_repeated_interstitials_release_partitions() {
        let (mut tab, mut p) = setup();
        navigate(&mut tab, &mut p, "http://www.google.com", 1);
        let instances = p.site_instance_count();
        let processes = p.process_count();

        for _ in 0..100 {
            tab.show_interstitial("http://interstitial", true, Box::new(Warning), &mut p)
                .unwrap();
            assert!(tab.interstitial_dont_proceed(&mut p));
        }
        assert_eq!(p.site_instance_count(), instances);
        assert_eq!(p.process_count(), processes);
    }

    #[test]
    fn test_history_keeps_partition_alive() {
        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        let google_partition = tab.partition();
        navigate(&mut tab, &mut p, "http://www.yahoo.com", 1);

        let process = tab.manager().surface(google).unwrap().process();
        tab.renderer_process_closing(process, &mut p);
        assert_eq!(tab.manager().swapped_out_count(), 0);
        assert!(p.site_instance(google_partition).is_some());

        let back = tab.go_back(&mut p).unwrap().unwrap();
        assert_eq!(tab.manager().surface(back).unwrap().partition(), google_partition);

        tab.close(&mut p);
        assert_eq!(p.site_instance_count(), 0);
        assert_eq!(p.process_count(), 0);
    }

    #[test]
    fn test_declined_interstitial_can_reload() {
        struct Reloading;

        impl InterstitialDelegate for Reloading {
            fn html_contents(&self) -> String {
                "<h1>Blocked content</h1>".to_string()
            }

            fn reload_on_dont_proceed(&self) -> bool {
                true
            }
        }

        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        tab.take_messages();

        tab.show_interstitial("http://interstitial", false, Box::new(Reloading), &mut p)
            .unwrap();
        assert!(tab.interstitial_dont_proceed(&mut p));

        assert_eq!(tab.controller().pending_entry_index(), Some(0));
        let reloads = tab
            .take_messages()
            .into_iter()
            .filter(|m| m.target == google)
            .filter(|m| {
                matches!(
                    &m.message,
                    SurfaceMessage::Navigate(params) if params.transition == Transition::Reload
                )
            })
            .count();
        assert_eq!(reloads, 1);
    }

    #[test]
    fn test_request_close() {
        let (mut tab, mut p) = setup();
        let google = navigate(&mut tab, &mut p, "http://www.google.com", 1);
        tab.take_messages();

        tab.request_close(&mut p);
        tab.should_close_ack(false, true, &mut p);
        assert!(tab.status().close_approved);
        let sent: Vec<_> = tab
            .take_messages()
            .into_iter()
            .filter(|m| m.target == google)
            .map(|m| m.message)
            .collect();
        assert_eq!(
            sent,
            vec![
                SurfaceMessage::FireBeforeUnload {
                    for_cross_site: false
                },
                SurfaceMessage::ClosePage,
            ]
        );
    }

    #[test]
    fn test_close_releases_processes() {
        let (mut tab, mut p) = setup();
        navigate(&mut tab, &mut p, "http://www.google.com", 1);
        navigate(&mut tab, &mut p, "http://www.yahoo.com", 1);
        assert_eq!(p.renderer_count(), 2);

        let messages = tab.close(&mut p);
        assert_eq!(p.renderer_count(), 0);
        let shutdowns = messages
            .iter()
            .filter(|m| m.message == SurfaceMessage::Shutdown)
            .count();
        assert_eq!(shutdowns, 2);
    }
}

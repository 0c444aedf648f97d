//! Surface manager
//!
//! Owns the surfaces of one tab and decides, for every navigation, whether
//! it stays in the current surface or moves to a surface in another
//! partition. Cross-partition moves go through the handshake in
//! [`super::pending`]; the new surface only becomes current when it commits.

use log::{debug, info, warn};
use url::Url;

use super::entry::NavigationEntry;
use super::observer::{ObserverList, SurfaceEvent};
use super::pending::{
    BeginOutcome, CancelledNavigation, CurrentCommit, HandshakePhase, PendingNavigationTracker,
    Surfaces, UnloadAck,
};
use super::resolver::{PartitionView, SitePartitionResolver};
use super::surface::{
    RenderSurface, SurfaceArena, SurfaceId, SurfaceSpawn, SurfaceState, SwappedOutTable,
};
use crate::config::NavigationConfig;
use crate::process::{NavigateParams, ProcessId, RoutingId, SiteInstanceId, SurfaceMessage};
use crate::utils::error::Result;

/// Services the surface manager needs from the tab that owns it
#[cfg_attr(test, mockall::automock)]
pub trait ManagerDelegate {
    /// Place a new surface for `partition` in a renderer process
    fn create_render_surface(&mut self, partition: SiteInstanceId) -> Result<SurfaceSpawn>;

    /// Partition for `url` in the browsing instance of `current`
    fn related_partition(&mut self, current: SiteInstanceId, url: &Url) -> Result<SiteInstanceId>;

    /// Partition for `url` in a fresh browsing instance
    fn isolated_partition(&mut self, url: &Url) -> SiteInstanceId;

    /// URL the partition's site was recorded from
    fn partition_site(&self, partition: SiteInstanceId) -> Option<Url>;

    /// Record the site of a partition (first call wins)
    fn assign_site(&mut self, partition: SiteInstanceId, url: &Url);

    /// Last committed history entry of the tab
    fn last_committed_entry(&self) -> Option<NavigationEntry>;

    /// Deliver a message to a surface
    fn send(&mut self, surface: SurfaceId, routing_id: RoutingId, message: SurfaceMessage);

    /// The current surface changed
    fn active_surface_changed(&mut self, old: Option<SurfaceId>, new: SurfaceId);

    /// Focus the default UI element (location bar) after an internal page
    /// took over
    fn focus_default_ui(&mut self);

    /// The tab's own beforeunload finished. Returns whether the page may
    /// close.
    fn before_unload_fired(&mut self, proceed: bool) -> bool;

    /// A surface was destroyed
    fn release_surface(&mut self, surface: SurfaceId, process: ProcessId);
}

/// What to do with a commit reported by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDisposition {
    /// Record the commit
    Commit,
    /// Drop it; the surface is not allowed to commit right now
    Drop,
}

/// Current surface, pending surface and swapped-out surfaces of a tab
#[derive(Debug)]
pub struct SurfaceManager {
    resolver: SitePartitionResolver,
    arena: SurfaceArena,
    current: SurfaceId,
    tracker: PendingNavigationTracker,
    swapped_out: SwappedOutTable,
    observers: ObserverList,
}

impl SurfaceManager {
    /// Create the manager with a not-yet-started surface in `partition`
    pub fn init(
        config: &NavigationConfig,
        partition: SiteInstanceId,
        delegate: &mut dyn ManagerDelegate,
    ) -> Result<Self> {
        let mut arena = SurfaceArena::new();
        let spawn = delegate.create_render_surface(partition)?;
        let current = arena.insert(partition, spawn, SurfaceState::NotStarted, false);
        debug!("Surface manager initialized with {} in {}", current, partition);

        Ok(Self {
            resolver: SitePartitionResolver::new(config),
            arena,
            current,
            tracker: PendingNavigationTracker::new(),
            swapped_out: SwappedOutTable::new(),
            observers: ObserverList::new(),
        })
    }

    pub fn current_surface(&self) -> SurfaceId {
        self.current
    }

    pub fn pending_surface(&self) -> Option<SurfaceId> {
        self.tracker.pending_surface()
    }

    pub fn cross_navigation_pending(&self) -> bool {
        self.tracker.is_pending()
    }

    pub fn tracker(&self) -> &PendingNavigationTracker {
        &self.tracker
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&RenderSurface> {
        self.arena.get(id)
    }

    /// Partition of the current surface
    pub fn current_partition(&self) -> SiteInstanceId {
        self.current_ref().partition()
    }

    /// Whether the surface is unloaded and kept for reuse
    pub fn is_swapped_out(&self, surface: SurfaceId) -> bool {
        self.swapped_out.contains_surface(surface)
            || self
                .arena
                .get(surface)
                .is_some_and(|s| s.state() == SurfaceState::SwappedOut)
    }

    /// Swapped-out surface parked for a partition
    pub fn swapped_out_surface(&self, partition: SiteInstanceId) -> Option<SurfaceId> {
        self.swapped_out.get(partition)
    }

    pub fn swapped_out_count(&self) -> usize {
        self.swapped_out.len()
    }

    /// Every surface the manager owns
    pub fn surface_count(&self) -> usize {
        self.arena.len()
    }

    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        self.arena.ids()
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<SurfaceEvent> {
        self.observers.subscribe()
    }

    pub fn notify(&mut self, event: SurfaceEvent) {
        self.observers.notify(event);
    }

    /// Pick the surface that will load `entry`, starting a cross-partition
    /// navigation when needed
    pub fn navigate(
        &mut self,
        entry: &NavigationEntry,
        delegate: &mut dyn ManagerDelegate,
    ) -> Result<SurfaceId> {
        let current = self.current_ref();
        let view = PartitionView {
            partition: current.partition(),
            privileged: current.has_privileged_bindings(),
        };

        let committed = delegate.last_committed_entry();
        let current_url = committed
            .as_ref()
            .map(|e| e.url().clone())
            .or_else(|| delegate.partition_site(view.partition));

        let force_swap = self.resolver.privilege_mismatch(&view, entry);
        let requires_swap = self
            .resolver
            .requires_swap(&view, current_url.as_ref(), entry);

        let target = if force_swap {
            match entry.assigned_partition() {
                Some(p) if p != view.partition => p,
                _ => delegate.isolated_partition(entry.url()),
            }
        } else if self.resolver.process_per_tab() {
            view.partition
        } else {
            match entry.assigned_partition() {
                Some(p) => p,
                None if requires_swap => delegate.related_partition(view.partition, entry.url())?,
                None => view.partition,
            }
        };

        let cancelled = {
            let (tracker, mut surfaces) = self.split();
            tracker.cancel_if_superseded(target, &mut surfaces, delegate)
        };
        self.report_cancel(cancelled);

        if target == view.partition && !force_swap {
            return self.navigate_in_place(entry, delegate);
        }

        let begun = {
            let (tracker, mut surfaces) = self.split();
            tracker.begin(entry, target, &mut surfaces, delegate)
        };

        match begun {
            Ok(outcome) => Ok(self.after_begin(entry, target, outcome, delegate)),
            Err(e) => {
                warn!("Swap to {} failed, navigating in place: {}", target, e);
                self.observers.notify(SurfaceEvent::SwapFallback {
                    partition: target,
                    reason: e.to_string(),
                });
                self.navigate_in_place(entry, delegate)
            }
        }
    }

    fn after_begin(
        &mut self,
        entry: &NavigationEntry,
        target: SiteInstanceId,
        outcome: BeginOutcome,
        delegate: &mut dyn ManagerDelegate,
    ) -> SurfaceId {
        if outcome.created {
            self.observers.notify(SurfaceEvent::Created {
                surface: outcome.surface,
                partition: target,
            });
        }
        if entry.required_privilege_tier().is_privileged() {
            delegate.assign_site(target, entry.url());
        }

        if outcome.reused_pending || self.current_ref().is_live() {
            return outcome.surface;
        }

        // Nothing to ask for permission: the old surface never loaded or its
        // renderer is gone
        debug!("Current {} is not live, committing {} immediately", self.current, outcome.surface);
        self.commit_pending(delegate);
        self.current
    }

    fn navigate_in_place(
        &mut self,
        entry: &NavigationEntry,
        delegate: &mut dyn ManagerDelegate,
    ) -> Result<SurfaceId> {
        match self.current_ref().state() {
            SurfaceState::NotStarted => {
                let current = self.current;
                if let Some(s) = self.arena.get_mut(current) {
                    s.set_state(SurfaceState::Live);
                    s.send(SurfaceMessage::CreateView, delegate);
                }
            }
            SurfaceState::Crashed => self.replace_crashed_current(delegate)?,
            SurfaceState::SwappedOut => {
                let current = self.current;
                if let Some(s) = self.arena.get_mut(current) {
                    s.set_state(SurfaceState::Live);
                }
            }
            SurfaceState::Live => {}
        }

        if entry.required_privilege_tier().is_privileged() {
            delegate.assign_site(self.current_partition(), entry.url());
        }
        Ok(self.current)
    }

    fn replace_crashed_current(&mut self, delegate: &mut dyn ManagerDelegate) -> Result<()> {
        let old = self.current;
        let partition = self.current_partition();
        let privileged = self.current_ref().has_privileged_bindings();

        let spawn = delegate.create_render_surface(partition)?;
        let new = self.arena.insert(partition, spawn, SurfaceState::Live, false);
        if let Some(s) = self.arena.get_mut(new) {
            s.send(SurfaceMessage::CreateView, delegate);
            if privileged {
                s.grant_privileged_bindings(delegate);
            }
        }
        self.observers.notify(SurfaceEvent::Created {
            surface: new,
            partition,
        });

        info!("Replacing crashed {} with {}", old, new);
        self.current = new;
        self.arena.destroy(old, delegate);
        self.observers.notify(SurfaceEvent::Destroyed { surface: old });
        delegate.active_surface_changed(Some(old), new);
        self.observers.notify(SurfaceEvent::Swapped {
            old: Some(old),
            new,
        });
        Ok(())
    }

    /// Send a navigation to a surface, holding it while the surface waits
    /// for the beforeunload answer
    pub fn send_navigate(
        &mut self,
        surface: SurfaceId,
        params: NavigateParams,
        delegate: &mut dyn ManagerDelegate,
    ) {
        match self.arena.get_mut(surface) {
            Some(s) => s.navigate(params, delegate),
            None => warn!("Navigate for unknown {}", surface),
        }
    }

    /// Stop loading in the current surface and any pending one
    pub fn stop(&mut self, delegate: &mut dyn ManagerDelegate) {
        self.current_ref().send(SurfaceMessage::Stop, delegate);
        if let Some(pending) = self.pending_surface().and_then(|id| self.arena.get(id)) {
            pending.send(SurfaceMessage::Stop, delegate);
        }
    }

    /// Ordering rule for commits: decides whether a commit from `surface`
    /// is recorded
    ///
    /// # Panics
    ///
    /// Panics when `surface` does not belong to this manager.
    pub fn filter_commit(
        &mut self,
        surface: SurfaceId,
        is_main_frame: bool,
        delegate: &mut dyn ManagerDelegate,
    ) -> CommitDisposition {
        if surface == self.current {
            let decision = {
                let (tracker, mut surfaces) = self.split();
                tracker.filter_current_commit(is_main_frame, &mut surfaces, delegate)
            };
            return match decision {
                CurrentCommit::Accept => CommitDisposition::Commit,
                CurrentCommit::Preempt => {
                    self.observers.notify(SurfaceEvent::PendingCancelled {
                        surface: self.current,
                    });
                    CommitDisposition::Commit
                }
                CurrentCommit::ImplicitProceed | CurrentCommit::Ignore => CommitDisposition::Drop,
            };
        }
        if Some(surface) == self.pending_surface() {
            return CommitDisposition::Commit;
        }
        if self.is_swapped_out(surface) {
            debug!("Dropping commit from swapped-out {}", surface);
            return CommitDisposition::Drop;
        }
        panic!("commit from {} which is neither current nor pending", surface);
    }

    /// A main-frame load committed in `surface`. A pending surface becomes
    /// current; a commit from the current surface cancels any pending
    /// navigation.
    ///
    /// # Panics
    ///
    /// Panics when `surface` is neither current nor pending.
    pub fn did_navigate_main_frame(
        &mut self,
        surface: SurfaceId,
        url: &Url,
        delegate: &mut dyn ManagerDelegate,
    ) {
        if Some(surface) == self.pending_surface() {
            self.commit_pending(delegate);
        } else if surface == self.current {
            let cancelled = {
                let (tracker, mut surfaces) = self.split();
                tracker.cancel(&mut surfaces, delegate)
            };
            self.report_cancel(cancelled);
            let current = self.current;
            if let Some(s) = self.arena.get_mut(current) {
                if matches!(s.state(), SurfaceState::NotStarted | SurfaceState::SwappedOut) {
                    s.set_state(SurfaceState::Live);
                }
            }
        } else {
            panic!("{} committed but is neither current nor pending", surface);
        }

        let partition = self.current_partition();
        if delegate.partition_site(partition).is_none() {
            delegate.assign_site(partition, url);
        }
    }

    /// Beforeunload answer of the current surface. Cross-site answers drive
    /// the pending navigation; others decide whether the tab closes.
    pub fn should_close_page(
        &mut self,
        for_cross_site: bool,
        proceed: bool,
        delegate: &mut dyn ManagerDelegate,
    ) {
        if !for_cross_site {
            if delegate.before_unload_fired(proceed) {
                self.current_ref().send(SurfaceMessage::ClosePage, delegate);
            }
            return;
        }

        let pending = self.pending_surface();
        let ack = {
            let (tracker, mut surfaces) = self.split();
            tracker.on_unload_ack(proceed, &mut surfaces, delegate)
        };
        match (ack, pending) {
            (UnloadAck::AckedCancel, Some(surface)) => {
                self.observers.notify(SurfaceEvent::PendingCancelled { surface });
            }
            (UnloadAck::NotRequested, _) => {
                debug!("Beforeunload answer without a pending navigation");
            }
            _ => {}
        }
    }

    /// The pending surface received its response; ask the current surface
    /// to unload
    pub fn on_cross_site_response(&mut self, request_id: u64, delegate: &mut dyn ManagerDelegate) {
        let (tracker, mut surfaces) = self.split();
        tracker.request_unload(request_id, &mut surfaces, delegate);
    }

    /// A surface finished unloading
    pub fn on_swap_out_ack(&mut self, surface: SurfaceId, delegate: &mut dyn ManagerDelegate) {
        if surface != self.current {
            debug!("Swap-out ack from non-current {}", surface);
            return;
        }
        let (tracker, mut surfaces) = self.split();
        if !tracker.on_swap_out_ack(&mut surfaces, delegate) {
            debug!("Unsolicited swap-out ack from {}", surface);
        }
    }

    /// The renderer of `surface` went away
    pub fn render_view_gone(&mut self, surface: SurfaceId, delegate: &mut dyn ManagerDelegate) {
        let Some(s) = self.arena.get_mut(surface) else {
            warn!("Crash reported for unknown {}", surface);
            return;
        };
        s.set_state(SurfaceState::Crashed);
        s.clear_held_navigation();
        self.observers.notify(SurfaceEvent::Crashed { surface });

        if Some(surface) == self.pending_surface() {
            warn!("Pending {} crashed; keeping {}", surface, self.current);
            let cancelled = {
                let (tracker, mut surfaces) = self.split();
                tracker.cancel(&mut surfaces, delegate)
            };
            self.report_cancel(cancelled);
        } else if surface == self.current {
            let (tracker, mut surfaces) = self.split();
            tracker.on_current_gone(&mut surfaces, delegate);
        } else if self.swapped_out.contains_surface(surface) {
            let removed = self.swapped_out.drain_where(|_, s| s == surface);
            self.destroy_all(removed, delegate);
        }
    }

    /// A renderer process is exiting. Swapped-out surfaces hosted by it can
    /// no longer be reused.
    pub fn renderer_process_closing(
        &mut self,
        process: ProcessId,
        delegate: &mut dyn ManagerDelegate,
    ) {
        let arena = &self.arena;
        let removed = self
            .swapped_out
            .drain_where(|_, s| arena.get(s).is_some_and(|r| r.process() == process));
        if !removed.is_empty() {
            debug!("Dropping {} swapped-out surfaces of {}", removed.len(), process);
        }
        self.destroy_all(removed, delegate);
    }

    /// Destroy swapped-out surfaces whose partition fails `keep`
    pub fn prune_swapped_out(
        &mut self,
        mut keep: impl FnMut(SiteInstanceId) -> bool,
        delegate: &mut dyn ManagerDelegate,
    ) -> usize {
        let removed = self.swapped_out.drain_where(|partition, _| !keep(partition));
        let count = removed.len();
        self.destroy_all(removed, delegate);
        count
    }

    /// Create a live surface outside the current/pending slots
    pub fn create_detached_surface(
        &mut self,
        partition: SiteInstanceId,
        delegate: &mut dyn ManagerDelegate,
    ) -> Result<SurfaceId> {
        let spawn = delegate.create_render_surface(partition)?;
        let id = self.arena.insert(partition, spawn, SurfaceState::Live, false);
        if let Some(s) = self.arena.get(id) {
            s.send(SurfaceMessage::CreateView, delegate);
        }
        self.observers.notify(SurfaceEvent::Created {
            surface: id,
            partition,
        });
        Ok(id)
    }

    /// Destroy a surface created with `create_detached_surface`
    pub fn destroy_detached_surface(
        &mut self,
        surface: SurfaceId,
        delegate: &mut dyn ManagerDelegate,
    ) {
        if surface == self.current || Some(surface) == self.pending_surface() {
            warn!("Refusing to destroy attached {}", surface);
            return;
        }
        if self.arena.destroy(surface, delegate).is_some() {
            self.observers.notify(SurfaceEvent::Destroyed { surface });
        }
    }

    /// Mark a detached surface crashed
    pub fn mark_detached_crashed(&mut self, surface: SurfaceId) {
        if let Some(s) = self.arena.get_mut(surface) {
            s.set_state(SurfaceState::Crashed);
            self.observers.notify(SurfaceEvent::Crashed { surface });
        }
    }

    /// Send a message to any surface the manager owns
    pub fn send_to(
        &self,
        surface: SurfaceId,
        message: SurfaceMessage,
        delegate: &mut dyn ManagerDelegate,
    ) -> bool {
        match self.arena.get(surface) {
            Some(s) => {
                s.send(message, delegate);
                true
            }
            None => false,
        }
    }

    /// Tear down every surface. The manager is unusable afterwards.
    pub fn shutdown(mut self, delegate: &mut dyn ManagerDelegate) {
        let cancelled = {
            let (tracker, mut surfaces) = self.split();
            tracker.cancel(&mut surfaces, delegate)
        };
        self.report_cancel(cancelled);

        let ids = self.arena.ids();
        info!("Shutting down {} surfaces", ids.len());
        self.destroy_all(ids, delegate);
    }

    fn commit_pending(&mut self, delegate: &mut dyn ManagerDelegate) {
        let Some(nav) = self.tracker.take() else {
            return;
        };
        let old = self.current;
        let new = nav.surface;

        if let Some(s) = self.arena.get_mut(new) {
            s.set_navigations_suspended(false, delegate);
            s.set_state(SurfaceState::Live);
        }
        self.current = new;

        let (old_state, old_partition) = match self.arena.get(old) {
            Some(s) => (s.state(), s.partition()),
            None => (SurfaceState::Crashed, nav.partition),
        };
        let unload_sent = matches!(
            nav.phase,
            HandshakePhase::UnloadRequested { .. } | HandshakePhase::Unloaded { .. }
        );
        match old_state {
            SurfaceState::Live | SurfaceState::SwappedOut => {
                if let Some(s) = self.arena.get_mut(old) {
                    if old_state == SurfaceState::Live && !unload_sent {
                        // Committed without a network response; unload now
                        s.send(SurfaceMessage::SwapOut { request_id: 0 }, delegate);
                    }
                    s.set_state(SurfaceState::SwappedOut);
                }
                if let Some(displaced) = self.swapped_out.park(old_partition, old) {
                    self.destroy_all(vec![displaced], delegate);
                }
                self.observers.notify(SurfaceEvent::SwappedOut {
                    surface: old,
                    partition: old_partition,
                });
            }
            SurfaceState::NotStarted | SurfaceState::Crashed => {
                self.destroy_all(vec![old], delegate);
            }
        }

        info!("{} replaced {} as current surface", new, old);
        delegate.active_surface_changed(Some(old), new);
        self.observers.notify(SurfaceEvent::Swapped {
            old: Some(old),
            new,
        });

        if self.current_ref().has_privileged_bindings() {
            delegate.focus_default_ui();
        }
    }

    fn report_cancel(&mut self, cancelled: Option<CancelledNavigation>) {
        if let Some(c) = cancelled {
            self.observers.notify(SurfaceEvent::PendingCancelled { surface: c.surface });
            if c.destroyed {
                self.observers.notify(SurfaceEvent::Destroyed { surface: c.surface });
            }
        }
    }

    fn destroy_all(&mut self, ids: Vec<SurfaceId>, delegate: &mut dyn ManagerDelegate) {
        for id in ids {
            if self.arena.destroy(id, delegate).is_some() {
                self.observers.notify(SurfaceEvent::Destroyed { surface: id });
            }
        }
    }

    fn split(&mut self) -> (&mut PendingNavigationTracker, Surfaces<'_>) {
        let surfaces = Surfaces {
            arena: &mut self.arena,
            swapped_out: &mut self.swapped_out,
            current: self.current,
        };
        (&mut self.tracker, surfaces)
    }

    fn current_ref(&self) -> &RenderSurface {
        self.arena
            .get(self.current)
            .unwrap_or_else(|| panic!("current {} missing from arena", self.current))
    }
}

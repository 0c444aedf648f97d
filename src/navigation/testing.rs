//! Recording delegate for unit tests

use url::Url;

use super::entry::{EntryId, NavigationEntry, Transition};
use super::manager::ManagerDelegate;
use super::surface::{SurfaceId, SurfaceSpawn};
use crate::config::NavigationConfig;
use crate::process::{
    Outbox, PrivilegeTier, ProcessId, ProcessManager, RoutingId, SiteInstanceId, SurfaceMessage,
};
use crate::utils::error::{NavError, Result};

pub(crate) struct FakeDelegate {
    pub processes: ProcessManager,
    pub outbox: Outbox,
    pub committed: Option<NavigationEntry>,
    pub released: Vec<SurfaceId>,
    pub swaps: Vec<(Option<SurfaceId>, SurfaceId)>,
    pub focus_requests: usize,
    pub fail_creation: bool,
    next_entry: u64,
}

impl FakeDelegate {
    pub fn new() -> Self {
        Self {
            processes: ProcessManager::new(),
            outbox: Outbox::new(),
            committed: None,
            released: Vec::new(),
            swaps: Vec::new(),
            focus_requests: 0,
            fail_creation: false,
            next_entry: 1,
        }
    }

    /// A fresh history entry for `url`
    pub fn entry(&mut self, url: &str) -> NavigationEntry {
        let url = Url::parse(url).unwrap();
        let tier = PrivilegeTier::for_url(&url, &NavigationConfig::default());
        let id = EntryId::new(self.next_entry);
        self.next_entry += 1;
        NavigationEntry::new(id, url, Transition::Typed, tier)
    }

    /// Remember `entry` as committed in `partition`
    pub fn record_commit(
        &mut self,
        mut entry: NavigationEntry,
        partition: SiteInstanceId,
    ) -> NavigationEntry {
        entry.assign_partition(partition);
        self.committed = Some(entry.clone());
        entry
    }

    /// Messages queued for `surface`
    pub fn sent(&self, surface: SurfaceId) -> Vec<SurfaceMessage> {
        self.outbox.messages_for(surface).cloned().collect()
    }

    pub fn count_sent(
        &self,
        surface: SurfaceId,
        matches: impl Fn(&SurfaceMessage) -> bool,
    ) -> usize {
        self.outbox.messages_for(surface).filter(|m| matches(m)).count()
    }
}

impl ManagerDelegate for FakeDelegate {
    fn create_render_surface(&mut self, partition: SiteInstanceId) -> Result<SurfaceSpawn> {
        if self.fail_creation {
            return Err(NavError::ProcessLimitReached(0));
        }
        let process = self.processes.spawn_renderer(partition)?;
        Ok(SurfaceSpawn {
            process,
            routing_id: self.processes.next_routing_id(),
        })
    }

    fn related_partition(&mut self, current: SiteInstanceId, url: &Url) -> Result<SiteInstanceId> {
        self.processes.related_site_instance(current, url)
    }

    fn isolated_partition(&mut self, url: &Url) -> SiteInstanceId {
        self.processes.isolated_site_instance(url)
    }

    fn partition_site(&self, partition: SiteInstanceId) -> Option<Url> {
        self.processes
            .site_instance(partition)
            .and_then(|i| i.site_url().cloned())
    }

    fn assign_site(&mut self, partition: SiteInstanceId, url: &Url) {
        self.processes.set_site(partition, url);
    }

    fn last_committed_entry(&self) -> Option<NavigationEntry> {
        self.committed.clone()
    }

    fn send(&mut self, surface: SurfaceId, routing_id: RoutingId, message: SurfaceMessage) {
        self.outbox.post(surface, routing_id, message);
    }

    fn active_surface_changed(&mut self, old: Option<SurfaceId>, new: SurfaceId) {
        self.swaps.push((old, new));
    }

    fn focus_default_ui(&mut self) {
        self.focus_requests += 1;
    }

    fn before_unload_fired(&mut self, proceed: bool) -> bool {
        proceed
    }

    fn release_surface(&mut self, surface: SurfaceId, process: ProcessId) {
        self.released.push(surface);
        self.processes.release_renderer(process);
    }
}

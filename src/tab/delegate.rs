//! Surface manager services provided by a tab

use log::debug;
use url::Url;

use crate::navigation::{ManagerDelegate, NavigationEntry, SurfaceId, SurfaceSpawn};
use crate::process::{
    Outbox, ProcessId, ProcessManager, RoutingId, SiteInstanceId, SurfaceMessage,
};
use crate::utils::error::Result;

/// Counters a tab keeps about its own surfaces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabStatus {
    /// Times the current surface changed
    pub swaps: usize,
    /// Requests to focus the location bar
    pub focus_requests: usize,
    /// The page agreed to close
    pub close_approved: bool,
}

/// Borrowed view of a tab handed to the surface manager for one operation
pub struct TabDelegate<'a> {
    processes: &'a mut ProcessManager,
    outbox: &'a mut Outbox,
    status: &'a mut TabStatus,
    committed: Option<NavigationEntry>,
}

impl<'a> TabDelegate<'a> {
    pub fn new(
        processes: &'a mut ProcessManager,
        outbox: &'a mut Outbox,
        status: &'a mut TabStatus,
        committed: Option<NavigationEntry>,
    ) -> Self {
        Self {
            processes,
            outbox,
            status,
            committed,
        }
    }
}

impl ManagerDelegate for TabDelegate<'_> {
    fn create_render_surface(&mut self, partition: SiteInstanceId) -> Result<SurfaceSpawn> {
        let process = match self.processes.spawn_renderer(partition) {
            Ok(process) => process,
            Err(e) => {
                // Nothing else will ever hold a partition made for this surface
                if self.processes.discard_unused_site_instance(partition) {
                    debug!("Discarded {} after failed spawn", partition);
                }
                return Err(e);
            }
        };
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
        debug!("Active surface {:?} -> {}", old, new);
        self.status.swaps += 1;
    }

    fn focus_default_ui(&mut self) {
        self.status.focus_requests += 1;
    }

    fn before_unload_fired(&mut self, proceed: bool) -> bool {
        self.status.close_approved = proceed;
        proceed
    }

    fn release_surface(&mut self, surface: SurfaceId, process: ProcessId) {
        debug!("Releasing {} from {}", surface, process);
        self.processes.release_renderer(process);
    }
}

//! Process manager for multi-process architecture
//!
//! Allocates site instances per browsing instance and keeps the renderer
//! process bookkeeping for the surfaces that live in them.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};
use url::Url;

use super::ipc::RoutingId;
use super::site::{BrowsingInstanceId, Site, SiteInstance, SiteInstanceId};
use crate::utils::error::{NavError, Result};

/// Identifier of a renderer process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u32);

impl ProcessId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process#{}", self.0)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Crashed,
    Terminated,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Running => "Running",
            ProcessState::Crashed => "Crashed",
            ProcessState::Terminated => "Terminated",
        }
    }
}

/// Information about a renderer process
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub state: ProcessState,
    pub site_instance: SiteInstanceId,
    /// Surfaces hosted by this process
    pub surface_count: usize,
    pub start_time: Instant,
}

impl ProcessInfo {
    /// Create a new process info
    pub fn new(id: ProcessId, site_instance: SiteInstanceId) -> Self {
        Self {
            id,
            state: ProcessState::Running,
            site_instance,
            surface_count: 0,
            start_time: Instant::now(),
        }
    }

    /// Get uptime
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

/// Process manager
pub struct ProcessManager {
    processes: HashMap<ProcessId, ProcessInfo>,
    instances: HashMap<SiteInstanceId, SiteInstance>,
    site_to_instance: HashMap<(BrowsingInstanceId, Site), SiteInstanceId>,
    next_process_id: u32,
    next_instance_id: u32,
    next_browsing_instance_id: u32,
    next_routing_id: u32,
    max_renderer_processes: usize,
}

impl ProcessManager {
    /// Create a new process manager
    pub fn new() -> Self {
        Self::with_max_renderers(crate::defaults::MAX_RENDERER_PROCESSES)
    }

    /// Create a process manager with a renderer process cap
    pub fn with_max_renderers(max_renderer_processes: usize) -> Self {
        Self {
            processes: HashMap::new(),
            instances: HashMap::new(),
            site_to_instance: HashMap::new(),
            next_process_id: 1,
            next_instance_id: 1,
            next_browsing_instance_id: 1,
            next_routing_id: 1,
            max_renderer_processes,
        }
    }

    /// Create a site instance in a fresh browsing instance
    pub fn create_site_instance(&mut self) -> SiteInstanceId {
        let browsing_instance = self.next_browsing_instance();
        self.new_instance(browsing_instance)
    }

    /// Site instance for `url` in the same browsing instance as `current`.
    /// Reuses the instance already registered for that site.
    pub fn related_site_instance(
        &mut self,
        current: SiteInstanceId,
        url: &Url,
    ) -> Result<SiteInstanceId> {
        let browsing_instance = self
            .instances
            .get(&current)
            .map(|i| i.browsing_instance)
            .ok_or(NavError::UnknownSiteInstance(current))?;

        if let Some(site) = Site::for_url(url) {
            if let Some(&existing) = self.site_to_instance.get(&(browsing_instance, site)) {
                return Ok(existing);
            }
        }

        let id = self.new_instance(browsing_instance);
        self.set_site(id, url);
        Ok(id)
    }

    /// Site instance for `url` in a fresh browsing instance
    pub fn isolated_site_instance(&mut self, url: &Url) -> SiteInstanceId {
        let id = self.create_site_instance();
        self.set_site(id, url);
        id
    }

    /// Record the site of an instance. The first recorded site sticks.
    pub fn set_site(&mut self, id: SiteInstanceId, url: &Url) -> bool {
        let Some(instance) = self.instances.get_mut(&id) else {
            warn!("set_site on unknown {}", id);
            return false;
        };
        if !instance.set_site(url) {
            return false;
        }
        if let Some(site) = Site::for_url(url) {
            debug!("{} assigned site {}", id, site);
            self.site_to_instance
                .entry((instance.browsing_instance, site))
                .or_insert(id);
        }
        true
    }

    /// Get a site instance
    pub fn site_instance(&self, id: SiteInstanceId) -> Option<&SiteInstance> {
        self.instances.get(&id)
    }

    /// Number of live site instances
    pub fn site_instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Hold `id` on behalf of something other than a surface
    pub fn retain_site_instance(&mut self, id: SiteInstanceId) {
        match self.instances.get_mut(&id) {
            Some(instance) => instance.refs += 1,
            None => warn!("retain on unknown {}", id),
        }
    }

    /// Drop one hold on `id`. The instance goes away with its last hold.
    pub fn release_site_instance(&mut self, id: SiteInstanceId) {
        let Some(instance) = self.instances.get_mut(&id) else {
            return;
        };
        instance.refs = instance.refs.saturating_sub(1);
        if instance.refs == 0 {
            self.remove_instance(id);
        }
    }

    /// Remove `id` if nothing holds it yet
    pub fn discard_unused_site_instance(&mut self, id: SiteInstanceId) -> bool {
        if self.instances.get(&id).is_some_and(|i| i.refs == 0) {
            self.remove_instance(id);
            true
        } else {
            false
        }
    }

    /// Renderer process for a surface in `instance`. Surfaces of the same
    /// instance share one process. The surface holds `instance` until
    /// [`release_renderer`](Self::release_renderer).
    pub fn spawn_renderer(&mut self, instance: SiteInstanceId) -> Result<ProcessId> {
        let existing = self
            .instances
            .get(&instance)
            .ok_or(NavError::UnknownSiteInstance(instance))?
            .process;

        if let Some(id) = existing {
            if let Some(info) = self.processes.get_mut(&id) {
                if info.state == ProcessState::Running {
                    info.surface_count += 1;
                    self.retain_site_instance(instance);
                    return Ok(id);
                }
            }
        }

        if self.renderer_count() >= self.max_renderer_processes {
            warn!(
                "Cannot spawn renderer for {}: limit of {} reached",
                instance, self.max_renderer_processes
            );
            return Err(NavError::ProcessLimitReached(self.max_renderer_processes));
        }

        let id = ProcessId::new(self.next_process_id);
        self.next_process_id += 1;

        let mut info = ProcessInfo::new(id, instance);
        info.surface_count = 1;
        self.processes.insert(id, info);
        if let Some(site_instance) = self.instances.get_mut(&instance) {
            site_instance.process = Some(id);
            site_instance.refs += 1;
        }

        info!("Spawned renderer {} for {}", id, instance);
        Ok(id)
    }

    /// A surface hosted by `id` went away. The process is terminated and
    /// forgotten once it hosts nothing.
    pub fn release_renderer(&mut self, id: ProcessId) {
        let Some(info) = self.processes.get_mut(&id) else {
            return;
        };
        info.surface_count = info.surface_count.saturating_sub(1);
        let instance = info.site_instance;
        if info.surface_count == 0 {
            if info.state == ProcessState::Running {
                self.terminate(id);
            }
            self.cleanup();
        }
        self.release_site_instance(instance);
    }

    /// Allocate a routing id for a new surface
    pub fn next_routing_id(&mut self) -> RoutingId {
        let id = RoutingId::new(self.next_routing_id);
        self.next_routing_id += 1;
        id
    }

    /// Get process info
    pub fn get_process(&self, id: ProcessId) -> Option<&ProcessInfo> {
        self.processes.get(&id)
    }

    /// Get all processes
    pub fn all_processes(&self) -> impl Iterator<Item = &ProcessInfo> {
        self.processes.values()
    }

    /// Terminate a process
    pub fn terminate(&mut self, id: ProcessId) {
        if let Some(info) = self.processes.get_mut(&id) {
            info.state = ProcessState::Terminated;
            debug!("Terminated renderer {}", id);
            self.detach(id);
        }
    }

    /// Mark process as crashed. Later surfaces in its instances get a new
    /// process.
    pub fn mark_crashed(&mut self, id: ProcessId) {
        if let Some(info) = self.processes.get_mut(&id) {
            if info.state == ProcessState::Running {
                warn!("Renderer {} crashed", id);
                info.state = ProcessState::Crashed;
                self.detach(id);
            }
        }
    }

    /// Get process count
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Number of running renderer processes
    pub fn renderer_count(&self) -> usize {
        self.processes
            .values()
            .filter(|p| p.state == ProcessState::Running)
            .count()
    }

    /// Set max renderer processes
    pub fn set_max_renderers(&mut self, max: usize) {
        self.max_renderer_processes = max;
    }

    /// Forget terminated processes and crashed ones that host nothing
    pub fn cleanup(&mut self) {
        self.processes.retain(|_, p| match p.state {
            ProcessState::Running => true,
            ProcessState::Crashed => p.surface_count > 0,
            ProcessState::Terminated => false,
        });
    }

    fn detach(&mut self, process: ProcessId) {
        for instance in self.instances.values_mut() {
            if instance.process == Some(process) {
                instance.process = None;
            }
        }
    }

    fn remove_instance(&mut self, id: SiteInstanceId) {
        if self.instances.remove(&id).is_some() {
            self.site_to_instance.retain(|_, instance| *instance != id);
            debug!("Dropped {}", id);
        }
    }

    fn next_browsing_instance(&mut self) -> BrowsingInstanceId {
        let id = BrowsingInstanceId::new(self.next_browsing_instance_id);
        self.next_browsing_instance_id += 1;
        id
    }

    fn new_instance(&mut self, browsing_instance: BrowsingInstanceId) -> SiteInstanceId {
        let id = SiteInstanceId::new(self.next_instance_id);
        self.next_instance_id += 1;
        self.instances
            .insert(id, SiteInstance::new(id, browsing_instance));
        id
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

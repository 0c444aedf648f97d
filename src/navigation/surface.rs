//! Render surfaces and the arena that owns them
//!
//! Surfaces are addressed by [`SurfaceId`] handles; the arena is the single
//! owner. Destroying a surface removes it from the arena, tells the renderer
//! to shut the view down and releases its process reference exactly once.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use super::manager::ManagerDelegate;
use crate::process::{NavigateParams, ProcessId, RoutingId, SiteInstanceId, SurfaceMessage};

/// Handle to a render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

impl SurfaceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Lifecycle state of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Created, renderer view not initialized yet
    NotStarted,
    /// Renderer view is alive
    Live,
    /// Renderer died
    Crashed,
    /// Unloaded and kept for reuse
    SwappedOut,
}

impl SurfaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceState::NotStarted => "NotStarted",
            SurfaceState::Live => "Live",
            SurfaceState::Crashed => "Crashed",
            SurfaceState::SwappedOut => "SwappedOut",
        }
    }
}

/// Process placement for a new surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSpawn {
    pub process: ProcessId,
    pub routing_id: RoutingId,
}

/// A renderer-backed view bound to one partition
#[derive(Debug, Clone)]
pub struct RenderSurface {
    id: SurfaceId,
    partition: SiteInstanceId,
    process: ProcessId,
    routing_id: RoutingId,
    state: SurfaceState,
    privileged: bool,
    navigations_suspended: bool,
    held_navigation: Option<NavigateParams>,
}

impl RenderSurface {
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn partition(&self) -> SiteInstanceId {
        self.partition
    }

    pub fn process(&self) -> ProcessId {
        self.process
    }

    pub fn routing_id(&self) -> RoutingId {
        self.routing_id
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn set_state(&mut self, state: SurfaceState) {
        self.state = state;
    }

    /// Renderer view is alive
    pub fn is_live(&self) -> bool {
        self.state == SurfaceState::Live
    }

    pub fn has_privileged_bindings(&self) -> bool {
        self.privileged
    }

    pub fn are_navigations_suspended(&self) -> bool {
        self.navigations_suspended
    }

    /// Navigation waiting for the suspension to lift
    pub fn held_navigation(&self) -> Option<&NavigateParams> {
        self.held_navigation.as_ref()
    }

    /// Grant internal-UI bindings. Returns false if already granted.
    pub fn grant_privileged_bindings(&mut self, delegate: &mut dyn ManagerDelegate) -> bool {
        if self.privileged {
            return false;
        }
        self.privileged = true;
        delegate.send(self.id, self.routing_id, SurfaceMessage::AllowPrivilegedBindings);
        true
    }

    /// Send a navigation, or hold it while navigations are suspended
    pub fn navigate(&mut self, params: NavigateParams, delegate: &mut dyn ManagerDelegate) {
        if self.navigations_suspended {
            debug!("{} holding navigation to {}", self.id, params.url);
            self.held_navigation = Some(params);
        } else {
            delegate.send(self.id, self.routing_id, SurfaceMessage::Navigate(params));
        }
    }

    /// Suspend or resume navigations. Resuming sends the held navigation.
    pub fn set_navigations_suspended(
        &mut self,
        suspended: bool,
        delegate: &mut dyn ManagerDelegate,
    ) {
        self.navigations_suspended = suspended;
        if !suspended {
            if let Some(params) = self.held_navigation.take() {
                delegate.send(self.id, self.routing_id, SurfaceMessage::Navigate(params));
            }
        }
    }

    /// Forget the held navigation without sending it
    pub fn clear_held_navigation(&mut self) {
        self.navigations_suspended = false;
        self.held_navigation = None;
    }

    pub fn send(&self, message: SurfaceMessage, delegate: &mut dyn ManagerDelegate) {
        delegate.send(self.id, self.routing_id, message);
    }
}

/// Owner of every surface of a tab
#[derive(Debug, Default)]
pub struct SurfaceArena {
    surfaces: HashMap<SurfaceId, RenderSurface>,
    next_id: u32,
}

impl SurfaceArena {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            next_id: 1,
        }
    }

    /// Add a surface and return its handle
    pub fn insert(
        &mut self,
        partition: SiteInstanceId,
        spawn: SurfaceSpawn,
        state: SurfaceState,
        privileged: bool,
    ) -> SurfaceId {
        let id = SurfaceId::new(self.next_id.max(1));
        self.next_id = id.get() + 1;
        self.surfaces.insert(
            id,
            RenderSurface {
                id,
                partition,
                process: spawn.process,
                routing_id: spawn.routing_id,
                state,
                privileged,
                navigations_suspended: false,
                held_navigation: None,
            },
        );
        debug!("Created {} in {} ({})", id, partition, spawn.process);
        id
    }

    pub fn get(&self, id: SurfaceId) -> Option<&RenderSurface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut RenderSurface> {
        self.surfaces.get_mut(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Remove a surface, shut its view down and release its process
    pub fn destroy(
        &mut self,
        id: SurfaceId,
        delegate: &mut dyn ManagerDelegate,
    ) -> Option<RenderSurface> {
        let surface = self.surfaces.remove(&id)?;
        if surface.state != SurfaceState::Crashed {
            surface.send(SurfaceMessage::Shutdown, delegate);
        }
        delegate.release_surface(id, surface.process);
        debug!("Destroyed {}", id);
        Some(surface)
    }

    pub fn ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<_> = self.surfaces.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

/// Swapped-out surfaces kept for reuse, keyed by partition
#[derive(Debug, Default)]
pub struct SwappedOutTable {
    surfaces: HashMap<SiteInstanceId, SurfaceId>,
}

impl SwappedOutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a surface. Returns the surface it displaced, if any.
    pub fn park(&mut self, partition: SiteInstanceId, surface: SurfaceId) -> Option<SurfaceId> {
        self.surfaces
            .insert(partition, surface)
            .filter(|displaced| *displaced != surface)
    }

    /// Take the surface parked for a partition
    pub fn take(&mut self, partition: SiteInstanceId) -> Option<SurfaceId> {
        self.surfaces.remove(&partition)
    }

    pub fn get(&self, partition: SiteInstanceId) -> Option<SurfaceId> {
        self.surfaces.get(&partition).copied()
    }

    pub fn contains_surface(&self, surface: SurfaceId) -> bool {
        self.surfaces.values().any(|s| *s == surface)
    }

    /// Remove and return every parked surface matching `predicate`
    pub fn drain_where(
        &mut self,
        mut predicate: impl FnMut(SiteInstanceId, SurfaceId) -> bool,
    ) -> Vec<SurfaceId> {
        let mut removed = Vec::new();
        self.surfaces.retain(|partition, surface| {
            if predicate(*partition, *surface) {
                removed.push(*surface);
                false
            } else {
                true
            }
        });
        removed.sort();
        removed
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

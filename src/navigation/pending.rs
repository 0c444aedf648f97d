//! Pending navigation tracker
//!
//! At most one cross-partition navigation is in flight per tab. The handshake
//! runs in order:
//!
//! 1. the current surface is asked to run its beforeunload handler while the
//!    pending surface holds its navigation;
//! 2. a positive answer lets the pending surface start loading;
//! 3. the first response for the pending surface asks the current surface to
//!    unload (swap out);
//! 4. once the unload is acknowledged the held response resumes and the
//!    pending surface is promoted when it commits.

use std::mem;

use log::{debug, info, warn};
use url::Url;

use super::entry::{EntryId, NavigationEntry};
use super::manager::ManagerDelegate;
use super::surface::{SurfaceArena, SurfaceId, SurfaceState, SwappedOutTable};
use crate::process::{SiteInstanceId, SurfaceMessage};
use crate::utils::error::{NavError, Result};

/// Where the unload handshake stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Waiting for the current surface's beforeunload answer
    BeforeUnloadRequested,
    /// Beforeunload approved, pending surface is loading
    Proceeding,
    /// Current surface was asked to unload
    UnloadRequested { request_id: u64 },
    /// Current surface unloaded, response resumed
    Unloaded { request_id: u64 },
}

/// Beforeunload status as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadAck {
    NotRequested,
    Requested,
    AckedProceed,
    AckedCancel,
}

/// The navigation in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNavigation {
    pub destination: Url,
    pub entry: EntryId,
    pub partition: SiteInstanceId,
    pub surface: SurfaceId,
    pub phase: HandshakePhase,
    /// The surface came out of the swapped-out table and goes back there on
    /// cancel
    pub reused_from_swapped_out: bool,
}

impl PendingNavigation {
    pub fn unload_ack(&self) -> UnloadAck {
        match self.phase {
            HandshakePhase::BeforeUnloadRequested => UnloadAck::Requested,
            _ => UnloadAck::AckedProceed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingState {
    #[default]
    Idle,
    Active(PendingNavigation),
}

/// Result of [`PendingNavigationTracker::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginOutcome {
    pub surface: SurfaceId,
    /// A brand-new surface was created
    pub created: bool,
    /// The navigation joined the one already pending for this partition
    pub reused_pending: bool,
}

/// What [`PendingNavigationTracker::cancel`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledNavigation {
    pub surface: SurfaceId,
    pub partition: SiteInstanceId,
    /// The surface was destroyed rather than parked
    pub destroyed: bool,
    /// The current surface was brought back from swapped-out
    pub restored_current: bool,
}

/// How a main-frame commit of the current surface interacts with the
/// pending navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentCommit {
    /// Nothing pending, or a sub-frame: commit normally
    Accept,
    /// Counted as the beforeunload answer; the commit is dropped
    ImplicitProceed,
    /// Current surface is unloading; the commit is dropped
    Ignore,
    /// The pending navigation was cancelled; the commit proceeds
    Preempt,
}

/// Surfaces the tracker works on
pub struct Surfaces<'a> {
    pub arena: &'a mut SurfaceArena,
    pub swapped_out: &'a mut SwappedOutTable,
    pub current: SurfaceId,
}

#[derive(Debug, Default)]
pub struct PendingNavigationTracker {
    state: PendingState,
}

impl PendingNavigationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PendingState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingNavigation> {
        match &self.state {
            PendingState::Active(nav) => Some(nav),
            PendingState::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    pub fn pending_surface(&self) -> Option<SurfaceId> {
        self.pending().map(|nav| nav.surface)
    }

    pub fn phase(&self) -> Option<HandshakePhase> {
        self.pending().map(|nav| nav.phase)
    }

    /// Start (or join) a navigation into `partition`. When the current
    /// surface is live it is asked for its beforeunload answer and the
    /// pending surface holds its navigation until then.
    pub fn begin(
        &mut self,
        dest: &NavigationEntry,
        partition: SiteInstanceId,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> Result<BeginOutcome> {
        if let PendingState::Active(nav) = &mut self.state {
            if nav.partition == partition {
                debug!("{} joins pending navigation in {}", dest.id(), partition);
                nav.destination = dest.url().clone();
                nav.entry = dest.id();
                return Ok(BeginOutcome {
                    surface: nav.surface,
                    created: false,
                    reused_pending: true,
                });
            }
        }
        self.cancel(surfaces, delegate);

        let privileged = dest.required_privilege_tier().is_privileged();
        let parked = surfaces
            .swapped_out
            .take(partition)
            .filter(|id| surfaces.arena.contains(*id));

        let (surface, created) = match parked {
            Some(id) => {
                debug!("Reusing swapped-out {} for {}", id, partition);
                (id, false)
            }
            None => {
                let spawn = delegate
                    .create_render_surface(partition)
                    .map_err(|e| match e {
                        NavError::SurfaceCreation { .. } => e,
                        other => NavError::SurfaceCreation {
                            partition,
                            reason: other.to_string(),
                        },
                    })?;
                let id = surfaces
                    .arena
                    .insert(partition, spawn, SurfaceState::Live, false);
                if let Some(s) = surfaces.arena.get(id) {
                    s.send(SurfaceMessage::CreateView, delegate);
                }
                (id, true)
            }
        };

        let current_live = surfaces
            .arena
            .get(surfaces.current)
            .is_some_and(|s| s.is_live());

        if let Some(s) = surfaces.arena.get_mut(surface) {
            s.set_state(SurfaceState::Live);
            if privileged {
                s.grant_privileged_bindings(delegate);
            }
            if current_live {
                s.set_navigations_suspended(true, delegate);
            }
        }

        let phase = if current_live {
            if let Some(current) = surfaces.arena.get(surfaces.current) {
                current.send(SurfaceMessage::FireBeforeUnload { for_cross_site: true }, delegate);
            }
            HandshakePhase::BeforeUnloadRequested
        } else {
            HandshakePhase::Proceeding
        };

        info!("Pending navigation to {} in {} ({})", dest.url(), partition, surface);
        self.state = PendingState::Active(PendingNavigation {
            destination: dest.url().clone(),
            entry: dest.id(),
            partition,
            surface,
            phase,
            reused_from_swapped_out: parked.is_some(),
        });

        Ok(BeginOutcome {
            surface,
            created,
            reused_pending: false,
        })
    }

    /// The current surface answered its beforeunload request
    pub fn on_unload_ack(
        &mut self,
        proceed: bool,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> UnloadAck {
        let PendingState::Active(nav) = &mut self.state else {
            return UnloadAck::NotRequested;
        };

        if nav.phase != HandshakePhase::BeforeUnloadRequested {
            debug!("Ignoring late beforeunload answer ({:?})", nav.phase);
            return nav.unload_ack();
        }

        if proceed {
            nav.phase = HandshakePhase::Proceeding;
            if let Some(s) = surfaces.arena.get_mut(nav.surface) {
                s.set_navigations_suspended(false, delegate);
            }
            UnloadAck::AckedProceed
        } else {
            info!("Beforeunload denied navigation to {}", nav.destination);
            self.cancel(surfaces, delegate);
            UnloadAck::AckedCancel
        }
    }

    /// The pending surface got its response. Asks the current surface to
    /// unload, once per pending navigation.
    pub fn request_unload(
        &mut self,
        request_id: u64,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> bool {
        let PendingState::Active(nav) = &mut self.state else {
            debug!("Cross-site response {} without a pending navigation", request_id);
            return false;
        };
        if nav.phase != HandshakePhase::Proceeding {
            warn!(
                "Cross-site response {} in phase {:?} ignored",
                request_id, nav.phase
            );
            return false;
        }

        match surfaces.arena.get(surfaces.current).filter(|s| s.is_live()) {
            Some(current) => {
                current.send(SurfaceMessage::SwapOut { request_id }, delegate);
                nav.phase = HandshakePhase::UnloadRequested { request_id };
            }
            None => {
                // Nothing left to unload
                if let Some(s) = surfaces.arena.get(nav.surface) {
                    s.send(SurfaceMessage::ResumeResponse { request_id }, delegate);
                }
                nav.phase = HandshakePhase::Unloaded { request_id };
            }
        }
        true
    }

    /// The current surface finished unloading
    pub fn on_swap_out_ack(
        &mut self,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> bool {
        let PendingState::Active(nav) = &mut self.state else {
            return false;
        };
        let HandshakePhase::UnloadRequested { request_id } = nav.phase else {
            return false;
        };

        if let Some(current) = surfaces.arena.get_mut(surfaces.current) {
            current.set_state(SurfaceState::SwappedOut);
        }
        if let Some(s) = surfaces.arena.get(nav.surface) {
            s.send(SurfaceMessage::ResumeResponse { request_id }, delegate);
        }
        nav.phase = HandshakePhase::Unloaded { request_id };
        true
    }

    /// The current surface died. The navigation proceeds as if it had
    /// agreed to leave.
    pub fn on_current_gone(
        &mut self,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) {
        let PendingState::Active(nav) = &mut self.state else {
            return;
        };
        match nav.phase {
            HandshakePhase::BeforeUnloadRequested => {
                nav.phase = HandshakePhase::Proceeding;
                if let Some(s) = surfaces.arena.get_mut(nav.surface) {
                    s.set_navigations_suspended(false, delegate);
                }
            }
            HandshakePhase::UnloadRequested { request_id } => {
                if let Some(s) = surfaces.arena.get(nav.surface) {
                    s.send(SurfaceMessage::ResumeResponse { request_id }, delegate);
                }
                nav.phase = HandshakePhase::Unloaded { request_id };
            }
            HandshakePhase::Proceeding | HandshakePhase::Unloaded { .. } => {}
        }
    }

    /// Decide what a commit from the current surface means for the pending
    /// navigation
    pub fn filter_current_commit(
        &mut self,
        is_main_frame: bool,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> CurrentCommit {
        let Some(phase) = self.phase() else {
            return CurrentCommit::Accept;
        };
        if !is_main_frame {
            return CurrentCommit::Accept;
        }

        match phase {
            HandshakePhase::BeforeUnloadRequested => {
                debug!("Current surface committed while asked to unload; proceeding");
                self.on_unload_ack(true, surfaces, delegate);
                CurrentCommit::ImplicitProceed
            }
            HandshakePhase::UnloadRequested { .. } | HandshakePhase::Unloaded { .. } => {
                debug!("Dropping commit from unloading current surface");
                CurrentCommit::Ignore
            }
            HandshakePhase::Proceeding => {
                info!("Current surface commit preempts pending navigation");
                self.cancel(surfaces, delegate);
                CurrentCommit::Preempt
            }
        }
    }

    /// Cancel the pending navigation unless it targets `partition`
    pub fn cancel_if_superseded(
        &mut self,
        partition: SiteInstanceId,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> Option<CancelledNavigation> {
        let superseded =
            matches!(&self.state, PendingState::Active(nav) if nav.partition != partition);
        if superseded {
            self.cancel(surfaces, delegate)
        } else {
            None
        }
    }

    /// Abandon the pending navigation. Idempotent. The current surface is
    /// never replaced.
    pub fn cancel(
        &mut self,
        surfaces: &mut Surfaces<'_>,
        delegate: &mut dyn ManagerDelegate,
    ) -> Option<CancelledNavigation> {
        let PendingState::Active(nav) = mem::take(&mut self.state) else {
            return None;
        };

        let mut park = nav.reused_from_swapped_out;
        if let Some(s) = surfaces.arena.get_mut(nav.surface) {
            if s.state() == SurfaceState::Crashed {
                park = false;
            } else {
                s.send(SurfaceMessage::AbortNavigation, delegate);
            }
            s.clear_held_navigation();
        }

        if park {
            if let Some(s) = surfaces.arena.get_mut(nav.surface) {
                s.set_state(SurfaceState::SwappedOut);
            }
            if let Some(displaced) = surfaces.swapped_out.park(nav.partition, nav.surface) {
                surfaces.arena.destroy(displaced, delegate);
            }
        } else {
            surfaces.arena.destroy(nav.surface, delegate);
        }

        let mut restored_current = false;
        if let Some(current) = surfaces.arena.get_mut(surfaces.current) {
            if current.state() == SurfaceState::SwappedOut {
                current.set_state(SurfaceState::Live);
                restored_current = true;
            }
        }

        info!("Cancelled pending navigation to {}", nav.destination);
        Some(CancelledNavigation {
            surface: nav.surface,
            partition: nav.partition,
            destroyed: !park,
            restored_current,
        })
    }

    /// Hand the pending navigation over for promotion
    pub fn take(&mut self) -> Option<PendingNavigation> {
        match mem::take(&mut self.state) {
            PendingState::Active(nav) => Some(nav),
            PendingState::Idle => None,
        }
    }
}

//! Interstitial overlays
//!
//! A tab shows at most one interstitial (a warning page that blocks the
//! content underneath until the user decides). The overlay loads in its own
//! surface and only becomes visible once that surface commits. Showing a
//! second overlay declines the first one before the second starts loading.
//!
//! While an overlay is up, resource requests of the surface it covers are
//! blocked. They are released exactly once, either resumed or cancelled
//! depending on the decision and on whether the overlay stands for a new
//! navigation.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use url::Url;

use super::controller::NavigationController;
use super::entry::Transition;
use super::manager::{ManagerDelegate, SurfaceManager};
use super::observer::SurfaceEvent;
use super::surface::SurfaceId;
use crate::process::{NavigateParams, ResourceAction, SurfaceMessage};
use crate::utils::error::Result;

/// Content and callbacks of one interstitial page
pub trait InterstitialDelegate {
    /// Markup loaded into the overlay surface
    fn html_contents(&self) -> String;

    /// A command sent by the overlay page
    fn command_received(&mut self, _command: &str) {}

    fn on_decided(&mut self, _decision: Decision) {}

    /// Reload the covered page when the user declines
    fn reload_on_dont_proceed(&self) -> bool {
        false
    }

    fn on_destroyed(&mut self) {}
}

/// Overlay identifier, unique per tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

impl OverlayId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Created,
    /// Loading; not visible yet
    AwaitingCommit,
    Showing,
    Destroyed,
}

impl OverlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayState::Created => "created",
            OverlayState::AwaitingCommit => "awaiting-commit",
            OverlayState::Showing => "showing",
            OverlayState::Destroyed => "destroyed",
        }
    }
}

/// The user's answer to an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Undecided,
    Proceed,
    DontProceed,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Undecided => "undecided",
            Decision::Proceed => "proceed",
            Decision::DontProceed => "dont-proceed",
        }
    }
}

/// One interstitial page
pub struct InterstitialOverlay {
    id: OverlayId,
    url: Url,
    /// The overlay stands for a navigation that adds a history entry
    new_navigation: bool,
    should_discard_pending_entry: bool,
    reload_on_dont_proceed: bool,
    state: OverlayState,
    decision: Decision,
    /// Cleared once the user decided or navigated elsewhere
    enabled: bool,
    surface: Option<SurfaceId>,
    original_surface: SurfaceId,
    resource_action_taken: bool,
    original_title: Option<String>,
    content: Box<dyn InterstitialDelegate>,
}

impl fmt::Debug for InterstitialOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterstitialOverlay")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("new_navigation", &self.new_navigation)
            .field("state", &self.state)
            .field("decision", &self.decision)
            .field("enabled", &self.enabled)
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

impl InterstitialOverlay {
    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_new_navigation(&self) -> bool {
        self.new_navigation
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Surface the overlay covers
    pub fn original_surface(&self) -> SurfaceId {
        self.original_surface
    }

    /// Release or block the covered surface's requests. Resume and cancel
    /// are only sent once.
    fn take_resource_action(&mut self, action: ResourceAction, host: &mut OverlayHost<'_>) {
        if action != ResourceAction::Block {
            if self.resource_action_taken {
                return;
            }
            self.resource_action_taken = true;
        }
        let message = SurfaceMessage::ResourceRequests(action);
        if !host.manager.send_to(self.original_surface, message, host.delegate) {
            debug!("{} is gone, dropping resource action", self.original_surface);
        }
    }
}

/// What an overlay operation may touch
pub struct OverlayHost<'a> {
    pub controller: &'a mut NavigationController,
    pub manager: &'a mut SurfaceManager,
    pub delegate: &'a mut dyn ManagerDelegate,
}

/// Single-slot holder for a tab's interstitial
#[derive(Debug, Default)]
pub struct InterstitialStack {
    active: Option<InterstitialOverlay>,
    /// Surfaces of dismissed overlays; their late messages are dropped
    retired: HashSet<SurfaceId>,
    reload_requested: bool,
    next_id: u64,
}

impl InterstitialStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&InterstitialOverlay> {
        self.active.as_ref()
    }

    /// An overlay committed and is visible
    pub fn is_showing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|o| o.state == OverlayState::Showing)
    }

    /// The surface belongs to the active overlay or to a dismissed one
    pub fn owns_surface(&self, surface: SurfaceId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|o| o.surface == Some(surface))
            || self.retired.contains(&surface)
    }

    /// Show a new overlay for `url`, declining any undecided one first
    pub fn show(
        &mut self,
        url: Url,
        new_navigation: bool,
        content: Box<dyn InterstitialDelegate>,
        host: &mut OverlayHost<'_>,
    ) -> Result<OverlayId> {
        let data_url = Url::parse(&format!(
            "data:text/html;charset=utf-8,{}",
            escape_data(&content.html_contents())
        ))?;

        if let Some(mut old) = self.active.take() {
            if old.decision != Decision::Undecided {
                self.hide(old, host);
            } else {
                // The pending entry now belongs to the new overlay
                if new_navigation && old.new_navigation {
                    old.should_discard_pending_entry = false;
                }
                self.decline(old, host);
            }
        }

        self.next_id += 1;
        let mut overlay = InterstitialOverlay {
            id: OverlayId::new(self.next_id),
            url,
            new_navigation,
            should_discard_pending_entry: new_navigation,
            reload_on_dont_proceed: content.reload_on_dont_proceed(),
            state: OverlayState::Created,
            decision: Decision::Undecided,
            enabled: true,
            surface: None,
            original_surface: host.manager.current_surface(),
            resource_action_taken: false,
            original_title: None,
            content,
        };
        let id = overlay.id;

        overlay.take_resource_action(ResourceAction::Block, host);
        if new_navigation {
            host.controller.add_transient_entry(overlay.url.clone());
        }

        let partition = host.delegate.isolated_partition(&overlay.url);
        let surface = match host.manager.create_detached_surface(partition, host.delegate) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("No surface for {}: {}", id, e);
                self.decline(overlay, host);
                return Err(e);
            }
        };
        overlay.surface = Some(surface);

        let params = NavigateParams {
            entry: None,
            url: data_url,
            page_id: None,
            transition: Transition::Link,
        };
        host.manager
            .send_to(surface, SurfaceMessage::Navigate(params), host.delegate);
        overlay.state = OverlayState::AwaitingCommit;

        info!("{} loading in {} over {}", id, surface, overlay.original_surface);
        self.active = Some(overlay);
        Ok(id)
    }

    /// The overlay surface committed its page
    pub fn did_navigate(
        &mut self,
        surface: SurfaceId,
        is_main_frame: bool,
        host: &mut OverlayHost<'_>,
    ) {
        let Some(mut overlay) = self.take_if(|o| o.surface == Some(surface)) else {
            debug!("Ignoring commit from dismissed overlay surface {}", surface);
            return;
        };

        // Already accepted; it goes away with the next navigation commit
        if overlay.decision == Decision::Proceed {
            debug!("Ignoring commit from proceeded {}", overlay.id);
            self.active = Some(overlay);
            return;
        }
        // The owner navigated away while the overlay was loading
        if !overlay.enabled {
            self.decline(overlay, host);
            return;
        }
        if is_main_frame && overlay.state != OverlayState::Showing {
            overlay.state = OverlayState::Showing;
            info!("{} showing", overlay.id);
            host.manager.notify(SurfaceEvent::InterstitialAttached {
                overlay: overlay.id,
                surface,
            });
        }
        self.active = Some(overlay);
    }

    /// Accept the overlay. Honored once.
    pub fn proceed(&mut self, host: &mut OverlayHost<'_>) -> bool {
        let Some(mut overlay) = self.take_if(|o| o.decision == Decision::Undecided) else {
            warn!("Proceed without an undecided interstitial");
            return false;
        };

        overlay.enabled = false;
        overlay.decision = Decision::Proceed;
        // A new navigation leaves the covered page behind
        let action = if overlay.new_navigation {
            ResourceAction::Cancel
        } else {
            ResourceAction::Resume
        };
        overlay.take_resource_action(action, host);
        overlay.content.on_decided(Decision::Proceed);
        info!("{} proceeding", overlay.id);

        if overlay.new_navigation {
            // Hidden when the next navigation commits
            self.active = Some(overlay);
        } else {
            self.hide(overlay, host);
        }
        true
    }

    /// Decline the overlay and return to the covered page
    pub fn dont_proceed(&mut self, host: &mut OverlayHost<'_>) -> bool {
        match self.active.take() {
            Some(overlay) => {
                if overlay.reload_on_dont_proceed {
                    self.reload_requested = true;
                }
                self.decline(overlay, host);
                true
            }
            None => false,
        }
    }

    /// Whether a declined overlay asked for the covered page to reload.
    /// Clears the request.
    pub fn take_reload_request(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    /// Forward a command from the overlay page
    pub fn command(&mut self, command: &str) -> bool {
        match self.active.as_mut() {
            Some(o) if o.enabled && o.decision == Decision::Undecided => {
                o.content.command_received(command);
                true
            }
            _ => {
                debug!("Dropping interstitial command {:?}", command);
                false
            }
        }
    }

    /// The owner started another navigation. The overlay stays up until the
    /// navigation commits but no longer reacts.
    pub fn on_navigation_pending(&mut self, host: &mut OverlayHost<'_>) {
        if let Some(mut overlay) = self.active.take() {
            overlay.enabled = false;
            overlay.take_resource_action(ResourceAction::Cancel, host);
            self.active = Some(overlay);
        }
    }

    /// A main-frame load committed in the owner's surfaces
    pub fn on_main_frame_committed(&mut self, host: &mut OverlayHost<'_>) {
        self.dismiss(host);
    }

    /// The overlay's renderer went away
    pub fn on_surface_gone(&mut self, surface: SurfaceId, host: &mut OverlayHost<'_>) {
        host.manager.mark_detached_crashed(surface);
        if let Some(overlay) = self.take_if(|o| o.surface == Some(surface)) {
            warn!("{} crashed", overlay.id);
            self.decline(overlay, host);
        }
    }

    /// The covered surface's renderer went away
    pub fn on_current_surface_gone(&mut self, host: &mut OverlayHost<'_>) {
        if let Some(overlay) = self.take_if(|o| o.decision == Decision::Undecided) {
            warn!("Surface under {} crashed", overlay.id);
            self.decline(overlay, host);
        }
    }

    /// The tab is closing
    pub fn close(&mut self, host: &mut OverlayHost<'_>) {
        self.dismiss(host);
    }

    /// Title reported by the overlay page. Titles set over an existing entry
    /// are reverted when the overlay goes away.
    pub fn update_title(
        &mut self,
        surface: SurfaceId,
        title: &str,
        controller: &mut NavigationController,
    ) -> bool {
        let Some(overlay) = self.active.as_mut().filter(|o| o.surface == Some(surface)) else {
            return false;
        };
        let Some(entry) = controller.active_entry_mut() else {
            warn!("Title for {} without an active entry", overlay.id);
            return true;
        };
        if !overlay.new_navigation && overlay.original_title.is_none() {
            overlay.original_title = Some(entry.title().to_string());
        }
        entry.set_title(title);
        true
    }

    fn dismiss(&mut self, host: &mut OverlayHost<'_>) {
        if let Some(overlay) = self.active.take() {
            if overlay.decision == Decision::Undecided {
                self.decline(overlay, host);
            } else {
                self.hide(overlay, host);
            }
        }
    }

    fn decline(&mut self, mut overlay: InterstitialOverlay, host: &mut OverlayHost<'_>) {
        overlay.enabled = false;
        overlay.decision = Decision::DontProceed;
        // A new navigation returns to the covered page
        let action = if overlay.new_navigation {
            ResourceAction::Resume
        } else {
            ResourceAction::Cancel
        };
        overlay.take_resource_action(action, host);
        if overlay.should_discard_pending_entry {
            host.controller.discard_non_committed_entries();
        }
        overlay.content.on_decided(Decision::DontProceed);
        info!("{} declined", overlay.id);
        self.hide(overlay, host);
    }

    fn hide(&mut self, mut overlay: InterstitialOverlay, host: &mut OverlayHost<'_>) {
        if let Some(surface) = overlay.surface.take() {
            host.manager.destroy_detached_surface(surface, host.delegate);
            self.retired.insert(surface);
        }
        if let Some(title) = overlay.original_title.take() {
            if let Some(entry) = host.controller.active_entry_mut() {
                entry.set_title(title);
            }
        }

        overlay.state = OverlayState::Destroyed;
        host.manager.notify(SurfaceEvent::InterstitialDetached {
            overlay: overlay.id,
            decision: overlay.decision,
        });
        overlay.content.on_destroyed();
        debug!("{} destroyed ({})", overlay.id, overlay.decision.as_str());
    }

    fn take_if(
        &mut self,
        pred: impl FnOnce(&InterstitialOverlay) -> bool,
    ) -> Option<InterstitialOverlay> {
        if self.active.as_ref().is_some_and(pred) {
            self.active.take()
        } else {
            None
        }
    }
}

/// Escape page markup for the payload of a `data:` URL
fn escape_data(html: &str) -> String {
    let mut escaped = String::with_capacity(html.len());
    for c in html.chars() {
        match c {
            '%' | '#' | '?' | ' ' => escaped.push_str(&format!("%{:02X}", c as u32)),
            c if c.is_ascii_control() => escaped.push_str(&format!("%{:02X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

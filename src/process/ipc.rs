//! Inter-process communication
//!
//! Messages from the browser side to render surfaces are fire-and-forget.
//! They are queued in an [`Outbox`] that the embedder drains and delivers.

use std::fmt;

use url::Url;

use crate::navigation::entry::{EntryId, Transition};
use crate::navigation::surface::SurfaceId;

/// Renderer-side routing id of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingId(u32);

impl RoutingId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RoutingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

/// Parameters of a navigation sent to a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateParams {
    pub entry: Option<EntryId>,
    pub url: Url,
    pub page_id: Option<i32>,
    pub transition: Transition,
}

/// What to do with the network requests held for a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Block,
    Resume,
    Cancel,
}

/// Message to a render surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceMessage {
    /// Create the renderer-side view
    CreateView,
    /// Grant internal-UI bindings
    AllowPrivilegedBindings,
    /// Load a destination
    Navigate(NavigateParams),
    /// Run the beforeunload handler and ack with `should_close_ack`
    FireBeforeUnload { for_cross_site: bool },
    /// Run the unload handler and ack with `swap_out_ack`
    SwapOut { request_id: u64 },
    /// Stop the in-progress load
    Stop,
    /// Drop the navigation this surface was preparing
    AbortNavigation,
    /// Let the held cross-site response continue
    ResumeResponse { request_id: u64 },
    /// Close the page after beforeunload approved it
    ClosePage,
    /// Apply an action to the held network requests
    ResourceRequests(ResourceAction),
    /// Tear the view down
    Shutdown,
}

impl SurfaceMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceMessage::CreateView => "CreateView",
            SurfaceMessage::AllowPrivilegedBindings => "AllowPrivilegedBindings",
            SurfaceMessage::Navigate(_) => "Navigate",
            SurfaceMessage::FireBeforeUnload { .. } => "FireBeforeUnload",
            SurfaceMessage::SwapOut { .. } => "SwapOut",
            SurfaceMessage::Stop => "Stop",
            SurfaceMessage::AbortNavigation => "AbortNavigation",
            SurfaceMessage::ResumeResponse { .. } => "ResumeResponse",
            SurfaceMessage::ClosePage => "ClosePage",
            SurfaceMessage::ResourceRequests(_) => "ResourceRequests",
            SurfaceMessage::Shutdown => "Shutdown",
        }
    }
}

/// IPC message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcMessage {
    pub target: SurfaceId,
    pub routing_id: RoutingId,
    pub message: SurfaceMessage,
    pub sequence_id: u64,
}

/// Queue of messages waiting for delivery
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<IpcMessage>,
    next_sequence: u64,
}

impl Outbox {
    /// Create an empty outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message
    pub fn post(&mut self, target: SurfaceId, routing_id: RoutingId, message: SurfaceMessage) {
        log::trace!("{} -> {}: {}", routing_id, target, message.as_str());
        self.messages.push(IpcMessage {
            target,
            routing_id,
            message,
            sequence_id: self.next_sequence,
        });
        self.next_sequence += 1;
    }

    /// Take every queued message
    pub fn take(&mut self) -> Vec<IpcMessage> {
        std::mem::take(&mut self.messages)
    }

    /// Queued messages
    pub fn messages(&self) -> &[IpcMessage] {
        &self.messages
    }

    /// Queued messages for one surface
    pub fn messages_for(&self, target: SurfaceId) -> impl Iterator<Item = &SurfaceMessage> {
        self.messages
            .iter()
            .filter(move |m| m.target == target)
            .map(|m| &m.message)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_sequence() {
        let mut outbox = Outbox::new();
        let surface = SurfaceId::new(1);
        outbox.post(surface, RoutingId::new(7), SurfaceMessage::Stop);
        outbox.post(surface, RoutingId::new(7), SurfaceMessage::ClosePage);

        let messages = outbox.take();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sequence_id, 0);
        assert_eq!(messages[1].sequence_id, 1);
        assert!(outbox.is_empty());

        outbox.post(surface, RoutingId::new(7), SurfaceMessage::Shutdown);
        assert_eq!(outbox.messages()[0].sequence_id, 2);
    }

    #[test]
    fn test_messages_for() {
        let mut outbox = Outbox::new();
        outbox.post(SurfaceId::new(1), RoutingId::new(1), SurfaceMessage::Stop);
        outbox.post(
            SurfaceId::new(2),
            RoutingId::new(2),
            SurfaceMessage::SwapOut { request_id: 4 },
        );

        let for_two: Vec<_> = outbox.messages_for(SurfaceId::new(2)).collect();
        assert_eq!(for_two, vec![&SurfaceMessage::SwapOut { request_id: 4 }]);
    }

    #[test]
    fn test_message_name() {
        assert_eq!(
            SurfaceMessage::FireBeforeUnload {
                for_cross_site: true
            }
            .as_str(),
            "FireBeforeUnload"
        );
        assert_eq!(
            SurfaceMessage::ResourceRequests(ResourceAction::Block).as_str(),
            "ResourceRequests"
        );
    }
}

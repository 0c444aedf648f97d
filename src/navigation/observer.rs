//! Surface lifecycle events
//!
//! Interested parties subscribe with [`ObserverList::subscribe`] and read
//! events from the returned channel. Subscribers whose receiver was dropped
//! are removed on the next notification.

use std::sync::mpsc::{Receiver, Sender, channel};

use super::interstitial::{Decision, OverlayId};
use super::surface::SurfaceId;
use crate::process::SiteInstanceId;

/// Something that happened to a tab's surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A surface was created in a partition
    Created {
        surface: SurfaceId,
        partition: SiteInstanceId,
    },
    /// The current surface changed
    Swapped {
        old: Option<SurfaceId>,
        new: SurfaceId,
    },
    /// A surface was parked for reuse
    SwappedOut {
        surface: SurfaceId,
        partition: SiteInstanceId,
    },
    /// A surface was destroyed
    Destroyed { surface: SurfaceId },
    /// A pending navigation was abandoned
    PendingCancelled { surface: SurfaceId },
    /// A swap was needed but no surface could be created; the navigation
    /// runs in the current surface instead
    SwapFallback {
        partition: SiteInstanceId,
        reason: String,
    },
    /// A surface's renderer went away
    Crashed { surface: SurfaceId },
    /// An interstitial overlay became visible
    InterstitialAttached { overlay: OverlayId, surface: SurfaceId },
    /// An interstitial overlay was removed
    InterstitialDetached { overlay: OverlayId, decision: Decision },
}

/// Subscribers to surface events
#[derive(Debug, Default)]
pub struct ObserverList {
    senders: Vec<Sender<SurfaceEvent>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to future events
    pub fn subscribe(&mut self) -> Receiver<SurfaceEvent> {
        let (tx, rx) = channel();
        self.senders.push(tx);
        rx
    }

    /// Add an existing sender
    pub fn add(&mut self, sender: Sender<SurfaceEvent>) {
        self.senders.push(sender);
    }

    /// Deliver an event to every live subscriber
    pub fn notify(&mut self, event: SurfaceEvent) {
        log::trace!("Surface event: {:?}", event);
        self.senders.retain(|s| s.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_subscribers() {
        let mut observers = ObserverList::new();
        let rx1 = observers.subscribe();
        let rx2 = observers.subscribe();

        observers.notify(SurfaceEvent::Destroyed {
            surface: SurfaceId::new(3),
        });

        assert_eq!(
            rx1.try_recv().unwrap(),
            SurfaceEvent::Destroyed {
                surface: SurfaceId::new(3)
            }
        );
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_subscriber_removed() {
        let mut observers = ObserverList::new();
        let rx = observers.subscribe();
        drop(rx);
        observers.notify(SurfaceEvent::Crashed {
            surface: SurfaceId::new(1),
        });
        assert!(observers.is_empty());
    }
}

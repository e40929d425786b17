//! Seam to the external tablature rendering / synthesis engine
//!
//! The engine is a collaborator: it renders notation, synthesizes audio and
//! reports playback progress. This module defines the commands the player
//! issues and the notifications it consumes. Adapters embed an
//! [`EngineEventHub`] to hand out [`Subscription`]s; dropping a subscription
//! deregisters it, so a torn-down player never receives callbacks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use folio_common::PlaybackState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

use crate::midi::MidiEvent;

/// Engine command failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Score or soundfont not loaded yet
    #[error("engine not ready")]
    NotReady,

    #[error("engine rejected command: {0}")]
    Rejected(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Position notification
///
/// Emitted on every engine tick and, spuriously, around pause/resume and
/// loop-repeat transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChanged {
    pub current_ms: u64,
    pub end_ms: u64,
    /// Raised by an explicit position assignment rather than playback
    pub is_seek: bool,
}

impl PositionChanged {
    pub fn tick(current_ms: u64, end_ms: u64) -> Self {
        Self {
            current_ms,
            end_ms,
            is_seek: false,
        }
    }

    pub fn seek(current_ms: u64, end_ms: u64) -> Self {
        Self {
            current_ms,
            end_ms,
            is_seek: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    PositionChanged(PositionChanged),
    StateChanged { state: PlaybackState },
}

/// Commands the player issues to the engine
///
/// Calls are synchronous and must not block on playback; the engine reports
/// results through its event stream.
pub trait PlaybackEngine: Send + Sync {
    fn play(&self) -> EngineResult<()>;
    fn pause(&self) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;

    /// Move the playback cursor (milliseconds)
    fn set_time_position(&self, position_ms: u64) -> EngineResult<()>;

    /// Tempo multiplier, 1.0 = as written
    fn set_playback_speed(&self, speed: f64) -> EngineResult<()>;

    fn set_looping(&self, looping: bool) -> EngineResult<()>;

    /// The MIDI stream generated from the loaded score
    fn midi_events(&self) -> EngineResult<Vec<MidiEvent>>;

    /// Replace the MIDI stream and regenerate audio from it
    fn regenerate(&self, events: Vec<MidiEvent>) -> EngineResult<()>;

    fn subscribe(&self) -> Subscription;
}

type Senders = HashMap<u64, mpsc::UnboundedSender<EngineEvent>>;

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    senders: Mutex<Senders>,
}

impl HubInner {
    fn senders(&self) -> MutexGuard<'_, Senders> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fan-out of engine notifications to registered subscriptions
///
/// Delivery is in emission order per subscription.
#[derive(Clone, Default)]
pub struct EngineEventHub {
    inner: Arc<HubInner>,
}

impl EngineEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.senders().insert(id, tx);
        trace!(subscription = id, "Engine subscription registered");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver to every live subscription
    pub fn emit(&self, event: EngineEvent) {
        self.inner
            .senders()
            .retain(|_, tx| tx.send(event).is_ok());
    }

    pub fn emit_position(&self, position: PositionChanged) {
        self.emit(EngineEvent::PositionChanged(position));
    }

    pub fn emit_state(&self, state: PlaybackState) {
        self.emit(EngineEvent::StateChanged { state });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.senders().len()
    }
}

/// Handle to one registration on an [`EngineEventHub`]
///
/// Held by the owning component; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event; None once the engine is gone
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.senders().remove(&self.id);
            trace!(subscription = self.id, "Engine subscription dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_delivered_in_order() {
        let hub = EngineEventHub::new();
        let mut sub = hub.subscribe();

        hub.emit_position(PositionChanged::tick(1000, 5000));
        hub.emit_state(PlaybackState::Paused);
        hub.emit_position(PositionChanged::seek(0, 5000));

        assert_eq!(
            sub.try_recv(),
            Some(EngineEvent::PositionChanged(PositionChanged::tick(1000, 5000)))
        );
        assert_eq!(
            sub.try_recv(),
            Some(EngineEvent::StateChanged {
                state: PlaybackState::Paused
            })
        );
        assert_eq!(
            sub.try_recv(),
            Some(EngineEvent::PositionChanged(PositionChanged::seek(0, 5000)))
        );
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = EngineEventHub::new();
        let first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_ne!(first.id(), second.id());
        assert_eq!(hub.subscriber_count(), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(), 1);

        hub.emit_state(PlaybackState::Playing);
        assert!(second.try_recv().is_some());
    }

    #[test]
    fn test_subscription_outlives_hub() {
        let hub = EngineEventHub::new();
        let sub = hub.subscribe();
        drop(hub);
        // Dropping after the hub is gone must not panic
        drop(sub);
    }
}

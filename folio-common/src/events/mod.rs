//! Event types for the Folio event system
//!
//! Provides the typed message set and the EventBus shared by the player,
//! the track list and any embedding UI. Components talk to each other
//! through these variants instead of string-named global events.

mod playback_types;

pub use playback_types::PlaybackState;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Folio event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a
/// host UI can forward them as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FolioEvent {
    /// Playback state changed (Stopped / Playing / Paused)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Reconciled playback position
    ///
    /// Only positions accepted by the reconciler are published here, so the
    /// sequence seen by subscribers never contains engine glitches.
    PlaybackPosition {
        /// Current position (milliseconds)
        position_ms: u64,
        /// Total duration (milliseconds)
        duration_ms: u64,
        /// Whether currently playing (vs paused)
        playing: bool,
    },

    /// User seek applied
    PlaybackSeeked {
        position_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Selected recording changed
    TrackChanged {
        /// Index into the ordered track list
        index: usize,
        track_id: Uuid,
        title: String,
    },

    /// Request to toggle play/pause on the active player
    ///
    /// Emitted by controls that do not own the player (e.g. a global
    /// keyboard shortcut or a mini-player in the page header).
    PlayToggleRequested {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Synthesizer instrument switched
    InstrumentChanged {
        /// General MIDI program number (0-127)
        program: u8,
        /// Number of program-change events rewritten
        rewritten: usize,
    },

    /// Playback speed multiplier changed
    PlaybackSpeedChanged { speed: f64 },

    /// Active soundfont changed
    SoundfontChanged { url: String },
}

impl FolioEvent {
    /// Short event name, used in log fields
    pub fn event_type(&self) -> &'static str {
        match self {
            FolioEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            FolioEvent::PlaybackPosition { .. } => "PlaybackPosition",
            FolioEvent::PlaybackSeeked { .. } => "PlaybackSeeked",
            FolioEvent::TrackChanged { .. } => "TrackChanged",
            FolioEvent::PlayToggleRequested { .. } => "PlayToggleRequested",
            FolioEvent::InstrumentChanged { .. } => "InstrumentChanged",
            FolioEvent::PlaybackSpeedChanged { .. } => "PlaybackSpeedChanged",
            FolioEvent::SoundfontChanged { .. } => "SoundfontChanged",
        }
    }
}

/// Broadcast channel carrying [`FolioEvent`]s between components
///
/// Publishing never waits on subscribers. A subscriber that falls more than
/// `capacity` events behind loses the oldest ones and is told how many on
/// its next receive.
///
/// # Examples
///
/// ```
/// use folio_common::events::{EventBus, FolioEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(FolioEvent::PlaybackSpeedChanged { speed: 0.5 });
///
/// assert_eq!(
///     rx.try_recv().unwrap(),
///     FolioEvent::PlaybackSpeedChanged { speed: 0.5 }
/// );
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FolioEvent>,
    capacity: usize,
}

impl EventBus {
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped. Position updates arrive on every engine tick, so
    /// interactive hosts should use at least a few hundred.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Receiver for events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<FolioEvent> {
        self.tx.subscribe()
    }

    /// Publish, returning how many receivers got it
    ///
    /// Fails when nobody is subscribed.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FolioEvent,
    ) -> Result<usize, broadcast::error::SendError<FolioEvent>> {
        self.tx.send(event)
    }

    /// Publish whether or not anyone is listening
    pub fn emit_lossy(&self, event: FolioEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

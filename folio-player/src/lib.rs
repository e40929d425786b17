//! # Folio Player
//!
//! Playback control around an external tablature/synthesis engine:
//! - Position reconciliation (glitch suppression on pause/resume/loop)
//! - MIDI program rewriting for instrument switching
//! - SoundFont preset scanning and compatibility checks
//! - Track list selection for the recordings page

pub mod controller;
pub mod engine;
pub mod error;
pub mod midi;
pub mod program;
pub mod reconciler;
pub mod soundfont;
pub mod tracklist;

pub use controller::{PlayerController, PlayerSnapshot};
pub use engine::{EngineError, EngineEvent, EngineEventHub, PlaybackEngine, PositionChanged, Subscription};
pub use error::{PlayerError, Result};
pub use program::Program;
pub use reconciler::{PositionReconciler, Reconciled, ReconcilerConfig};
pub use soundfont::{CompatibilityReport, SoundFontError, SoundFontInfo};
pub use tracklist::TrackList;

//! Test helpers for folio-player integration tests
//!
//! - FakeEngine: records commands and lets tests script engine notifications
//! - Bus helpers: collect what a UI subscriber would have seen

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use folio_common::{EventBus, FolioEvent, PlaybackState};
use folio_player::engine::{EngineError, EngineEventHub, EngineResult, PlaybackEngine, PositionChanged, Subscription};
use folio_player::midi::MidiEvent;
use folio_player::{PlayerController, ReconcilerConfig};
use tokio::sync::broadcast;

pub const SONG_END_MS: u64 = 180_000;

/// Command as received by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    SetTimePosition(u64),
    SetSpeed(f64),
    SetLooping(bool),
    Regenerate(Vec<MidiEvent>),
}

/// Scriptable engine double
///
/// With `echo` enabled, commands produce the notifications a real engine
/// sends back (state changes, seek reports), including the spurious rewind
/// to zero on stop.
pub struct FakeEngine {
    hub: EngineEventHub,
    commands: Mutex<Vec<Command>>,
    midi: Mutex<Vec<MidiEvent>>,
    echo: AtomicBool,
    fail_regenerate: AtomicBool,
    fail_play: AtomicBool,
    fail_set_time_position: AtomicBool,
}

impl FakeEngine {
    pub fn new(midi: Vec<MidiEvent>) -> Arc<Self> {
        Arc::new(Self {
            hub: EngineEventHub::new(),
            commands: Mutex::new(Vec::new()),
            midi: Mutex::new(midi),
            echo: AtomicBool::new(false),
            fail_regenerate: AtomicBool::new(false),
            fail_play: AtomicBool::new(false),
            fail_set_time_position: AtomicBool::new(false),
        })
    }

    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::SeqCst);
    }

    pub fn fail_regenerate(&self, fail: bool) {
        self.fail_regenerate.store(fail, Ordering::SeqCst);
    }

    /// Rejected commands are not recorded
    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_time_position(&self, fail: bool) {
        self.fail_set_time_position.store(fail, Ordering::SeqCst);
    }

    pub fn hub(&self) -> &EngineEventHub {
        &self.hub
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn count(&self, command: &Command) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn current_midi(&self) -> Vec<MidiEvent> {
        self.midi.lock().unwrap().clone()
    }

    /// Playback tick
    pub fn tick(&self, ms: u64) {
        self.hub.emit_position(PositionChanged::tick(ms, SONG_END_MS));
    }

    pub fn report_state(&self, state: PlaybackState) {
        self.hub.emit_state(state);
    }

    fn record(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }

    fn echoing(&self) -> bool {
        self.echo.load(Ordering::SeqCst)
    }
}

impl PlaybackEngine for FakeEngine {
    fn play(&self) -> EngineResult<()> {
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(EngineError::NotReady);
        }
        self.record(Command::Play);
        if self.echoing() {
            self.hub.emit_state(PlaybackState::Playing);
        }
        Ok(())
    }

    fn pause(&self) -> EngineResult<()> {
        self.record(Command::Pause);
        if self.echoing() {
            self.hub.emit_state(PlaybackState::Paused);
        }
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        self.record(Command::Stop);
        if self.echoing() {
            self.hub.emit_state(PlaybackState::Stopped);
            self.hub.emit_position(PositionChanged::seek(0, SONG_END_MS));
        }
        Ok(())
    }

    fn set_time_position(&self, position_ms: u64) -> EngineResult<()> {
        if self.fail_set_time_position.load(Ordering::SeqCst) {
            return Err(EngineError::NotReady);
        }
        self.record(Command::SetTimePosition(position_ms));
        if self.echoing() {
            self.hub
                .emit_position(PositionChanged::seek(position_ms, SONG_END_MS));
        }
        Ok(())
    }

    fn set_playback_speed(&self, speed: f64) -> EngineResult<()> {
        self.record(Command::SetSpeed(speed));
        Ok(())
    }

    fn set_looping(&self, looping: bool) -> EngineResult<()> {
        self.record(Command::SetLooping(looping));
        Ok(())
    }

    fn midi_events(&self) -> EngineResult<Vec<MidiEvent>> {
        Ok(self.current_midi())
    }

    fn regenerate(&self, events: Vec<MidiEvent>) -> EngineResult<()> {
        if self.fail_regenerate.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected("synthesizer busy".to_string()));
        }
        self.record(Command::Regenerate(events.clone()));
        *self.midi.lock().unwrap() = events;
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}

/// Timing used by controller tests: production thresholds, short re-assertion
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        reassert_delay: Duration::from_millis(30),
        ..ReconcilerConfig::default()
    }
}

/// Controller attached to a fresh FakeEngine, plus a bus receiver
pub fn attach(
    midi: Vec<MidiEvent>,
    config: ReconcilerConfig,
) -> (PlayerController, Arc<FakeEngine>, EventBus, broadcast::Receiver<FolioEvent>) {
    let engine = FakeEngine::new(midi);
    let bus = EventBus::new(1024);
    let rx = bus.subscribe();
    let controller = PlayerController::attach(engine.clone(), bus.clone(), config);
    (controller, engine, bus, rx)
}

/// Let the pump and any re-assertion timers run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

/// Everything published so far
pub fn drain(rx: &mut broadcast::Receiver<FolioEvent>) -> Vec<FolioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Published positions, in order
pub fn positions(events: &[FolioEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            FolioEvent::PlaybackPosition { position_ms, .. } => Some(*position_ms),
            _ => None,
        })
        .collect()
}

pub fn state_changes(events: &[FolioEvent]) -> Vec<(PlaybackState, PlaybackState)> {
    events
        .iter()
        .filter_map(|e| match e {
            FolioEvent::PlaybackStateChanged {
                old_state,
                new_state,
                ..
            } => Some((*old_state, *new_state)),
            _ => None,
        })
        .collect()
}

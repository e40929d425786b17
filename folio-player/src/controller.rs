//! Player controller
//!
//! Binds one engine to a [`PositionReconciler`] and the application
//! [`EventBus`]. Engine notifications are consumed by a single pump task
//! in emission order; each is handled to completion under the reconciler
//! lock, which user operations also take. Dropping or shutting down the
//! controller aborts the pump, which drops the engine [`Subscription`], and
//! disarms any pending position re-assertion.
//!
//! A user operation changes displayed state only once the engine has accepted
//! the command; rejected commands are logged and leave it as it was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use folio_common::db::settings;
use folio_common::{EventBus, FolioEvent, PlaybackState};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::engine::{EngineEvent, EngineResult, PlaybackEngine, Subscription};
use crate::error::Result;
use crate::program::{rewrite_programs, Program};
use crate::reconciler::{PositionReconciler, Reconciled, ReconcilerConfig, ResumePlan};

/// Point-in-time view of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub looping: bool,
}

struct Shared {
    engine: Arc<dyn PlaybackEngine>,
    reconciler: Mutex<PositionReconciler>,
    bus: EventBus,
    config: ReconcilerConfig,
    detached: AtomicBool,
}

pub struct PlayerController {
    shared: Arc<Shared>,
    pump: Option<JoinHandle<()>>,
}

impl PlayerController {
    /// Subscribe to the engine and start processing its events
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(engine: Arc<dyn PlaybackEngine>, bus: EventBus, config: ReconcilerConfig) -> Self {
        let engine_events = engine.subscribe();
        let bus_events = bus.subscribe();
        let shared = Arc::new(Shared {
            engine,
            reconciler: Mutex::new(PositionReconciler::new(config)),
            bus,
            config,
            detached: AtomicBool::new(false),
        });

        let pump = tokio::spawn(pump(Arc::clone(&shared), engine_events, bus_events));
        info!(
            glitch_threshold_ms = config.glitch_threshold_ms,
            reassert_delay_ms = config.reassert_delay.as_millis() as u64,
            "Player attached"
        );

        Self {
            shared,
            pump: Some(pump),
        }
    }

    /// Attach with timing and playback speed from the settings table
    pub async fn attach_with_settings(
        engine: Arc<dyn PlaybackEngine>,
        bus: EventBus,
        db: &SqlitePool,
    ) -> Result<Self> {
        let config = ReconcilerConfig::load(db).await?;
        let speed = settings::get_playback_speed(db).await?;
        let controller = Self::attach(engine, bus, config);
        controller.set_speed(speed).await;
        Ok(controller)
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        let reconciler = self.shared.reconciler.lock().await;
        PlayerSnapshot {
            state: reconciler.state(),
            position_ms: reconciler.position_ms(),
            duration_ms: reconciler.duration_ms(),
            looping: reconciler.looping(),
        }
    }

    /// Start or resume from the last displayed position
    ///
    /// Returns false if already playing.
    pub async fn play(&self) -> bool {
        self.shared.resume().await
    }

    pub async fn resume(&self) -> bool {
        self.shared.resume().await
    }

    /// Returns false if not playing
    pub async fn pause(&self) -> bool {
        self.shared.pause().await
    }

    pub async fn toggle(&self) {
        self.shared.toggle().await
    }

    pub async fn stop(&self) {
        let mut reconciler = self.shared.reconciler.lock().await;
        if !succeeded("stop", self.shared.engine.stop()) {
            return;
        }
        let old = reconciler.state();
        reconciler.stop(Instant::now());

        self.shared.publish_state(old, PlaybackState::Stopped);
        self.shared.publish_position(&reconciler);
    }

    /// Jump to `position_ms` in any state and direction
    ///
    /// Returns false if the engine rejected the new position.
    pub async fn seek(&self, position_ms: u64) -> bool {
        let mut reconciler = self.shared.reconciler.lock().await;
        if !succeeded("set_time_position", self.shared.engine.set_time_position(position_ms)) {
            return false;
        }
        let position_ms = reconciler.seek(position_ms, Instant::now());

        self.shared.bus.emit_lossy(FolioEvent::PlaybackSeeked {
            position_ms,
            timestamp: Utc::now(),
        });
        self.shared.publish_position(&reconciler);
        true
    }

    /// Returns the speed actually applied
    pub async fn set_speed(&self, speed: f64) -> f64 {
        let speed = settings::clamp_playback_speed(speed);
        log_failure("set_playback_speed", self.shared.engine.set_playback_speed(speed));
        self.shared
            .bus
            .emit_lossy(FolioEvent::PlaybackSpeedChanged { speed });
        debug!(speed, "Playback speed set");
        speed
    }

    pub async fn set_looping(&self, looping: bool) {
        let mut reconciler = self.shared.reconciler.lock().await;
        if succeeded("set_looping", self.shared.engine.set_looping(looping)) {
            reconciler.set_looping(looping);
        }
    }

    /// Switch every melodic channel to `program` and regenerate audio
    ///
    /// Playback in progress is stopped for the swap and resumes at the
    /// displayed position; a paused player stays paused in place. The
    /// previous position is restored even when regeneration fails.
    pub async fn change_instrument(&self, program: Program) -> Result<usize> {
        let engine = &self.shared.engine;
        let mut reconciler = self.shared.reconciler.lock().await;

        let plan = reconciler.prepare_regeneration(Instant::now());
        if plan.was_playing {
            log_failure("stop", engine.stop());
        }

        let outcome = engine.midi_events().and_then(|mut events| {
            let rewritten = rewrite_programs(&mut events, program);
            engine.regenerate(events)?;
            Ok(rewritten)
        });

        match reconciler.finish_regeneration(plan, Instant::now()) {
            Some(resume) => {
                log_failure("play", self.shared.start_engine(resume.position_ms));
                self.shared.schedule_reassertion(resume);
            }
            None => log_failure("set_time_position", engine.set_time_position(plan.position_ms)),
        }
        drop(reconciler);

        let rewritten = outcome.inspect_err(|e| {
            warn!(program = program.number(), error = %e, "Instrument change failed");
        })?;

        info!(
            program = program.number(),
            instrument = program.name(),
            rewritten,
            resumed = plan.was_playing,
            "Instrument changed"
        );
        self.shared.bus.emit_lossy(FolioEvent::InstrumentChanged {
            program: program.number(),
            rewritten,
        });
        Ok(rewritten)
    }

    /// Stop the event pump and drop the engine subscription
    ///
    /// Once this returns no further commands reach the engine.
    pub async fn shutdown(mut self) {
        self.shared.detached.store(true, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            pump.abort();
            if let Err(e) = pump.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Player event pump failed");
                }
            }
        }
        // Wait out a re-assertion that already holds the lock
        drop(self.shared.reconciler.lock().await);
        debug!("Player detached");
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        self.shared.detached.store(true, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Shared {
    async fn resume(self: &Arc<Self>) -> bool {
        let mut reconciler = self.reconciler.lock().await;
        self.resume_locked(&mut reconciler)
    }

    async fn pause(&self) -> bool {
        let mut reconciler = self.reconciler.lock().await;
        self.pause_locked(&mut reconciler)
    }

    async fn toggle(self: &Arc<Self>) {
        let mut reconciler = self.reconciler.lock().await;
        if reconciler.state().is_playing() {
            self.pause_locked(&mut reconciler);
        } else {
            self.resume_locked(&mut reconciler);
        }
    }

    fn resume_locked(self: &Arc<Self>, reconciler: &mut PositionReconciler) -> bool {
        let old = reconciler.state();
        if old.is_playing() {
            return false;
        }
        if !succeeded("play", self.start_engine(reconciler.position_ms())) {
            return false;
        }
        let Some(plan) = reconciler.request_resume(Instant::now()) else {
            return false;
        };
        self.schedule_reassertion(plan);
        self.publish_state(old, PlaybackState::Playing);
        true
    }

    fn pause_locked(&self, reconciler: &mut PositionReconciler) -> bool {
        if !reconciler.state().is_playing() {
            return false;
        }
        if !succeeded("pause", self.engine.pause()) {
            return false;
        }
        reconciler.request_pause(Instant::now());
        self.publish_state(PlaybackState::Playing, PlaybackState::Paused);
        true
    }

    /// Position the engine, then play
    ///
    /// A rejected position is left to the re-assertion; only `play` decides
    /// the outcome.
    fn start_engine(&self, position_ms: u64) -> EngineResult<()> {
        log_failure("set_time_position", self.engine.set_time_position(position_ms));
        self.engine.play()
    }

    /// Assert the resume position again after the delay
    ///
    /// Dropped if a seek, pause or stop superseded `plan`, or the controller
    /// was torn down meanwhile.
    fn schedule_reassertion(self: &Arc<Self>, plan: ResumePlan) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(shared.config.reassert_delay).await;

            let reconciler = shared.reconciler.lock().await;
            if shared.detached.load(Ordering::SeqCst) {
                return;
            }
            if let Some(position_ms) = reconciler.reassertion(plan.epoch) {
                trace!(position_ms, epoch = plan.epoch, "Re-asserting resume position");
                log_failure("set_time_position", shared.engine.set_time_position(position_ms));
            }
        });
    }

    async fn handle_engine_event(&self, event: EngineEvent) {
        let now = Instant::now();
        let mut reconciler = self.reconciler.lock().await;

        match event {
            EngineEvent::PositionChanged(position) => match reconciler.on_position(position, now) {
                Reconciled::Accepted { .. } => self.publish_position(&reconciler),
                Reconciled::SpuriousRewind { restore_ms } => {
                    log_failure("set_time_position", self.engine.set_time_position(restore_ms));
                }
                Reconciled::PauseGlitchSuppressed
                | Reconciled::IgnoredWhileNotPlaying
                | Reconciled::BackwardHeld => {}
            },
            EngineEvent::StateChanged { state } => {
                if let Some((old, new)) = reconciler.on_engine_state(state, now) {
                    self.publish_state(old, new);
                    if new == PlaybackState::Stopped {
                        self.publish_position(&reconciler);
                    }
                }
            }
        }
    }

    fn publish_state(&self, old_state: PlaybackState, new_state: PlaybackState) {
        if old_state == new_state {
            return;
        }
        self.bus.emit_lossy(FolioEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn publish_position(&self, reconciler: &PositionReconciler) {
        self.bus.emit_lossy(FolioEvent::PlaybackPosition {
            position_ms: reconciler.position_ms(),
            duration_ms: reconciler.duration_ms(),
            playing: reconciler.state().is_playing(),
        });
    }
}

async fn pump(
    shared: Arc<Shared>,
    mut engine_events: Subscription,
    mut bus_events: broadcast::Receiver<FolioEvent>,
) {
    loop {
        tokio::select! {
            event = engine_events.recv() => match event {
                Some(event) => shared.handle_engine_event(event).await,
                None => {
                    debug!("Engine event stream closed");
                    break;
                }
            },
            message = bus_events.recv() => match message {
                Ok(FolioEvent::PlayToggleRequested { .. }) => shared.toggle().await,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "Player bus receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Engine command failures leave displayed state unchanged
fn succeeded(command: &'static str, result: EngineResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(command, error = %e, "Engine command failed");
            false
        }
    }
}

fn log_failure(command: &'static str, result: EngineResult<()>) {
    succeeded(command, result);
}

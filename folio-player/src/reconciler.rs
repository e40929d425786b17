//! Playback position reconciliation
//!
//! The engine emits spurious position notifications around pause, resume
//! and loop-repeat transitions: a pause may be followed by one report from
//! slightly earlier, and a resume may report a position seconds behind
//! (often zero) before settling. Left alone these make the displayed time
//! jump backwards and resume playback from the wrong place.
//!
//! [`PositionReconciler`] sits between engine notifications and the UI. It
//! is a pure state machine: every operation takes the current instant and
//! returns a decision, and the [`PlayerController`](crate::PlayerController)
//! applies the engine side effects. Positions it accepts are non-decreasing
//! while playing, except across a user seek or a loop wrap.

use std::time::{Duration, Instant};

use folio_common::db::settings::{self, PlaybackTuning};
use folio_common::PlaybackState;
use sqlx::SqlitePool;
use tracing::{debug, trace};

use crate::engine::PositionChanged;

/// Timing for glitch detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Backward distance after a resume that counts as a spurious rewind
    pub glitch_threshold_ms: u64,
    /// Delay between `play` and the second position assertion
    pub reassert_delay: Duration,
    /// How long a pause suppresses one backward report
    pub pause_glitch_window: Duration,
    /// How long the resume guard (and any expected engine state echo) lives
    pub resume_guard_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        PlaybackTuning::default().into()
    }
}

impl From<PlaybackTuning> for ReconcilerConfig {
    fn from(tuning: PlaybackTuning) -> Self {
        Self {
            glitch_threshold_ms: tuning.glitch_threshold_ms,
            reassert_delay: Duration::from_millis(tuning.reassert_delay_ms),
            pause_glitch_window: Duration::from_millis(tuning.pause_glitch_window_ms),
            resume_guard_timeout: Duration::from_millis(tuning.resume_guard_timeout_ms),
        }
    }
}

impl ReconcilerConfig {
    /// Load tuning from the settings table
    pub async fn load(db: &SqlitePool) -> folio_common::Result<Self> {
        Ok(settings::load_playback_tuning(db).await?.into())
    }
}

/// Outcome of one engine position notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Publish this position
    Accepted { position_ms: u64, duration_ms: u64 },
    /// Engine jumped far back right after a resume; put it back at
    /// `restore_ms` and publish nothing
    SpuriousRewind { restore_ms: u64 },
    /// One-shot backward report after a pause
    PauseGlitchSuppressed,
    /// Playback tick while not playing
    IgnoredWhileNotPlaying,
    /// Backward tick while playing without looping
    BackwardHeld,
}

impl Reconciled {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Reconciled::Accepted { .. })
    }
}

/// What the controller must do to resume
///
/// Set the engine position to `position_ms`, call `play`, then after the
/// re-assertion delay ask [`PositionReconciler::reassertion`] with `epoch`
/// whether to set the position once more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePlan {
    pub position_ms: u64,
    pub epoch: u64,
}

/// State captured before the engine's MIDI stream is regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenerationPlan {
    pub was_playing: bool,
    pub position_ms: u64,
}

#[derive(Debug)]
pub struct PositionReconciler {
    config: ReconcilerConfig,
    state: PlaybackState,
    last_known_ms: u64,
    duration_ms: u64,
    looping: bool,
    /// Armed by a resume until the first forward-consistent report
    resume_guard_at: Option<Instant>,
    /// Armed by a pause; suppresses one backward report
    pause_glitch_at: Option<Instant>,
    /// Engine state we expect to be echoed after a user command; other
    /// state reports in the meantime are stale
    awaiting: Option<(PlaybackState, Instant)>,
    /// Bumped by every user command so delayed work can detect it was superseded
    epoch: u64,
}

impl PositionReconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            state: PlaybackState::Stopped,
            last_known_ms: 0,
            duration_ms: 0,
            looping: false,
            resume_guard_at: None,
            pause_glitch_at: None,
            awaiting: None,
            epoch: 0,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Last position published to the UI
    pub fn position_ms(&self) -> u64 {
        self.last_known_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn resume_guard_armed(&self) -> bool {
        self.resume_guard_at.is_some()
    }

    pub fn pause_glitch_armed(&self) -> bool {
        self.pause_glitch_at.is_some()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Resume from the last displayed position
    ///
    /// Returns None when already playing.
    pub fn request_resume(&mut self, now: Instant) -> Option<ResumePlan> {
        self.expire(now);
        if self.state == PlaybackState::Playing {
            return None;
        }

        self.state = PlaybackState::Playing;
        self.resume_guard_at = Some(now);
        self.pause_glitch_at = None;
        self.awaiting = Some((PlaybackState::Playing, now));
        self.epoch += 1;

        debug!(position_ms = self.last_known_ms, epoch = self.epoch, "Resume requested");
        Some(ResumePlan {
            position_ms: self.last_known_ms,
            epoch: self.epoch,
        })
    }

    /// Returns whether the engine should be paused
    pub fn request_pause(&mut self, now: Instant) -> bool {
        self.expire(now);
        if self.state != PlaybackState::Playing {
            return false;
        }

        self.state = PlaybackState::Paused;
        self.pause_glitch_at = Some(now);
        self.resume_guard_at = None;
        self.awaiting = Some((PlaybackState::Paused, now));
        self.epoch += 1;

        debug!(position_ms = self.last_known_ms, "Pause requested");
        true
    }

    pub fn stop(&mut self, now: Instant) {
        self.state = PlaybackState::Stopped;
        self.last_known_ms = 0;
        self.clear_flags();
        self.awaiting = Some((PlaybackState::Stopped, now));
        self.epoch += 1;
    }

    /// User seek: always wins, in any state and direction
    pub fn seek(&mut self, position_ms: u64, now: Instant) -> u64 {
        self.expire(now);
        self.last_known_ms = position_ms;
        self.clear_flags();
        self.epoch += 1;

        debug!(position_ms, "Seek");
        position_ms
    }

    /// Classify an engine position notification
    pub fn on_position(&mut self, event: PositionChanged, now: Instant) -> Reconciled {
        self.expire(now);
        let last = self.last_known_ms;
        let current = event.current_ms;

        if self.resume_guard_at.is_some()
            && self.state == PlaybackState::Playing
            && current.saturating_add(self.config.glitch_threshold_ms) < last
        {
            self.resume_guard_at = None;
            debug!(reported_ms = current, restore_ms = last, "Spurious rewind after resume");
            return Reconciled::SpuriousRewind { restore_ms: last };
        }

        if self.state == PlaybackState::Paused && self.pause_glitch_at.is_some() && current < last {
            self.pause_glitch_at = None;
            debug!(reported_ms = current, position_ms = last, "Suppressed backward report after pause");
            return Reconciled::PauseGlitchSuppressed;
        }

        if self.state != PlaybackState::Playing && !event.is_seek {
            trace!(reported_ms = current, state = %self.state, "Ignoring tick while not playing");
            return Reconciled::IgnoredWhileNotPlaying;
        }

        if self.state == PlaybackState::Playing && !event.is_seek && current < last {
            if !self.looping {
                trace!(reported_ms = current, position_ms = last, "Holding backward tick");
                return Reconciled::BackwardHeld;
            }
            debug!(reported_ms = current, "Loop wrap");
        }

        self.last_known_ms = current;
        self.duration_ms = event.end_ms;
        self.resume_guard_at = None;
        Reconciled::Accepted {
            position_ms: current,
            duration_ms: event.end_ms,
        }
    }

    /// Apply an engine state notification
    ///
    /// Returns the transition when the displayed state changes. While a
    /// user command is awaiting its echo, differing reports are stale
    /// and dropped.
    pub fn on_engine_state(
        &mut self,
        state: PlaybackState,
        now: Instant,
    ) -> Option<(PlaybackState, PlaybackState)> {
        self.expire(now);

        if let Some((expected, _)) = self.awaiting {
            if expected != state {
                trace!(reported = %state, expected = %expected, "Dropping stale engine state");
                return None;
            }
            self.awaiting = None;
        }

        let old = self.state;
        if old == state {
            return None;
        }

        self.state = state;
        match state {
            PlaybackState::Stopped => {
                self.last_known_ms = 0;
                self.clear_flags();
            }
            PlaybackState::Paused => {
                self.resume_guard_at = None;
            }
            PlaybackState::Playing => {}
        }
        debug!(old = %old, new = %state, "Engine state changed");
        Some((old, state))
    }

    /// Position to assert again after the re-assertion delay
    ///
    /// None if anything superseded the resume or a forward-consistent report
    /// already cleared the guard.
    pub fn reassertion(&self, epoch: u64) -> Option<u64> {
        (epoch == self.epoch
            && self.state == PlaybackState::Playing
            && self.resume_guard_at.is_some())
        .then_some(self.last_known_ms)
    }

    /// Drop flags whose window has elapsed
    pub fn expire(&mut self, now: Instant) {
        let window = self.config.pause_glitch_window;
        let timeout = self.config.resume_guard_timeout;

        if self
            .pause_glitch_at
            .is_some_and(|at| now.saturating_duration_since(at) >= window)
        {
            self.pause_glitch_at = None;
        }
        if self
            .resume_guard_at
            .is_some_and(|at| now.saturating_duration_since(at) >= timeout)
        {
            self.resume_guard_at = None;
        }
        if self
            .awaiting
            .is_some_and(|(_, at)| now.saturating_duration_since(at) >= timeout)
        {
            self.awaiting = None;
        }
    }

    /// Stop tracking playback while the engine regenerates audio
    pub fn prepare_regeneration(&mut self, now: Instant) -> RegenerationPlan {
        self.expire(now);
        let plan = RegenerationPlan {
            was_playing: self.state == PlaybackState::Playing,
            position_ms: self.last_known_ms,
        };
        if plan.was_playing {
            self.state = PlaybackState::Paused;
        }
        self.clear_flags();
        self.awaiting = None;
        self.epoch += 1;
        plan
    }

    /// Return to the captured position after regeneration
    ///
    /// Resumes if playback was in progress. Otherwise the engine is only
    /// repositioned, and one backward report from the reload is suppressed.
    pub fn finish_regeneration(&mut self, plan: RegenerationPlan, now: Instant) -> Option<ResumePlan> {
        self.last_known_ms = plan.position_ms;
        if plan.was_playing {
            return self.request_resume(now);
        }
        if self.state == PlaybackState::Paused {
            self.pause_glitch_at = Some(now);
        }
        None
    }

    fn clear_flags(&mut self) {
        self.resume_guard_at = None;
        self.pause_glitch_at = None;
    }
}

impl Default for PositionReconciler {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}

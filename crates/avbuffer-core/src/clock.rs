//! Wall-clock playback timer.
//!
//! Tracks elapsed play time since the last reset. While running the elapsed
//! time is `offset + started_at.elapsed()`; while stopped it is frozen at
//! `offset`. Seeks and audio-derived corrections inject a new offset.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ClockState {
    /// Set while the clock is running
    started_at: Option<Instant>,
    /// Time accumulated before `started_at`
    offset: Duration,
}

/// Monotonic playback clock with start/stop/reset and offset injection.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    state: Mutex<ClockState>,
}

impl PlaybackClock {
    /// Creates a stopped clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or resumes the clock. No-op if already running.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    /// Stops the clock, freezing elapsed time.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(started) = state.started_at.take() {
            state.offset += started.elapsed();
        }
    }

    /// Stops the clock and rewinds it to zero.
    pub fn reset(&self) {
        self.reset_to(Duration::ZERO);
    }

    /// Stops the clock and sets elapsed time to `position`.
    pub fn reset_to(&self, position: Duration) {
        let mut state = self.state.lock();
        state.started_at = None;
        state.offset = position;
    }

    /// Sets elapsed time to `position` without changing the running state.
    pub fn set_elapsed(&self, position: Duration) {
        let mut state = self.state.lock();
        state.offset = position;
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    /// Returns elapsed play time.
    pub fn elapsed(&self) -> Duration {
        let state = self.state.lock();
        match state.started_at {
            Some(started) => state.offset + started.elapsed(),
            None => state.offset,
        }
    }

    /// Returns true while the clock is running.
    pub fn is_running(&self) -> bool {
        self.state.lock().started_at.is_some()
    }
}

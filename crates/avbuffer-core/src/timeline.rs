//! Playback time as seen by the renderer.
//!
//! While an audio stream is live, time is the duration of PCM the sink has
//! pulled minus the sink's output delay; the wall clock only runs alongside.
//! Once audio ends (or when there is none) the [`PlaybackClock`] takes over,
//! picking up exactly where the audio left off.

use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::PlaybackClock;

#[derive(Debug, Default)]
struct AudioTime {
    /// Audio pulled by the sink since the last reset
    elapsed: Duration,
    /// Sink output latency captured at playback start
    delay: Duration,
    /// Audio is the time source for this run
    live: bool,
    /// Audio ended during this run; the clock drives time
    drained: bool,
}

impl AudioTime {
    fn position(&self) -> Duration {
        self.elapsed.saturating_sub(self.delay)
    }

    fn drives_time(&self) -> bool {
        self.live && !self.drained
    }
}

/// Combines the wall clock with audio-derived time under one lock.
#[derive(Debug, Default)]
pub struct Timeline {
    clock: PlaybackClock,
    audio: Mutex<AudioTime>,
}

impl Timeline {
    /// Creates a timeline at zero, driven by the clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying wall clock.
    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Prepares a grab-thread run starting at the clock's current position.
    ///
    /// The last measured sink delay is kept until playback start measures it
    /// again, so a resumed run reports the position it paused at.
    pub fn begin_run(&self, has_audio: bool) -> Duration {
        let mut audio = self.audio.lock();
        let position = self.clock.elapsed();
        *audio = AudioTime {
            elapsed: position,
            delay: audio.delay,
            live: has_audio,
            drained: false,
        };
        position
    }

    /// Records the sink latency measured when playback starts.
    pub fn set_audio_delay(&self, delay: Duration) {
        self.audio.lock().delay = delay;
    }

    /// Advances audio time by PCM the sink just pulled.
    pub fn add_audio(&self, played: Duration) {
        let mut audio = self.audio.lock();
        if audio.drives_time() {
            audio.elapsed += played;
        }
    }

    /// Hands timekeeping to the clock once the audio stream has run dry.
    pub fn mark_audio_drained(&self) {
        let mut audio = self.audio.lock();
        if audio.drives_time() {
            audio.drained = true;
            self.clock.set_elapsed(audio.position());
            tracing::debug!("Audio drained at {:?}; clock takes over", audio.position());
        }
    }

    /// Returns true while audio drives playback time.
    pub fn is_audio_driven(&self) -> bool {
        self.audio.lock().drives_time()
    }

    /// Current playback position.
    pub fn playback_time(&self) -> Duration {
        let audio = self.audio.lock();
        if audio.drives_time() {
            audio.position()
        } else {
            self.clock.elapsed()
        }
    }

    /// Stops the clock at the end of a run so the next run resumes here.
    pub fn end_run(&self) {
        let audio = self.audio.lock();
        if audio.drives_time() {
            self.clock.reset_to(audio.elapsed);
        } else {
            self.clock.stop();
        }
    }

    /// Stops everything and moves to `position` (seek, rewind).
    pub fn reset_to(&self, position: Duration) {
        let mut audio = self.audio.lock();
        self.clock.reset_to(position);
        audio.elapsed = position;
        audio.drained = false;
    }
}

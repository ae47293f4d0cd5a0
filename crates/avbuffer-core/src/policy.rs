//! Tunable grabbing heuristics.
//!
//! The grab thread asks these policies two questions each iteration: how
//! long may the next audio decode take, and how many video frames may the
//! decoder drop to catch up. Both are traits so they can be swapped and
//! tested without running the thread.

use std::time::Duration;

/// Maps audio ring fill level to a decode time budget.
pub trait AudioBudgetPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the budget for the next audio decode, `None` for unbounded.
    ///
    /// `fill_ratio` is buffered / capacity in `0.0..=1.0`; `frame_period` is
    /// the video frame period the audio decode shares time with.
    fn budget(&self, fill_ratio: f32, frame_period: Duration) -> Option<Duration>;
}

/// Maps frame pool free-slot ratio to a drop hint.
pub trait DropFramePolicy: Send + Sync + std::fmt::Debug {
    /// Returns how many frames the decoder may skip before the next one.
    fn drop_count(&self, free_ratio: f32) -> usize;
}

/// Budget shrinks linearly as the ring fills; unbounded when nearly empty.
#[derive(Debug, Clone)]
pub struct LinearAudioBudget {
    /// Below this fill ratio audio is starving and gets no limit.
    pub unbounded_below: f32,
    /// Smallest budget ever handed out.
    pub floor: Duration,
}

impl Default for LinearAudioBudget {
    fn default() -> Self {
        Self {
            unbounded_below: 0.25,
            floor: Duration::from_millis(1),
        }
    }
}

impl AudioBudgetPolicy for LinearAudioBudget {
    fn budget(&self, fill_ratio: f32, frame_period: Duration) -> Option<Duration> {
        let fill = if fill_ratio.is_finite() {
            fill_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if fill < self.unbounded_below {
            return None;
        }
        Some(frame_period.mul_f32(1.0 - fill).max(self.floor))
    }
}

/// Drops more frames the emptier the pool is, above a threshold.
#[derive(Debug, Clone)]
pub struct ProportionalDrop {
    /// Free ratio at or below which nothing is dropped.
    pub threshold: f32,
    /// Drop hint when the pool is completely empty.
    pub max_drop: usize,
}

impl Default for ProportionalDrop {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            max_drop: 4,
        }
    }
}

impl DropFramePolicy for ProportionalDrop {
    fn drop_count(&self, free_ratio: f32) -> usize {
        if !free_ratio.is_finite() || free_ratio <= self.threshold || self.threshold >= 1.0 {
            return 0;
        }
        let excess = (free_ratio.min(1.0) - self.threshold) / (1.0 - self.threshold);
        (excess * self.max_drop as f32).round() as usize
    }
}

/// Never drops. Used by ribbon pacing and for deterministic runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDrop;

impl DropFramePolicy for NoDrop {
    fn drop_count(&self, _free_ratio: f32) -> usize {
        0
    }
}

/// Hysteresis on audio grabbing.
///
/// Once the ring cannot take a full decode block, audio grabbing pauses
/// until more than half the ring is free, leaving the time to video.
#[derive(Debug, Clone)]
pub struct AudioGrabGate {
    block: usize,
    reopen_at: usize,
    closed: bool,
}

impl AudioGrabGate {
    /// Creates a gate for decode blocks of `block` bytes in a ring of `capacity`.
    pub fn new(block: usize, capacity: usize) -> Self {
        Self {
            block,
            reopen_at: (capacity / 2).max(block),
            closed: false,
        }
    }

    /// Returns whether to grab audio given the ring's current free space.
    pub fn should_grab(&mut self, free: usize) -> bool {
        if self.closed {
            // Strictly more than half must be free
            if free > self.reopen_at {
                self.closed = false;
            }
        } else if free < self.block {
            self.closed = true;
        }
        !self.closed
    }

    /// Returns true while grabbing is held off.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

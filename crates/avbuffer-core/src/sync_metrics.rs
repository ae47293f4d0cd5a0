//! A/V synchronization metrics and drift tracking.
//!
//! The render pacer records every presented frame against the playback time
//! it was presented at. Drift is `frame_pts - playback_time`: positive means
//! the frame shown is ahead of the audio, negative means it lags.
//!
//! # Usage
//!
//! ```ignore
//! let metrics = SyncMetrics::new();
//! metrics.record_frame(frame_pts, playback_time);
//! println!("{}", metrics.snapshot());
//! ```

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Threshold for acceptable A/V sync drift.
pub const SYNC_DRIFT_THRESHOLD_MS: i64 = 100;

/// Threshold for warning-level drift.
pub const SYNC_DRIFT_WARNING_MS: i64 = 150;

/// Threshold for severe drift (clearly out of sync).
pub const SYNC_DRIFT_SEVERE_MS: i64 = 200;

/// Thread-safe drift tracker, cheap to clone.
#[derive(Clone, Default)]
pub struct SyncMetrics {
    inner: Arc<SyncMetricsInner>,
}

#[derive(Default)]
struct SyncMetricsInner {
    /// Current drift in microseconds
    current_drift_us: AtomicI64,
    /// Maximum positive drift seen (video ahead)
    max_drift_ahead_us: AtomicI64,
    /// Maximum negative drift seen (video behind)
    max_drift_behind_us: AtomicI64,
    /// Sum of absolute drift values for the average
    total_drift_us: AtomicU64,
    /// Frames recorded
    sample_count: AtomicU64,
    /// Frames whose drift exceeded the threshold
    out_of_sync_count: AtomicU64,
    /// Last presented pts in microseconds
    last_video_pts_us: AtomicU64,
    /// Lookups that found no frame
    underrun_count: AtomicU64,
    /// Lookups served by a substitute frame
    fallback_count: AtomicU64,
    /// Samples left to ignore for max drift after a seek
    grace_samples: AtomicU64,
}

impl SyncMetrics {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a presented frame. Returns the drift in microseconds.
    pub fn record_frame(&self, video_pts: Duration, playback_time: Duration) -> i64 {
        let inner = &self.inner;
        let drift_us = video_pts.as_micros() as i64 - playback_time.as_micros() as i64;

        let in_grace = inner
            .grace_samples
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .is_ok();

        inner.current_drift_us.store(drift_us, Ordering::Relaxed);
        inner
            .last_video_pts_us
            .store(video_pts.as_micros() as u64, Ordering::Relaxed);
        if !in_grace {
            if drift_us > 0 {
                inner.max_drift_ahead_us.fetch_max(drift_us, Ordering::Relaxed);
            } else {
                inner.max_drift_behind_us.fetch_min(drift_us, Ordering::Relaxed);
            }
        }

        inner
            .total_drift_us
            .fetch_add(drift_us.unsigned_abs(), Ordering::Relaxed);
        inner.sample_count.fetch_add(1, Ordering::Relaxed);
        if drift_us.abs() / 1000 > SYNC_DRIFT_THRESHOLD_MS {
            inner.out_of_sync_count.fetch_add(1, Ordering::Relaxed);
        }
        drift_us
    }

    /// Records a lookup that found nothing to show.
    pub fn record_underrun(&self) {
        self.inner.underrun_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup answered with a substitute frame.
    pub fn record_fallback(&self) {
        self.inner.fallback_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of lookups that found nothing.
    pub fn underrun_count(&self) -> u64 {
        self.inner.underrun_count.load(Ordering::Relaxed)
    }

    /// Skips max-drift updates for the next `samples` frames.
    pub fn set_grace_period(&self, samples: u64) {
        self.inner.grace_samples.store(samples, Ordering::Relaxed);
    }

    /// Clears all counters.
    pub fn reset(&self) {
        let inner = &self.inner;
        inner.current_drift_us.store(0, Ordering::Relaxed);
        inner.max_drift_ahead_us.store(0, Ordering::Relaxed);
        inner.max_drift_behind_us.store(0, Ordering::Relaxed);
        inner.total_drift_us.store(0, Ordering::Relaxed);
        inner.sample_count.store(0, Ordering::Relaxed);
        inner.out_of_sync_count.store(0, Ordering::Relaxed);
        inner.last_video_pts_us.store(0, Ordering::Relaxed);
        inner.underrun_count.store(0, Ordering::Relaxed);
        inner.fallback_count.store(0, Ordering::Relaxed);
        inner.grace_samples.store(0, Ordering::Relaxed);
    }

    /// Returns a snapshot of current metrics.
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let inner = &self.inner;
        let sample_count = inner.sample_count.load(Ordering::Relaxed);
        let total_drift = inner.total_drift_us.load(Ordering::Relaxed);
        SyncMetricsSnapshot {
            current_drift_us: inner.current_drift_us.load(Ordering::Relaxed),
            max_drift_ahead_us: inner.max_drift_ahead_us.load(Ordering::Relaxed),
            max_drift_behind_us: inner.max_drift_behind_us.load(Ordering::Relaxed),
            avg_drift_us: if sample_count > 0 {
                (total_drift / sample_count) as i64
            } else {
                0
            },
            sample_count,
            out_of_sync_count: inner.out_of_sync_count.load(Ordering::Relaxed),
            last_video_pts: Duration::from_micros(inner.last_video_pts_us.load(Ordering::Relaxed)),
            underrun_count: inner.underrun_count.load(Ordering::Relaxed),
            fallback_count: inner.fallback_count.load(Ordering::Relaxed),
        }
    }

    /// Returns true if the last frame was within the drift threshold.
    pub fn is_in_sync(&self) -> bool {
        self.inner.current_drift_us.load(Ordering::Relaxed).abs() <= SYNC_DRIFT_THRESHOLD_MS * 1000
    }

    /// Logs current sync status at debug level.
    pub fn log_status(&self) {
        tracing::debug!("{}", self.snapshot());
    }
}

/// Snapshot of sync metrics at a point in time.
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsSnapshot {
    /// Current drift in microseconds (positive = video ahead)
    pub current_drift_us: i64,
    /// Maximum drift with video ahead (microseconds)
    pub max_drift_ahead_us: i64,
    /// Maximum drift with video behind (microseconds, negative)
    pub max_drift_behind_us: i64,
    /// Average absolute drift in microseconds
    pub avg_drift_us: i64,
    /// Frames presented
    pub sample_count: u64,
    /// Frames over the drift threshold
    pub out_of_sync_count: u64,
    /// pts of the last presented frame
    pub last_video_pts: Duration,
    /// Lookups that found nothing
    pub underrun_count: u64,
    /// Lookups served by a substitute frame
    pub fallback_count: u64,
}

impl SyncMetricsSnapshot {
    /// Minimum samples required for a meaningful verdict.
    const MIN_SYNC_SAMPLES: u64 = 10;

    /// Current drift in milliseconds.
    pub fn current_drift_ms(&self) -> i64 {
        self.current_drift_us / 1000
    }

    /// Maximum absolute drift in milliseconds.
    pub fn max_drift_ms(&self) -> i64 {
        self.max_drift_ahead_us
            .abs()
            .max(self.max_drift_behind_us.abs())
            / 1000
    }

    /// Percentage of frames that were out of sync.
    pub fn out_of_sync_percentage(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            (self.out_of_sync_count as f64 / self.sample_count as f64) * 100.0
        }
    }

    /// Returns true if the session passed sync quality criteria.
    pub fn passed_sync_test(&self) -> bool {
        self.sample_count >= Self::MIN_SYNC_SAMPLES
            && self.max_drift_ms() < SYNC_DRIFT_SEVERE_MS
            && self.out_of_sync_percentage() < 5.0
    }

    /// Human-readable quality rating.
    pub fn quality_summary(&self) -> String {
        let max_drift = self.max_drift_ms();
        let quality = if max_drift < SYNC_DRIFT_THRESHOLD_MS {
            "Excellent"
        } else if max_drift < SYNC_DRIFT_WARNING_MS {
            "Good"
        } else if max_drift < SYNC_DRIFT_SEVERE_MS {
            "Fair"
        } else {
            "Poor"
        };
        format!(
            "{quality} (max drift: {max_drift}ms, avg: {}ms, {:.1}% out of sync)",
            self.avg_drift_us / 1000,
            self.out_of_sync_percentage()
        )
    }
}

impl std::fmt::Display for SyncMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "A/V Sync: drift={:+}ms (max ahead={:+}ms, behind={:+}ms), {} frames, {} misses, {} fallbacks",
            self.current_drift_ms(),
            self.max_drift_ahead_us / 1000,
            self.max_drift_behind_us / 1000,
            self.sample_count,
            self.underrun_count,
            self.fallback_count
        )
    }
}

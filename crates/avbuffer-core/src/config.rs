//! Engine configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::format::{AudioFormat, VideoFormat};
use crate::policy::{AudioBudgetPolicy, DropFramePolicy, LinearAudioBudget, ProportionalDrop};

/// Hard ceiling on frame pool slots.
pub const MAX_VIDEO_SLOTS: usize = 20;

/// Smallest pool that still leaves room for the writer next to a lent frame.
pub const MIN_VIDEO_SLOTS: usize = 3;

/// Memory assumed available when the platform cannot report it.
const FALLBACK_AVAILABLE_MEMORY: usize = 512 * 1024 * 1024;

/// Sizing of the audio ring buffer.
#[derive(Debug, Clone)]
pub struct AudioBufferConfig {
    /// Seconds of PCM the ring can hold.
    pub buffered_seconds: u32,
    /// Samples per channel requested from the decoder in one call.
    pub block_samples: usize,
}

impl AudioBufferConfig {
    /// Ring capacity in bytes for the given format.
    pub fn bytes_for(&self, format: &AudioFormat) -> usize {
        format.bytes_per_second() * self.buffered_seconds.max(1) as usize
    }

    /// Size in bytes of one decode block for the given format.
    ///
    /// Never larger than half the ring, so the grab gate can always reopen.
    pub fn block_bytes_for(&self, format: &AudioFormat) -> usize {
        let block = self.block_samples.max(1) * format.bytes_per_frame();
        format.align_down(block.min(self.bytes_for(format) / 2)).max(format.bytes_per_frame())
    }
}

impl Default for AudioBufferConfig {
    fn default() -> Self {
        Self {
            buffered_seconds: 6,
            block_samples: 32767,
        }
    }
}

/// Sizing of the video frame pool.
#[derive(Debug, Clone)]
pub struct FramePoolConfig {
    /// Upper bound on slots.
    pub max_slots: usize,
    /// Lower bound on slots.
    pub min_slots: usize,
    /// Share of available memory the pool may use.
    pub memory_fraction: f64,
    /// Explicit byte budget; overrides `memory_fraction` when set.
    pub memory_budget: Option<usize>,
}

impl FramePoolConfig {
    /// Creates a config with a fixed slot count (tests, embedded targets).
    pub fn with_slots(slots: usize) -> Self {
        let slots = slots.max(MIN_VIDEO_SLOTS);
        Self {
            max_slots: slots,
            min_slots: slots,
            ..Self::default()
        }
    }

    /// Number of slots for frames of `frame_size` bytes.
    pub fn slot_count(&self, frame_size: usize) -> usize {
        let budget = self.memory_budget.unwrap_or_else(|| {
            (available_memory() as f64 * self.memory_fraction.clamp(0.0, 1.0)) as usize
        });
        let fit = budget / frame_size.max(1);
        let max = self.max_slots.clamp(MIN_VIDEO_SLOTS, MAX_VIDEO_SLOTS);
        fit.clamp(self.min_slots.clamp(MIN_VIDEO_SLOTS, max), max)
    }
}

impl Default for FramePoolConfig {
    fn default() -> Self {
        Self {
            max_slots: MAX_VIDEO_SLOTS,
            min_slots: MIN_VIDEO_SLOTS,
            memory_fraction: 0.05,
            memory_budget: None,
        }
    }
}

/// How the renderer copes with frames that arrive late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingStrategy {
    /// Never drop; show the newest decoded frame and let playback catch up.
    Ribbon,
    /// Ask the decoder to drop frames after a stall; show nothing on a miss.
    DropFrames,
}

impl PacingStrategy {
    /// Returns true for [`PacingStrategy::Ribbon`].
    pub fn is_ribbon(&self) -> bool {
        matches!(self, PacingStrategy::Ribbon)
    }
}

/// Top-level configuration for one opened stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Audio ring sizing.
    pub audio: AudioBufferConfig,
    /// Video pool sizing.
    pub video: FramePoolConfig,
    /// Late-frame handling.
    pub strategy: PacingStrategy,
    /// Restart from zero at end of stream.
    pub loop_playback: bool,
    /// Decode (rather than only parse) frames skipped while seeking forward.
    pub decode_while_searching: bool,
    /// Render period used when the stream reports no usable frame rate.
    pub render_period_fallback: Duration,
    /// Run the internal render pacer. When false the front-end pulls
    /// frames itself through `get_frame` / `release_found_frame`.
    pub render_thread: bool,
    /// Audio decode budget heuristic.
    pub audio_budget: Arc<dyn AudioBudgetPolicy>,
    /// Frame drop heuristic (never consulted under ribbon pacing).
    pub drop_policy: Arc<dyn DropFramePolicy>,
}

impl StreamConfig {
    /// Interactive playback: never drops, tolerates slow decoders.
    pub fn for_realtime() -> Self {
        Self {
            strategy: PacingStrategy::Ribbon,
            ..Self::default()
        }
    }

    /// Frame-accurate playback: drops frames to hold sync after stalls.
    pub fn for_accurate() -> Self {
        Self {
            strategy: PacingStrategy::DropFrames,
            decode_while_searching: true,
            ..Self::default()
        }
    }

    /// Render period for `format`, using the fallback when its rate is unusable.
    pub fn render_period(&self, format: &VideoFormat) -> Duration {
        if format.fps.is_finite() && format.fps > 0.0 {
            format.frame_period()
        } else {
            self.render_period_fallback
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            audio: AudioBufferConfig::default(),
            video: FramePoolConfig::default(),
            strategy: PacingStrategy::DropFrames,
            loop_playback: false,
            decode_while_searching: false,
            render_period_fallback: Duration::from_millis(40),
            render_thread: true,
            audio_budget: Arc::new(LinearAudioBudget::default()),
            drop_policy: Arc::new(ProportionalDrop::default()),
        }
    }
}

/// Returns available physical memory in bytes.
fn available_memory() -> usize {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|info| parse_mem_available(&info))
        .unwrap_or(FALLBACK_AVAILABLE_MEMORY)
}

fn parse_mem_available(info: &str) -> Option<usize> {
    let line = info.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kib: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

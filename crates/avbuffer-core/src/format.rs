//! Stream format metadata.
//!
//! Decoders describe their output with these types; buffer sizing and
//! playback-time accounting are derived from them.

use std::time::Duration;

use crate::error::{Result, StreamError};

/// Pixel layout of decoded video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB 24-bit
    Rgb24,
    /// RGBA 32-bit
    Rgba,
    /// BGRA 32-bit (common on some platforms)
    Bgra,
    /// Single 8-bit luma plane
    Gray8,
}

impl PixelFormat {
    /// Returns the number of bytes one pixel occupies.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Layout of decoded PCM audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bytes per single-channel sample (2 for s16, 4 for f32)
    pub bytes_per_sample: u16,
}

impl AudioFormat {
    /// Creates a format description.
    pub fn new(sample_rate: u32, channels: u16, bytes_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bytes_per_sample,
        }
    }

    /// Rejects formats that cannot be buffered.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 || self.bytes_per_sample == 0 {
            return Err(StreamError::InvalidFormat(format!(
                "audio {} Hz, {} ch, {} bytes/sample",
                self.sample_rate, self.channels, self.bytes_per_sample
            )));
        }
        Ok(())
    }

    /// Bytes of one interleaved sample frame (all channels).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bytes_per_sample as usize
    }

    /// Bytes consumed by one second of playback.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame()
    }

    /// Playback duration of `bytes` of PCM in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let per_second = self.bytes_per_second();
        if per_second == 0 {
            return Duration::ZERO;
        }
        let micros = bytes as u128 * 1_000_000 / per_second as u128;
        Duration::from_micros(micros as u64)
    }

    /// Rounds `bytes` down to a whole number of sample frames.
    pub fn align_down(&self, bytes: usize) -> usize {
        let frame = self.bytes_per_frame().max(1);
        bytes - bytes % frame
    }
}

/// Layout and timing of decoded video frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFormat {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout of each frame
    pub pixel_format: PixelFormat,
    /// Nominal frame rate (frames per second)
    pub fps: f32,
}

impl VideoFormat {
    /// Rejects formats that cannot be pooled.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::InvalidFormat(format!(
                "video {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Size in bytes of one decoded frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Duration of one frame at the nominal rate.
    ///
    /// Falls back to ~25fps when the rate is unknown or nonsensical.
    pub fn frame_period(&self) -> Duration {
        if self.fps <= 0.0 || !self.fps.is_finite() {
            return Duration::from_millis(40);
        }
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }
}

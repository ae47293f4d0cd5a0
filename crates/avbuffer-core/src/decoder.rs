//! Decoder and sink collaborator traits.
//!
//! Demuxing, decoding and output devices live outside this crate. The engine
//! only sees them through the traits below: decoders fill caller-owned
//! buffers, sinks receive what the engine hands out.

use std::time::Duration;

use crate::error::Result;
use crate::format::{AudioFormat, VideoFormat};

/// Source of decoded PCM audio.
pub trait AudioDecoder: Send {
    /// Returns the PCM layout this decoder produces.
    fn format(&self) -> AudioFormat;

    /// Returns the total duration if known.
    fn duration(&self) -> Option<Duration> {
        None
    }

    /// Decodes into `buf`, returning the number of bytes written.
    ///
    /// `budget` bounds how long the call may spend decoding; `None` means the
    /// caller is starved and the decoder should fill as much as it can.
    /// Returns `Ok(0)` at end of stream.
    fn decode(&mut self, buf: &mut [u8], budget: Option<Duration>) -> Result<usize>;

    /// Repositions so the next decoded sample is at `position`.
    fn seek(&mut self, position: Duration) -> Result<()>;
}

/// Hints passed along with each video frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameRequest {
    /// Frames the decoder may discard before producing one, to catch up.
    pub drop_count: usize,
    /// Earliest presentation time worth returning.
    pub min_time: Option<Duration>,
    /// Whether frames skipped on the way to `min_time` are decoded or only parsed.
    pub decode_while_searching: bool,
}

/// Outcome of a single video decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoDecode {
    /// A frame was written; `pts` is its presentation time.
    Frame {
        /// Presentation timestamp
        pts: Duration,
    },
    /// No more frames.
    EndOfStream,
}

/// Source of decoded, fixed-size video frames.
pub trait VideoDecoder: Send {
    /// Returns the frame layout this decoder produces.
    fn format(&self) -> VideoFormat;

    /// Returns the total duration if known.
    fn duration(&self) -> Option<Duration> {
        None
    }

    /// Decodes the next frame into `dst`, which is exactly one frame long.
    fn decode_frame(&mut self, dst: &mut [u8], request: FrameRequest) -> Result<VideoDecode>;

    /// Repositions so the next frame is the one displayed at `position`.
    fn seek(&mut self, position: Duration) -> Result<()>;
}

/// Audio output device driven by its own thread.
///
/// The device thread pulls PCM through [`crate::player::AudioPull`]; the
/// engine only starts, pauses and configures it.
pub trait AudioSink: Send {
    /// Starts (or resumes) pulling audio.
    fn play(&mut self);

    /// Stops pulling audio.
    fn pause(&mut self);

    /// Returns true while the device is pulling.
    fn is_playing(&self) -> bool;

    /// Output latency between a pull and audible playback.
    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Applies a gain in 0.0..=1.0.
    fn set_volume(&mut self, _volume: f32) {}

    /// Applies a left/right balance in -1.0..=1.0.
    fn set_balance(&mut self, _balance: f32) {}
}

/// Downstream consumer of presented video frames (texture upload, encoder...).
pub trait ImageSink: Send + Sync {
    /// Receives one frame. The slice is only valid for the duration of the call.
    fn present(&self, frame: &[u8], pts: Duration, format: &VideoFormat);
}

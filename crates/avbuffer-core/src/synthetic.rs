//! Deterministic in-memory decoders.
//!
//! Used by tests and the demo in place of a real demuxer. Audio is a byte
//! ramp so ordering can be checked after it passes through the ring; each
//! video frame starts with its little-endian frame index.

use std::thread;
use std::time::Duration;

use crate::decoder::{AudioDecoder, FrameRequest, VideoDecode, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::format::{AudioFormat, PixelFormat, VideoFormat};

/// Value of the PCM byte at absolute stream offset `offset`.
pub fn audio_byte_at(offset: usize) -> u8 {
    (offset % 251) as u8
}

/// Reads the frame index written by [`SyntheticVideo`].
pub fn frame_index(frame: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = frame.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// PCM source of a fixed length.
#[derive(Debug, Clone)]
pub struct SyntheticAudio {
    format: AudioFormat,
    total_bytes: usize,
    position: usize,
    max_chunk: usize,
    fail_after: Option<usize>,
    calls: usize,
}

impl SyntheticAudio {
    /// Creates `length` of audio in `format`.
    pub fn new(format: AudioFormat, length: Duration) -> Self {
        let total = (format.bytes_per_second() as u128 * length.as_micros() / 1_000_000) as usize;
        Self {
            format,
            total_bytes: format.align_down(total),
            position: 0,
            max_chunk: usize::MAX,
            fail_after: None,
            calls: 0,
        }
    }

    /// Limits each decode call to `bytes`.
    pub fn with_max_chunk(mut self, bytes: usize) -> Self {
        self.max_chunk = self.format.align_down(bytes).max(self.format.bytes_per_frame());
        self
    }

    /// Fails every decode call after the first `calls`.
    pub fn fail_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    /// Total PCM bytes this source produces.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

impl AudioDecoder for SyntheticAudio {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.format.duration_of(self.total_bytes))
    }

    fn decode(&mut self, buf: &mut [u8], _budget: Option<Duration>) -> Result<usize> {
        self.calls += 1;
        if self.fail_after.is_some_and(|limit| self.calls > limit) {
            return Err(StreamError::Decode("synthetic audio failure".into()));
        }

        let remaining = self.total_bytes - self.position;
        let len = self
            .format
            .align_down(buf.len().min(self.max_chunk).min(remaining));
        for (i, byte) in buf[..len].iter_mut().enumerate() {
            *byte = audio_byte_at(self.position + i);
        }
        self.position += len;
        Ok(len)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let offset = (self.format.bytes_per_second() as u128 * position.as_micros() / 1_000_000) as usize;
        self.position = self.format.align_down(offset).min(self.total_bytes);
        Ok(())
    }
}

/// Frame source of a fixed length and rate.
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    format: VideoFormat,
    frame_count: u32,
    next: u32,
    decode_delay: Duration,
    stall: Option<(u32, Duration)>,
    fail_after: Option<usize>,
    calls: usize,
    last_request: FrameRequest,
}

impl SyntheticVideo {
    /// Creates `length` of video at `fps` with `width`x`height` gray frames.
    pub fn new(width: u32, height: u32, fps: f32, length: Duration) -> Self {
        let frame_count = (length.as_secs_f64() * fps as f64).round() as u32;
        Self {
            format: VideoFormat {
                width,
                height,
                pixel_format: PixelFormat::Gray8,
                fps,
            },
            frame_count,
            next: 0,
            decode_delay: Duration::ZERO,
            stall: None,
            fail_after: None,
            calls: 0,
            last_request: FrameRequest::default(),
        }
    }

    /// Sleeps `delay` per decoded frame to imitate a slow decoder.
    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    /// Additionally sleeps `stall` on every `every`-th frame, giving bursty
    /// decode latency.
    pub fn with_stall(mut self, every: u32, stall: Duration) -> Self {
        self.stall = Some((every.max(1), stall));
        self
    }

    /// Fails every decode call after the first `calls`.
    pub fn fail_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    /// Number of frames in the stream.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Hints passed with the most recent decode call.
    pub fn last_request(&self) -> FrameRequest {
        self.last_request
    }

    /// pts of frame `index`.
    pub fn pts_of(&self, index: u32) -> Duration {
        let micros = (index as f64 * 1_000_000.0 / self.format.fps as f64).round();
        Duration::from_micros(micros as u64)
    }
}

impl VideoDecoder for SyntheticVideo {
    fn format(&self) -> VideoFormat {
        self.format
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.pts_of(self.frame_count))
    }

    fn decode_frame(&mut self, dst: &mut [u8], request: FrameRequest) -> Result<VideoDecode> {
        self.calls += 1;
        self.last_request = request;
        if self.fail_after.is_some_and(|limit| self.calls > limit) {
            return Err(StreamError::Decode("synthetic video failure".into()));
        }

        let mut index = self.next.saturating_add(request.drop_count as u32);
        if let Some(min_time) = request.min_time {
            while index < self.frame_count && self.pts_of(index) < min_time {
                index += 1;
            }
        }
        if index >= self.frame_count {
            self.next = self.frame_count;
            return Ok(VideoDecode::EndOfStream);
        }

        let mut delay = self.decode_delay;
        if let Some((every, stall)) = self.stall {
            if index % every == every - 1 {
                delay += stall;
            }
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        dst.fill(index as u8);
        if let Some(head) = dst.get_mut(..4) {
            head.copy_from_slice(&index.to_le_bytes());
        }
        self.next = index + 1;
        Ok(VideoDecode::Frame {
            pts: self.pts_of(index),
        })
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let index = (position.as_secs_f64() * self.format.fps as f64).floor() as u32;
        self.next = index.min(self.frame_count);
        Ok(())
    }
}

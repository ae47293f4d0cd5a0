//! Fixed pool of decoded video frames indexed by presentation time.
//!
//! The pool is a ring of `N` equally sized slots plus a time map recording
//! the pts of each slot. The grab thread writes at `head`; the renderer looks
//! frames up by time, reads the slot in place, then releases it, which moves
//! `tail` up to the frame it just showed.
//!
//! Cursor convention: `head` and `tail` are monotonically increasing logical
//! frame positions (slot = `pos % N`). Valid frames are `tail..head`. The
//! frame at `tail` is the one most recently shown and is kept until a newer
//! frame is released, so the writer never clobbers what the renderer holds.
//!
//! # Lookup contract
//!
//! Every successful [`VideoFramePool::get_frame`] must be followed by exactly
//! one [`VideoFramePool::release_found_frame`] before the next lookup.

use std::ops::{Deref, Range};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::config::FramePoolConfig;
use crate::decoder::{FrameRequest, VideoDecode, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::format::VideoFormat;

/// Free slots the writer must leave so a lent frame is never overwritten.
pub const SAFETY_MARGIN: usize = 2;

/// Numeric lookup status, matching the classic 0 / 1 / -1 convention.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupCode {
    /// A frame at or after the requested time
    Found = 0,
    /// A substitute frame (newest available, or oldest of a full pool)
    Fallback = 1,
    /// Nothing suitable
    NoFrame = -1,
}

impl LookupCode {
    /// Convert to the raw i32.
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// A frame borrowed from the pool. Derefs to the frame bytes.
pub struct LentFrame<'a> {
    pts: Duration,
    slot: usize,
    data: MutexGuard<'a, Box<[u8]>>,
}

impl LentFrame<'_> {
    /// Presentation time of this frame.
    pub fn pts(&self) -> Duration {
        self.pts
    }

    /// Slot index inside the pool.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Deref for LentFrame<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for LentFrame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LentFrame")
            .field("pts", &self.pts)
            .field("slot", &self.slot)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Result of a time lookup.
#[derive(Debug)]
pub enum FrameLookup<'a> {
    /// First frame whose pts is at or after the requested time.
    Found(LentFrame<'a>),
    /// Substitute frame; see [`VideoFramePool::get_frame`].
    Fallback(LentFrame<'a>),
    /// No frame should be shown.
    NoFrame,
}

impl<'a> FrameLookup<'a> {
    /// Numeric status of this lookup.
    pub fn code(&self) -> LookupCode {
        match self {
            FrameLookup::Found(_) => LookupCode::Found,
            FrameLookup::Fallback(_) => LookupCode::Fallback,
            FrameLookup::NoFrame => LookupCode::NoFrame,
        }
    }

    /// Returns the borrowed frame, if any.
    pub fn frame(&self) -> Option<&LentFrame<'a>> {
        match self {
            FrameLookup::Found(frame) | FrameLookup::Fallback(frame) => Some(frame),
            FrameLookup::NoFrame => None,
        }
    }

    /// Consumes the lookup, returning the borrowed frame, if any.
    pub fn into_frame(self) -> Option<LentFrame<'a>> {
        match self {
            FrameLookup::Found(frame) | FrameLookup::Fallback(frame) => Some(frame),
            FrameLookup::NoFrame => None,
        }
    }
}

/// Outcome of a [`VideoFramePool::write_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A frame with this pts was stored.
    Written(Duration),
    /// The decoder has no more frames; the pool is now finished.
    EndOfStream,
    /// The pool was flushed while decoding; the frame was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy)]
struct FoundFrame {
    pos: u64,
    /// Releasing frees this frame too (full-pool drain)
    consume: bool,
    generation: u64,
}

struct PoolState {
    /// pts of each slot
    time_map: Vec<Duration>,
    /// Next logical position to write
    head: u64,
    /// Oldest logical position still retained
    tail: u64,
    /// Frame lent by the last lookup, awaiting release
    found: Option<FoundFrame>,
    /// Last position committed by a release
    last_released: Option<u64>,
    /// Decoder reported end of stream
    finished: bool,
    /// Time the renderer missed; the next decode should reach it
    forced_time: Option<Duration>,
    /// Known stream length
    duration: Option<Duration>,
    /// Bumped by every flush so in-flight writes and lookups go stale
    generation: u64,
}

impl PoolState {
    fn slot_count(&self) -> usize {
        self.time_map.len()
    }

    fn occupancy(&self) -> usize {
        (self.head - self.tail) as usize
    }

    fn free_slots(&self) -> usize {
        self.slot_count() - self.occupancy()
    }

    fn slot_of(&self, pos: u64) -> usize {
        (pos % self.slot_count() as u64) as usize
    }

    /// Logical position of a slot inside `tail..head`.
    fn pos_of(&self, slot: usize) -> u64 {
        let n = self.slot_count();
        let offset = (slot + n - self.slot_of(self.tail)) % n;
        self.tail + offset as u64
    }

    /// Valid slots in time order, split where they wrap past the array end.
    fn valid_ranges(&self) -> [Range<usize>; 2] {
        let n = self.slot_count();
        let len = self.occupancy();
        if len == 0 {
            return [0..0, 0..0];
        }
        let first = self.slot_of(self.tail);
        if first + len <= n {
            [first..first + len, 0..0]
        } else {
            [first..n, 0..first + len - n]
        }
    }
}

/// Pool of fixed-size video frame slots with timestamp lookup.
pub struct VideoFramePool {
    state: Mutex<PoolState>,
    slots: Box<[Mutex<Box<[u8]>>]>,
    frame_size: usize,
}

impl VideoFramePool {
    /// Allocates `slot_count` slots of `frame_size` bytes each.
    ///
    /// Fails without keeping any partial allocation if one slot cannot be
    /// obtained.
    pub fn alloc(frame_size: usize, slot_count: usize) -> Result<Self> {
        let slot_count = slot_count.max(SAFETY_MARGIN + 1);
        let total = frame_size.saturating_mul(slot_count);
        if frame_size == 0 {
            return Err(StreamError::Allocation {
                what: "video frame pool",
                bytes: total,
            });
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(slot_count)
            .map_err(|_| StreamError::Allocation {
                what: "video frame pool",
                bytes: total,
            })?;
        for _ in 0..slot_count {
            let mut slot = Vec::new();
            slot.try_reserve_exact(frame_size)
                .map_err(|_| StreamError::Allocation {
                    what: "video frame pool",
                    bytes: total,
                })?;
            slot.resize(frame_size, 0);
            slots.push(Mutex::new(slot.into_boxed_slice()));
        }

        tracing::debug!(
            "Video frame pool allocated: {} slots x {} bytes",
            slot_count,
            frame_size
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                time_map: vec![Duration::ZERO; slot_count],
                head: 0,
                tail: 0,
                found: None,
                last_released: None,
                finished: false,
                forced_time: None,
                duration: None,
                generation: 0,
            }),
            slots: slots.into_boxed_slice(),
            frame_size,
        })
    }

    /// Allocates a pool sized for `format` under `config`'s memory rules.
    pub fn for_format(format: &VideoFormat, config: &FramePoolConfig) -> Result<Self> {
        format.validate()?;
        let frame_size = format.frame_size();
        Self::alloc(frame_size, config.slot_count(frame_size))
    }

    /// Sets the stream length used to reject lookups past the end.
    pub fn set_duration(&self, duration: Option<Duration>) {
        self.state.lock().duration = duration.filter(|d| !d.is_zero());
    }

    /// Empties the pool and clears the finished flag.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        state.time_map.fill(Duration::ZERO);
        state.head = 0;
        state.tail = 0;
        state.found = None;
        state.last_released = None;
        state.finished = false;
        state.forced_time = None;
        state.generation += 1;
    }

    /// Decodes the next frame into the slot at `head`.
    ///
    /// A pending forced time (left by a missed lookup) is passed to the
    /// decoder as the minimum pts worth returning. The caller must check
    /// [`is_buffer_full`](Self::is_buffer_full) first.
    pub fn write_frame(
        &self,
        decoder: &mut dyn VideoDecoder,
        drop_count: usize,
        decode_while_searching: bool,
    ) -> Result<WriteOutcome> {
        let (slot, generation, min_time) = {
            let mut state = self.state.lock();
            debug_assert!(
                state.free_slots() > 0,
                "write_frame on a pool with no free slot"
            );
            let slot = state.slot_of(state.head);
            (slot, state.generation, state.forced_time.take())
        };

        let request = FrameRequest {
            drop_count,
            min_time,
            decode_while_searching,
        };
        let decoded = {
            let mut data = self.slots[slot].lock();
            decoder.decode_frame(&mut data, request)?
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            return Ok(WriteOutcome::Discarded);
        }
        match decoded {
            VideoDecode::Frame { pts } => {
                state.time_map[slot] = pts;
                state.head += 1;
                tracing::trace!("Pooled frame pts={:?} slot={}", pts, slot);
                Ok(WriteOutcome::Written(pts))
            }
            VideoDecode::EndOfStream => {
                state.finished = true;
                tracing::debug!("Video stream finished after {} frames", state.head);
                Ok(WriteOutcome::EndOfStream)
            }
        }
    }

    /// Looks up the frame to show at `time`.
    ///
    /// - [`FrameLookup::Found`]: the first frame whose pts is at or after `time`.
    /// - [`FrameLookup::Fallback`] with the oldest frame when the pool is full
    ///   and nothing matched, even past the stream length; releasing it frees
    ///   that slot.
    /// - [`FrameLookup::NoFrame`] when `time` is past the stream length.
    /// - [`FrameLookup::Fallback`] with the newest frame when nothing matched
    ///   and either `ribbon` is set or the stream has finished.
    /// - [`FrameLookup::NoFrame`] on a mid-stream miss, in which case `time` is
    ///   remembered as a hint for the next decode.
    ///
    /// Frames returned must be released with
    /// [`release_found_frame`](Self::release_found_frame) before the next lookup.
    pub fn get_frame(&self, time: Duration, ribbon: bool) -> FrameLookup<'_> {
        let mut state = self.state.lock();
        debug_assert!(
            state.found.is_none(),
            "get_frame called again before release_found_frame"
        );
        state.found = None;

        let matched = state
            .valid_ranges()
            .into_iter()
            .flatten()
            .find(|&slot| state.time_map[slot] >= time);
        if let Some(slot) = matched {
            return self.lend(&mut state, slot, false, LookupCode::Found);
        }

        // The writer is blocked on a full pool; hand out the oldest frame so
        // releasing it makes room, and point the decoder at `time`.
        if state.occupancy() > 0 && state.free_slots() < SAFETY_MARGIN {
            if !state.finished {
                state.forced_time = Some(time);
            }
            let oldest = state.slot_of(state.tail);
            return self.lend(&mut state, oldest, true, LookupCode::Fallback);
        }

        if state.duration.is_some_and(|d| time > d) {
            return FrameLookup::NoFrame;
        }

        if ribbon || state.finished {
            let newest = state
                .valid_ranges()
                .into_iter()
                .flatten()
                .max_by_key(|&slot| state.time_map[slot]);
            if let Some(slot) = newest {
                return self.lend(&mut state, slot, false, LookupCode::Fallback);
            }
        }

        if !state.finished {
            state.forced_time = Some(time);
        }
        tracing::trace!("No frame for {:?} ({} buffered)", time, state.occupancy());
        FrameLookup::NoFrame
    }

    fn lend<'a>(
        &'a self,
        state: &mut MutexGuard<'_, PoolState>,
        slot: usize,
        consume: bool,
        code: LookupCode,
    ) -> FrameLookup<'a> {
        let pos = state.pos_of(slot);
        state.found = Some(FoundFrame {
            pos,
            consume,
            generation: state.generation,
        });
        let frame = LentFrame {
            pts: state.time_map[slot],
            slot,
            data: self.slots[slot].lock(),
        };
        match code {
            LookupCode::Found => FrameLookup::Found(frame),
            _ => FrameLookup::Fallback(frame),
        }
    }

    /// Commits the consumer cursor to the frame lent by the last lookup,
    /// freeing every older slot.
    ///
    /// Returns false (and changes nothing) when no frame is lent.
    pub fn release_found_frame(&self) -> bool {
        let mut state = self.state.lock();
        let Some(found) = state.found.take() else {
            tracing::warn!("release_found_frame without a lent frame; ignoring");
            return false;
        };
        if found.generation != state.generation {
            return false;
        }

        let new_tail = if found.consume { found.pos + 1 } else { found.pos };
        if new_tail > state.tail {
            state.tail = new_tail.min(state.head);
        }
        state.last_released = Some(found.pos);
        true
    }

    /// True when fewer than [`SAFETY_MARGIN`] slots are free.
    pub fn is_buffer_full(&self) -> bool {
        self.state.lock().free_slots() < SAFETY_MARGIN
    }

    /// Marks the stream finished without waiting for the decoder, once
    /// playback has run past its end.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if !state.finished {
            state.finished = true;
            state.forced_time = None;
            tracing::debug!("Video stream ended by time after {} frames", state.head);
        }
    }

    /// True once the decoder reported end of stream.
    pub fn is_stream_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// True once the stream finished and the newest frame has been shown.
    pub fn is_drained(&self) -> bool {
        let state = self.state.lock();
        state.finished
            && (state.head == 0 || state.last_released.is_some_and(|pos| pos + 1 >= state.head))
    }

    /// pts of the most recently written frame.
    pub fn newest_pts(&self) -> Option<Duration> {
        let state = self.state.lock();
        if state.occupancy() == 0 {
            return None;
        }
        let slot = state.slot_of(state.head - 1);
        Some(state.time_map[slot])
    }

    /// Free slots / total slots.
    pub fn free_ratio(&self) -> f32 {
        let state = self.state.lock();
        state.free_slots() as f32 / state.slot_count() as f32
    }

    /// Number of frames currently retained.
    pub fn len(&self) -> usize {
        self.state.lock().occupancy()
    }

    /// Returns true when no frame is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Size of one frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Time the renderer last missed, if not yet handed to the decoder.
    pub fn forced_time(&self) -> Option<Duration> {
        self.state.lock().forced_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decoder producing frames at fixed pts steps; the first byte is the index.
    struct StepDecoder {
        next: u64,
        step: Duration,
        frames: u64,
        last_request: Option<FrameRequest>,
    }

    impl StepDecoder {
        fn new(frames: u64, step_ms: u64) -> Self {
            Self {
                next: 0,
                step: Duration::from_millis(step_ms),
                frames,
                last_request: None,
            }
        }
    }

    impl VideoDecoder for StepDecoder {
        fn format(&self) -> VideoFormat {
            VideoFormat {
                width: 2,
                height: 2,
                pixel_format: crate::format::PixelFormat::Gray8,
                fps: 10.0,
            }
        }

        fn decode_frame(&mut self, dst: &mut [u8], request: FrameRequest) -> Result<VideoDecode> {
            self.last_request = Some(request);
            if self.next >= self.frames {
                return Ok(VideoDecode::EndOfStream);
            }
            dst.fill(self.next as u8);
            let pts = self.step * self.next as u32;
            self.next += 1;
            Ok(VideoDecode::Frame { pts })
        }

        fn seek(&mut self, _position: Duration) -> Result<()> {
            Ok(())
        }
    }

    fn filled_pool(slots: usize, frames: u64) -> (VideoFramePool, StepDecoder) {
        let pool = VideoFramePool::alloc(4, slots).unwrap();
        let mut decoder = StepDecoder::new(frames, 100);
        for _ in 0..frames {
            pool.write_frame(&mut decoder, 0, false).unwrap();
        }
        (pool, decoder)
    }

    fn lookup_pts(pool: &VideoFramePool, ms: u64, ribbon: bool) -> (LookupCode, Option<Duration>) {
        let lookup = pool.get_frame(Duration::from_millis(ms), ribbon);
        let code = lookup.code();
        let pts = lookup.frame().map(|f| f.pts());
        drop(lookup);
        if pts.is_some() {
            pool.release_found_frame();
        }
        (code, pts)
    }

    #[test]
    fn test_alloc_rejects_empty_frames() {
        assert!(matches!(
            VideoFramePool::alloc(0, 5),
            Err(StreamError::Allocation { .. })
        ));
        let pool = VideoFramePool::alloc(16, 1).unwrap();
        assert_eq!(pool.slot_count(), SAFETY_MARGIN + 1);
    }

    #[test]
    fn test_empty_pool_reports_no_frame() {
        let pool = VideoFramePool::alloc(4, 5).unwrap();
        pool.flush();
        let lookup = pool.get_frame(Duration::ZERO, false);
        assert_eq!(lookup.code(), LookupCode::NoFrame);
        assert_eq!(lookup.code().as_raw(), -1);
        assert!(!pool.is_stream_finished());
        assert_eq!(pool.forced_time(), Some(Duration::ZERO));
    }

    #[test]
    fn test_nearest_timestamp_lookup() {
        let (pool, _) = filled_pool(8, 3); // 0, 100, 200 ms

        let lookup = pool.get_frame(Duration::from_millis(150), false);
        assert_eq!(lookup.code(), LookupCode::Found);
        let frame = lookup.into_frame().unwrap();
        assert_eq!(frame.pts(), Duration::from_millis(200));
        assert_eq!(frame[0], 2);
        drop(frame);
        assert!(pool.release_found_frame());
    }

    #[test]
    fn test_ribbon_serves_newest_frame() {
        let (pool, _) = filled_pool(8, 3);

        assert_eq!(
            lookup_pts(&pool, 250, true),
            (LookupCode::Fallback, Some(Duration::from_millis(200)))
        );
        assert_eq!(LookupCode::Fallback.as_raw(), 1);
    }

    #[test]
    fn test_mid_stream_miss_records_forced_time() {
        let (pool, mut decoder) = filled_pool(8, 3);

        assert_eq!(lookup_pts(&pool, 250, false), (LookupCode::NoFrame, None));
        assert_eq!(pool.forced_time(), Some(Duration::from_millis(250)));

        // The hint goes to the next decode and is consumed
        pool.write_frame(&mut decoder, 0, true).unwrap();
        let request = decoder.last_request.unwrap();
        assert_eq!(request.min_time, Some(Duration::from_millis(250)));
        assert!(request.decode_while_searching);
        assert_eq!(pool.forced_time(), None);
    }

    #[test]
    fn test_finished_stream_falls_back_to_newest() {
        let (pool, mut decoder) = filled_pool(8, 3);
        assert_eq!(
            pool.write_frame(&mut decoder, 0, false).unwrap(),
            WriteOutcome::EndOfStream
        );
        assert!(pool.is_stream_finished());

        assert_eq!(
            lookup_pts(&pool, 900, false),
            (LookupCode::Fallback, Some(Duration::from_millis(200)))
        );
        assert!(pool.is_drained());
    }

    #[test]
    fn test_time_past_duration_is_rejected() {
        let (pool, _) = filled_pool(8, 3);
        pool.set_duration(Some(Duration::from_millis(300)));
        assert_eq!(lookup_pts(&pool, 301, true), (LookupCode::NoFrame, None));
        assert_eq!(lookup_pts(&pool, 150, true).0, LookupCode::Found);
    }

    #[test]
    fn test_full_pool_and_release() {
        let slots = 5;
        let (pool, _) = filled_pool(slots, slots as u64);
        assert!(pool.is_buffer_full());
        assert_eq!(pool.len(), slots);

        // Consuming the 200ms frame frees the two frames before it
        assert_eq!(lookup_pts(&pool, 200, false).0, LookupCode::Found);
        assert!(!pool.is_buffer_full());
        assert_eq!(pool.len(), slots - 2);
    }

    #[test]
    fn test_full_pool_miss_drains_oldest() {
        let slots = 4;
        let (pool, _) = filled_pool(slots, slots as u64); // 0..300 ms

        // Nothing at or after 1s and the writer is blocked: oldest frame,
        // consumed on release
        assert_eq!(
            lookup_pts(&pool, 1000, false),
            (LookupCode::Fallback, Some(Duration::ZERO))
        );
        assert_eq!(pool.len(), slots - 1);
        assert_eq!(pool.forced_time(), Some(Duration::from_secs(1)));
        assert!(pool.is_buffer_full());

        assert_eq!(
            lookup_pts(&pool, 1000, false),
            (LookupCode::Fallback, Some(Duration::from_millis(100)))
        );
        assert!(!pool.is_buffer_full());

        // With room for the writer, a miss falls under the normal rules again
        assert_eq!(lookup_pts(&pool, 1000, false), (LookupCode::NoFrame, None));
    }

    #[test]
    fn test_full_pool_drains_past_duration() {
        // Audio-driven time ran past the end while 2 s of video sat unshown
        let pool = VideoFramePool::alloc(4, 8).unwrap();
        let mut decoder = StepDecoder::new(20, 100);
        while !pool.is_buffer_full() {
            pool.write_frame(&mut decoder, 0, false).unwrap();
        }
        pool.set_duration(Some(Duration::from_secs(2)));

        let (code, pts) = lookup_pts(&pool, 2100, true);
        assert_eq!((code, pts), (LookupCode::Fallback, Some(Duration::ZERO)));
        assert_eq!(pool.forced_time(), Some(Duration::from_millis(2100)));
        assert!(!pool.is_buffer_full());

        // The writer gets room and the forced time carries it to the end
        pool.write_frame(&mut decoder, 0, false).unwrap();
        assert_eq!(decoder.last_request.unwrap().min_time, Some(Duration::from_millis(2100)));

        // Once there is room again, past-the-end lookups are rejected
        while pool.is_buffer_full() {
            lookup_pts(&pool, 2100, true);
        }
        assert_eq!(lookup_pts(&pool, 2100, true), (LookupCode::NoFrame, None));
    }

    #[test]
    fn test_finish_ends_stream_early() {
        let (pool, _) = filled_pool(8, 3);
        assert_eq!(lookup_pts(&pool, 250, false), (LookupCode::NoFrame, None));
        pool.finish();
        assert!(pool.is_stream_finished());
        assert_eq!(pool.forced_time(), None);
        // A finished stream serves its newest frame on a miss
        assert_eq!(
            lookup_pts(&pool, 250, false),
            (LookupCode::Fallback, Some(Duration::from_millis(200)))
        );
        assert!(pool.is_drained());
    }

    #[test]
    fn test_writer_respects_margin_across_wraparound() {
        let pool = VideoFramePool::alloc(4, 4).unwrap();
        let mut decoder = StepDecoder::new(100, 100);
        let mut shown = Vec::new();
        let mut written = 0;

        while shown.len() < 40 {
            while !pool.is_buffer_full() {
                pool.write_frame(&mut decoder, 0, false).unwrap();
                written += 1;
            }
            // Renderer asks for the frame one step after the last one shown
            let want = shown.last().map_or(0, |ms| ms + 100);
            let (code, pts) = lookup_pts(&pool, want, false);
            assert_eq!(code, LookupCode::Found);
            shown.push(pts.unwrap().as_millis() as u64);
        }

        let expected: Vec<u64> = (0..40).map(|i| i * 100).collect();
        assert_eq!(shown, expected);
        assert!(written > 40);
    }

    #[test]
    fn test_release_without_lookup_is_noop() {
        let (pool, _) = filled_pool(8, 4);
        assert_eq!(lookup_pts(&pool, 200, false).0, LookupCode::Found);
        let before = pool.len();

        assert!(!pool.release_found_frame());
        assert_eq!(pool.len(), before);

        // A miss lends nothing either
        drop(pool.get_frame(Duration::from_secs(10), false));
        assert!(!pool.release_found_frame());
        assert_eq!(pool.len(), before);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "before release_found_frame")]
    fn test_double_lookup_asserts_in_debug() {
        let (pool, _) = filled_pool(8, 3);
        drop(pool.get_frame(Duration::ZERO, false));
        drop(pool.get_frame(Duration::ZERO, false));
    }

    #[test]
    fn test_flush_resets_pool() {
        let (pool, mut decoder) = filled_pool(8, 3);
        pool.write_frame(&mut decoder, 0, false).unwrap();
        assert!(pool.is_stream_finished());

        pool.flush();
        assert!(pool.is_empty());
        assert!(!pool.is_stream_finished());
        assert!(!pool.is_buffer_full());
        assert_eq!(pool.newest_pts(), None);
    }

    #[test]
    fn test_lookup_released_after_flush_is_ignored() {
        let (pool, _) = filled_pool(8, 3);
        let lookup = pool.get_frame(Duration::from_millis(100), false);
        drop(lookup);
        pool.flush();
        assert!(!pool.release_found_frame());
        assert!(pool.is_empty());
    }
}

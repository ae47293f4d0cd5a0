//! Circular byte buffer for decoded PCM.
//!
//! The grab thread writes decoded audio, the audio sink's thread drains it.
//! Both sides serialize on one mutex; each call holds it only for a copy.
//!
//! Design: `start` (next byte to read) and `end` (next byte to write) are
//! monotonically increasing logical positions that never wrap; the physical
//! index is `pos % capacity`. Fill is `end - start`, so `start == end` always
//! means empty and the whole capacity is usable.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, StreamError};

struct RingState {
    /// Backing storage; empty while the buffer is closed.
    data: Vec<u8>,
    /// Logical read position.
    start: u64,
    /// Logical write position.
    end: u64,
}

impl RingState {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn fill(&self) -> usize {
        (self.end - self.start) as usize
    }

    fn free(&self) -> usize {
        self.capacity().saturating_sub(self.fill())
    }

    /// Physical index of a logical position.
    fn index(&self, pos: u64) -> usize {
        (pos % self.capacity() as u64) as usize
    }
}

/// Metrics snapshot for observability.
#[derive(Debug, Clone, Default)]
pub struct RingBufferMetrics {
    /// Current fill level in bytes.
    pub fill_bytes: usize,
    /// Buffer capacity in bytes.
    pub capacity_bytes: usize,
    /// Total bytes accepted by `write`.
    pub total_written: u64,
    /// Total bytes handed out by `read`.
    pub total_read: u64,
    /// Reads that found fewer bytes than requested.
    pub underrun_count: u64,
}

/// Fixed-capacity PCM ring with underrun resync.
pub struct AudioRingBuffer {
    state: Mutex<RingState>,
    total_written: AtomicU64,
    total_read: AtomicU64,
    underrun_count: AtomicU64,
}

impl AudioRingBuffer {
    /// Creates a closed buffer. Call [`alloc`](Self::alloc) before use.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RingState {
                data: Vec::new(),
                start: 0,
                end: 0,
            }),
            total_written: AtomicU64::new(0),
            total_read: AtomicU64::new(0),
            underrun_count: AtomicU64::new(0),
        }
    }

    /// Creates a buffer with `bytes` of storage.
    pub fn with_capacity(bytes: usize) -> Result<Self> {
        let ring = Self::new();
        ring.alloc(bytes)?;
        Ok(ring)
    }

    /// Allocates backing storage and resets both positions.
    ///
    /// On failure the buffer is left closed (zero capacity).
    pub fn alloc(&self, bytes: usize) -> Result<()> {
        let mut state = self.state.lock();
        state.data = Vec::new();
        state.start = 0;
        state.end = 0;

        if bytes == 0 {
            return Err(StreamError::Allocation {
                what: "audio ring buffer",
                bytes,
            });
        }
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| StreamError::Allocation {
                what: "audio ring buffer",
                bytes,
            })?;
        data.resize(bytes, 0);
        state.data = data;

        tracing::debug!("Audio ring buffer allocated: {} bytes", bytes);
        Ok(())
    }

    /// Drops the backing storage, closing the buffer.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.data = Vec::new();
        state.start = 0;
        state.end = 0;
    }

    /// Copies `data` in at the write position, wrapping at the array end.
    ///
    /// The caller must check [`is_enough_free_space`](Self::is_enough_free_space)
    /// first. Writing more than the free space overwrites unread audio; the
    /// read position is then moved up so the buffer stays consistent.
    pub fn write(&self, data: &[u8]) {
        let mut state = self.state.lock();
        let capacity = state.capacity();
        if capacity == 0 || data.is_empty() {
            return;
        }
        debug_assert!(
            data.len() <= state.free(),
            "ring write of {} bytes exceeds free space {}",
            data.len(),
            state.free()
        );

        // Only the newest `capacity` bytes can survive a single write.
        let data = &data[data.len().saturating_sub(capacity)..];
        let at = state.index(state.end);
        let first = data.len().min(capacity - at);
        state.data[at..at + first].copy_from_slice(&data[..first]);
        state.data[..data.len() - first].copy_from_slice(&data[first..]);

        state.end += data.len() as u64;
        if state.fill() > capacity {
            state.start = state.end - capacity as u64;
        }
        self.total_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
    }

    /// Fills `out` from the read position.
    ///
    /// Returns `out.len()` on success. If fewer bytes are buffered, `out` is
    /// zero-filled, the read position jumps to the write position (discarding
    /// the remainder) and 0 is returned.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        if out.is_empty() {
            return 0;
        }
        if state.capacity() == 0 || state.fill() < out.len() {
            out.fill(0);
            state.start = state.end;
            self.underrun_count.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        let capacity = state.capacity();
        let at = state.index(state.start);
        let first = out.len().min(capacity - at);
        out[..first].copy_from_slice(&state.data[at..at + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&state.data[..rest]);

        state.start += out.len() as u64;
        self.total_read.fetch_add(out.len() as u64, Ordering::Relaxed);
        out.len()
    }

    /// Returns whether `bytes` can be written without overtaking unread data.
    pub fn is_enough_free_space(&self, bytes: usize) -> bool {
        self.state.lock().free() >= bytes
    }

    /// Empties the buffer without reallocating.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        state.start = 0;
        state.end = 0;
    }

    /// Bytes that can be written right now.
    pub fn free_space_size(&self) -> usize {
        self.state.lock().free()
    }

    /// Bytes waiting to be read.
    pub fn fill_size(&self) -> usize {
        self.state.lock().fill()
    }

    /// Total capacity in bytes (0 while closed).
    pub fn size(&self) -> usize {
        self.state.lock().capacity()
    }

    /// Returns true when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.fill_size() == 0
    }

    /// Returns current metrics.
    pub fn metrics(&self) -> RingBufferMetrics {
        let (fill, capacity) = {
            let state = self.state.lock();
            (state.fill(), state.capacity())
        };
        RingBufferMetrics {
            fill_bytes: fill,
            capacity_bytes: capacity,
            total_written: self.total_written.load(Ordering::Relaxed),
            total_read: self.total_read.load(Ordering::Relaxed),
            underrun_count: self.underrun_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for AudioRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

//! Error types for the buffering engine.
//!
//! Only hard failures are errors. A lookup that finds no frame, or an audio
//! read that runs dry, is reported through the result value of that call.

use std::time::Duration;

/// Errors produced while opening, filling or controlling a stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    /// Buffer or pool storage could not be obtained at open time.
    #[error("failed to allocate {what} ({bytes} bytes)")]
    Allocation {
        /// Which buffer was being allocated
        what: &'static str,
        /// Requested size
        bytes: usize,
    },
    /// The decoder reported a hard failure while grabbing.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The decoder could not reposition.
    #[error("seek to {position:?} failed: {message}")]
    Seek {
        /// Requested position
        position: Duration,
        /// Decoder-provided reason
        message: String,
    },
    /// Stream metadata is unusable (zero sample rate, empty frames, ...).
    #[error("invalid stream format: {0}")]
    InvalidFormat(String),
    /// Neither an audio nor a video stream could be opened.
    #[error("stream has neither audio nor video")]
    NoStreams,
    /// A handle does not refer to a live entry.
    #[error("invalid or stale handle")]
    InvalidHandle,
    /// A worker thread could not be started.
    #[error("failed to spawn {what} thread: {message}")]
    Spawn {
        /// Which thread
        what: &'static str,
        /// OS-provided reason
        message: String,
    },
    /// The control thread is no longer running.
    #[error("player control thread has exited")]
    Disconnected,
}

impl StreamError {
    /// Returns true for failures that end the grab loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Decode(_) | StreamError::Seek { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StreamError>;

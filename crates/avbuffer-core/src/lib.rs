//! avbuffer-core: Audio/video buffering and synchronization engine.
//!
//! Decoded PCM and video frames flow from decoder collaborators into two
//! buffers and out to the playback devices, time-aligned against one clock:
//!
//! - Buffers: [`audio_ring_buffer`], [`frame_pool`]
//! - Timing: [`clock`], [`timeline`], [`sync_metrics`]
//! - Threads: [`orchestrator`] (grab thread + state machine), [`render_pacer`],
//!   and the audio pull callback ([`player::AudioPull`])
//! - Tunables: [`config`], [`policy`]
//! - Front-end: [`player`], [`arena`], [`audio`]
//! - Collaborator boundary: [`decoder`], [`format`], [`synthetic`]
//!
//! Demuxing, decoding and output devices are not part of this crate; they
//! plug in through the traits in [`decoder`].

pub mod arena;
pub mod audio;
pub mod audio_ring_buffer;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod frame_pool;
pub mod orchestrator;
pub mod player;
pub mod policy;
pub mod render_pacer;
pub mod sync_metrics;
pub mod synthetic;
pub mod timeline;
pub mod wake;

pub use arena::{Arena, Handle, PlayerRegistry};
pub use config::{PacingStrategy, StreamConfig};
pub use decoder::{AudioDecoder, AudioSink, ImageSink, VideoDecoder};
pub use error::{Result, StreamError};
pub use format::{AudioFormat, PixelFormat, VideoFormat};
pub use frame_pool::{FrameLookup, LookupCode};
pub use orchestrator::{StreamEvent, StreamOrchestrator, StreamState};
pub use player::{AudioPull, MediaPlayer, PlayerCommand, PlayerStatus};

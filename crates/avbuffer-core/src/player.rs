//! Playback front-end.
//!
//! [`MediaPlayer`] owns a [`StreamOrchestrator`] and a control thread.
//! Transport commands (play, pause, seek, ...) travel over a channel so
//! callers never block on a grab-thread join; queries and the frame/audio
//! pull primitives go straight to the orchestrator.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::config::StreamConfig;
use crate::decoder::{AudioDecoder, AudioSink, ImageSink, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::format::{AudioFormat, VideoFormat};
use crate::frame_pool::FrameLookup;
use crate::orchestrator::{StreamEvent, StreamOrchestrator, StreamState};
use crate::sync_metrics::SyncMetrics;

pub use crate::orchestrator::AudioPull;

/// Transport commands handled by the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// Start or resume playback.
    Play,
    /// Pause, keeping the position.
    Pause,
    /// Seek to zero.
    Rewind,
    /// Seek to a position.
    Seek(Duration),
    /// Enable or disable looping.
    SetLoop(bool),
    /// Stop and rewind.
    Stop,
}

/// Player status as seen by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Opened, not playing, at the start.
    Stopped,
    /// Playing (possibly still buffering before the first frame).
    Playing,
    /// Paused by the user.
    Paused,
    /// Reached the end without looping.
    Ended,
    /// The grab loop failed; see [`MediaPlayer::last_error`].
    Failed,
}

impl From<StreamState> for PlayerStatus {
    fn from(state: StreamState) -> Self {
        match state {
            StreamState::Stopped => PlayerStatus::Stopped,
            StreamState::Paused => PlayerStatus::Paused,
            StreamState::Playing => PlayerStatus::Playing,
        }
    }
}

/// An opened media stream with its playback machinery.
pub struct MediaPlayer {
    orchestrator: Arc<StreamOrchestrator>,
    status: Arc<Mutex<PlayerStatus>>,
    command_tx: Option<Sender<PlayerCommand>>,
    control: Option<JoinHandle<()>>,
}

impl MediaPlayer {
    /// Opens a stream from its decoders and sinks.
    ///
    /// Either decoder may be absent; a stream whose buffers cannot be
    /// allocated is treated as absent. Fails with [`StreamError::NoStreams`]
    /// when nothing playable remains.
    pub fn open(
        audio: Option<Box<dyn AudioDecoder>>,
        video: Option<Box<dyn VideoDecoder>>,
        audio_sink: Option<Box<dyn AudioSink>>,
        image_sink: Arc<dyn ImageSink>,
        config: StreamConfig,
    ) -> Result<Self> {
        let orchestrator = Arc::new(StreamOrchestrator::new(
            audio, video, audio_sink, image_sink, config,
        )?);
        let status = Arc::new(Mutex::new(PlayerStatus::Stopped));
        let (command_tx, command_rx) = crossbeam_channel::unbounded();

        let control = {
            let orchestrator = Arc::clone(&orchestrator);
            let status = Arc::clone(&status);
            let events = orchestrator.events();
            thread::Builder::new()
                .name("avbuffer-control".into())
                .spawn(move || control_loop(&orchestrator, &status, command_rx, events))
                .map_err(|e| StreamError::Spawn {
                    what: "control",
                    message: e.to_string(),
                })?
        };

        tracing::info!(
            "Opened stream (audio: {}, video: {}, length: {:?})",
            orchestrator.audio_format().is_some(),
            orchestrator.video_format().is_some(),
            orchestrator.length()
        );

        Ok(Self {
            orchestrator,
            status,
            command_tx: Some(command_tx),
            control: Some(control),
        })
    }

    /// Queues a transport command.
    pub fn send(&self, command: PlayerCommand) -> Result<()> {
        let tx = self.command_tx.as_ref().ok_or(StreamError::Disconnected)?;
        tx.send(command).map_err(|_| StreamError::Disconnected)
    }

    /// Starts or resumes playback.
    pub fn play(&self) -> Result<()> {
        self.send(PlayerCommand::Play)
    }

    /// Pauses playback.
    pub fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause)
    }

    /// Seeks to zero.
    pub fn rewind(&self) -> Result<()> {
        self.send(PlayerCommand::Rewind)
    }

    /// Seeks to `position`.
    pub fn seek(&self, position: Duration) -> Result<()> {
        self.send(PlayerCommand::Seek(position))
    }

    /// Enables or disables looping at end of stream.
    pub fn set_loop(&self, looping: bool) -> Result<()> {
        self.send(PlayerCommand::SetLoop(looping))
    }

    /// Stops playback and rewinds.
    pub fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop)
    }

    /// Current status.
    pub fn status(&self) -> PlayerStatus {
        *self.status.lock()
    }

    /// Error that ended the last run, if any.
    pub fn last_error(&self) -> Option<StreamError> {
        self.orchestrator.last_error()
    }

    /// Current playback position.
    pub fn current_time(&self) -> Duration {
        self.orchestrator.playback_time()
    }

    /// Longest known stream duration.
    pub fn length(&self) -> Option<Duration> {
        self.orchestrator.length()
    }

    /// Nominal video frame rate.
    pub fn frame_rate(&self) -> Option<f32> {
        self.orchestrator.frame_rate()
    }

    /// Volume in 0.0..=1.0.
    pub fn volume(&self) -> f32 {
        self.orchestrator.audio_controls().volume()
    }

    /// Sets the volume (clamped) and applies it to the audio sink.
    pub fn set_volume(&self, volume: f32) {
        self.orchestrator.set_volume(volume);
    }

    /// Balance in -1.0..=1.0.
    pub fn balance(&self) -> f32 {
        self.orchestrator.audio_controls().balance()
    }

    /// Sets the balance (clamped) and applies it to the audio sink.
    pub fn set_balance(&self, balance: f32) {
        self.orchestrator.set_balance(balance);
    }

    /// Mutes or unmutes the audio sink.
    pub fn set_muted(&self, muted: bool) {
        self.orchestrator.set_muted(muted);
    }

    /// Returns true when playback restarts at end of stream.
    pub fn is_looping(&self) -> bool {
        self.orchestrator.is_looping()
    }

    /// A/V drift accounting.
    pub fn sync_metrics(&self) -> &SyncMetrics {
        self.orchestrator.sync_metrics()
    }

    /// Audio layout, if the stream has audio.
    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.orchestrator.audio_format()
    }

    /// Video layout, if the stream has video.
    pub fn video_format(&self) -> Option<VideoFormat> {
        self.orchestrator.video_format()
    }

    /// Looks up the frame for `time`; see [`StreamOrchestrator::get_frame`].
    pub fn get_frame(&self, time: Duration, ribbon: bool) -> FrameLookup<'_> {
        self.orchestrator.get_frame(time, ribbon)
    }

    /// Releases the frame returned by the last [`get_frame`](Self::get_frame).
    pub fn release_found_frame(&self) -> bool {
        self.orchestrator.release_found_frame()
    }

    /// Pull handle for the audio sink's thread.
    pub fn audio_pull(&self) -> Option<AudioPull> {
        self.orchestrator.audio_pull()
    }

    /// Stops playback and releases the stream.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the command channel ends the control loop
        if self.command_tx.take().is_none() {
            return;
        }
        if let Some(handle) = self.control.take() {
            if handle.join().is_err() {
                tracing::warn!("Player control thread panicked");
            }
        }
        self.orchestrator.stop();
        tracing::info!("Closed stream");
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn control_loop(
    orchestrator: &StreamOrchestrator,
    status: &Mutex<PlayerStatus>,
    commands: Receiver<PlayerCommand>,
    events: Receiver<StreamEvent>,
) {
    loop {
        crossbeam_channel::select! {
            recv(commands) -> msg => {
                let Ok(command) = msg else { break };
                handle_command(orchestrator, status, command);
            }
            recv(events) -> msg => {
                if let Ok(event) = msg {
                    handle_event(orchestrator, status, event);
                }
            }
        }
    }
    tracing::debug!("Player control thread exited");
}

fn handle_command(orchestrator: &StreamOrchestrator, status: &Mutex<PlayerStatus>, command: PlayerCommand) {
    tracing::debug!("Player command: {:?}", command);
    let result = match command {
        PlayerCommand::Play => orchestrator.start(),
        PlayerCommand::Pause => {
            orchestrator.pause();
            Ok(())
        }
        PlayerCommand::Rewind => orchestrator.rewind(),
        PlayerCommand::Seek(position) => orchestrator.seek(position),
        PlayerCommand::SetLoop(looping) => {
            orchestrator.set_loop(looping);
            return;
        }
        PlayerCommand::Stop => {
            orchestrator.stop();
            Ok(())
        }
    };

    let mut status = status.lock();
    match result {
        Ok(()) => *status = PlayerStatus::from(orchestrator.state()),
        Err(e) => {
            tracing::error!("Player command {:?} failed: {}", command, e);
            *status = PlayerStatus::Failed;
        }
    }
}

fn handle_event(orchestrator: &StreamOrchestrator, status: &Mutex<PlayerStatus>, event: StreamEvent) {
    let playing = orchestrator.state() == StreamState::Playing;
    let mut status = status.lock();
    match event {
        StreamEvent::PlaybackStarted(_) | StreamEvent::Looped if playing => {
            *status = PlayerStatus::Playing;
        }
        // Stale if a new run already started
        StreamEvent::Finished if !playing => *status = PlayerStatus::Ended,
        StreamEvent::Failed(_) if !playing => *status = PlayerStatus::Failed,
        _ => {}
    }
}

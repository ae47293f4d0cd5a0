//! Background grab thread and playback state machine.
//!
//! One thread alternately decodes audio into the [`AudioRingBuffer`] and
//! video into the [`VideoFramePool`]. Once both are full (or nothing more
//! can be grabbed) it starts playback exactly once: the clock runs, the
//! audio sink starts pulling through [`AudioPull`], and a [`RenderPacer`]
//! starts showing frames. From then on the thread sleeps on a
//! [`WakeSignal`] until a consumer frees space.
//!
//! Control operations (`start`, `pause`, `stop`, `seek`) serialize on the
//! worker handle and always join the grab thread before touching cursors.
//! The grab thread itself only writes the shared state cell, so joining it
//! while holding the worker lock cannot deadlock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::audio::AudioControls;
use crate::audio_ring_buffer::AudioRingBuffer;
use crate::config::StreamConfig;
use crate::decoder::{AudioDecoder, AudioSink, ImageSink, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::format::{AudioFormat, VideoFormat};
use crate::frame_pool::{FrameLookup, VideoFramePool, WriteOutcome};
use crate::policy::AudioGrabGate;
use crate::render_pacer::{PacerContext, RenderPacer};
use crate::sync_metrics::SyncMetrics;
use crate::timeline::Timeline;
use crate::wake::WakeSignal;

/// Poll interval while waiting for consumers to drain the last data.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Frames ignored for max-drift after a seek while the pipeline settles.
const SEEK_GRACE_FRAMES: u64 = 3;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not running; position is reset.
    Stopped,
    /// Not running; position is kept.
    Paused,
    /// The grab thread is running.
    Playing,
}

/// Notifications emitted by the grab thread.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Buffers were primed and playback began at this position.
    PlaybackStarted(Duration),
    /// Both streams ended and were fully consumed; the stream rewound.
    Finished,
    /// Both streams ended and playback restarted from zero.
    Looped,
    /// The grab loop ended on an error.
    Failed(StreamError),
}

struct AudioStream {
    ring: AudioRingBuffer,
    format: AudioFormat,
    duration: Option<Duration>,
    block_bytes: usize,
    decoder: Mutex<Box<dyn AudioDecoder>>,
}

struct VideoStream {
    pool: Arc<VideoFramePool>,
    format: VideoFormat,
    duration: Option<Duration>,
    decoder: Mutex<Box<dyn VideoDecoder>>,
}

struct Shared {
    audio: Option<AudioStream>,
    video: Option<VideoStream>,
    audio_sink: Mutex<Option<Box<dyn AudioSink>>>,
    image_sink: Arc<dyn ImageSink>,
    config: StreamConfig,
    timeline: Arc<Timeline>,
    wake: Arc<WakeSignal>,
    stop: AtomicBool,
    need_flush: AtomicBool,
    audio_finished: AtomicBool,
    looping: AtomicBool,
    state: Mutex<StreamState>,
    last_error: Mutex<Option<StreamError>>,
    metrics: SyncMetrics,
    controls: AudioControls,
    events: Sender<StreamEvent>,
}

impl Shared {
    fn render_period(&self) -> Duration {
        match &self.video {
            Some(video) => self.config.render_period(&video.format),
            None => self.config.render_period_fallback,
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(event);
    }

    fn apply_audio_controls(&self) {
        if let Some(sink) = self.audio_sink.lock().as_mut() {
            sink.set_volume(self.controls.effective_volume());
            sink.set_balance(self.controls.balance());
        }
    }
}

/// Drives decoders into the buffers and owns the playback state machine.
pub struct StreamOrchestrator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    events: Receiver<StreamEvent>,
}

impl StreamOrchestrator {
    /// Allocates buffers for the given streams.
    ///
    /// A stream whose buffer cannot be allocated (or whose format is
    /// unusable) is dropped with a warning. Audio without a sink is dropped
    /// too, so video is never paced by audio nobody plays. Fails with
    /// [`StreamError::NoStreams`] when nothing is left.
    pub fn new(
        audio: Option<Box<dyn AudioDecoder>>,
        video: Option<Box<dyn VideoDecoder>>,
        audio_sink: Option<Box<dyn AudioSink>>,
        image_sink: Arc<dyn ImageSink>,
        config: StreamConfig,
    ) -> Result<Self> {
        let audio = match (audio, audio_sink.is_some()) {
            (Some(_), false) => {
                tracing::info!("No audio sink attached; ignoring audio stream");
                None
            }
            (Some(decoder), true) => match open_audio(decoder, &config) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    tracing::warn!("Audio stream unavailable: {}", e);
                    None
                }
            },
            (None, _) => None,
        };
        let video = match video {
            Some(decoder) => match open_video(decoder, &config) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    tracing::warn!("Video stream unavailable: {}", e);
                    None
                }
            },
            None => None,
        };
        if audio.is_none() && video.is_none() {
            return Err(StreamError::NoStreams);
        }

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let looping = config.loop_playback;
        Ok(Self {
            shared: Arc::new(Shared {
                audio,
                video,
                audio_sink: Mutex::new(audio_sink),
                image_sink,
                config,
                timeline: Arc::new(Timeline::new()),
                wake: Arc::new(WakeSignal::new()),
                stop: AtomicBool::new(false),
                need_flush: AtomicBool::new(false),
                audio_finished: AtomicBool::new(false),
                looping: AtomicBool::new(looping),
                state: Mutex::new(StreamState::Stopped),
                last_error: Mutex::new(None),
                metrics: SyncMetrics::new(),
                controls: AudioControls::new(),
                events: events_tx,
            }),
            worker: Mutex::new(None),
            events: events_rx,
        })
    }

    /// Starts or resumes playback from the current position.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        let running = worker.as_ref().is_some_and(|h| !h.is_finished());
        if running && *self.shared.state.lock() == StreamState::Playing {
            return Ok(());
        }
        self.spawn_worker(&mut worker)
    }

    /// Stops the grab thread, keeping the position.
    pub fn pause(&self) {
        let mut worker = self.worker.lock();
        self.halt_worker(&mut worker);
        let mut state = self.shared.state.lock();
        if *state == StreamState::Playing {
            *state = StreamState::Paused;
            tracing::debug!("Paused at {:?}", self.shared.timeline.playback_time());
        }
    }

    /// Stops the grab thread and rewinds to zero.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        self.halt_worker(&mut worker);
        self.shared.timeline.reset_to(Duration::ZERO);
        self.shared.need_flush.store(true, Ordering::Release);
        self.shared.metrics.reset();
        *self.shared.state.lock() = StreamState::Stopped;
        tracing::debug!("Stopped");
    }

    /// Moves playback to `position`.
    ///
    /// The grab thread is joined first; buffers are flushed and the decoders
    /// repositioned by the next run. Playback resumes if it was running.
    pub fn seek(&self, position: Duration) -> Result<()> {
        let mut worker = self.worker.lock();
        let was_playing = worker.as_ref().is_some_and(|h| !h.is_finished())
            && *self.shared.state.lock() == StreamState::Playing;
        self.halt_worker(&mut worker);

        self.shared.need_flush.store(true, Ordering::Release);
        self.shared.timeline.reset_to(position);
        self.shared.metrics.reset();
        self.shared.metrics.set_grace_period(SEEK_GRACE_FRAMES);
        tracing::debug!("Seek to {:?}", position);

        if was_playing {
            self.spawn_worker(&mut worker)
        } else {
            let mut state = self.shared.state.lock();
            if *state == StreamState::Playing {
                *state = StreamState::Paused;
            }
            Ok(())
        }
    }

    /// Seeks to zero.
    pub fn rewind(&self) -> Result<()> {
        self.seek(Duration::ZERO)
    }

    /// Enables or disables restarting at end of stream.
    pub fn set_loop(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    /// Returns true when playback restarts at end of stream.
    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Relaxed)
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        *self.shared.state.lock()
    }

    /// Error that ended the last run, if any.
    pub fn last_error(&self) -> Option<StreamError> {
        self.shared.last_error.lock().clone()
    }

    /// Current playback position.
    pub fn playback_time(&self) -> Duration {
        self.shared.timeline.playback_time()
    }

    /// True while a seek or stop awaits the next run's flush.
    pub fn needs_flush(&self) -> bool {
        self.shared.need_flush.load(Ordering::Acquire)
    }

    /// True once the audio decoder reported end of stream (or there is no audio).
    pub fn is_audio_finished(&self) -> bool {
        self.shared.audio.is_none() || self.shared.audio_finished.load(Ordering::Acquire)
    }

    /// True once the video decoder reported end of stream (or there is no video).
    pub fn is_video_finished(&self) -> bool {
        self.shared
            .video
            .as_ref()
            .map_or(true, |video| video.pool.is_stream_finished())
    }

    /// Looks up the frame for `time`. See [`VideoFramePool::get_frame`].
    ///
    /// Only for front-ends that render themselves
    /// ([`StreamConfig::render_thread`] off); the render pacer does its own
    /// lookups and the pool allows one outstanding frame.
    pub fn get_frame(&self, time: Duration, ribbon: bool) -> FrameLookup<'_> {
        match &self.shared.video {
            Some(video) => video.pool.get_frame(time, ribbon),
            None => FrameLookup::NoFrame,
        }
    }

    /// Releases the frame from the last [`get_frame`](Self::get_frame) and
    /// wakes the grab thread.
    pub fn release_found_frame(&self) -> bool {
        let Some(video) = &self.shared.video else {
            return false;
        };
        let released = video.pool.release_found_frame();
        if released {
            self.shared.wake.notify();
        }
        released
    }

    /// Handle for the audio sink's pull callback, if there is audio.
    pub fn audio_pull(&self) -> Option<AudioPull> {
        self.shared.audio.as_ref().map(|_| AudioPull {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Receiver of grab-thread events. Receivers share one queue.
    pub fn events(&self) -> Receiver<StreamEvent> {
        self.events.clone()
    }

    /// Drift / underrun accounting of the render pacer.
    pub fn sync_metrics(&self) -> &SyncMetrics {
        &self.shared.metrics
    }

    /// Volume, balance and mute state.
    pub fn audio_controls(&self) -> &AudioControls {
        &self.shared.controls
    }

    /// Sets the volume and forwards it to the sink.
    pub fn set_volume(&self, volume: f32) {
        self.shared.controls.set_volume(volume);
        self.shared.apply_audio_controls();
    }

    /// Sets the balance and forwards it to the sink.
    pub fn set_balance(&self, balance: f32) {
        self.shared.controls.set_balance(balance);
        self.shared.apply_audio_controls();
    }

    /// Sets mute and forwards the effective volume to the sink.
    pub fn set_muted(&self, muted: bool) {
        self.shared.controls.set_muted(muted);
        self.shared.apply_audio_controls();
    }

    /// Format of the audio stream, if present.
    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.shared.audio.as_ref().map(|audio| audio.format)
    }

    /// Format of the video stream, if present.
    pub fn video_format(&self) -> Option<VideoFormat> {
        self.shared.video.as_ref().map(|video| video.format)
    }

    /// Longest known stream duration.
    pub fn length(&self) -> Option<Duration> {
        let audio = self.shared.audio.as_ref().and_then(|a| a.duration);
        let video = self.shared.video.as_ref().and_then(|v| v.duration);
        audio.max(video)
    }

    /// Nominal video frame rate, if there is video.
    pub fn frame_rate(&self) -> Option<f32> {
        self.shared.video.as_ref().map(|video| video.format.fps)
    }

    fn spawn_worker(&self, worker: &mut Option<JoinHandle<()>>) -> Result<()> {
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::warn!("Grab thread panicked");
            }
        }

        self.shared.stop.store(false, Ordering::Release);
        *self.shared.last_error.lock() = None;
        let previous = std::mem::replace(&mut *self.shared.state.lock(), StreamState::Playing);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("avbuffer-grab".into())
            .spawn(move || grab_thread(&shared));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.state.lock() = previous;
                Err(StreamError::Spawn {
                    what: "grab",
                    message: e.to_string(),
                })
            }
        }
    }

    fn halt_worker(&self, worker: &mut Option<JoinHandle<()>>) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wake.notify();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::warn!("Grab thread panicked");
            }
        }
    }
}

impl Drop for StreamOrchestrator {
    fn drop(&mut self) {
        let mut worker = self.worker.lock();
        self.halt_worker(&mut worker);
        // A sink thread may hold an AudioPull; dropping the sink here lets it exit
        drop(self.shared.audio_sink.lock().take());
    }
}

/// Pull side of the audio ring, called from the audio sink's thread.
#[derive(Clone)]
pub struct AudioPull {
    shared: Arc<Shared>,
}

impl AudioPull {
    /// Fills `out` with the next PCM bytes.
    ///
    /// Returns `out.len()`, or 0 with `out` zeroed when not enough audio is
    /// buffered. Advances playback time by the audio handed out and wakes the
    /// grab thread once more than half the ring is free.
    pub fn get_audio(&self, out: &mut [u8]) -> usize {
        let Some(audio) = &self.shared.audio else {
            out.fill(0);
            return 0;
        };

        let read = audio.ring.read(out);
        if read > 0 {
            self.shared.timeline.add_audio(audio.format.duration_of(read));
        }
        if audio.ring.free_space_size() > audio.ring.size() / 2 {
            self.shared.wake.notify();
        }
        if read == 0
            && self.shared.audio_finished.load(Ordering::Acquire)
            && audio.ring.is_empty()
        {
            self.shared.timeline.mark_audio_drained();
            self.shared.wake.notify();
        }
        tracing::trace!("get_audio: {} of {} bytes", read, out.len());
        read
    }

    /// PCM layout handed out by [`get_audio`](Self::get_audio).
    pub fn format(&self) -> Option<AudioFormat> {
        self.shared.audio.as_ref().map(|audio| audio.format)
    }

    /// Volume, balance and mute state for the sink to apply.
    pub fn controls(&self) -> &AudioControls {
        &self.shared.controls
    }
}

fn open_audio(decoder: Box<dyn AudioDecoder>, config: &StreamConfig) -> Result<AudioStream> {
    let format = decoder.format();
    format.validate()?;
    let ring = AudioRingBuffer::with_capacity(config.audio.bytes_for(&format))?;
    let block_bytes = config.audio.block_bytes_for(&format);
    tracing::info!(
        "Audio stream: {} Hz, {} ch, {} bytes/sample, ring {} bytes",
        format.sample_rate,
        format.channels,
        format.bytes_per_sample,
        ring.size()
    );
    Ok(AudioStream {
        ring,
        format,
        duration: decoder.duration(),
        block_bytes,
        decoder: Mutex::new(decoder),
    })
}

fn open_video(decoder: Box<dyn VideoDecoder>, config: &StreamConfig) -> Result<VideoStream> {
    let format = decoder.format();
    let pool = VideoFramePool::for_format(&format, &config.video)?;
    let duration = decoder.duration();
    pool.set_duration(duration);
    tracing::info!(
        "Video stream: {}x{} {:?} @ {} fps, {} slots",
        format.width,
        format.height,
        format.pixel_format,
        format.fps,
        pool.slot_count()
    );
    Ok(VideoStream {
        pool: Arc::new(pool),
        format,
        duration,
        decoder: Mutex::new(decoder),
    })
}

/// How a single run ended.
enum RunEnd {
    /// Stop was requested.
    Interrupted,
    /// Both streams ended and were consumed.
    Finished,
}

fn grab_thread(shared: &Arc<Shared>) {
    tracing::debug!("Grab thread started");
    loop {
        let mut run = GrabRun::new(shared);
        let outcome = run.run();
        run.post_run();

        match outcome {
            Ok(RunEnd::Interrupted) => break,
            Ok(RunEnd::Finished) => {
                shared.timeline.reset_to(Duration::ZERO);
                shared.need_flush.store(true, Ordering::Release);
                if shared.looping.load(Ordering::Relaxed) && !shared.stop_requested() {
                    tracing::debug!("End of stream; looping");
                    shared.metrics.set_grace_period(SEEK_GRACE_FRAMES);
                    shared.emit(StreamEvent::Looped);
                    continue;
                }
                {
                    let mut state = shared.state.lock();
                    if *state == StreamState::Playing {
                        *state = StreamState::Paused;
                    }
                }
                tracing::info!("End of stream");
                shared.metrics.log_status();
                shared.emit(StreamEvent::Finished);
                break;
            }
            Err(e) => {
                tracing::error!("Grab loop failed: {}", e);
                *shared.last_error.lock() = Some(e.clone());
                shared.need_flush.store(true, Ordering::Release);
                *shared.state.lock() = StreamState::Stopped;
                shared.emit(StreamEvent::Failed(e));
                break;
            }
        }
    }
    tracing::debug!("Grab thread exiting");
}

/// State of one grab-thread run, from start (or loop) to stop or end of stream.
struct GrabRun<'a> {
    shared: &'a Arc<Shared>,
    renderer: Option<RenderPacer>,
    started: bool,
    has_audio: bool,
    frame_period: Duration,
}

impl<'a> GrabRun<'a> {
    fn new(shared: &'a Arc<Shared>) -> Self {
        Self {
            shared,
            renderer: None,
            started: false,
            has_audio: shared.audio.is_some(),
            frame_period: shared.render_period(),
        }
    }

    fn run(&mut self) -> Result<RunEnd> {
        self.pre_run()?;
        if let RunEnd::Interrupted = self.grab_loop()? {
            return Ok(RunEnd::Interrupted);
        }
        self.drain()
    }

    /// Repositions decoders and flushes buffers if a seek or stop asked for it.
    fn pre_run(&mut self) -> Result<()> {
        let shared = self.shared;
        let position = shared.timeline.clock().elapsed();

        if shared.need_flush.swap(false, Ordering::AcqRel) {
            if let Some(audio) = &shared.audio {
                audio
                    .decoder
                    .lock()
                    .seek(position)
                    .map_err(|e| seek_error(position, e))?;
                audio.ring.flush();
            }
            if let Some(video) = &shared.video {
                video
                    .decoder
                    .lock()
                    .seek(position)
                    .map_err(|e| seek_error(position, e))?;
                video.pool.flush();
            }
            shared.audio_finished.store(false, Ordering::Release);
            tracing::debug!("Buffers flushed at {:?}", position);
        }

        let audio_spent = shared.audio.as_ref().is_some_and(|audio| {
            shared.audio_finished.load(Ordering::Acquire) && audio.ring.is_empty()
        });
        shared.timeline.begin_run(self.has_audio && !audio_spent);
        Ok(())
    }

    fn grab_loop(&mut self) -> Result<RunEnd> {
        let shared = self.shared;
        let ribbon = shared.config.strategy.is_ribbon();

        let mut gate = shared
            .audio
            .as_ref()
            .map(|audio| AudioGrabGate::new(audio.block_bytes, audio.ring.size()));
        let mut block = vec![0u8; shared.audio.as_ref().map_or(0, |a| a.block_bytes)];

        loop {
            if shared.stop_requested() {
                return Ok(RunEnd::Interrupted);
            }
            let mut produced = false;

            if let (Some(audio), Some(gate)) = (&shared.audio, gate.as_mut()) {
                if !shared.audio_finished.load(Ordering::Acquire)
                    && gate.should_grab(audio.ring.free_space_size())
                {
                    let budget = if self.started {
                        let fill = audio.ring.fill_size() as f32 / audio.ring.size() as f32;
                        shared.config.audio_budget.budget(fill, self.frame_period)
                    } else {
                        None
                    };
                    let written = audio.decoder.lock().decode(&mut block, budget)?;
                    if written == 0 {
                        shared.audio_finished.store(true, Ordering::Release);
                        tracing::debug!("Audio stream finished");
                    } else {
                        audio.ring.write(&block[..written]);
                        produced = true;
                    }
                }
            }

            if let Some(video) = &shared.video {
                if !self.video_exhausted(video) && !video.pool.is_buffer_full() {
                    let drop_count = if ribbon || !self.started {
                        0
                    } else {
                        shared.config.drop_policy.drop_count(video.pool.free_ratio())
                    };
                    let mut decoder = video.decoder.lock();
                    match video.pool.write_frame(
                        &mut **decoder,
                        drop_count,
                        shared.config.decode_while_searching,
                    )? {
                        WriteOutcome::Written(_) => produced = true,
                        WriteOutcome::EndOfStream | WriteOutcome::Discarded => {}
                    }
                }
            }

            let video_finished = shared
                .video
                .as_ref()
                .map_or(true, |video| self.video_exhausted(video));
            let audio_finished =
                shared.audio.is_none() || shared.audio_finished.load(Ordering::Acquire);
            if audio_finished && video_finished {
                return Ok(RunEnd::Finished);
            }

            if !produced {
                if !self.started {
                    self.start_playback()?;
                }
                shared.wake.wait(&shared.stop);
            }
        }
    }

    /// Waits for consumers to take everything that was decoded.
    fn drain(&mut self) -> Result<RunEnd> {
        let shared = self.shared;
        if !self.started {
            self.start_playback()?;
        }
        tracing::debug!("Decoders finished; draining buffers");

        loop {
            if shared.stop_requested() {
                return Ok(RunEnd::Interrupted);
            }

            let audio_drained = shared.audio.as_ref().map_or(true, |audio| audio.ring.is_empty());
            if audio_drained && self.has_audio {
                shared.timeline.mark_audio_drained();
            }
            let video_drained = shared
                .video
                .as_ref()
                .map_or(true, |video| self.video_drained(video));
            if audio_drained && video_drained {
                return Ok(RunEnd::Finished);
            }

            shared.wake.wait_timeout(DRAIN_POLL);
        }
    }

    /// True once the decoder hit end of stream, or playback has moved a full
    /// frame past the stream's known length.
    fn video_exhausted(&self, video: &VideoStream) -> bool {
        if video.pool.is_stream_finished() {
            return true;
        }
        let past_end = self.started
            && video.duration.is_some_and(|length| {
                self.shared.timeline.playback_time() > length + self.frame_period
            });
        if past_end {
            video.pool.finish();
        }
        past_end
    }

    fn video_drained(&self, video: &VideoStream) -> bool {
        let Some(newest) = video.pool.newest_pts() else {
            return true;
        };
        let time = self.shared.timeline.playback_time();
        time >= newest + self.frame_period || (time >= newest && video.pool.is_drained())
    }

    fn start_playback(&mut self) -> Result<()> {
        let shared = self.shared;
        self.started = true;
        shared.timeline.clock().start();

        if self.has_audio {
            let mut sink = shared.audio_sink.lock();
            if let Some(sink) = sink.as_mut() {
                shared.timeline.set_audio_delay(sink.delay());
            }
        }
        // Read before the sink starts pulling
        let position = shared.timeline.playback_time();

        if self.has_audio {
            let mut sink = shared.audio_sink.lock();
            if let Some(sink) = sink.as_mut() {
                sink.set_volume(shared.controls.effective_volume());
                sink.set_balance(shared.controls.balance());
                sink.play();
            }
        }

        if let (Some(video), true) = (&shared.video, shared.config.render_thread) {
            self.renderer = Some(RenderPacer::start(PacerContext {
                pool: Arc::clone(&video.pool),
                timeline: Arc::clone(&shared.timeline),
                sink: Arc::clone(&shared.image_sink),
                format: video.format,
                period: self.frame_period,
                ribbon: shared.config.strategy.is_ribbon(),
                metrics: shared.metrics.clone(),
                wake: Arc::clone(&shared.wake),
            })?);
        }

        tracing::info!("Playback started at {:?}", position);
        shared.emit(StreamEvent::PlaybackStarted(position));
        Ok(())
    }

    /// Stops output and folds the consumed time back into the clock.
    fn post_run(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.stop();
        }
        if self.started {
            if let Some(sink) = self.shared.audio_sink.lock().as_mut() {
                sink.pause();
            }
        }
        self.shared.timeline.end_run();
    }
}

fn seek_error(position: Duration, err: StreamError) -> StreamError {
    match err {
        StreamError::Seek { .. } => err,
        other => StreamError::Seek {
            position,
            message: other.to_string(),
        },
    }
}

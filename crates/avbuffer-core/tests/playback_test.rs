//! End-to-end runs of the grab thread, render pacer and audio pull path
//! against synthetic streams.
//!
//! The pulling sink drains audio faster than real time, so a two-second
//! stream finishes well under a second of wall time.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use avbuffer_core::config::FramePoolConfig;
use avbuffer_core::synthetic::{audio_byte_at, SyntheticAudio, SyntheticVideo};
use avbuffer_core::{
    AudioDecoder, AudioFormat, AudioSink, LookupCode, StreamConfig, StreamError, StreamEvent,
    StreamOrchestrator, StreamState, VideoDecoder,
};
use common::{init_tracing, wait_event, PullingSink, RecordingImages, SinkMonitor};

const TIMEOUT: Duration = Duration::from_secs(10);

/// 8 kHz mono 16-bit: 16000 bytes per second
fn pcm_format() -> AudioFormat {
    AudioFormat::new(8000, 1, 2)
}

fn config() -> StreamConfig {
    StreamConfig {
        video: FramePoolConfig::with_slots(8),
        ..StreamConfig::default()
    }
}

fn open_av(
    length: Duration,
    chunk: usize,
    interval: Duration,
) -> (StreamOrchestrator, Arc<SinkMonitor>, Arc<RecordingImages>) {
    let audio = SyntheticAudio::new(pcm_format(), length);
    let video = SyntheticVideo::new(16, 16, 10.0, length);
    let (sink, monitor) = PullingSink::new(chunk, interval);
    open_with(Box::new(audio), Box::new(video), sink, monitor, config())
}

fn open_with(
    audio: Box<dyn AudioDecoder>,
    video: Box<dyn VideoDecoder>,
    sink: impl AudioSink + 'static,
    monitor: Arc<SinkMonitor>,
    config: StreamConfig,
) -> (StreamOrchestrator, Arc<SinkMonitor>, Arc<RecordingImages>) {
    let images = Arc::new(RecordingImages::default());
    let orchestrator = StreamOrchestrator::new(
        Some(audio),
        Some(video),
        Some(Box::new(sink)),
        images.clone(),
        config,
    )
    .unwrap();
    monitor.attach(orchestrator.audio_pull().unwrap());
    (orchestrator, monitor, images)
}

fn started_at(events: &crossbeam_channel::Receiver<StreamEvent>) -> Duration {
    match wait_event(events, TIMEOUT, |e| matches!(e, StreamEvent::PlaybackStarted(_))) {
        Some(StreamEvent::PlaybackStarted(at)) => at,
        other => panic!("playback never started: {other:?}"),
    }
}

#[test]
fn test_audio_video_pairing_runs_to_completion() {
    init_tracing();
    let (orchestrator, monitor, images) =
        open_av(Duration::from_secs(2), 800, Duration::from_millis(5));
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    assert!(wait_event(&events, TIMEOUT, |e| *e == StreamEvent::Finished).is_some());

    assert!(orchestrator.is_audio_finished());
    assert!(orchestrator.is_video_finished());
    // 2 s of 16 kB/s, within one video frame's worth of audio
    let delivered = monitor.delivered();
    assert!(delivered.abs_diff(32_000) <= 1_600, "delivered {delivered}");

    let shown = images.shown();
    assert!(!shown.is_empty());
    assert!(shown.windows(2).all(|w| w[0].1 <= w[1].1));

    // End of stream parks the player at zero, ready to replay
    assert_eq!(orchestrator.state(), StreamState::Paused);
    assert_eq!(orchestrator.playback_time(), Duration::ZERO);
    assert!(orchestrator.needs_flush());
    assert!(orchestrator.last_error().is_none());
}

#[test]
fn test_seek_flushes_and_restarts_at_position() {
    init_tracing();
    let (orchestrator, monitor, images) =
        open_av(Duration::from_secs(2), 800, Duration::from_millis(5));
    let events = orchestrator.events();

    orchestrator.seek(Duration::from_millis(500)).unwrap();
    assert!(orchestrator.needs_flush());
    assert_eq!(orchestrator.playback_time(), Duration::from_millis(500));
    assert_eq!(orchestrator.state(), StreamState::Stopped);

    orchestrator.start().unwrap();
    let started = wait_event(&events, TIMEOUT, |e| {
        matches!(e, StreamEvent::PlaybackStarted(_))
    });
    let Some(StreamEvent::PlaybackStarted(at)) = started else {
        panic!("playback never started");
    };
    assert!(at >= Duration::from_millis(500), "started at {at:?}");
    assert!(at <= Duration::from_millis(600), "started at {at:?}");
    assert!(!orchestrator.needs_flush());

    assert!(wait_event(&events, TIMEOUT, |e| *e == StreamEvent::Finished).is_some());

    // Audio resumed from byte 8000 (0.5 s in), video from frame 5
    assert_eq!(monitor.first_byte(), Some(audio_byte_at(8_000)));
    assert!(monitor.delivered().abs_diff(24_000) <= 1_600);
    let first = images.shown()[0];
    assert!(first.0 >= 5, "first frame {first:?}");
}

#[test]
fn test_pause_keeps_position_and_resumes() {
    init_tracing();
    // Pulls 50 ms of audio every 20 ms
    let (orchestrator, monitor, _images) =
        open_av(Duration::from_secs(2), 800, Duration::from_millis(20));
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    assert!(wait_event(&events, TIMEOUT, |e| matches!(e, StreamEvent::PlaybackStarted(_))).is_some());
    thread::sleep(Duration::from_millis(100));

    orchestrator.pause();
    assert_eq!(orchestrator.state(), StreamState::Paused);
    assert!(!monitor.is_playing());
    let paused_at = orchestrator.playback_time();
    assert!(paused_at > Duration::ZERO);

    thread::sleep(Duration::from_millis(60));
    assert_eq!(orchestrator.playback_time(), paused_at);

    orchestrator.start().unwrap();
    let resumed = wait_event(&events, TIMEOUT, |e| matches!(e, StreamEvent::PlaybackStarted(_)));
    let Some(StreamEvent::PlaybackStarted(at)) = resumed else {
        panic!("playback never resumed");
    };
    assert!(at >= paused_at);
    assert!(at <= paused_at + Duration::from_millis(100));

    orchestrator.stop();
    assert_eq!(orchestrator.state(), StreamState::Stopped);
    assert_eq!(orchestrator.playback_time(), Duration::ZERO);
    assert!(orchestrator.needs_flush());
}

#[test]
fn test_loop_restarts_from_zero() {
    init_tracing();
    let video = SyntheticVideo::new(8, 8, 10.0, Duration::from_millis(500));
    let images = Arc::new(RecordingImages::default());
    let orchestrator = StreamOrchestrator::new(
        None,
        Some(Box::new(video)),
        None,
        images.clone(),
        StreamConfig {
            loop_playback: true,
            ..config()
        },
    )
    .unwrap();
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    assert!(wait_event(&events, TIMEOUT, |e| *e == StreamEvent::Looped).is_some());
    assert_eq!(orchestrator.state(), StreamState::Playing);

    orchestrator.set_loop(false);
    assert!(wait_event(&events, TIMEOUT, |e| *e == StreamEvent::Finished).is_some());
    assert_eq!(orchestrator.state(), StreamState::Paused);

    // Frame 0 was shown again after the loop
    let shown = images.shown();
    let restarts = shown.windows(2).filter(|w| w[1].0 < w[0].0).count();
    assert!(restarts >= 1, "shown {shown:?}");
}

#[test]
fn test_decode_failure_stops_the_stream() {
    init_tracing();
    let video = SyntheticVideo::new(8, 8, 10.0, Duration::from_secs(2)).fail_after(3);
    let orchestrator = StreamOrchestrator::new(
        None,
        Some(Box::new(video)),
        None,
        Arc::new(RecordingImages::default()),
        config(),
    )
    .unwrap();
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    let failed = wait_event(&events, TIMEOUT, |e| matches!(e, StreamEvent::Failed(_)));
    assert!(matches!(failed, Some(StreamEvent::Failed(StreamError::Decode(_)))));
    assert!(matches!(orchestrator.last_error(), Some(StreamError::Decode(_))));
    assert_eq!(orchestrator.state(), StreamState::Stopped);
}

#[test]
fn test_front_end_pulls_frames_without_render_thread() {
    init_tracing();
    let video = SyntheticVideo::new(8, 8, 10.0, Duration::from_secs(1));
    let orchestrator = StreamOrchestrator::new(
        None,
        Some(Box::new(video)),
        None,
        Arc::new(RecordingImages::default()),
        StreamConfig {
            render_thread: false,
            ..config()
        },
    )
    .unwrap();
    let events = orchestrator.events();
    orchestrator.start().unwrap();
    assert!(wait_event(&events, TIMEOUT, |e| matches!(e, StreamEvent::PlaybackStarted(_))).is_some());

    let mut shown = Vec::new();
    while shown.len() < 200 {
        let lookup = orchestrator.get_frame(orchestrator.playback_time(), false);
        let pts = lookup.frame().map(|frame| frame.pts());
        let code = lookup.code();
        drop(lookup);
        if let Some(pts) = pts {
            assert!(orchestrator.release_found_frame());
            assert_ne!(code, LookupCode::NoFrame);
            shown.push(pts);
        }
        if events.try_recv() == Ok(StreamEvent::Finished) {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    assert!(shown.windows(2).all(|w| w[0] <= w[1]));
    assert!(shown.last().is_some_and(|pts| *pts >= Duration::from_millis(800)));
    assert!(orchestrator.is_video_finished());
}

#[test]
fn test_audio_without_sink_is_ignored() {
    let audio = SyntheticAudio::new(pcm_format(), Duration::from_secs(1));
    let video = SyntheticVideo::new(8, 8, 10.0, Duration::from_secs(1));
    let orchestrator = StreamOrchestrator::new(
        Some(Box::new(audio)),
        Some(Box::new(video)),
        None,
        Arc::new(RecordingImages::default()),
        config(),
    )
    .unwrap();

    assert!(orchestrator.audio_pull().is_none());
    assert!(orchestrator.audio_format().is_none());
    assert_eq!(orchestrator.length(), Some(Duration::from_secs(1)));

    let audio_only = StreamOrchestrator::new(
        Some(Box::new(SyntheticAudio::new(pcm_format(), Duration::from_secs(1)))),
        None,
        None,
        Arc::new(RecordingImages::default()),
        config(),
    );
    assert!(matches!(audio_only, Err(StreamError::NoStreams)));
}

#[test]
fn test_start_position_accounts_for_sink_delay() {
    init_tracing();
    let (sink, monitor) = PullingSink::new(800, Duration::from_millis(20));
    let (orchestrator, _monitor, _images) = open_with(
        Box::new(SyntheticAudio::new(pcm_format(), Duration::from_secs(2))),
        Box::new(SyntheticVideo::new(16, 16, 10.0, Duration::from_secs(2))),
        sink.with_delay(Duration::from_millis(40)),
        monitor,
        config(),
    );
    let events = orchestrator.events();

    orchestrator.seek(Duration::from_millis(500)).unwrap();
    orchestrator.start().unwrap();
    assert_eq!(started_at(&events), Duration::from_millis(460));

    thread::sleep(Duration::from_millis(100));
    orchestrator.pause();
    let paused_at = orchestrator.playback_time();

    // The delay measured by the last run still applies until the next start
    orchestrator.start().unwrap();
    assert_eq!(started_at(&events), paused_at);
    orchestrator.stop();
}

#[test]
fn test_bursty_video_with_ribbon_reaches_the_end() {
    init_tracing();
    // Every fifth frame stalls for far longer than a frame period while audio
    // is pulled at 2.5x real time through a small pool
    let video = SyntheticVideo::new(16, 16, 10.0, Duration::from_secs(2))
        .with_decode_delay(Duration::from_millis(5))
        .with_stall(5, Duration::from_millis(150));
    let (sink, monitor) = PullingSink::new(800, Duration::from_millis(20));
    let (orchestrator, monitor, images) = open_with(
        Box::new(SyntheticAudio::new(pcm_format(), Duration::from_secs(2))),
        Box::new(video),
        sink,
        monitor,
        StreamConfig {
            video: FramePoolConfig::with_slots(4),
            ..StreamConfig::for_realtime()
        },
    );
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    assert!(wait_event(&events, TIMEOUT, |e| *e == StreamEvent::Finished).is_some());

    assert!(orchestrator.last_error().is_none());
    assert!(orchestrator.is_video_finished());
    assert_eq!(monitor.delivered(), 32_000);
    assert!(!images.shown().is_empty());
    assert_eq!(orchestrator.state(), StreamState::Paused);
}

#[test]
fn test_slow_video_with_frame_drops_reaches_the_end() {
    init_tracing();
    let video =
        SyntheticVideo::new(16, 16, 10.0, Duration::from_secs(2)).with_decode_delay(Duration::from_millis(30));
    let (sink, monitor) = PullingSink::new(800, Duration::from_millis(10));
    let (orchestrator, _monitor, images) = open_with(
        Box::new(SyntheticAudio::new(pcm_format(), Duration::from_secs(2))),
        Box::new(video),
        sink,
        monitor,
        StreamConfig {
            video: FramePoolConfig::with_slots(4),
            ..StreamConfig::for_accurate()
        },
    );
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    assert!(wait_event(&events, TIMEOUT, |e| *e == StreamEvent::Finished).is_some());
    assert!(orchestrator.last_error().is_none());
    assert!(orchestrator.is_video_finished());

    // Frames come out in order, some skipped to keep up
    let shown = images.shown();
    assert!(shown.windows(2).all(|w| w[0].1 <= w[1].1), "shown {shown:?}");
}

#[test]
fn test_audio_decode_failure_stops_the_stream() {
    init_tracing();
    // Fifth decode call fails, 0.4 s into the stream
    let audio = SyntheticAudio::new(pcm_format(), Duration::from_secs(2))
        .with_max_chunk(1_600)
        .fail_after(4);
    let (sink, monitor) = PullingSink::new(800, Duration::from_millis(5));
    let (orchestrator, _monitor, _images) = open_with(
        Box::new(audio),
        Box::new(SyntheticVideo::new(16, 16, 10.0, Duration::from_secs(2))),
        sink,
        monitor,
        config(),
    );
    let events = orchestrator.events();

    orchestrator.start().unwrap();
    let failed = wait_event(&events, TIMEOUT, |e| matches!(e, StreamEvent::Failed(_)));
    assert!(matches!(failed, Some(StreamEvent::Failed(StreamError::Decode(_)))));
    assert!(matches!(orchestrator.last_error(), Some(StreamError::Decode(_))));
    assert_eq!(orchestrator.state(), StreamState::Stopped);
    assert!(orchestrator.needs_flush());
}

//! Shared sinks and helpers for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use avbuffer_core::synthetic::frame_index;
use avbuffer_core::{AudioPull, AudioSink, ImageSink, StreamEvent, VideoFormat};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

/// Opt-in logs: `RUST_LOG=avbuffer_core=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// State observed by the test while a [`PullingSink`] runs.
#[derive(Default)]
pub struct SinkMonitor {
    playing: AtomicBool,
    closed: AtomicBool,
    pull: Mutex<Option<AudioPull>>,
    delivered: AtomicUsize,
    first_byte: Mutex<Option<u8>>,
    volume: Mutex<Option<f32>>,
}

impl SinkMonitor {
    /// Connects the sink to the stream it plays.
    pub fn attach(&self, pull: AudioPull) {
        *self.pull.lock() = Some(pull);
    }

    /// PCM bytes handed out so far.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Acquire)
    }

    /// First byte of the first non-empty pull.
    pub fn first_byte(&self) -> Option<u8> {
        *self.first_byte.lock()
    }

    /// Last volume applied by the engine.
    pub fn volume(&self) -> Option<f32> {
        *self.volume.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

/// Audio device stand-in: a thread pulling `chunk` bytes every `interval`.
pub struct PullingSink {
    monitor: Arc<SinkMonitor>,
    delay: Duration,
    thread: Option<JoinHandle<()>>,
}

impl PullingSink {
    pub fn new(chunk: usize, interval: Duration) -> (Self, Arc<SinkMonitor>) {
        let monitor = Arc::new(SinkMonitor::default());
        let thread = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                let mut buf = vec![0u8; chunk];
                while !monitor.closed.load(Ordering::Acquire) {
                    {
                        // Held across the pull so pause() waits for it
                        let pull = monitor.pull.lock();
                        if let (true, Some(pull)) = (monitor.is_playing(), pull.as_ref()) {
                            let n = pull.get_audio(&mut buf);
                            if n > 0 {
                                monitor.first_byte.lock().get_or_insert(buf[0]);
                                monitor.delivered.fetch_add(n, Ordering::AcqRel);
                            }
                        }
                    }
                    thread::sleep(interval);
                }
            })
        };
        (
            Self {
                monitor: Arc::clone(&monitor),
                delay: Duration::ZERO,
                thread: Some(thread),
            },
            monitor,
        )
    }

    /// Reports `delay` of output latency to the engine.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl AudioSink for PullingSink {
    fn play(&mut self) {
        self.monitor.playing.store(true, Ordering::Release);
    }

    fn pause(&mut self) {
        self.monitor.playing.store(false, Ordering::Release);
        drop(self.monitor.pull.lock());
    }

    fn is_playing(&self) -> bool {
        self.monitor.is_playing()
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn set_volume(&mut self, volume: f32) {
        *self.monitor.volume.lock() = Some(volume);
    }
}

impl Drop for PullingSink {
    fn drop(&mut self) {
        self.monitor.closed.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.monitor.pull.lock().take();
    }
}

/// Image sink recording (frame index, pts) of everything presented.
#[derive(Default)]
pub struct RecordingImages {
    shown: Mutex<Vec<(u32, Duration)>>,
}

impl RecordingImages {
    pub fn shown(&self) -> Vec<(u32, Duration)> {
        self.shown.lock().clone()
    }
}

impl ImageSink for RecordingImages {
    fn present(&self, frame: &[u8], pts: Duration, _format: &VideoFormat) {
        if let Some(index) = frame_index(frame) {
            self.shown.lock().push((index, pts));
        }
    }
}

/// Waits for the first event matching `want`, returning it.
pub fn wait_event(
    events: &Receiver<StreamEvent>,
    timeout: Duration,
    want: impl Fn(&StreamEvent) -> bool,
) -> Option<StreamEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(left) {
            Ok(event) if want(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

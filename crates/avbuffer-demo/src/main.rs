//! avbuffer Demo Application
//!
//! Plays synthetic audio and video through the engine in real time with a
//! simulated audio device and a logging image sink, then prints sync stats.
//!
//! Usage: `avbuffer-demo [seconds] [--ribbon] [--loop]`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use avbuffer_core::synthetic::{frame_index, SyntheticAudio, SyntheticVideo};
use avbuffer_core::{
    AudioFormat, AudioPull, AudioSink, ImageSink, MediaPlayer, PacingStrategy, PlayerStatus,
    StreamConfig, VideoFormat,
};
use clap::Parser;
use parking_lot::Mutex;

/// Device period of the simulated audio output.
const DEVICE_PERIOD: Duration = Duration::from_millis(10);

/// Simulated audio device pulling one period of PCM per tick.
struct DeviceSink {
    pull: Arc<Mutex<Option<AudioPull>>>,
    playing: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceSink {
    fn new(format: AudioFormat) -> (Self, Arc<Mutex<Option<AudioPull>>>) {
        let pull: Arc<Mutex<Option<AudioPull>>> = Arc::new(Mutex::new(None));
        let playing = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let period_bytes = format.align_down(format.bytes_per_second() / 100);

        let thread = {
            let pull = Arc::clone(&pull);
            let playing = Arc::clone(&playing);
            let closed = Arc::clone(&closed);
            thread::spawn(move || {
                let mut buf = vec![0u8; period_bytes];
                let mut next = Instant::now();
                while !closed.load(Ordering::Acquire) {
                    if playing.load(Ordering::Acquire) {
                        if let Some(pull) = pull.lock().as_ref() {
                            let n = pull.get_audio(&mut buf);
                            if n < buf.len() {
                                tracing::trace!("Device short read: {} of {}", n, buf.len());
                            }
                        }
                    }
                    next += DEVICE_PERIOD;
                    thread::sleep(next.saturating_duration_since(Instant::now()));
                }
            })
        };

        (
            Self {
                pull: Arc::clone(&pull),
                playing,
                closed,
                thread: Some(thread),
            },
            pull,
        )
    }
}

impl AudioSink for DeviceSink {
    fn play(&mut self) {
        self.playing.store(true, Ordering::Release);
    }

    fn pause(&mut self) {
        self.playing.store(false, Ordering::Release);
        // Wait out a pull in progress
        drop(self.pull.lock());
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    fn delay(&self) -> Duration {
        DEVICE_PERIOD
    }

    fn set_volume(&mut self, volume: f32) {
        tracing::debug!("Device volume {:.2}", volume);
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.pull.lock().take();
    }
}

/// Image sink that logs each presented frame.
#[derive(Default)]
struct LogSink {
    presented: AtomicU64,
}

impl ImageSink for LogSink {
    fn present(&self, frame: &[u8], pts: Duration, format: &VideoFormat) {
        let count = self.presented.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            "Present #{} frame {:?} at {:?} ({}x{})",
            count,
            frame_index(frame),
            pts,
            format.width,
            format.height
        );
    }
}

/// Plays synthetic A/V through the avbuffer engine.
#[derive(Debug, Parser)]
#[command(name = "avbuffer-demo", version, about)]
struct Options {
    /// Stream length in seconds
    #[arg(default_value_t = 3.0, value_parser = parse_seconds)]
    seconds: f64,

    /// Show the newest frame on a miss instead of dropping frames
    #[arg(long)]
    ribbon: bool,

    /// Restart from zero at end of stream
    #[arg(long = "loop")]
    looping: bool,
}

impl Options {
    fn length(&self) -> Duration {
        Duration::from_secs_f64(self.seconds)
    }

    fn strategy(&self) -> PacingStrategy {
        if self.ribbon {
            PacingStrategy::Ribbon
        } else {
            PacingStrategy::DropFrames
        }
    }
}

fn parse_seconds(arg: &str) -> Result<f64, String> {
    let secs: f64 = arg.parse().map_err(|e| format!("{e}"))?;
    if secs.is_finite() && secs > 0.0 && secs < 3600.0 {
        Ok(secs)
    } else {
        Err(format!("length must be between 0 and 3600 seconds, got {arg}"))
    }
}

fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["avbuffer_core=debug", "avbuffer_demo=debug"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let options = Options::parse();
    // Initialize logging
    init_tracing();
    let length = options.length();
    let strategy = options.strategy();

    let audio_format = AudioFormat::new(44_100, 2, 2);
    let audio = SyntheticAudio::new(audio_format, length);
    let video = SyntheticVideo::new(320, 180, 25.0, length);
    let (device, pull_slot) = DeviceSink::new(audio_format);
    let images = Arc::new(LogSink::default());

    let config = StreamConfig {
        strategy,
        loop_playback: options.looping,
        ..StreamConfig::default()
    };

    let player = match MediaPlayer::open(
        Some(Box::new(audio)),
        Some(Box::new(video)),
        Some(Box::new(device)),
        images.clone(),
        config,
    ) {
        Ok(player) => player,
        Err(e) => {
            tracing::error!("Failed to open stream: {}", e);
            std::process::exit(1);
        }
    };
    *pull_slot.lock() = player.audio_pull();

    tracing::info!(
        "Playing {:?} ({:?}, loop: {})",
        length,
        strategy,
        options.looping
    );
    if let Err(e) = player.play() {
        tracing::error!("Play failed: {}", e);
        return;
    }

    // Looping never ends on its own; cap the run
    let deadline = Instant::now() + length * 2 + Duration::from_secs(2);
    let mut last_report = Instant::now();
    while Instant::now() < deadline {
        match player.status() {
            PlayerStatus::Ended | PlayerStatus::Failed => break,
            _ => {}
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            tracing::info!("Position {:?}", player.current_time());
            player.sync_metrics().log_status();
            last_report = Instant::now();
        }
        thread::sleep(Duration::from_millis(50));
    }

    if let Some(e) = player.last_error() {
        tracing::error!("Playback failed: {}", e);
    }
    let snapshot = player.sync_metrics().snapshot();
    println!(
        "status: {:?}, frames presented: {}, underruns: {}",
        player.status(),
        images.presented.load(Ordering::Relaxed),
        snapshot.underrun_count
    );
    println!("sync: {}", snapshot.quality_summary());
    player.close();
}

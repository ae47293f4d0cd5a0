//! Front-end transport driven through the command channel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use avbuffer_core::synthetic::{SyntheticAudio, SyntheticVideo};
use avbuffer_core::{AudioFormat, MediaPlayer, PlayerStatus, StreamConfig};
use common::{init_tracing, wait_until, PullingSink, RecordingImages, SinkMonitor};

const TIMEOUT: Duration = Duration::from_secs(10);

fn open_player(length: Duration) -> (MediaPlayer, Arc<SinkMonitor>) {
    let audio = SyntheticAudio::new(AudioFormat::new(8000, 1, 2), length);
    let video = SyntheticVideo::new(16, 16, 10.0, length);
    let (sink, monitor) = PullingSink::new(800, Duration::from_millis(20));
    let player = MediaPlayer::open(
        Some(Box::new(audio)),
        Some(Box::new(video)),
        Some(Box::new(sink)),
        Arc::new(RecordingImages::default()),
        StreamConfig::default(),
    )
    .unwrap();
    monitor.attach(player.audio_pull().unwrap());
    (player, monitor)
}

#[test]
fn test_transport_commands_update_status() {
    init_tracing();
    let (player, monitor) = open_player(Duration::from_secs(2));
    assert_eq!(player.status(), PlayerStatus::Stopped);
    assert_eq!(player.length(), Some(Duration::from_secs(2)));
    assert_eq!(player.frame_rate(), Some(10.0));

    player.play().unwrap();
    assert!(wait_until(TIMEOUT, || player.status() == PlayerStatus::Playing));
    assert!(wait_until(TIMEOUT, || monitor.is_playing()));

    // Out-of-range volume is clamped before it reaches the sink
    player.set_volume(2.0);
    assert_eq!(player.volume(), 1.0);
    assert_eq!(monitor.volume(), Some(1.0));

    player.pause().unwrap();
    assert!(wait_until(TIMEOUT, || player.status() == PlayerStatus::Paused));
    assert!(!monitor.is_playing());

    player.seek(Duration::from_secs(1)).unwrap();
    assert!(wait_until(TIMEOUT, || player.current_time() == Duration::from_secs(1)));
    assert_eq!(player.status(), PlayerStatus::Paused);

    player.play().unwrap();
    assert!(wait_until(TIMEOUT, || player.status() == PlayerStatus::Ended));
    assert_eq!(player.current_time(), Duration::ZERO);
    assert!(player.last_error().is_none());

    player.close();
}

#[test]
fn test_stop_rewinds_and_mute_silences() {
    init_tracing();
    let (player, monitor) = open_player(Duration::from_secs(3));

    player.set_muted(true);
    player.play().unwrap();
    assert!(wait_until(TIMEOUT, || monitor.volume() == Some(0.0)));
    assert!(wait_until(TIMEOUT, || player.current_time() > Duration::ZERO));

    player.stop().unwrap();
    assert!(wait_until(TIMEOUT, || player.status() == PlayerStatus::Stopped));
    assert_eq!(player.current_time(), Duration::ZERO);

    player.set_muted(false);
    assert_eq!(monitor.volume(), Some(1.0));
}

#[test]
fn test_video_only_player_toggles_loop() {
    let video = SyntheticVideo::new(4, 4, 25.0, Duration::from_secs(1));
    let player = MediaPlayer::open(
        None,
        Some(Box::new(video)),
        None,
        Arc::new(RecordingImages::default()),
        StreamConfig::default(),
    )
    .unwrap();
    assert!(player.audio_pull().is_none());
    assert!(player.set_loop(true).is_ok());
    assert!(wait_until(TIMEOUT, || player.is_looping()));
    // Dropping the player joins the control thread
    drop(player);
}

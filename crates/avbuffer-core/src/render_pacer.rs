//! Render thread: shows the frame matching the playback time once per period.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::decoder::ImageSink;
use crate::error::{Result, StreamError};
use crate::format::VideoFormat;
use crate::frame_pool::{LookupCode, VideoFramePool};
use crate::sync_metrics::SyncMetrics;
use crate::timeline::Timeline;
use crate::wake::WakeSignal;

/// Everything the render thread reads or writes.
#[derive(Clone)]
pub struct PacerContext {
    /// Frames to show
    pub pool: Arc<VideoFramePool>,
    /// Source of playback time
    pub timeline: Arc<Timeline>,
    /// Destination of presented frames
    pub sink: Arc<dyn ImageSink>,
    /// Layout handed to the sink with each frame
    pub format: VideoFormat,
    /// Target interval between lookups
    pub period: Duration,
    /// Serve the newest frame on a miss instead of nothing
    pub ribbon: bool,
    /// Drift / underrun accounting
    pub metrics: SyncMetrics,
    /// Signalled after each release so the grab thread refills the pool
    pub wake: Arc<WakeSignal>,
}

impl PacerContext {
    /// Performs one lookup / present / release cycle.
    pub fn render_once(&self) -> LookupCode {
        let time = self.timeline.playback_time();
        let lookup = self.pool.get_frame(time, self.ribbon);
        let code = lookup.code();

        match lookup.into_frame() {
            Some(frame) => {
                let pts = frame.pts();
                self.sink.present(&frame, pts, &self.format);
                self.metrics.record_frame(pts, time);
                if code == LookupCode::Fallback {
                    self.metrics.record_fallback();
                }
                // The slot lock must be gone before the cursor moves past it
                drop(frame);
                self.pool.release_found_frame();
                self.wake.notify();
            }
            None => self.metrics.record_underrun(),
        }
        code
    }
}

/// Owns the render thread. Stops and joins on drop.
pub struct RenderPacer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RenderPacer {
    /// Spawns the render thread.
    pub fn start(context: PacerContext) -> Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let period = context.period;

        let handle = thread::Builder::new()
            .name("avbuffer-render".into())
            .spawn(move || {
                tracing::debug!("Render pacer started (period {:?})", period);
                loop {
                    let began = Instant::now();
                    context.render_once();

                    // Never negative, never longer than one period
                    let sleep = period.saturating_sub(began.elapsed()).min(period);
                    match stop_rx.recv_timeout(sleep) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Render pacer stopped");
            })
            .map_err(|e| StreamError::Spawn {
                what: "render",
                message: e.to_string(),
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel and wakes the sleep
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Render pacer thread panicked");
            }
        }
    }
}

impl Drop for RenderPacer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

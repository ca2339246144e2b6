//! Face-presence sampling loop.
//!
//! [`FrameSampler`] pulls frames from the session's video track at a fixed
//! cadence, runs them through a [`FaceDetector`] and posts one
//! [`SessionEvent::FaceFrame`] per analysed frame. Per-frame failures are
//! skipped so a flaky detector never stalls monitoring.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::FaceConfig;
use crate::error::Result;
use crate::events::{EventSender, SessionEvent};

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixels, row-major.
    pub pixels: Vec<u8>,
}

/// Read access to the video track of the session's media stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame; `Ok(None)` once the track has ended.
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>>;
}

/// Counts faces in a frame.
#[async_trait]
pub trait FaceDetector: Send {
    /// Load the model.
    async fn initialize(&mut self, config: &FaceConfig) -> Result<()>;

    fn count_faces(&mut self, frame: &VideoFrame) -> Result<usize>;
}

/// Handle to a running sampling loop.
#[derive(Debug)]
pub struct FrameSampler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FrameSampler {
    /// Start sampling `source` every `interval`.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        mut detector: Box<dyn FaceDetector>,
        interval: Duration,
        events: EventSender,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_ms = interval.as_millis() as u64, "face sampling started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let frame = match source.next_frame().await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        tracing::info!("video track ended; face sampling stopped");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!("skipping unreadable frame: {e}");
                        continue;
                    }
                };
                match detector.count_faces(&frame) {
                    Ok(face_count) => {
                        if events.send(SessionEvent::FaceFrame { face_count }).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!("face detection failed for frame: {e}"),
                }
            }
        });
        Self { cancel, task }
    }

    /// Stop sampling. Safe to call repeatedly.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::slot::FrameSlot;
use crate::source::{StreamConnection, VideoSource};

/// Delay between reconnect attempts after an open or read failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Drives the camera connection: open the stream, publish every frame read
/// into the slot, and reconnect after a fixed delay whenever the stream
/// breaks. Open and read failures are never fatal; only shutdown ends the
/// loop.
pub struct StreamSupervisor<S> {
    source: S,
    url: String,
    slot: Arc<FrameSlot>,
    shutdown: watch::Receiver<bool>,
}

impl<S: VideoSource> StreamSupervisor<S> {
    pub fn new(
        source: S,
        url: String,
        slot: Arc<FrameSlot>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            url,
            slot,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            info!(url = self.url, "connecting to camera stream");
            let opened = tokio::select! {
                res = self.source.open(&self.url) => res,
                _ = self.shutdown.changed() => break,
            };

            match opened {
                Ok(conn) => {
                    self.stream_frames(conn).await;
                    if *self.shutdown.borrow() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to open camera stream");
                }
            }

            // Fixed-delay retry, still responsive to shutdown.
            tokio::select! {
                _ = tokio::time::sleep(RETRY_DELAY) => {}
                _ = self.shutdown.changed() => break,
            }
        }
        info!("capture loop stopped");
    }

    /// Publish frames until the connection breaks, the stream ends, or
    /// shutdown is requested. The connection is released on return.
    async fn stream_frames(&mut self, mut conn: Box<dyn StreamConnection>) {
        loop {
            let read = tokio::select! {
                res = conn.read_frame() => res,
                _ = self.shutdown.changed() => return,
            };
            match read {
                Ok(Some(frame)) => self.slot.publish(frame).await,
                Ok(None) => {
                    error!("camera stream ended");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "failed to read frame");
                    return;
                }
            }
        }
    }
}

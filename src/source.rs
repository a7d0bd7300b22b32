use async_trait::async_trait;

use crate::frame::Frame;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("failed to connect to stream: {0}")]
    Connect(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("stream read failed: {0}")]
    Read(String),
}

/// A live connection to the camera, yielding frames until it breaks.
#[async_trait]
pub trait StreamConnection: Send {
    /// Read the next frame. `Ok(None)` means the stream ended cleanly;
    /// either way the connection is done and must be reopened.
    async fn read_frame(&mut self) -> Result<Option<Frame>, StreamError>;
}

/// Opens connections to a camera stream address.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn StreamConnection>, StreamError>;
}

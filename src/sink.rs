use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives tag-scanned events.
#[async_trait]
pub trait TagEventSink: Send + Sync {
    async fn send_tag_event(&self, tag_id: &str, device_id: &str) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to build sink client: {0}")]
    Client(String),
    #[error("event request failed: {0}")]
    Request(String),
}

/// Home Assistant core API sink: POSTs `tag_scanned` events, authenticated
/// with the supervisor bearer token.
pub struct HaEventSink {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HaEventSink {
    pub fn new(base_url: &str, token: String) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/events/tag_scanned", base_url.trim_end_matches('/')),
            token,
        })
    }
}

#[async_trait]
impl TagEventSink for HaEventSink {
    async fn send_tag_event(&self, tag_id: &str, device_id: &str) -> Result<(), SinkError> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "tag_id": tag_id, "device_id": device_id }))
            .send()
            .await
            .map_err(|e| SinkError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| SinkError::Request(e.to_string()))?;
        Ok(())
    }
}

/// Sends emitted tags to the sink, best effort: a failed delivery is logged
/// and dropped, never retried and never surfaced to the detection loop.
pub struct Dispatcher<S> {
    sink: S,
    device_id: String,
}

impl<S: TagEventSink> Dispatcher<S> {
    pub fn new(sink: S, device_id: String) -> Self {
        Self { sink, device_id }
    }

    pub async fn dispatch(&self, tag_id: &str) {
        match self.sink.send_tag_event(tag_id, &self.device_id).await {
            Ok(()) => {
                info!(tag_id, device_id = %self.device_id, "sent tag event");
            }
            Err(e) => {
                error!(error = %e, tag_id, "failed to send tag event");
            }
        }
    }
}

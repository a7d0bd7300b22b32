use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::debounce::DebounceGate;
use crate::decode::TagDecoder;
use crate::sink::{Dispatcher, TagEventSink};
use crate::slot::FrameSlot;

/// Recognized tag payload: a Home Assistant tag URL whose token is hex
/// digits and hyphens. Only the token is used downstream.
static TAG_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.home-assistant\.io/tag/([0-9a-fA-F-]+)")
        .expect("tag pattern is valid")
});

/// Extract the tag identifier from decoded payload text.
pub fn extract_tag_id(text: &str) -> Option<&str> {
    TAG_ID_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Consumes frames from the slot and turns tag sightings into events.
pub struct TagDetector<D, S> {
    slot: Arc<FrameSlot>,
    decoder: D,
    gate: DebounceGate,
    dispatcher: Dispatcher<S>,
}

impl<D: TagDecoder, S: TagEventSink> TagDetector<D, S> {
    pub fn new(
        slot: Arc<FrameSlot>,
        decoder: D,
        gate: DebounceGate,
        dispatcher: Dispatcher<S>,
    ) -> Self {
        Self {
            slot,
            decoder,
            gate,
            dispatcher,
        }
    }

    /// Run until the slot closes. A frame that fails to decode is logged
    /// and skipped; one bad frame never stops detection of the next.
    pub async fn run(mut self) {
        while let Some(frame) = self.slot.wait_and_take().await {
            let text = match self.decoder.decode(&frame.jpeg) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, seq = frame.seq, "failed to scan frame");
                    continue;
                }
            };

            let Some(tag_id) = extract_tag_id(&text) else {
                debug!(payload = %text, "decoded payload is not a tag URL");
                continue;
            };

            if self.gate.should_emit(tag_id, Instant::now()) {
                self.dispatcher.dispatch(tag_id).await;
            }
        }
        info!("detector stopped");
    }
}

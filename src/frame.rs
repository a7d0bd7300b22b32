use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQ_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A single captured camera frame.
///
/// The JPEG bytes are owned by whoever currently holds the frame; ownership
/// moves from the capture loop into the slot and out to the detector.
/// Timestamp and sequence number exist for logging and ordering checks only.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    /// Stamp freshly captured JPEG bytes with capture time and a
    /// process-wide sequence number.
    pub fn capture(jpeg: Vec<u8>) -> Self {
        Self {
            jpeg,
            captured_at_ms: Utc::now().timestamp_millis(),
            seq: SEQ_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Frame::capture(vec![0xFF, 0xD8]);
        let b = Frame::capture(vec![0xFF, 0xD8]);
        assert!(b.seq > a.seq);
    }
}

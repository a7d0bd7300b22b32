use std::time::{Duration, Instant};

/// How long a repeated identical tag is suppressed from re-dispatch.
pub const DEBOUNCE_PERIOD: Duration = Duration::from_secs(5);

/// Decides whether a detected tag is new enough to report.
///
/// A sighting emits when the tag differs from the last emitted tag, or when
/// the debounce period has elapsed since the last emit. A tag sitting in
/// view is reported once, but reappearing after the window (or swapping to
/// a different tag) reports immediately. Suppressed sightings do not
/// refresh the window.
pub struct DebounceGate {
    period: Duration,
    last: Option<(String, Instant)>,
}

impl DebounceGate {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Returns true if this sighting should be dispatched, recording it as
    /// the last emitted tag. The first sighting always emits.
    pub fn should_emit(&mut self, tag_id: &str, now: Instant) -> bool {
        let emit = match &self.last {
            None => true,
            Some((last_id, last_at)) => {
                last_id != tag_id || now.duration_since(*last_at) >= self.period
            }
        };
        if emit {
            self.last = Some((tag_id.to_string(), now));
        }
        emit
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::frame::Frame;

/// Single-slot handoff between the capture loop and the detector.
///
/// Holds at most one frame. A publish replaces any unread frame, so the
/// detector always sees the freshest capture and a slow decode never builds
/// a backlog; skipped frames are simply dropped.
pub struct FrameSlot {
    cell: Mutex<Option<Frame>>,
    ready: Notify,
    closed: AtomicBool,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
            ready: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Store a frame, replacing any unread one, and wake the consumer.
    pub async fn publish(&self, frame: Frame) {
        let mut cell = self.cell.lock().await;
        if let Some(old) = cell.replace(frame) {
            debug!(
                seq = old.seq,
                captured_at_ms = old.captured_at_ms,
                "dropping unread frame"
            );
        }
        drop(cell);
        self.ready.notify_one();
    }

    /// Wait until a frame is available and take it, leaving the slot empty.
    ///
    /// Returns `None` once the slot has been closed and no frame is
    /// pending. A frame published before `close` is still handed over.
    pub async fn wait_and_take(&self) -> Option<Frame> {
        loop {
            // Register for wakeup before checking the cell so a publish or
            // close racing with the check cannot be missed.
            let notified = self.ready.notified();
            if let Some(frame) = self.cell.lock().await.take() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Close the slot and wake any waiter. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn take_returns_latest_publish() {
        let slot = FrameSlot::new();
        slot.publish(Frame::capture(vec![1])).await;
        slot.publish(Frame::capture(vec![2])).await;
        slot.publish(Frame::capture(vec![3])).await;

        let frame = slot.wait_and_take().await.unwrap();
        assert_eq!(frame.jpeg, vec![3]);
    }

    #[tokio::test]
    async fn take_blocks_until_publish() {
        let slot = Arc::new(FrameSlot::new());

        // Nothing published yet: the wait must not complete.
        let pending = timeout(Duration::from_millis(20), slot.wait_and_take()).await;
        assert!(pending.is_err());

        let waiter = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.wait_and_take().await })
        };
        slot.publish(Frame::capture(vec![7])).await;

        let frame = waiter.await.unwrap().unwrap();
        assert_eq!(frame.jpeg, vec![7]);
    }

    #[tokio::test]
    async fn close_wakes_empty_waiter() {
        let slot = Arc::new(FrameSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.wait_and_take().await })
        };
        // Let the waiter block before closing.
        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.close();
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_frame_survives_close() {
        let slot = FrameSlot::new();
        slot.publish(Frame::capture(vec![9])).await;
        slot.close();

        let frame = slot.wait_and_take().await.unwrap();
        assert_eq!(frame.jpeg, vec![9]);
        assert!(slot.wait_and_take().await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let slot = FrameSlot::new();
        slot.close();
        slot.close();
        assert!(slot.wait_and_take().await.is_none());
    }

    #[tokio::test]
    async fn take_never_yields_the_same_frame_twice() {
        let slot = Arc::new(FrameSlot::new());
        slot.publish(Frame::capture(vec![1])).await;
        let first = slot.wait_and_take().await.unwrap();

        slot.publish(Frame::capture(vec![2])).await;
        let second = slot.wait_and_take().await.unwrap();
        assert!(second.seq > first.seq);
    }
}

//! Non-blocking bounded delivery for outbound events. Control messages
//! (flush, shutdown) go through a separate unbounded channel so a full
//! event queue can never wedge them.

use super::OutboundEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::warn;

/// Producer handle for the bounded event channel.
pub struct Queue {
    tx: mpsc::Sender<OutboundEvent>,
    warned: AtomicBool,
}

impl Queue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                warned: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Enqueues `event`, dropping it (and logging once per overflow
    /// episode) if the queue is already at `capacity`.
    pub fn enqueue(&self, event: OutboundEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.warned.store(false, Ordering::Relaxed),
            Err(mpsc::error::TrySendError::Full(_)) => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!("event queue is full, dropping event");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FeatureEvent;

    fn dummy() -> OutboundEvent {
        OutboundEvent::Feature(Box::new(FeatureEvent {
            flag_key: "f".into(),
            value: serde_json::json!(true),
            variation_index: Some(0),
            version: Some(1),
            default: serde_json::json!(false),
            reason: None,
            user: crate::user::User::new("u"),
            track_events: false,
            debug_events_until_date: None,
            prereq_of: None,
            timestamp_millis: 0,
        }))
    }

    #[tokio::test]
    async fn drops_events_past_capacity() {
        let (queue, mut rx) = Queue::new(2);
        queue.enqueue(dummy());
        queue.enqueue(dummy());
        queue.enqueue(dummy()); // dropped, queue full

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }
}

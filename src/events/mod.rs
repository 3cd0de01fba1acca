//! The analytics event pipeline: a single-consumer loop fed by a bounded
//! producer queue, folding evaluations into summary counters and shipping
//! full-form events to the events server in bounded batches.

mod lru;
mod queue;
mod summarizer;
mod wire;
mod worker;

use crate::{config::Config, evaluator::Reason, user::User};
use queue::Queue;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use worker::WorkerPool;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A single flag evaluation, produced both for the flag the caller asked
/// about and for every prerequisite walked along the way.
#[derive(Clone, Debug)]
pub struct FeatureEvent {
    pub flag_key: String,
    pub value: serde_json::Value,
    pub variation_index: Option<usize>,
    pub version: Option<u64>,
    pub default: serde_json::Value,
    pub reason: Option<Reason>,
    pub user: User,
    pub track_events: bool,
    pub debug_events_until_date: Option<i64>,
    pub prereq_of: Option<String>,
    pub timestamp_millis: i64,
}

#[derive(Clone, Debug)]
pub struct CustomEvent {
    pub key: String,
    pub user: User,
    pub data: Option<serde_json::Value>,
    pub timestamp_millis: i64,
}

#[derive(Clone, Debug)]
pub struct IndexEvent {
    pub user: User,
    pub timestamp_millis: i64,
}

/// What a producer hands to [`Queue`]; control operations travel on a
/// separate unbounded channel (see [`DefaultEventProcessor`]).
#[derive(Clone, Debug)]
pub enum OutboundEvent {
    Feature(Box<FeatureEvent>),
    Identify(Box<User>),
    Custom(Box<CustomEvent>),
}

enum ControlMessage {
    Flush,
    FlushUsers,
    TestSync(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

/// Public surface the client facade talks to: either the real pipeline or
/// a no-op stand-in for offline/LDD/`send_events=false` configurations.
#[async_trait::async_trait]
pub trait EventProcessor: Send + Sync {
    fn send_feature(&self, event: FeatureEvent);
    fn send_identify(&self, user: User);
    fn send_custom(&self, event: CustomEvent);
    fn flush(&self);

    /// Flushes, then waits (bounded) for the consumer loop and its worker
    /// pool to go quiet.
    async fn close(&self);
}

pub struct NullEventProcessor;

#[async_trait::async_trait]
impl EventProcessor for NullEventProcessor {
    fn send_feature(&self, _event: FeatureEvent) {}
    fn send_identify(&self, _user: User) {}
    fn send_custom(&self, _event: CustomEvent) {}
    fn flush(&self) {}
    async fn close(&self) {}
}

pub struct DefaultEventProcessor {
    queue: Queue,
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    closed: AtomicBool,
}

impl DefaultEventProcessor {
    pub fn new(config: Arc<Config>, sdk_key: &str) -> Self {
        let (queue, event_rx) = Queue::new(config.capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let worker_pool = Arc::new(WorkerPool::with_timeout(
            &config.events_uri,
            sdk_key,
            config.read_timeout,
        ));

        tokio::spawn(consumer_loop(
            Arc::clone(&config),
            event_rx,
            control_rx,
            worker_pool,
        ));

        let flush_tx = control_tx.clone();
        let flush_interval = config.flush_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_interval);
            loop {
                ticker.tick().await;
                if flush_tx.send(ControlMessage::Flush).is_err() {
                    return;
                }
            }
        });

        let reset_tx = control_tx.clone();
        let reset_interval = config.user_keys_flush_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reset_interval);
            loop {
                ticker.tick().await;
                if reset_tx.send(ControlMessage::FlushUsers).is_err() {
                    return;
                }
            }
        });

        Self {
            queue,
            control_tx,
            closed: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    async fn test_sync(&self) {
        let (tx, rx) = oneshot::channel();
        if self.control_tx.send(ControlMessage::TestSync(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

#[async_trait::async_trait]
impl EventProcessor for DefaultEventProcessor {
    fn send_feature(&self, event: FeatureEvent) {
        self.queue.enqueue(OutboundEvent::Feature(Box::new(event)));
    }

    fn send_identify(&self, user: User) {
        self.queue.enqueue(OutboundEvent::Identify(Box::new(user)));
    }

    fn send_custom(&self, event: CustomEvent) {
        self.queue.enqueue(OutboundEvent::Custom(Box::new(event)));
    }

    fn flush(&self) {
        let _ = self.control_tx.send(ControlMessage::Flush);
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, rx) = oneshot::channel();
        if self.control_tx.send(ControlMessage::Stop(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

struct ConsumerState {
    config: Arc<Config>,
    summarizer: summarizer::Summarizer,
    notice_users: lru::NoticeUsers,
    outbound: Vec<serde_json::Value>,
    worker_pool: Arc<WorkerPool>,
}

impl ConsumerState {
    fn threshold_millis(&self) -> i64 {
        now_millis().max(self.worker_pool.last_known_server_time.load(Ordering::Relaxed))
    }

    fn dispatch_feature(&mut self, event: FeatureEvent) {
        if self.worker_pool.is_disabled() {
            return;
        }

        if !self.config.inline_users_in_events && !self.notice_users.notice(&event.user.key) {
            self.outbound.push(wire::index_event(
                &IndexEvent {
                    user: event.user.clone(),
                    timestamp_millis: event.timestamp_millis,
                },
                &self.config,
            ));
        }

        self.summarizer.fold(
            &event.flag_key,
            &event.value,
            event.variation_index,
            event.version,
            &event.default,
            event.timestamp_millis,
        );

        let debug = !event.track_events
            && event
                .debug_events_until_date
                .map(|until| until > self.threshold_millis())
                .unwrap_or(false);

        if event.track_events || debug {
            self.outbound.push(wire::feature_event(&event, &self.config, debug));
        }
    }

    fn dispatch_identify(&mut self, user: User) {
        if self.worker_pool.is_disabled() {
            return;
        }
        self.notice_users.notice(&user.key);
        self.outbound
            .push(wire::identify_event(&user, &self.config, now_millis()));
    }

    fn dispatch_custom(&mut self, event: CustomEvent) {
        if self.worker_pool.is_disabled() {
            return;
        }
        if !self.config.inline_users_in_events && !self.notice_users.notice(&event.user.key) {
            self.outbound.push(wire::index_event(
                &IndexEvent {
                    user: event.user.clone(),
                    timestamp_millis: event.timestamp_millis,
                },
                &self.config,
            ));
        }
        self.outbound.push(wire::custom_event(&event, &self.config));
    }

    fn flush(&mut self) {
        let summary = self.summarizer.snapshot_and_reset();
        let mut batch = std::mem::take(&mut self.outbound);
        if let Some(summary) = summary {
            batch.push(wire::summary_event(summary));
        }
        if batch.is_empty() {
            return;
        }
        trace!(num_events = batch.len(), "submitting flush payload");
        self.worker_pool.submit(serde_json::Value::Array(batch));
    }
}

async fn consumer_loop(
    config: Arc<Config>,
    mut event_rx: mpsc::Receiver<OutboundEvent>,
    mut control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    worker_pool: Arc<WorkerPool>,
) {
    let mut state = ConsumerState {
        notice_users: lru::NoticeUsers::new(config.user_keys_capacity),
        summarizer: summarizer::Summarizer::new(),
        outbound: Vec::new(),
        config,
        worker_pool,
    };

    loop {
        tokio::select! {
            biased;
            control = control_rx.recv() => {
                match control {
                    Some(ControlMessage::Flush) => state.flush(),
                    Some(ControlMessage::FlushUsers) => state.notice_users.clear(),
                    Some(ControlMessage::TestSync(done)) => { let _ = done.send(()); }
                    Some(ControlMessage::Stop(done)) => {
                        state.flush();
                        state.worker_pool.wait_quiescent(Duration::from_secs(5)).await;
                        let _ = done.send(());
                        debug!("event pipeline stopped");
                        return;
                    }
                    None => return,
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(OutboundEvent::Feature(e)) => state.dispatch_feature(*e),
                    Some(OutboundEvent::Identify(u)) => state.dispatch_identify(*u),
                    Some(OutboundEvent::Custom(c)) => state.dispatch_custom(*c),
                    None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<Config> {
        Arc::new(Config::builder().flush_interval(Duration::from_secs(3600)).build())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn events_reach_the_consumer_and_survive_a_flush() {
        let processor = DefaultEventProcessor::new(config(), "test-key");
        processor.send_identify(User::new("alice"));
        processor.test_sync().await;
        processor.flush();
        processor.test_sync().await;
    }
}

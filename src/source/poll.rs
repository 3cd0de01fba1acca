//! The polling data source: every `poll_interval`, fetch the full snapshot
//! and replace the store atomically.

use super::{DataSource, ReadySignal};
use crate::{message::Message, requestor::Requestor, store::Store, sync};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{error, warn};

pub struct PollDataSource {
    store: Arc<dyn Store>,
    requestor: Arc<Requestor>,
    base_uri: String,
    poll_interval: Duration,
    initialized: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl PollDataSource {
    pub fn new(
        store: Arc<dyn Store>,
        requestor: Arc<Requestor>,
        base_uri: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            requestor,
            base_uri: base_uri.into(),
            poll_interval,
            initialized: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
        }
    }

    async fn poll_once(
        store: &dyn Store,
        requestor: &Requestor,
        url: &str,
    ) -> Result<(), crate::requestor::Error> {
        let body = requestor.get(url).await?;
        let data: crate::message::InitData = serde_json::from_slice(&body)?;
        sync::apply(store, Message::Put(data));
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataSource for PollDataSource {
    async fn start(self: Arc<Self>) -> ReadySignal {
        let (ready_tx, signal) = ReadySignal::new();
        let url = format!("{}/sdk/latest-all", self.base_uri);
        let store = Arc::clone(&self.store);
        let requestor = Arc::clone(&self.requestor);
        let initialized = Arc::clone(&self.initialized);
        let stop = Arc::clone(&self.stop);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            loop {
                match Self::poll_once(store.as_ref(), requestor.as_ref(), &url).await {
                    Ok(()) => {
                        initialized.store(true, Ordering::SeqCst);
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(true);
                        }
                    }
                    Err(e) if e.is_unrecoverable() => {
                        error!(error = %e, "polling stopped permanently");
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(false);
                        }
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "poll failed, retrying next tick");
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = stop.notified() => return,
                }
            }
        });

        signal
    }

    async fn stop(&self) {
        self.stop.notify_waiters();
    }

    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockStore;

    #[test]
    fn starts_uninitialized() {
        let store: Arc<dyn Store> = Arc::new(MockStore::new());
        let requestor = Arc::new(Requestor::new("test-key").unwrap());
        let source = PollDataSource::new(
            store,
            requestor,
            "https://example.com",
            Duration::from_secs(30),
        );
        assert!(!source.initialized());
    }
}

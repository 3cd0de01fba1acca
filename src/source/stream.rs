//! The streaming data source: an SSE connection to `/all` with
//! reconnection, exponential backoff and jitter.

use super::{DataSource, ReadySignal};
use crate::{message, requestor::is_unrecoverable_status, store::Store, sync};
use eventsource_client::{Event as SseEvent, HttpsConnector};
use futures::StreamExt;
use http::StatusCode;
use rand::Rng;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{error, trace, warn};

/// Extracts the HTTP status from an SSE transport error, when it carries one
/// (`eventsource_client::Error::UnexpectedResponse`). Other variants such as
/// `Eof` reflect a dropped connection rather than a rejected request and are
/// always retried.
fn unexpected_response_status(err: &eventsource_client::Error) -> Option<StatusCode> {
    match err {
        eventsource_client::Error::UnexpectedResponse(status) => Some(*status),
        _ => None,
    }
}

const DEFAULT_STREAM_PATH: &str = "/all";
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid SDK key")]
    InvalidToken,
    #[error("SSE transport error: {0}")]
    Transport(#[from] eventsource_client::Error),
    #[error(transparent)]
    Parse(#[from] message::MessageParseError),
}

pub struct StreamDataSource {
    store: Arc<dyn Store>,
    client: eventsource_client::Client<HttpsConnector>,
    initialized: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl StreamDataSource {
    pub fn new(store: Arc<dyn Store>, sdk_key: &str, stream_uri: &str) -> Result<Self, Error> {
        let url = format!("{}{}", stream_uri, DEFAULT_STREAM_PATH);
        let client = eventsource_client::Client::for_url(&url)
            .map_err(|_| Error::InvalidToken)?
            .header("Authorization", sdk_key)
            .map_err(|_| Error::InvalidToken)?
            .build();
        Ok(Self {
            store,
            client,
            initialized: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
        })
    }
}

#[derive(serde::Deserialize)]
struct Envelope {
    path: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    version: Option<u64>,
}

/// Converts a single SSE event into zero or one store [`message::Message`]s.
fn parse_event(event: SseEvent) -> Result<Option<message::Message>, Error> {
    let name = event.event_type.as_str();
    let data = match event.field("data") {
        Some(data) => data,
        None => return Ok(None),
    };

    match name {
        "put" => {
            let init: message::InitData =
                serde_json::from_slice(data).map_err(message::MessageParseError::from)?;
            Ok(Some(message::Message::Put(init)))
        }
        "patch" => {
            let envelope: Envelope =
                serde_json::from_slice(data).map_err(message::MessageParseError::from)?;
            let payload = envelope
                .data
                .ok_or_else(|| message::MessageParseError::UnknownPath(envelope.path.clone()))?;
            Ok(Some(message::parse_patch(&envelope.path, payload)?))
        }
        "delete" => {
            let envelope: Envelope =
                serde_json::from_slice(data).map_err(message::MessageParseError::from)?;
            let version = envelope
                .version
                .ok_or_else(|| message::MessageParseError::UnknownPath(envelope.path.clone()))?;
            Ok(Some(message::parse_delete(&envelope.path, version)?))
        }
        other => {
            trace!(event = %other, "ignoring unrecognized SSE event type");
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl DataSource for StreamDataSource {
    async fn start(self: Arc<Self>) -> ReadySignal {
        let (ready_tx, signal) = ReadySignal::new();
        let store = Arc::clone(&self.store);
        let initialized = Arc::clone(&self.initialized);
        let stop = Arc::clone(&self.stop);
        let this = Arc::clone(&self);

        tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            let mut backoff = INITIAL_BACKOFF;

            loop {
                let mut stream = this.client.stream();
                loop {
                    let next = tokio::select! {
                        item = stream.next() => item,
                        _ = stop.notified() => return,
                    };
                    let item = match next {
                        Some(item) => item,
                        None => break, // stream ended, reconnect
                    };

                    match item {
                        Ok(event) => {
                            backoff = INITIAL_BACKOFF;
                            match parse_event(event) {
                                Ok(Some(message)) => {
                                    sync::apply(store.as_ref(), message);
                                    if store.initialized() {
                                        initialized.store(true, Ordering::SeqCst);
                                        if let Some(tx) = ready_tx.take() {
                                            let _ = tx.send(true);
                                        }
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => warn!(error = %e, "failed to parse stream event"),
                            }
                        }
                        Err(e) => {
                            if let Some(status) = unexpected_response_status(&e).filter(|s| is_unrecoverable_status(*s)) {
                                error!(%status, "stream rejected permanently");
                                if let Some(tx) = ready_tx.take() {
                                    let _ = tx.send(false);
                                }
                                return;
                            }
                            warn!(error = %e, "stream error, will reconnect");
                            break;
                        }
                    }
                }

                let jitter = rand::thread_rng().gen_range(0..250);
                let sleep = (backoff + Duration::from_millis(jitter)).min(MAX_BACKOFF);
                tokio::select! {
                    _ = tokio::time::sleep(sleep) => {}
                    _ = stop.notified() => return,
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
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
        let source =
            StreamDataSource::new(store, "test-key", "https://example.com").expect("valid url");
        assert!(!source.initialized());
    }
}

//! Bounded pool of HTTP POST workers that ship flushed payloads to the
//! events server's `/bulk` endpoint.

use crate::requestor::is_unrecoverable_status;
use http::{
    header::{AUTHORIZATION, CONTENT_TYPE, DATE, USER_AGENT},
    HeaderValue,
};
use hyper::{client::HttpConnector, Body, Client, Request};
use hyper_rustls::HttpsConnector;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Semaphore;
use tracing::{error, warn};

const SDK_NAME: &str = "RustClient";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
const MAX_FLUSH_WORKERS: usize = 5;

pub struct WorkerPool {
    client: Client<HttpsConnector<HttpConnector>>,
    url: String,
    sdk_key: HeaderValue,
    semaphore: Arc<Semaphore>,
    read_timeout: Duration,
    pub(super) last_known_server_time: Arc<AtomicI64>,
    pub(super) disabled: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(events_uri: &str, sdk_key: &str) -> Self {
        Self::with_timeout(events_uri, sdk_key, Duration::from_secs(10))
    }

    pub fn with_timeout(events_uri: &str, sdk_key: &str, read_timeout: Duration) -> Self {
        let https = HttpsConnector::with_native_roots();
        Self {
            client: Client::builder().build(https),
            url: format!("{}/bulk", events_uri),
            sdk_key: HeaderValue::from_str(sdk_key).unwrap_or_else(|_| HeaderValue::from_static("")),
            semaphore: Arc::new(Semaphore::new(MAX_FLUSH_WORKERS)),
            read_timeout,
            last_known_server_time: Arc::new(AtomicI64::new(0)),
            disabled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Submits `payload` to the bounded pool; returns immediately, the POST
    /// runs in the background. Silently skipped if a prior unrecoverable
    /// response already disabled the pipeline.
    pub fn submit(self: &Arc<Self>, payload: serde_json::Value) {
        if self.is_disabled() {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let permit = match this.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            this.post(payload).await;
            drop(permit);
        });
    }

    async fn post(&self, payload: serde_json::Value) {
        let body = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "failed to serialize event payload, dropping");
                return;
            }
        };

        let request = Request::post(&self.url)
            .header(AUTHORIZATION, self.sdk_key.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(
                USER_AGENT,
                HeaderValue::from_str(&format!("{}/{}", SDK_NAME, SDK_VERSION))
                    .unwrap_or_else(|_| HeaderValue::from_static(SDK_NAME)),
            )
            .body(Body::from(body));

        let request = match request {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "failed to build event POST request");
                return;
            }
        };

        let response = tokio::time::timeout(self.read_timeout, self.client.request(request)).await;
        match response {
            Err(_) => warn!("event flush request timed out"),
            Ok(Ok(response)) => {
                if let Some(date) = response.headers().get(DATE) {
                    if let Ok(date_str) = date.to_str() {
                        if let Ok(parsed) = chrono::DateTime::parse_from_rfc2822(date_str) {
                            self.last_known_server_time
                                .store(parsed.timestamp_millis(), Ordering::Relaxed);
                        }
                    }
                }

                let status = response.status();
                if !status.is_success() && is_unrecoverable_status(status) {
                    error!(%status, "events server rejected payload, disabling event pipeline");
                    self.disabled.store(true, Ordering::Relaxed);
                } else if !status.is_success() {
                    warn!(%status, "event flush failed, will retry on next flush");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "event flush request failed"),
        }
    }

    /// Waits (up to `timeout`) for all in-flight POSTs to finish, used by
    /// `Close` before tearing down the runtime.
    pub async fn wait_quiescent(&self, timeout: std::time::Duration) {
        let acquire = self.semaphore.acquire_many(MAX_FLUSH_WORKERS as u32);
        let _ = tokio::time::timeout(timeout, acquire).await;
    }
}

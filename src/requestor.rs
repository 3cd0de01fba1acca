//! Stateless HTTP GET wrapper used by polling and by one-shot fetches, with
//! per-URL ETag caching.

use bytes::Bytes;
use http::{
    header::{AUTHORIZATION, IF_NONE_MATCH, USER_AGENT},
    HeaderValue, StatusCode,
};
use hyper::{client::HttpConnector, Body, Client, Request};
use hyper_rustls::HttpsConnector;
use std::{collections::HashMap, sync::Mutex, time::Duration};
use tracing::debug;

const SDK_NAME: &str = "RustClient";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid SDK key")]
    InvalidToken(#[from] http::header::InvalidHeaderValue),
    #[error("request failed: {0}")]
    Transport(#[from] hyper::Error),
    #[error("server returned unexpected status {0}")]
    UnexpectedResponse(StatusCode),
    #[error("failed reading response body: {0}")]
    Body(hyper::Error),
    #[error("failed to parse response body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request timed out")]
    Timeout,
}

/// HTTP 401/403, and any other 4xx except 400/408/429 — the unrecoverable
/// set from spec §4.4, shared by the requestor, the streaming data source
/// and the event pipeline's flush workers.
pub(crate) fn is_unrecoverable_status(status: StatusCode) -> bool {
    let code = status.as_u16();
    (400..500).contains(&code) && !matches!(code, 400 | 408 | 429)
}

impl Error {
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            Error::UnexpectedResponse(status) => is_unrecoverable_status(*status),
            _ => false,
        }
    }
}

struct CacheEntry {
    etag: HeaderValue,
    body: Bytes,
}

/// Single-shot GET wrapper with ETag-based revalidation, shared by the
/// polling data source and by any one-off lookups (`/sdk/latest-flags/{key}`
/// etc).
pub struct Requestor {
    client: Client<HttpsConnector<HttpConnector>>,
    sdk_key: HeaderValue,
    cache: Mutex<HashMap<String, CacheEntry>>,
    read_timeout: Duration,
}

impl Requestor {
    pub fn new(sdk_key: &str) -> Result<Self, Error> {
        Self::with_timeout(sdk_key, Duration::from_secs(10))
    }

    /// Builds a requestor that gives up a single GET after `read_timeout`
    /// (spec §6's `read_timeout` knob), still caching whatever was
    /// successfully fetched before a timeout on a prior call.
    pub fn with_timeout(sdk_key: &str, read_timeout: Duration) -> Result<Self, Error> {
        let https = HttpsConnector::with_native_roots();
        Ok(Self {
            client: Client::builder().build(https),
            sdk_key: HeaderValue::from_str(sdk_key)?,
            cache: Mutex::new(HashMap::new()),
            read_timeout,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Bytes, Error> {
        let mut req = Request::get(url)
            .header(AUTHORIZATION, self.sdk_key.clone())
            .header(
                USER_AGENT,
                HeaderValue::from_str(&format!("{}/{}", SDK_NAME, SDK_VERSION))
                    .unwrap_or_else(|_| HeaderValue::from_static(SDK_NAME)),
            );

        let cached_etag = {
            let cache = self.cache.lock().expect("requestor cache poisoned");
            cache.get(url).map(|e| e.etag.clone())
        };
        if let Some(etag) = &cached_etag {
            req = req.header(IF_NONE_MATCH, etag.clone());
        }

        let request = req.body(Body::empty()).expect("well-formed GET request");
        let response = tokio::time::timeout(self.read_timeout, self.client.request(request))
            .await
            .map_err(|_| Error::Timeout)??;

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                debug!(%url, "304 not modified, reusing cached body");
                let cache = self.cache.lock().expect("requestor cache poisoned");
                cache
                    .get(url)
                    .map(|e| e.body.clone())
                    .ok_or(Error::UnexpectedResponse(StatusCode::NOT_MODIFIED))
            }
            status if status.is_success() => {
                let etag = response.headers().get(http::header::ETAG).cloned();
                let body = hyper::body::to_bytes(response.into_body())
                    .await
                    .map_err(Error::Body)?;
                if let Some(etag) = etag {
                    let mut cache = self.cache.lock().expect("requestor cache poisoned");
                    cache.insert(
                        url.to_owned(),
                        CacheEntry {
                            etag,
                            body: body.clone(),
                        },
                    );
                }
                Ok(body)
            }
            status => Err(Error::UnexpectedResponse(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_sdk_key_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .and(header("Authorization", "test-key"))
            .and(header_exists("User-Agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let requestor = Requestor::new("test-key").unwrap();
        let body = requestor
            .get(&format!("{}/sdk/latest-all", server.uri()))
            .await
            .unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn reuses_cached_body_on_304() {
        let server = MockServer::start().await;
        let url = format!("{}/sdk/latest-all", server.uri());

        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"flags\":{}}")
                    .insert_header("ETag", "\"v1\""),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .and(header("If-None-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let requestor = Requestor::new("test-key").unwrap();
        let first = requestor.get(&url).await.unwrap();
        let second = requestor.get(&url).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unexpected_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let requestor = Requestor::new("test-key").unwrap();
        let err = requestor
            .get(&format!("{}/sdk/latest-all", server.uri()))
            .await
            .unwrap_err();
        assert!(err.is_unrecoverable());
    }
}

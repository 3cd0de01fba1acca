//! The client facade: wires the store, data source and event pipeline
//! together behind the handful of operations application code calls.

use crate::{
    config::{Config, DataSourceKind},
    evaluator::{self, ErrorKind, EvaluationDetail, Reason},
    events::{CustomEvent, DefaultEventProcessor, EventProcessor, FeatureEvent, NullEventProcessor},
    models::{Flag, FlagMeta, FlagsState, FlagsStateOptions},
    requestor::Requestor,
    secure_mode,
    source::{DataSource, NullDataSource, PollDataSource, StreamDataSource},
    store::{MemoryStore, Store},
    user::User,
};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid SDK key")]
    InvalidSdkKey,
    #[error("failed to start the streaming data source: {0}")]
    Stream(#[from] crate::source::stream::Error),
}

/// Feature-flag evaluation and event-tracking client. Cheap to clone: every
/// field is an `Arc`, so a clone shares the same store/source/pipeline.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    sdk_key: Arc<str>,
    store: Arc<dyn Store>,
    data_source: Arc<dyn DataSource>,
    events: Arc<dyn EventProcessor>,
}

impl Client {
    /// Builds and starts a client: constructs the store, event pipeline and
    /// data source per `config`, starts the data source, and blocks up to
    /// `config.wait_for_seconds` for it to become ready (logging rather
    /// than failing on timeout, per spec §4.6).
    pub async fn new(sdk_key: impl Into<String>, config: Config) -> Result<Self, ClientError> {
        let sdk_key: Arc<str> = Arc::from(sdk_key.into());
        let config = Arc::new(config);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let data_source: Arc<dyn DataSource> = match config.effective_data_source() {
            DataSourceKind::Null => Arc::new(NullDataSource::new()),
            DataSourceKind::Poll => {
                let requestor = Arc::new(
                    Requestor::with_timeout(&sdk_key, config.read_timeout)
                        .map_err(|_| ClientError::InvalidSdkKey)?,
                );
                Arc::new(PollDataSource::new(
                    Arc::clone(&store),
                    requestor,
                    config.base_uri.clone(),
                    config.poll_interval,
                ))
            }
            DataSourceKind::Stream => Arc::new(StreamDataSource::new(
                Arc::clone(&store),
                &sdk_key,
                &config.stream_uri,
            )?),
        };

        let events: Arc<dyn EventProcessor> = if config.offline || !config.send_events {
            Arc::new(NullEventProcessor)
        } else {
            Arc::new(DefaultEventProcessor::new(Arc::clone(&config), &sdk_key))
        };

        let ready = Arc::clone(&data_source).start().await;
        if let Some(wait) = config.wait_for_seconds {
            if !ready.wait(wait).await {
                warn!(?wait, "data source not ready within wait_for_seconds, continuing");
            }
        }

        Ok(Self {
            config,
            sdk_key,
            store,
            data_source,
            events,
        })
    }

    /// Constructs a client over caller-supplied store/data-source/event
    /// pipeline, bypassing `Config`-driven wiring — used by tests and by
    /// callers embedding this crate behind their own component choices.
    pub fn from_parts(
        config: Config,
        sdk_key: impl Into<String>,
        store: Arc<dyn Store>,
        data_source: Arc<dyn DataSource>,
        events: Arc<dyn EventProcessor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sdk_key: Arc::from(sdk_key.into()),
            store,
            data_source,
            events,
        }
    }

    pub fn variation(&self, key: &str, user: Option<&User>, default: serde_json::Value) -> serde_json::Value {
        self.variation_detail_internal(key, user, default, false).value
    }

    pub fn variation_detail(
        &self,
        key: &str,
        user: Option<&User>,
        default: serde_json::Value,
    ) -> EvaluationDetail {
        self.variation_detail_internal(key, user, default, true)
    }

    fn variation_detail_internal(
        &self,
        key: &str,
        user: Option<&User>,
        default: serde_json::Value,
        with_reasons: bool,
    ) -> EvaluationDetail {
        let flag = match self.store.flag(key) {
            Some(f) => f,
            None => {
                warn!(flag = %key, "evaluating unknown flag, returning default");
                let detail = EvaluationDetail {
                    value: default.clone(),
                    variation_index: None,
                    reason: Reason::Error {
                        kind: ErrorKind::FlagNotFound,
                    },
                };
                self.emit_feature_event(key, None, &detail, user, &default, false);
                return detail;
            }
        };

        let (mut detail, prereq_events) = evaluator::evaluate(&flag, user, self.store.as_ref());
        if matches!(detail.reason, Reason::Error { .. }) {
            detail.value = default.clone();
        }

        for prereq in prereq_events {
            self.events.send_feature(FeatureEvent {
                flag_key: prereq.flag_key,
                value: prereq.value,
                variation_index: prereq.variation_index,
                version: Some(prereq.flag_version),
                default: serde_json::Value::Null,
                reason: None,
                user: user.cloned().unwrap_or_default(),
                track_events: prereq.track_events,
                debug_events_until_date: prereq.debug_events_until_date,
                prereq_of: Some(prereq.prereq_of),
                timestamp_millis: now_millis(),
            });
        }

        let include_reason = with_reasons || self.rule_requests_reason(&flag, &detail);
        self.emit_feature_event(key, Some(&flag), &detail, user, &default, include_reason);
        detail
    }

    fn rule_requests_reason(&self, flag: &Flag, detail: &EvaluationDetail) -> bool {
        match &detail.reason {
            Reason::RuleMatch { rule_index, .. } => flag
                .rules
                .get(*rule_index)
                .map(|r| r.track_events)
                .unwrap_or(false),
            Reason::Fallthrough => flag.track_events_fallthrough,
            _ => false,
        }
    }

    fn emit_feature_event(
        &self,
        flag_key: &str,
        flag: Option<&Flag>,
        detail: &EvaluationDetail,
        user: Option<&User>,
        default: &serde_json::Value,
        include_reason: bool,
    ) {
        let track_events = flag.map(|f| f.track_events).unwrap_or(false);
        // no version set when the flag is missing or evaluation otherwise errored
        let version = flag
            .filter(|_| !matches!(detail.reason, Reason::Error { .. }))
            .map(|f| f.version);
        self.events.send_feature(FeatureEvent {
            flag_key: flag_key.to_owned(),
            value: detail.value.clone(),
            variation_index: detail.variation_index,
            version,
            default: default.clone(),
            reason: include_reason.then(|| detail.reason.clone()),
            user: user.cloned().unwrap_or_default(),
            track_events,
            debug_events_until_date: flag.and_then(|f| f.debug_events_until_date),
            prereq_of: None,
            timestamp_millis: now_millis(),
        });
    }

    /// Evaluates every flag for `user`, honoring `options`. No analytics
    /// events are emitted — this is a snapshot read, mirroring the wire
    /// shape client-side SDKs bootstrap from.
    pub fn all_flags_state(&self, user: Option<&User>, options: FlagsStateOptions) -> FlagsState {
        let user = match user {
            Some(u) => u,
            None => return FlagsState::invalid(),
        };

        let mut state = FlagsState {
            valid: true,
            ..Default::default()
        };

        for (key, item) in self.store.all(crate::store::Kind::Flags) {
            let flag = match item.as_flag() {
                Some(f) => f.clone(),
                None => continue,
            };
            if options.client_side_only && !flag.client_side {
                continue;
            }

            let (detail, _) = evaluator::evaluate(&flag, Some(user), self.store.as_ref());
            let include_reason = options.with_reasons || self.rule_requests_reason(&flag, &detail);
            let track_this = flag.track_events || flag.track_events_fallthrough;
            if options.details_only_for_tracked_flags && !track_this && !include_reason {
                state.values.insert(key.clone(), detail.value);
                continue;
            }

            state.meta.insert(
                key.clone(),
                FlagMeta {
                    variation: detail.variation_index,
                    version: flag.version,
                    reason: include_reason.then(|| detail.reason.clone()),
                    track_events: flag.track_events,
                    debug_events_until_date: flag.debug_events_until_date,
                },
            );
            state.values.insert(key, detail.value);
        }

        state
    }

    pub fn identify(&self, user: User) {
        self.events.send_identify(user);
    }

    pub fn track(&self, event_key: impl Into<String>, user: User, data: Option<serde_json::Value>) {
        self.events.send_custom(CustomEvent {
            key: event_key.into(),
            user,
            data,
            timestamp_millis: now_millis(),
        });
    }

    pub fn flush(&self) {
        self.events.flush();
    }

    /// Stops the data source and event pipeline, draining outstanding work
    /// within their respective bounded waits.
    pub async fn close(&self) {
        self.data_source.stop().await;
        self.events.close().await;
    }

    pub fn initialized(&self) -> bool {
        self.data_source.initialized()
    }

    pub fn secure_mode_hash(&self, user: &User) -> String {
        secure_mode::hash(&self.sdk_key, &user.key)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::NullEventProcessor, test_utils::{FlagBuilder, MockStore, NullSource}};

    fn client_with(store: MockStore) -> Client {
        Client::from_parts(
            Config::builder().send_events(false).build(),
            "test-key",
            Arc::new(store),
            Arc::new(NullSource),
            Arc::new(NullEventProcessor),
        )
    }

    #[test]
    fn variation_returns_default_for_unknown_flag() {
        let client = client_with(MockStore::new());
        let user = User::new("alice");
        let value = client.variation("missing", Some(&user), serde_json::json!("fallback"));
        assert_eq!(value, serde_json::json!("fallback"));
    }

    #[test]
    fn variation_detail_surfaces_target_match_reason() {
        let mut store = MockStore::new();
        store.add(
            FlagBuilder::default()
                .on()
                .with_key("f")
                .add_target(1, "alice")
                .into_inner(),
        );
        let client = client_with(store);
        let user = User::new("alice");
        let detail = client.variation_detail("f", Some(&user), serde_json::json!(false));
        assert_eq!(detail.value, serde_json::json!(true));
        assert_eq!(detail.reason, Reason::TargetMatch);
    }

    #[test]
    fn secure_mode_hash_is_deterministic() {
        let client = client_with(MockStore::new());
        let user = User::new("alice");
        assert_eq!(client.secure_mode_hash(&user), client.secure_mode_hash(&user));
    }
}

//! Tuning knobs for a [`crate::Client`]. Out of scope for the core's own
//! logic (spec: "the configuration object ... a value type holding tuning
//! knobs"), but still the crate's public construction surface.

use std::time::Duration;

fn strip_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}

/// Where `update_processor`/`data_source` test overrides plug into
/// [`Config`]; kept as its own type so the alias-preference rule (§9 open
/// question c: prefer the newer `data_source` name) is enforced once, here,
/// rather than at every call site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataSourceKind {
    #[default]
    Stream,
    Poll,
    /// Daemon mode / offline: read-only against an externally-populated
    /// store, no network traffic.
    Null,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_uri: String,
    pub stream_uri: String,
    pub events_uri: String,
    pub capacity: usize,
    pub flush_interval: Duration,
    pub user_keys_flush_interval: Duration,
    pub user_keys_capacity: usize,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub stream: bool,
    pub poll_interval: Duration,
    pub use_ldd: bool,
    pub offline: bool,
    pub send_events: bool,
    pub inline_users_in_events: bool,
    pub all_attributes_private: bool,
    pub private_attribute_names: Vec<String>,
    pub data_source: Option<DataSourceKind>,
    pub wait_for_seconds: Option<Duration>,
    pub proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_uri: "https://app.launchdarkly.com".into(),
            stream_uri: "https://stream.launchdarkly.com".into(),
            events_uri: "https://events.launchdarkly.com".into(),
            capacity: 10_000,
            flush_interval: Duration::from_secs(10),
            user_keys_flush_interval: Duration::from_secs(300),
            user_keys_capacity: 1000,
            read_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(2),
            stream: true,
            poll_interval: Duration::from_secs(30),
            use_ldd: false,
            offline: false,
            send_events: true,
            inline_users_in_events: false,
            all_attributes_private: false,
            private_attribute_names: Vec::new(),
            data_source: None,
            wait_for_seconds: Some(Duration::from_secs(5)),
            proxy: None,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder(Config::default())
    }

    /// Minimum allowed polling interval (spec §9 open question b): smaller
    /// configured values are silently clamped up to this floor, and the
    /// clamp is logged by [`ConfigBuilder::build`].
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Resolves `use_ldd`/`offline`/`data_source`/`stream` into the single
    /// variant the client actually constructs (spec §9 open question c:
    /// `update_processor`/`data_source` are aliases, the newer `data_source`
    /// wins). `offline`/`use_ldd` always win over either alias; otherwise an
    /// explicitly-set `data_source` wins over the legacy `stream` toggle.
    pub fn effective_data_source(&self) -> DataSourceKind {
        if self.offline || self.use_ldd {
            return DataSourceKind::Null;
        }
        if let Some(explicit) = self.data_source {
            return explicit;
        }
        if !self.stream {
            return DataSourceKind::Poll;
        }
        DataSourceKind::Stream
    }
}

pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn base_uri(mut self, v: impl Into<String>) -> Self {
        self.0.base_uri = strip_trailing_slash(v.into());
        self
    }

    pub fn stream_uri(mut self, v: impl Into<String>) -> Self {
        self.0.stream_uri = strip_trailing_slash(v.into());
        self
    }

    pub fn events_uri(mut self, v: impl Into<String>) -> Self {
        self.0.events_uri = strip_trailing_slash(v.into());
        self
    }

    pub fn capacity(mut self, v: usize) -> Self {
        self.0.capacity = v;
        self
    }

    pub fn flush_interval(mut self, v: Duration) -> Self {
        self.0.flush_interval = v;
        self
    }

    pub fn user_keys_flush_interval(mut self, v: Duration) -> Self {
        self.0.user_keys_flush_interval = v;
        self
    }

    pub fn user_keys_capacity(mut self, v: usize) -> Self {
        self.0.user_keys_capacity = v;
        self
    }

    pub fn read_timeout(mut self, v: Duration) -> Self {
        self.0.read_timeout = v;
        self
    }

    pub fn connect_timeout(mut self, v: Duration) -> Self {
        self.0.connect_timeout = v;
        self
    }

    pub fn stream(mut self, v: bool) -> Self {
        self.0.stream = v;
        self
    }

    pub fn poll_interval(mut self, v: Duration) -> Self {
        self.0.poll_interval = v;
        self
    }

    pub fn use_ldd(mut self, v: bool) -> Self {
        self.0.use_ldd = v;
        self
    }

    pub fn offline(mut self, v: bool) -> Self {
        self.0.offline = v;
        self
    }

    pub fn send_events(mut self, v: bool) -> Self {
        self.0.send_events = v;
        self
    }

    pub fn inline_users_in_events(mut self, v: bool) -> Self {
        self.0.inline_users_in_events = v;
        self
    }

    pub fn all_attributes_private(mut self, v: bool) -> Self {
        self.0.all_attributes_private = v;
        self
    }

    pub fn private_attribute_names(mut self, v: Vec<String>) -> Self {
        self.0.private_attribute_names = v;
        self
    }

    pub fn data_source(mut self, v: DataSourceKind) -> Self {
        self.0.data_source = Some(v);
        self
    }

    pub fn wait_for_seconds(mut self, v: Option<Duration>) -> Self {
        self.0.wait_for_seconds = v;
        self
    }

    pub fn proxy(mut self, v: impl Into<String>) -> Self {
        self.0.proxy = Some(v.into());
        self
    }

    pub fn build(mut self) -> Config {
        if self.0.poll_interval < Config::MIN_POLL_INTERVAL {
            tracing::warn!(
                configured = ?self.0.poll_interval,
                floor = ?Config::MIN_POLL_INTERVAL,
                "poll_interval below the floor, clamping"
            );
            self.0.poll_interval = Config::MIN_POLL_INTERVAL;
        }
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slashes() {
        let cfg = Config::builder().base_uri("https://example.com/").build();
        assert_eq!(cfg.base_uri, "https://example.com");
    }

    #[test]
    fn clamps_poll_interval_to_floor() {
        let cfg = Config::builder()
            .poll_interval(Duration::from_secs(1))
            .build();
        assert_eq!(cfg.poll_interval, Config::MIN_POLL_INTERVAL);
    }

    #[test]
    fn offline_always_wins_the_data_source_choice() {
        let cfg = Config::builder()
            .offline(true)
            .data_source(DataSourceKind::Stream)
            .build();
        assert_eq!(cfg.effective_data_source(), DataSourceKind::Null);
    }

    #[test]
    fn legacy_stream_false_selects_poll_when_data_source_left_default() {
        let cfg = Config::builder().stream(false).build();
        assert_eq!(cfg.effective_data_source(), DataSourceKind::Poll);
    }

    #[test]
    fn explicit_data_source_overrides_legacy_stream_toggle() {
        let cfg = Config::builder()
            .stream(false)
            .data_source(DataSourceKind::Stream)
            .build();
        assert_eq!(cfg.effective_data_source(), DataSourceKind::Stream);
    }
}

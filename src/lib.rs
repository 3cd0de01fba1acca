//! Core runtime for a server-side feature-flag SDK: flag evaluation, a
//! versioned feature store, pluggable data sources (streaming, polling,
//! offline) and an analytics event pipeline, assembled behind a single
//! [`Client`] facade.

pub mod client;
pub mod config;
pub mod evaluator;
pub mod events;
pub mod message;
pub mod models;
pub mod requestor;
pub mod secure_mode;
pub mod source;
pub mod store;
pub mod sync;
pub mod user;

#[cfg(test)]
mod test_utils;

pub use client::{Client, ClientError};
pub use config::{Config, ConfigBuilder, DataSourceKind};
pub use evaluator::{EvaluationDetail, Reason};
pub use models::{FlagsState, FlagsStateOptions};
pub use user::{User, UserBuilder};

#[cfg(test)]
mod tests {
    use crate::{
        config::Config,
        evaluator::Reason,
        events::NullEventProcessor,
        source::NullDataSource,
        store::{MemoryStore, Store},
        test_utils::FlagBuilder,
        user::User,
        Client,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn smoke() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::default()
            .on()
            .with_key("smoke_flag")
            .add_target(1, "kalk.space")
            .add_target(1, "www.netlify.com")
            .into_inner();
        let mut flags = std::collections::HashMap::new();
        flags.insert(
            flag.key.clone(),
            crate::store::Item::Flag(flag),
        );
        store.init(flags, std::collections::HashMap::new());

        let client = Client::from_parts(
            Config::builder().send_events(false).build(),
            "test-key",
            store,
            Arc::new(NullDataSource::new()),
            Arc::new(NullEventProcessor),
        );

        let user = User::new("kalk.space");
        let detail = client.variation_detail("smoke_flag", Some(&user), serde_json::json!(false));
        assert_eq!(detail.value, serde_json::json!(true));
        assert_eq!(detail.reason, Reason::TargetMatch);

        let user = User::new("app.netlify.com");
        let value = client.variation("smoke_flag", Some(&user), serde_json::json!(false));
        assert_eq!(value, serde_json::json!(false));
    }
}

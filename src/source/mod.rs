//! The data source: keeps the feature store synchronized with upstream,
//! either by streaming (SSE, preferred) or polling (fallback), plus a null
//! variant for offline/LDD mode.

pub mod null;
pub mod poll;
pub mod stream;

pub use null::NullDataSource;
pub use poll::PollDataSource;
pub use stream::StreamDataSource;

use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// A one-shot readiness event: fires once the store first reaches
/// initialized state, or once the data source gives up permanently after an
/// unrecoverable error.
pub struct ReadySignal(watch::Receiver<bool>);

impl ReadySignal {
    pub(crate) fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(rx))
    }

    /// An already-resolved signal, for data sources (or test doubles) that
    /// are ready synchronously.
    pub fn ready(value: bool) -> Self {
        let (_tx, rx) = watch::channel(value);
        Self(rx)
    }

    /// Waits up to `timeout` for the signal to fire. Returns `true` if it
    /// fired within the window, `false` on timeout — callers should log
    /// rather than error on a `false` result (spec §4.6: "log (don't
    /// error) on timeout").
    pub async fn wait(mut self, timeout: Duration) -> bool {
        if *self.0.borrow() {
            return true;
        }
        matches!(
            tokio::time::timeout(timeout, self.0.changed()).await,
            Ok(Ok(()))
        )
    }
}

/// Common contract for the three data source variants. `start` spawns any
/// background work and returns immediately with a [`ReadySignal`] the
/// caller may await; dropping the signal does not cancel the background
/// work.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn start(self: Arc<Self>) -> ReadySignal;

    async fn stop(&self);

    fn initialized(&self) -> bool;
}

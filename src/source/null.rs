//! The null data source: offline mode and LDD (daemon) mode. No network
//! traffic; the store is assumed to be populated externally (or left
//! empty, in which case every evaluation falls back to caller-supplied
//! defaults).

use super::{DataSource, ReadySignal};
use std::sync::Arc;

pub struct NullDataSource;

impl NullDataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DataSource for NullDataSource {
    async fn start(self: Arc<Self>) -> ReadySignal {
        // Immediately "ready": there is nothing to wait for.
        ReadySignal::ready(true)
    }

    async fn stop(&self) {}

    fn initialized(&self) -> bool {
        true
    }
}

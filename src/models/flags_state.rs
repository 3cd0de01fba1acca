use crate::evaluator::Reason;
use serde::Serialize;
use std::collections::HashMap;

/// Per-flag metadata included in [`FlagsState`] alongside the value, mirroring
/// the wire shape the JS/mobile SDKs expect from `allFlagsState`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FlagMeta {
    pub variation: Option<usize>,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(rename = "trackEvents", skip_serializing_if = "std::ops::Not::not")]
    pub track_events: bool,
    #[serde(
        rename = "debugEventsUntilDate",
        skip_serializing_if = "Option::is_none"
    )]
    pub debug_events_until_date: Option<i64>,
}

/// Snapshot of every evaluated flag's value and metadata for a single user,
/// as returned by `Client::all_flags_state`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FlagsState {
    pub valid: bool,
    #[serde(flatten)]
    pub values: HashMap<String, serde_json::Value>,
    #[serde(rename = "$flagsState")]
    pub meta: HashMap<String, FlagMeta>,
}

impl FlagsState {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

/// Options controlling what `all_flags_state` includes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagsStateOptions {
    pub client_side_only: bool,
    pub with_reasons: bool,
    pub details_only_for_tracked_flags: bool,
}

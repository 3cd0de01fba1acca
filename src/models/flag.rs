use super::{
    client_side_availability::ClientSideAvailability, prerequisite::Prerequisite, rule::Rule,
    target::Target, variation_or_rollout::Fallthrough,
};
use serde::{Deserialize, Serialize};

/// A single feature flag's full rule structure, as stored by the feature
/// store and interpreted by the evaluator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub on: bool,
    pub variations: Vec<serde_json::Value>,
    #[serde(default, rename = "offVariation", skip_serializing_if = "Option::is_none")]
    pub off_variation: Option<usize>,
    pub fallthrough: Fallthrough,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub salt: String,
    #[serde(default, rename = "trackEvents")]
    pub track_events: bool,
    #[serde(
        default,
        rename = "trackEventsFallthrough",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub track_events_fallthrough: bool,
    #[serde(
        default,
        rename = "debugEventsUntilDate",
        skip_serializing_if = "Option::is_none"
    )]
    pub debug_events_until_date: Option<i64>,
    #[serde(default, rename = "clientSide")]
    pub client_side: bool,
    #[serde(default, rename = "clientSideAvailability")]
    pub client_side_availability: ClientSideAvailability,
    #[serde(default)]
    pub deleted: bool,
}

impl Flag {
    pub fn variation_value(&self, index: usize) -> Option<&serde_json::Value> {
        self.variations.get(index)
    }
}

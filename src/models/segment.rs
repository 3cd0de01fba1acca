use super::segment_rule::SegmentRule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named user cohort, referenced by flag clauses via `segmentMatch`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub included: HashSet<String>,
    #[serde(default)]
    pub excluded: HashSet<String>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub deleted: bool,
}

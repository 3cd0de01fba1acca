use super::clause::Clause;
use serde::{Deserialize, Serialize};

/// A rule within a [`Segment`](super::segment::Segment). Unlike flag rules,
/// a segment rule has no nested `segmentMatch` clauses and may carry a
/// weight that further buckets which matching users are actually included.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, rename = "bucketBy", skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

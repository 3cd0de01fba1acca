use super::value::AttributeValue;
use serde::{Deserialize, Serialize};

/// A single targeting predicate, AND-composed with its rule siblings.
///
/// `segment_match` is special-cased by the evaluator: `values` holds segment
/// keys rather than literals to compare against the attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub attribute: String,
    pub op: Operator,
    pub values: Vec<AttributeValue>,
    #[serde(default)]
    pub negate: bool,
}

/// All operators the wire format can name. `Unknown` is what any
/// unrecognized op string decodes to; its `matches` always returns false
/// without raising an error (spec: unknown operators don't abort
/// evaluation).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    StartsWith,
    EndsWith,
    Contains,
    Matches,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
    SemVerEqual,
    SemVerLessThan,
    SemVerGreaterThan,
    SegmentMatch,
    #[serde(other)]
    Unknown,
}

use super::rollout::Rollout;
use serde::{Deserialize, Serialize};

/// A selector used by both `fallthrough` and rule bodies: either a fixed
/// variation index or a weighted rollout. Exactly one should be set; a flag
/// with neither is malformed (see [`crate::evaluator::Error::MalformedFlag`]).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationOrRollout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
}

/// Alias kept for parity with the wire schema's field name (`fallthrough`).
pub type Fallthrough = VariationOrRollout;

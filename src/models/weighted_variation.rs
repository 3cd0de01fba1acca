use serde::{Deserialize, Serialize};

/// One slice of a [`Rollout`](super::rollout::Rollout): a variation index
/// and its share of the bucket space, out of 100000.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    pub weight: i64,
}

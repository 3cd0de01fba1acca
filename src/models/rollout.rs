use super::weighted_variation::WeightedVariation;
use serde::{Deserialize, Serialize};

/// A percentage rollout across a set of weighted variations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,
    #[serde(default, rename = "bucketBy", skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

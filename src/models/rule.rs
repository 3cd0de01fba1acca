use super::{clause::Clause, variation_or_rollout::VariationOrRollout};
use serde::{Deserialize, Serialize};

/// A targeting rule: matches when every clause matches, in which case it
/// selects a variation (fixed or rolled out).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub clauses: Vec<Clause>,
    #[serde(flatten)]
    pub selector: VariationOrRollout,
    #[serde(default, rename = "trackEvents")]
    pub track_events: bool,
}

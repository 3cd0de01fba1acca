use serde::{Deserialize, Serialize};

/// A dependency on another flag's variation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

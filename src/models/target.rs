use serde::{Deserialize, Serialize};

/// An individual-targeting block: every user key in `values` gets `variation`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub variation: usize,
    pub values: Vec<String>,
}

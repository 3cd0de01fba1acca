use serde::{Deserialize, Serialize};

/// Mirrors the wire field of the same name; the core doesn't interpret it
/// itself, but flags carry it for client-side SDKs consuming the same
/// snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSideAvailability {
    #[serde(default, rename = "usingMobileKey")]
    pub using_mobile_key: bool,
    #[serde(default, rename = "usingEnvironmentId")]
    pub using_environment_id: bool,
}

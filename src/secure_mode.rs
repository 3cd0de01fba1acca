//! Secure-mode hash: HMAC-SHA256(sdk_key, user.key) hex, used by
//! client-side SDKs to prove a user identity was computed server-side.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn hash(sdk_key: &str, user_key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(sdk_key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(user_key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(hash("key", "user"), hash("key", "user"));
    }

    #[test]
    fn differs_by_key_and_user() {
        assert_ne!(hash("key", "user"), hash("other-key", "user"));
        assert_ne!(hash("key", "user"), hash("key", "other-user"));
    }
}

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes the anti-CSRF state token for a session.
///
/// HMAC-SHA256 keyed with `key` over `identity` followed by `timestamp`,
/// encoded as URL-safe base64 without padding. The same inputs always give
/// the same token, which is what lets the callback check it without any
/// server-side record of the login.
pub fn derive_state(identity: &str, timestamp: &str, key: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(identity.as_bytes());
    mac.update(timestamp.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison.
pub fn states_match(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// The secret key behind state tokens.
#[derive(Clone)]
pub struct StateKey {
    key: Vec<u8>,
}

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey(<{} bytes>)", self.key.len())
    }
}

impl StateKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn derive(&self, identity: &str, timestamp: &str) -> Result<String, InvalidLength> {
        derive_state(identity, timestamp, &self.key)
    }

    /// Re-derives the token for `identity`/`timestamp` and compares it with
    /// `supplied` in constant time.
    pub fn verify(
        &self,
        identity: &str,
        timestamp: &str,
        supplied: &str,
    ) -> Result<bool, InvalidLength> {
        let expected = self.derive(identity, timestamp)?;
        Ok(states_match(&expected, supplied))
    }
}

//! Port-claim lock naming and tokens.

use std::fmt;

use crate::domain::server::ServerId;

/// Lock key prefix for port claims.
pub const CLAIM_KEY_PREFIX: &str = "port-check";

/// Lock name guarding `port` on `server`: `port-check:<server>:<port>`.
#[must_use]
pub fn claim_key(server: ServerId, port: u16) -> String {
    format!("{CLAIM_KEY_PREFIX}:{server}:{port}")
}

/// Proof of a granted claim lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    /// Generate a fresh random token.
    ///
    /// Format: `claim-` followed by 16 lowercase hex characters.
    #[must_use]
    pub fn generate() -> Self {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u128(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        );
        hasher.write_u64(RandomState::new().build_hasher().finish());
        Self(format!("claim-{:016x}", hasher.finish()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use crate::random::RandomSource;
use data_encoding::BASE32;
use sha1::{Digest, Sha1};
use std::fmt;

/// Namespace every lease key lives under in the store.
pub const KEY_PREFIX: &str = "leader:";

/// Number of random bytes behind an [`Identity`].
pub const IDENTITY_BYTES: usize = 16;

/// Store key of one election, derived from its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey(String);

impl LeaseKey {
    /// `leader:` followed by the base32 SHA-1 digest of `name`.
    pub fn derive(name: &str) -> Self {
        let digest = Sha1::digest(name.as_bytes());
        Self(format!("{KEY_PREFIX}{}", BASE32.encode(&digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ownership token an elector writes into the lease record.
///
/// Generated once per elector; a new token would not recognise the lease
/// written under the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn generate(random: &dyn RandomSource) -> Self {
        let mut bytes = [0u8; IDENTITY_BYTES];
        random.fill_bytes(&mut bytes);
        Self(BASE32.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Cache key derivation
//!
//! Keys are `<readable prefix><sha256 hex>`. The prefix keeps only
//! `[a-z_-]` characters of the command so a directory listing of the cache
//! hints at what each entry holds; uniqueness comes from the digest alone.

use sha2::{Digest, Sha256};
use std::fmt;

/// Longest readable prefix kept verbatim
const MAX_PREFIX_LEN: usize = 128;

/// Characters kept from each end when the prefix is too long
const PREFIX_EDGE_LEN: usize = 60;

/// Filesystem-safe identifier of a cached command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a command string
    pub fn derive(command: &str) -> Self {
        let prefix: String = command
            .chars()
            .filter(|c| matches!(c, 'a'..='z' | '_' | '-'))
            .collect();

        let digest = hex::encode(Sha256::digest(command.as_bytes()));

        // The prefix is pure ASCII, so byte slicing is on char boundaries
        let key = if prefix.len() > MAX_PREFIX_LEN {
            format!(
                "{}..{}{}",
                &prefix[..PREFIX_EDGE_LEN],
                &prefix[prefix.len() - PREFIX_EDGE_LEN..],
                digest
            )
        } else {
            format!("{}{}", prefix, digest)
        };

        Self(key)
    }

    /// The key as a file name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Salted password hashing.
//!
//! Hashes are `hex(sha256(salt || password))` with a random per-account salt.
//! Verification compares in constant time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// A stored password hash and its salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded digest.
    pub digest: String,
}

impl PasswordHash {
    /// Hashes `password` under a fresh salt.
    #[must_use]
    pub fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = digest(&salt, password);
        Self { salt, digest }
    }

    /// Returns `true` if `password` produces this hash.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        let candidate = digest(&self.salt, password);
        candidate.as_bytes().ct_eq(self.digest.as_bytes()).into()
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let hash = PasswordHash::new("correct horse");
        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("correct horse "));
        assert_eq!(hash.digest.len(), 64);
    }

    #[test]
    fn test_salts_differ() {
        let a = PasswordHash::new("same");
        let b = PasswordHash::new("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }
}

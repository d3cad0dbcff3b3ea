// PassGuard — Account password hashing
//
// One-way bcrypt hashing for user account passwords. Unlike the credential
// cipher, these hashes are never reversed; login verifies against the
// stored hash.

use crate::error::{Error, Result};

/// bcrypt work factor. 2^10 rounds.
const BCRYPT_COST: u32 = 10;

/// Hash a plaintext account password for storage.
pub fn hash_password(plain: &str) -> Result<String> {
    bcrypt::hash(plain, BCRYPT_COST)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a plaintext password against a stored bcrypt hash.
/// A malformed stored hash verifies as false rather than erroring, so a
/// corrupted row cannot be used to probe internals.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b, "bcrypt must salt each hash");
    }

    #[test]
    fn test_malformed_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}

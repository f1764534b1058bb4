//! Password hashing and verification.

use crate::Result;

/// Marker stored in place of a password hash on soft-deleted accounts.
///
/// The value can never be produced by [`hash_password`], so verification
/// against it always fails.
pub const UNUSABLE_PASSWORD: &str = "- unusable -";

/// Hash a cleartext password with the default work factor.
pub fn hash_password(cleartext: &str) -> Result<String> {
    hash_password_with_cost(cleartext, bcrypt::DEFAULT_COST)
}

/// Hash a cleartext password with an explicit work factor.
///
/// Lower costs are useful in tests; production callers should stick to
/// [`hash_password`].
pub fn hash_password_with_cost(cleartext: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(cleartext, cost)?)
}

/// Verify a cleartext password against a stored hash.
///
/// A malformed or unusable hash is a non-match, not an error.
pub fn is_password_matching(cleartext: &str, hash: &str) -> bool {
    bcrypt::verify(cleartext, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // lowest work factor bcrypt accepts; keeps the suite fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password_with_cost("hunter2", TEST_COST).unwrap();
        assert!(is_password_matching("hunter2", &hash));
        assert!(!is_password_matching("hunter3", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password_with_cost("hunter2", TEST_COST).unwrap();
        let b = hash_password_with_cost("hunter2", TEST_COST).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unusable_password_never_matches() {
        assert!(!is_password_matching("hunter2", UNUSABLE_PASSWORD));
        assert!(!is_password_matching(UNUSABLE_PASSWORD, UNUSABLE_PASSWORD));
        assert!(!is_password_matching("", UNUSABLE_PASSWORD));
    }

    #[test]
    fn test_malformed_hash_is_non_match() {
        assert!(!is_password_matching("hunter2", "not-a-bcrypt-hash"));
        assert!(!is_password_matching("hunter2", ""));
    }
}

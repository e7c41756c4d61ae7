use std::sync::OnceLock;

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Hash a password for storage.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Verify a plaintext password against a stored hash - constant-time via bcrypt.
/// A malformed hash never verifies.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Burn the same bcrypt work as a real check when the username is unknown,
/// so a missing account is not faster to reject than a wrong password.
/// Always false.
pub fn verify_against_dummy(plaintext: &str, cost: u32) -> bool {
    let hash = DUMMY_HASH.get_or_init(|| hash_password("yatube-no-such-user", cost).ok());
    if let Some(hash) = hash {
        let _ = verify_password(plaintext, hash);
    }
    false
}

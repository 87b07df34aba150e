//! Credential verification
//!
//! Passwords are stored as `hex(salt).hex(derivedKey)` with a random
//! per-password salt and Argon2id as the key-derivation function, so
//! verification is self-contained. Comparison is constant-time; a malformed
//! stored value is a non-match, never an error surfaced as "valid".

use argon2::Argon2;
use thiserror::Error;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// Hash a plaintext password for storage.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    use rand::RngCore;

    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(plaintext.as_bytes(), &salt, &mut key)
        .map_err(|e| PasswordError::Derivation(e.to_string()))?;

    Ok(format!("{}.{}", hex::encode(salt), hex::encode(key)))
}

/// Verify a plaintext password against a stored hash.
///
/// Any malformed stored representation verifies false.
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    let Some((salt_hex, key_hex)) = stored.split_once('.') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(key_hex) else {
        return false;
    };
    if salt.len() < 8 || expected.len() != KEY_LEN {
        return false;
    }

    let mut derived = [0u8; KEY_LEN];
    if Argon2::default()
        .hash_password_into(plaintext.as_bytes(), &salt, &mut derived)
        .is_err()
    {
        return false;
    }

    constant_time_compare(&derived, &expected)
}

/// Generate a random password for provisioned directory accounts.
///
/// Never disclosed; the account only ever authenticates via the directory.
pub fn generate_password() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    const PASSWORD_LENGTH: usize = 40;

    let mut rng = rand::rng();
    (0..PASSWORD_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

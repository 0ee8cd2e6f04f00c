//! Password hashing.
//!
//! Argon2id with interactive-login parameters (19 MiB, t=2, p=1) and a
//! random 16-byte salt.  Stored form is `salt_hex:digest_hex`; verification
//! re-derives and compares in constant time.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::PasswordError;

const M_COST: u32 = 19456; // KiB
const T_COST: u32 = 2;
const P_COST: u32 = 1;
const DIGEST_LEN: usize = 32;
const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let digest = derive(password.as_bytes(), &salt)?;
    Ok(format!("{}:{}", hex::encode(salt), hex::encode(digest)))
}

/// Check a password against a stored `salt_hex:digest_hex` value.
///
/// Wrong passwords return `Ok(false)`; `Err` means the stored value itself
/// is unusable.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let (salt_hex, digest_hex) = stored.split_once(':').ok_or(PasswordError::InvalidFormat)?;

    let salt = hex::decode(salt_hex).map_err(|_| PasswordError::InvalidFormat)?;
    let expected = hex::decode(digest_hex).map_err(|_| PasswordError::InvalidFormat)?;
    if salt.len() != SALT_LEN || expected.len() != DIGEST_LEN {
        return Err(PasswordError::InvalidFormat);
    }

    let digest = derive(password.as_bytes(), &salt)?;
    Ok(bool::from(digest.ct_eq(&expected)))
}

fn derive(password: &[u8], salt: &[u8]) -> Result<[u8; DIGEST_LEN], PasswordError> {
    let params = Params::new(M_COST, T_COST, P_COST, Some(DIGEST_LEN))
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; DIGEST_LEN];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;

    Ok(output)
}

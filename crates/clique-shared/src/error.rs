use thiserror::Error;

/// Errors from decoding or verifying an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Base64 decode error")]
    Base64Decode,
}

/// Errors from hashing or verifying a password.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// The stored digest is not in the `salt_hex:digest_hex` shape.
    #[error("Invalid password hash format")]
    InvalidFormat,

    /// The Argon2 derivation itself failed.
    #[error("Password hashing error: {0}")]
    Hashing(String),
}

//! # clique-shared
//!
//! Pure logic shared across the Clique backend: the service signing
//! identity, signed bearer tokens, password hashing, and tag suggestion.
//! Nothing in this crate touches the network or the database.

pub mod auth;
pub mod identity;
pub mod password;
pub mod tagging;

mod error;

pub use auth::{AccessToken, TokenClaims};
pub use error::{AuthError, PasswordError};
pub use identity::ServiceIdentity;

//! Signed bearer tokens.
//!
//! A token is its claims plus an Ed25519 signature over their bincode
//! serialization, the whole thing base64url-encoded.  Verification is
//! against the service's own verifying key; no key material travels in
//! the payload.

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::identity::ServiceIdentity;

/// What a token asserts about its bearer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Mail address of the authenticated account.
    pub mail: String,
    /// Random per-issue id; makes every login's token distinct even within
    /// the same clock tick.
    pub token_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A signed bearer token as handed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub claims: TokenClaims,
    pub signature: Vec<u8>,
}

impl AccessToken {
    /// Issue a token for `mail`, valid for `ttl` from now.
    pub fn issue(identity: &ServiceIdentity, mail: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        let claims = TokenClaims {
            mail: mail.to_string(),
            token_id: Uuid::new_v4(),
            issued_at: now,
            expires_at: now + ttl,
        };

        let claim_bytes = bincode::serialize(&claims).expect("claims serialization");
        let signature = identity.sign(&claim_bytes);

        Self {
            claims,
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Encode the token as a base64url string (the wire form).
    pub fn encode(&self) -> String {
        let bytes = bincode::serialize(self).expect("token serialization");
        base64_url_encode(&bytes)
    }

    /// Decode a base64url string back into an AccessToken.
    pub fn decode(code: &str) -> Result<Self, AuthError> {
        let bytes = base64_url_decode(code)?;
        bincode::deserialize(&bytes).map_err(|_| AuthError::InvalidFormat)
    }

    /// Verify expiry, then the signature against the service key.
    pub fn verify(&self, verifying_key: &VerifyingKey) -> Result<(), AuthError> {
        if Utc::now() > self.claims.expires_at {
            return Err(AuthError::Expired);
        }

        let claim_bytes =
            bincode::serialize(&self.claims).map_err(|_| AuthError::InvalidFormat)?;

        let signature =
            Signature::from_slice(&self.signature).map_err(|_| AuthError::InvalidSignature)?;

        verifying_key
            .verify(&claim_bytes, &signature)
            .map_err(|_| AuthError::InvalidSignature)
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, AuthError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD
        .decode(s.trim())
        .map_err(|_| AuthError::Base64Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let identity = ServiceIdentity::generate();
        let token = AccessToken::issue(&identity, "abc@gmail.com", Duration::minutes(30));

        let code = token.encode();
        let decoded = AccessToken::decode(&code).expect("decode should work");
        decoded
            .verify(&identity.verifying_key())
            .expect("verify should pass");

        assert_eq!(decoded.claims.mail, "abc@gmail.com");
        assert_eq!(decoded.claims.token_id, token.claims.token_id);
    }

    #[test]
    fn test_token_tampered_fails() {
        let identity = ServiceIdentity::generate();
        let token = AccessToken::issue(&identity, "abc@gmail.com", Duration::minutes(30));

        let mut bad_token = token;
        bad_token.claims.mail = "admin@example.com".to_string();
        assert!(bad_token.verify(&identity.verifying_key()).is_err());
    }

    #[test]
    fn test_token_wrong_key_fails() {
        let identity = ServiceIdentity::generate();
        let other = ServiceIdentity::generate();
        let token = AccessToken::issue(&identity, "abc@gmail.com", Duration::minutes(30));

        assert!(matches!(
            token.verify(&other.verifying_key()),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_token_expired_fails() {
        let identity = ServiceIdentity::generate();
        let token = AccessToken::issue(&identity, "abc@gmail.com", Duration::minutes(-1));

        assert!(matches!(
            token.verify(&identity.verifying_key()),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_each_issue_is_distinct() {
        let identity = ServiceIdentity::generate();
        let first = AccessToken::issue(&identity, "abc@gmail.com", Duration::minutes(30));
        let second = AccessToken::issue(&identity, "abc@gmail.com", Duration::minutes(30));
        assert_ne!(first.encode(), second.encode());
    }
}

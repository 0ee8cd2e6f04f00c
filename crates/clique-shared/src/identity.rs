use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// The service's Ed25519 signing identity.  Every access token the server
/// hands out is signed with this key; verification needs only the public
/// half, so the secret never leaves the process that loaded it.
#[derive(Clone)]
pub struct ServiceIdentity {
    signing_key: SigningKey,
}

impl ServiceIdentity {
    /// Generate a fresh random identity.  Tokens signed by it die with the
    /// process, which is the right behavior for development setups that
    /// did not configure a persistent key.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Restore the identity from secret key bytes.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        Self { signing_key }
    }

    /// Get the raw secret key bytes.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Get the verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_identity_roundtrip() {
        let identity = ServiceIdentity::generate();
        let restored = ServiceIdentity::from_secret_bytes(identity.secret_bytes());
        assert_eq!(identity.verifying_key(), restored.verifying_key());
    }

    #[test]
    fn test_sign_verify() {
        let identity = ServiceIdentity::generate();
        let signature = identity.sign(b"hello");

        assert!(identity.verifying_key().verify(b"hello", &signature).is_ok());
        assert!(identity.verifying_key().verify(b"wrong", &signature).is_err());
    }
}

//! Server configuration, loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use clique_shared::ServiceIdentity;
use tracing::warn;

/// Runtime configuration for the server.
///
/// Every field has a sensible default so the server can start with no
/// environment at all; production deployments override what they need.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    /// Env: `CLIQUE_HTTP_ADDR`. Default: `0.0.0.0:8080`.
    pub http_addr: SocketAddr,

    /// Path of the SQLite database file. Parent directories are created
    /// on startup if missing.
    /// Env: `CLIQUE_DATABASE_PATH`. Default: `./data/clique.db`.
    pub database_path: PathBuf,

    /// Ed25519 secret key used to sign access tokens, hex-encoded
    /// (64 hex chars). When unset a fresh key is generated at startup,
    /// which invalidates all tokens on restart.
    /// Env: `CLIQUE_TOKEN_SIGNING_KEY`. Default: none (ephemeral key).
    pub token_signing_key: Option<[u8; 32]>,

    /// Lifetime of issued access tokens, in minutes.
    /// Env: `CLIQUE_TOKEN_TTL_MINUTES`. Default: `30`.
    pub token_ttl_minutes: i64,

    /// Base URL of the object store that holds uploaded images and
    /// generated preview screenshots.
    /// Env: `CLIQUE_OBJECT_STORE_URL`. Default: `http://localhost:4443`.
    pub object_store_url: String,

    /// Bucket under which all objects are placed.
    /// Env: `CLIQUE_OBJECT_STORE_BUCKET`. Default: `clique-media`.
    pub object_store_bucket: String,

    /// Base URL of the screenshot service used for link previews.
    /// Env: `CLIQUE_PREVIEW_SERVICE_URL`. Default: `http://localhost:3000`.
    pub preview_service_url: String,

    /// Largest accepted image upload, in bytes. Uploads at or above this
    /// size are rejected with 413.
    /// Env: `CLIQUE_MAX_IMAGE_BYTES`. Default: `2097152` (2 MiB).
    pub max_image_bytes: usize,

    /// Failed-credential window: how many register/login attempts a
    /// single address gets per minute before being throttled.
    /// Env: `CLIQUE_CREDENTIAL_ATTEMPTS_PER_MINUTE`. Default: `10`.
    pub credential_attempts_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".parse().unwrap(),
            database_path: PathBuf::from("./data/clique.db"),
            token_signing_key: None,
            token_ttl_minutes: 30,
            object_store_url: "http://localhost:4443".to_string(),
            object_store_bucket: "clique-media".to_string(),
            preview_service_url: "http://localhost:3000".to_string(),
            max_image_bytes: 2 * 1024 * 1024,
            credential_attempts_per_minute: 10,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CLIQUE_HTTP_ADDR") {
            match val.parse() {
                Ok(addr) => config.http_addr = addr,
                Err(_) => warn!(value = %val, "invalid CLIQUE_HTTP_ADDR, using default"),
            }
        }

        if let Ok(val) = std::env::var("CLIQUE_DATABASE_PATH") {
            config.database_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CLIQUE_TOKEN_SIGNING_KEY") {
            match parse_hex_key(&val) {
                Some(key) => config.token_signing_key = Some(key),
                None => {
                    warn!("invalid CLIQUE_TOKEN_SIGNING_KEY (want 64 hex chars), ignoring")
                }
            }
        }

        if let Ok(val) = std::env::var("CLIQUE_TOKEN_TTL_MINUTES") {
            match val.parse::<i64>() {
                Ok(minutes) if minutes > 0 => config.token_ttl_minutes = minutes,
                _ => warn!(value = %val, "invalid CLIQUE_TOKEN_TTL_MINUTES, using default"),
            }
        }

        if let Ok(val) = std::env::var("CLIQUE_OBJECT_STORE_URL") {
            config.object_store_url = val;
        }

        if let Ok(val) = std::env::var("CLIQUE_OBJECT_STORE_BUCKET") {
            config.object_store_bucket = val;
        }

        if let Ok(val) = std::env::var("CLIQUE_PREVIEW_SERVICE_URL") {
            config.preview_service_url = val;
        }

        if let Ok(val) = std::env::var("CLIQUE_MAX_IMAGE_BYTES") {
            match val.parse::<usize>() {
                Ok(bytes) if bytes > 0 => config.max_image_bytes = bytes,
                _ => warn!(value = %val, "invalid CLIQUE_MAX_IMAGE_BYTES, using default"),
            }
        }

        if let Ok(val) = std::env::var("CLIQUE_CREDENTIAL_ATTEMPTS_PER_MINUTE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.credential_attempts_per_minute = n,
                _ => warn!(
                    value = %val,
                    "invalid CLIQUE_CREDENTIAL_ATTEMPTS_PER_MINUTE, using default"
                ),
            }
        }

        config
    }

    /// Build the signing identity for access tokens. Uses the configured
    /// key when present, otherwise generates an ephemeral one.
    pub fn service_identity(&self) -> ServiceIdentity {
        match &self.token_signing_key {
            Some(secret) => ServiceIdentity::from_secret_bytes(secret),
            None => {
                warn!("CLIQUE_TOKEN_SIGNING_KEY unset, generating ephemeral signing key");
                ServiceIdentity::generate()
            }
        }
    }
}

/// Parse a 64-char hex string into a 32-byte key.
fn parse_hex_key(hex_str: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim()).ok()?;
    bytes.try_into().ok()
}

// Log verbosity is controlled via RUST_LOG as usual, e.g.
// RUST_LOG=info,clique_server=debug

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_complete() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.token_ttl_minutes, 30);
        assert_eq!(config.max_image_bytes, 2 * 1024 * 1024);
        assert!(config.token_signing_key.is_none());
    }

    #[test]
    fn parse_hex_key_accepts_valid_key() {
        let hex_str = "ab".repeat(32);
        let key = parse_hex_key(&hex_str).unwrap();
        assert_eq!(key, [0xab; 32]);
    }

    #[test]
    fn parse_hex_key_rejects_bad_input() {
        assert!(parse_hex_key("deadbeef").is_none());
        assert!(parse_hex_key("zz".repeat(32).as_str()).is_none());
        assert!(parse_hex_key("").is_none());
    }

    #[test]
    fn ephemeral_identity_when_key_unset() {
        let config = ServerConfig::default();
        let a = config.service_identity();
        let b = config.service_identity();
        assert_ne!(a.verifying_key(), b.verifying_key());
    }

    #[test]
    fn configured_key_gives_stable_identity() {
        let config = ServerConfig {
            token_signing_key: Some([7u8; 32]),
            ..Default::default()
        };
        let a = config.service_identity();
        let b = config.service_identity();
        assert_eq!(a.verifying_key(), b.verifying_key());
    }
}

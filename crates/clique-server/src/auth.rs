//! Request authentication.
//!
//! A bearer token is only honored when it passes two gates: the Ed25519
//! signature check against the server identity, and a byte-for-byte match
//! with the token currently stored for that account. The stored row is
//! what makes logout effective before the signed expiry is reached.

use axum::http::HeaderMap;
use chrono::Utc;
use subtle::ConstantTimeEq;

use clique_shared::AccessToken;
use clique_store::PublicUser;

use crate::error::ApiError;
use crate::routes::AppState;

/// Resolve the authenticated account behind a request, or fail with 401.
pub async fn current_user(headers: &HeaderMap, state: &AppState) -> Result<PublicUser, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let encoded = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if encoded.is_empty() {
        return Err(ApiError::Unauthorized("missing bearer token".to_string()));
    }

    let token = AccessToken::decode(encoded)?;
    token.verify(&state.identity.verifying_key())?;

    let db = state.db.lock().await;
    let stored = db
        .get_token(&token.claims.mail)
        .map_err(|_| unauthorized())?;

    let matches = encoded.as_bytes().ct_eq(stored.token.as_bytes());
    if bool::from(!matches) {
        return Err(unauthorized());
    }
    if !stored.is_active || Utc::now() > stored.expires_at {
        return Err(unauthorized());
    }

    let user = db.get_user(&token.claims.mail).map_err(|_| unauthorized())?;
    Ok(PublicUser::from(user))
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized("invalid or expired token".to_string())
}

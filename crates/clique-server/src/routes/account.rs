//! Account lifecycle: registration, login/logout, profile updates,
//! account deletion.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use clique_shared::{password, AccessToken};
use clique_store::{AuthToken, PublicUser, User};

use crate::auth::current_user;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Deserialize)]
pub(crate) struct RegisterRequest {
    mail: String,
    /// Display name; falls back to the mail address when omitted.
    #[serde(default)]
    name: String,
    password: String,
}

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    mail: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

#[derive(Deserialize)]
pub(crate) struct UpdateAccountRequest {
    name: Option<String>,
    password: Option<String>,
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    validate_mail(&req.mail)?;
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".to_string()));
    }

    let name = if req.name.trim().is_empty() {
        req.mail.clone()
    } else {
        req.name.trim().to_string()
    };
    let password_hash =
        password::hash_password(&req.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    let user = User {
        mail: req.mail,
        name,
        password_hash,
        created_at: Utc::now(),
    };

    let db = state.db.lock().await;
    db.create_user(&user)?;
    info!(mail = %user.mail, "account registered");

    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = {
        let db = state.db.lock().await;
        db.get_user(&req.mail).map_err(|_| bad_credentials())?
    };

    // Argon2 runs outside the database lock
    let ok = password::verify_password(&req.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !ok {
        return Err(bad_credentials());
    }

    let ttl = Duration::minutes(state.config.token_ttl_minutes);
    let token = AccessToken::issue(&state.identity, &user.mail, ttl);
    let encoded = token.encode();

    let db = state.db.lock().await;
    db.upsert_token(&AuthToken {
        user_mail: user.mail.clone(),
        token: encoded.clone(),
        is_active: true,
        expires_at: token.claims.expires_at,
        created_at: token.claims.issued_at,
    })?;
    info!(mail = %user.mail, "login");

    Ok(Json(TokenResponse {
        access_token: encoded,
        token_type: "bearer",
    }))
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.deactivate_token(&user.mail)?;
    info!(mail = %user.mail, "logout");

    Ok(Json(serde_json::json!({ "logged_out": true })))
}

pub(crate) async fn user_details(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, ApiError> {
    let user = current_user(&headers, &state).await?;
    Ok(Json(user))
}

pub(crate) async fn update_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = current_user(&headers, &state).await?;

    if req.name.is_none() && req.password.is_none() {
        return Err(ApiError::BadRequest("nothing to update".to_string()));
    }
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_string()));
        }
    }

    let password_hash = match &req.password {
        Some(plain) if plain.is_empty() => {
            return Err(ApiError::BadRequest("password must not be empty".to_string()));
        }
        Some(plain) => {
            Some(password::hash_password(plain).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        None => None,
    };

    let mut db = state.db.lock().await;
    let updated = db.update_user(
        &user.mail,
        req.name.as_deref().map(str::trim),
        password_hash.as_deref(),
    )?;
    info!(mail = %user.mail, "account updated");

    Ok(Json(PublicUser::from(updated)))
}

pub(crate) async fn remove_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let mut db = state.db.lock().await;
    db.delete_account(&user.mail)?;
    info!(mail = %user.mail, "account removed");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// The one error every failed login gets, whether the mail is unknown or
/// the password wrong.
fn bad_credentials() -> ApiError {
    ApiError::Unauthorized("invalid mail or password".to_string())
}

/// Cheap structural check on a mail address. Not RFC holy writ, enough to
/// stop empty strings and obvious junk from becoming primary keys.
fn validate_mail(mail: &str) -> Result<(), ApiError> {
    let well_formed = mail.len() <= 254
        && !mail.contains(char::is_whitespace)
        && mail
            .split_once('@')
            .map(|(local, domain)| {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            })
            .unwrap_or(false);

    if !well_formed {
        return Err(ApiError::BadRequest(format!("invalid mail address: {mail}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{self, bearer};

    /// Register and log in through the real handlers, Argon2 included.
    async fn register_and_login(state: &AppState, mail: &str, name: &str) -> String {
        register(
            State(state.clone()),
            Json(RegisterRequest {
                mail: mail.to_string(),
                name: name.to_string(),
                password: "hunter2!".to_string(),
            }),
        )
        .await
        .unwrap();

        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                mail: mail.to_string(),
                password: "hunter2!".to_string(),
            }),
        )
        .await
        .unwrap();
        response.0.access_token
    }

    #[test]
    fn mail_validation_accepts_normal_addresses() {
        assert!(validate_mail("abc@gmail.com").is_ok());
        assert!(validate_mail("bzak@agh.pl").is_ok());
    }

    #[test]
    fn mail_validation_rejects_junk() {
        for mail in ["", "abc", "abc@", "@gmail.com", "a b@x.pl", "abc@nodot", "a@.pl", "a@pl."] {
            assert!(validate_mail(mail).is_err(), "accepted {mail:?}");
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let state = test_support::state();
        let token = register_and_login(&state, "abc@gmail.com", "Dominik").await;

        let details = user_details(State(state.clone()), bearer(&token))
            .await
            .unwrap();
        assert_eq!(details.0.mail, "abc@gmail.com");
        assert_eq!(details.0.name, "Dominik");
    }

    #[tokio::test]
    async fn register_defaults_name_to_mail() {
        let state = test_support::state();
        let (status, user) = register(
            State(state.clone()),
            Json(RegisterRequest {
                mail: "ewa@example.com".to_string(),
                name: String::new(),
                password: "pw".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user.0.name, "ewa@example.com");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let state = test_support::state();
        register_and_login(&state, "abc@gmail.com", "Dominik").await;

        let err = register(
            State(state.clone()),
            Json(RegisterRequest {
                mail: "abc@gmail.com".to_string(),
                name: "Other".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyExists("user")));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let state = test_support::state();
        register_and_login(&state, "abc@gmail.com", "Dominik").await;

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                mail: "abc@gmail.com".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_rejects_unknown_mail_without_leaking() {
        let state = test_support::state();
        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                mail: "ghost@example.com".to_string(),
                password: "whatever".to_string(),
            }),
        )
        .await
        .unwrap_err();
        // same error as a bad password, not a 404
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let state = test_support::state();
        let token = register_and_login(&state, "abc@gmail.com", "Dominik").await;

        logout(State(state.clone()), bearer(&token)).await.unwrap();

        let err = user_details(State(state.clone()), bearer(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn update_account_rotates_password() {
        let state = test_support::state();
        let token = register_and_login(&state, "abc@gmail.com", "Dominik").await;

        let updated = update_account(
            State(state.clone()),
            bearer(&token),
            Json(UpdateAccountRequest {
                name: Some("Dominik K".to_string()),
                password: Some("new-secret".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.0.name, "Dominik K");

        let old = login(
            State(state.clone()),
            Json(LoginRequest {
                mail: "abc@gmail.com".to_string(),
                password: "hunter2!".to_string(),
            }),
        )
        .await;
        assert!(old.is_err());

        let fresh = login(
            State(state.clone()),
            Json(LoginRequest {
                mail: "abc@gmail.com".to_string(),
                password: "new-secret".to_string(),
            }),
        )
        .await;
        assert!(fresh.is_ok());
    }

    #[tokio::test]
    async fn update_with_no_fields_is_rejected() {
        let state = test_support::state();
        let token = register_and_login(&state, "abc@gmail.com", "Dominik").await;

        let err = update_account(
            State(state.clone()),
            bearer(&token),
            Json(UpdateAccountRequest {
                name: None,
                password: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn removed_account_cannot_log_in() {
        let state = test_support::state();
        let token = register_and_login(&state, "abc@gmail.com", "Dominik").await;

        remove_account(State(state.clone()), bearer(&token))
            .await
            .unwrap();

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                mail: "abc@gmail.com".to_string(),
                password: "hunter2!".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}

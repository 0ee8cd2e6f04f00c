use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::AuthToken;

impl Database {
    /// Store the freshly issued token for a user, replacing any previous one.
    pub fn upsert_token(&self, token: &AuthToken) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO tokens (user_mail, token, is_active, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.user_mail,
                token.token,
                token.is_active,
                token.expires_at.to_rfc3339(),
                token.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_token(&self, user_mail: &str) -> Result<AuthToken> {
        self.conn()
            .query_row(
                "SELECT user_mail, token, is_active, expires_at, created_at
                 FROM tokens
                 WHERE user_mail = ?1",
                params![user_mail],
                row_to_token,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("token"),
                other => StoreError::Sqlite(other),
            })
    }

    /// Deactivate a user's token (logout).  Returns `true` if a live token
    /// was actually deactivated.
    pub fn deactivate_token(&self, user_mail: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE tokens SET is_active = 0 WHERE user_mail = ?1 AND is_active = 1",
            params![user_mail],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthToken> {
    let user_mail: String = row.get(0)?;
    let token: String = row.get(1)?;
    let is_active: bool = row.get(2)?;
    let expires_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let expires_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&expires_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(AuthToken {
        user_mail,
        token,
        is_active,
        expires_at,
        created_at,
    })
}

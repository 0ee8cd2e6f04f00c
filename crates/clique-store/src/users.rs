//! CRUD operations for [`User`] accounts, including the full account
//! deletion cascade.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::groups;
use crate::models::User;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new account.  The mail address is the primary key, so
    /// registering it twice yields [`StoreError::AlreadyExists`].
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (mail, name, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.mail,
                    user.name,
                    user.password_hash,
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::AlreadyExists("user")
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single account by mail address.
    pub fn get_user(&self, mail: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT mail, name, password_hash, created_at
                 FROM users
                 WHERE mail = ?1",
                params![mail],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("user"),
                other => StoreError::Sqlite(other),
            })
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Sparse account update: only `Some` fields overwrite.  Returns the
    /// updated record.
    pub fn update_user(
        &mut self,
        mail: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User> {
        let tx = self.conn_mut().transaction()?;

        let mut user = tx
            .query_row(
                "SELECT mail, name, password_hash, created_at
                 FROM users
                 WHERE mail = ?1",
                params![mail],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("user"),
                other => StoreError::Sqlite(other),
            })?;

        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash.to_string();
        }

        tx.execute(
            "UPDATE users SET name = ?2, password_hash = ?3 WHERE mail = ?1",
            params![user.mail, user.name, user.password_hash],
        )?;

        tx.commit()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an account and everything that hangs off it, in one
    /// transaction:
    ///
    /// 1. every group the user owns (with its media and memberships),
    /// 2. the user's remaining memberships (they cannot be the sole member
    ///    of a group they do not own, so no further group cleanup arises),
    /// 3. friendships and friend requests in either direction,
    /// 4. the bearer token,
    /// 5. the account row itself.
    pub fn delete_account(&mut self, mail: &str) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        ensure_user(&tx, mail)?;

        let owned: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM groups WHERE owner_mail = ?1")?;
            let rows = stmt.query_map(params![mail], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        for group_id in owned {
            groups::delete_group_rows(&tx, group_id)?;
        }

        tx.execute(
            "DELETE FROM group_members WHERE user_mail = ?1",
            params![mail],
        )?;
        tx.execute(
            "DELETE FROM friendships WHERE user_mail = ?1 OR friend_mail = ?1",
            params![mail],
        )?;
        tx.execute(
            "DELETE FROM friend_requests WHERE sender_mail = ?1 OR receiver_mail = ?1",
            params![mail],
        )?;
        tx.execute("DELETE FROM tokens WHERE user_mail = ?1", params![mail])?;
        tx.execute("DELETE FROM users WHERE mail = ?1", params![mail])?;

        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fail with [`StoreError::NotFound`] unless the account exists.  Shared by
/// every operation that validates its participants first.
pub(crate) fn ensure_user(conn: &rusqlite::Connection, mail: &str) -> Result<()> {
    match conn.query_row("SELECT 1 FROM users WHERE mail = ?1", params![mail], |_| {
        Ok(())
    }) {
        Ok(()) => Ok(()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound("user")),
        Err(other) => Err(StoreError::Sqlite(other)),
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let mail: String = row.get(0)?;
    let name: String = row.get(1)?;
    let password_hash: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        mail,
        name,
        password_hash,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(mail: &str, name: &str) -> User {
        User {
            mail: mail.to_string(),
            name: name.to_string(),
            password_hash: "salt:digest".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user("abc@gmail.com", "Dominik");

        db.create_user(&user).unwrap();
        let fetched = db.get_user("abc@gmail.com").unwrap();
        assert_eq!(fetched.name, "Dominik");
        assert_eq!(fetched.password_hash, "salt:digest");
    }

    #[test]
    fn duplicate_mail_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&test_user("abc@gmail.com", "Dominik")).unwrap();

        let err = db
            .create_user(&test_user("abc@gmail.com", "Impostor"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists("user")));
    }

    #[test]
    fn get_missing_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.get_user("ghost@example.com").unwrap_err();
        assert!(matches!(err, StoreError::NotFound("user")));
    }

    #[test]
    fn sparse_update_keeps_other_fields() {
        let mut db = Database::open_in_memory().unwrap();
        db.create_user(&test_user("abc@gmail.com", "Dominik")).unwrap();

        let updated = db.update_user("abc@gmail.com", Some("Dominik II"), None).unwrap();
        assert_eq!(updated.name, "Dominik II");
        assert_eq!(updated.password_hash, "salt:digest");

        let updated = db.update_user("abc@gmail.com", None, Some("salt:other")).unwrap();
        assert_eq!(updated.name, "Dominik II");
        assert_eq!(updated.password_hash, "salt:other");
    }

    #[test]
    fn delete_account_removes_user() {
        let mut db = Database::open_in_memory().unwrap();
        db.create_user(&test_user("abc@gmail.com", "Dominik")).unwrap();

        db.delete_account("abc@gmail.com").unwrap();
        assert!(matches!(
            db.get_user("abc@gmail.com"),
            Err(StoreError::NotFound("user"))
        ));
        assert!(matches!(
            db.delete_account("abc@gmail.com"),
            Err(StoreError::NotFound("user"))
        ));
    }
}

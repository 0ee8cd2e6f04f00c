//! Groups and their memberships.
//!
//! Two invariants hold at every commit: the owner is always also a member,
//! and a group never exists with zero members.  `remove_member` is the
//! only place both can be threatened, so it handles owner succession and
//! the last-member auto-delete inside its transaction.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Group, PublicUser};
use crate::users::ensure_user;

/// What `remove_member` did beyond deleting the membership row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRemoval {
    /// An ordinary member left; nothing else changed.
    Left,
    /// The owner left and ownership passed to the earliest-joined remaining
    /// member (ties broken by mail ascending).
    OwnershipTransferred {
        /// Mail of the member promoted to owner.
        new_owner: String,
    },
    /// The last member left; the group and its media were deleted.
    GroupDeleted,
}

impl Database {
    /// Create a group and enroll the owner as its first member.
    pub fn create_group(&mut self, name: &str, owner: &str) -> Result<Group> {
        let tx = self.conn_mut().transaction()?;
        ensure_user(&tx, owner)?;

        let now = Utc::now();
        tx.execute(
            "INSERT INTO groups (name, owner_mail, created_at) VALUES (?1, ?2, ?3)",
            params![name, owner, now.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO group_members (group_id, user_mail, joined_at) VALUES (?1, ?2, ?3)",
            params![id, owner, now.to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(Group {
            id,
            name: name.to_string(),
            owner_mail: owner.to_string(),
            created_at: now,
        })
    }

    pub fn get_group(&self, id: i64) -> Result<Group> {
        self.conn()
            .query_row(
                "SELECT id, name, owner_mail, created_at FROM groups WHERE id = ?1",
                params![id],
                row_to_group,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("group"),
                other => StoreError::Sqlite(other),
            })
    }

    /// Add users to a group.  Idempotent per member: existing memberships
    /// and duplicates within `mails` are skipped silently.  Any unknown
    /// user or group fails the whole batch; nothing is applied partially.
    ///
    /// Returns how many memberships were actually created.
    pub fn add_members(&mut self, group_id: i64, mails: &[String]) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        ensure_group(&tx, group_id)?;

        let now = Utc::now().to_rfc3339();
        let mut added = 0;
        for mail in mails {
            ensure_user(&tx, mail)?;
            added += tx.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_mail, joined_at)
                 VALUES (?1, ?2, ?3)",
                params![group_id, mail, now],
            )?;
        }

        tx.commit()?;
        Ok(added)
    }

    /// Remove a member.  In the same transaction: if they were the last
    /// member the group and its media are deleted; if they were the owner,
    /// ownership passes to the earliest-joined remaining member (ties
    /// broken by mail ascending, which makes succession deterministic).
    pub fn remove_member(&mut self, group_id: i64, mail: &str) -> Result<MemberRemoval> {
        let tx = self.conn_mut().transaction()?;

        let group = tx
            .query_row(
                "SELECT id, name, owner_mail, created_at FROM groups WHERE id = ?1",
                params![group_id],
                row_to_group,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("group"),
                other => StoreError::Sqlite(other),
            })?;
        ensure_user(&tx, mail)?;

        let affected = tx.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_mail = ?2",
            params![group_id, mail],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound("membership"));
        }

        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;

        let outcome = if remaining == 0 {
            delete_media_rows(&tx, group_id)?;
            tx.execute("DELETE FROM groups WHERE id = ?1", params![group_id])?;
            MemberRemoval::GroupDeleted
        } else if group.owner_mail == mail {
            let new_owner: String = tx.query_row(
                "SELECT user_mail FROM group_members
                 WHERE group_id = ?1
                 ORDER BY joined_at ASC, user_mail ASC
                 LIMIT 1",
                params![group_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "UPDATE groups SET owner_mail = ?2 WHERE id = ?1",
                params![group_id, new_owner],
            )?;
            MemberRemoval::OwnershipTransferred { new_owner }
        } else {
            MemberRemoval::Left
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Delete a group outright: media associations, media rows, membership
    /// rows, then the group row, in that order.
    pub fn delete_group(&mut self, group_id: i64) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        ensure_group(&tx, group_id)?;
        delete_group_rows(&tx, group_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Groups the user belongs to, in join order.
    pub fn list_user_groups(&self, mail: &str) -> Result<Vec<Group>> {
        ensure_user(self.conn(), mail)?;

        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.owner_mail, g.created_at
             FROM groups g
             JOIN group_members gm ON gm.group_id = g.id
             WHERE gm.user_mail = ?1
             ORDER BY gm.joined_at ASC, g.id ASC",
        )?;
        let rows = stmt.query_map(params![mail], row_to_group)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Groups the user currently owns.
    pub fn list_owned_groups(&self, mail: &str) -> Result<Vec<Group>> {
        ensure_user(self.conn(), mail)?;

        let mut stmt = self.conn().prepare(
            "SELECT id, name, owner_mail, created_at
             FROM groups
             WHERE owner_mail = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![mail], row_to_group)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Whether `mail` belongs to the group.  Missing groups report `false`
    /// rather than erroring; callers that care do [`Database::get_group`]
    /// first.
    pub fn is_member(&self, group_id: i64, mail: &str) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM group_members WHERE group_id = ?1 AND user_mail = ?2",
                params![group_id, mail],
                |_| Ok(()),
            )
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(other),
            })?;
        Ok(found)
    }

    /// Members of a group, earliest joiner first.
    pub fn list_group_members(&self, group_id: i64) -> Result<Vec<PublicUser>> {
        ensure_group(self.conn(), group_id)?;

        let mut stmt = self.conn().prepare(
            "SELECT u.mail, u.name
             FROM group_members gm
             JOIN users u ON u.mail = gm.user_mail
             WHERE gm.group_id = ?1
             ORDER BY gm.joined_at ASC, u.mail ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok(PublicUser {
                mail: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Groups both users belong to.  Friendship is a caller-side
    /// precondition; this is a plain intersection.
    pub fn mutual_groups(&self, a: &str, b: &str) -> Result<Vec<Group>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.owner_mail, g.created_at
             FROM groups g
             JOIN group_members ma ON ma.group_id = g.id AND ma.user_mail = ?1
             JOIN group_members mb ON mb.group_id = g.id AND mb.user_mail = ?2
             ORDER BY g.id ASC",
        )?;
        let rows = stmt.query_map(params![a, b], row_to_group)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fail with [`StoreError::NotFound`] unless the group exists.
pub(crate) fn ensure_group(conn: &rusqlite::Connection, group_id: i64) -> Result<()> {
    match conn.query_row(
        "SELECT 1 FROM groups WHERE id = ?1",
        params![group_id],
        |_| Ok(()),
    ) {
        Ok(()) => Ok(()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound("group")),
        Err(other) => Err(other.into()),
    }
}

/// Delete a group and everything inside it.  Runs within the caller's
/// transaction; also used by the account-deletion cascade.
pub(crate) fn delete_group_rows(conn: &rusqlite::Connection, group_id: i64) -> rusqlite::Result<()> {
    delete_media_rows(conn, group_id)?;
    conn.execute(
        "DELETE FROM group_members WHERE group_id = ?1",
        params![group_id],
    )?;
    conn.execute("DELETE FROM groups WHERE id = ?1", params![group_id])?;
    Ok(())
}

fn delete_media_rows(conn: &rusqlite::Connection, group_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM media_tags
         WHERE media_id IN (SELECT id FROM media WHERE group_id = ?1)",
        params![group_id],
    )?;
    conn.execute("DELETE FROM media WHERE group_id = ?1", params![group_id])?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Group`].
pub(crate) fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let owner_mail: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Group {
        id,
        name,
        owner_mail,
        created_at,
    })
}

//! The friend graph: pending directed requests and symmetric friendships.
//!
//! Friendships are stored as two directed rows written in the same
//! transaction, so either user's row set can be queried without a
//! direction-aware join.  A pending request and a friendship never coexist
//! for the same pair: accepting (or the crossing-request auto-accept)
//! consumes the request rows in the transaction that writes the pair.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{FriendRequest, PublicUser, RequestPeer};
use crate::users::ensure_user;

/// What `send_friend_request` did.
///
/// When the receiver had already asked the sender, the two requests cancel
/// out into a friendship instead of a second pending row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendRequestOutcome {
    /// A request row was created and now awaits the receiver.
    Pending(FriendRequest),
    /// The reverse request was pending; both were consumed and the
    /// friendship pair was written.
    BecameFriends,
}

impl Database {
    /// Send a friend request from `sender` to `receiver`.
    ///
    /// Validation order: self-reference, unknown users, existing
    /// friendship, duplicate same-direction request.  If the reverse
    /// request is pending, both requests are consumed and the symmetric
    /// friendship pair is written instead (see
    /// [`FriendRequestOutcome::BecameFriends`]).
    pub fn send_friend_request(
        &mut self,
        sender: &str,
        receiver: &str,
    ) -> Result<FriendRequestOutcome> {
        if sender == receiver {
            return Err(StoreError::SelfReference);
        }

        let tx = self.conn_mut().transaction()?;
        ensure_user(&tx, sender)?;
        ensure_user(&tx, receiver)?;

        if friendship_exists(&tx, sender, receiver)? {
            return Err(StoreError::AlreadyFriends);
        }
        if request_pending(&tx, sender, receiver)? {
            return Err(StoreError::DuplicateRequest);
        }

        let now = Utc::now();
        let outcome = if request_pending(&tx, receiver, sender)? {
            // Crossing requests: both sides asked, so resolve to a friendship.
            delete_requests_between(&tx, sender, receiver)?;
            insert_friendship_pair(&tx, sender, receiver, now)?;
            FriendRequestOutcome::BecameFriends
        } else {
            tx.execute(
                "INSERT INTO friend_requests (sender_mail, receiver_mail, created_at)
                 VALUES (?1, ?2, ?3)",
                params![sender, receiver, now.to_rfc3339()],
            )?;
            FriendRequestOutcome::Pending(FriendRequest {
                sender_mail: sender.to_string(),
                receiver_mail: receiver.to_string(),
                created_at: now,
            })
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Accept the pending request `requester` sent to `accepter`: consume
    /// the request rows (both directions, should a stray reverse exist) and
    /// write the friendship pair, all in one transaction.
    pub fn accept_friend_request(&mut self, accepter: &str, requester: &str) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        ensure_user(&tx, accepter)?;
        ensure_user(&tx, requester)?;

        if !request_pending(&tx, requester, accepter)? {
            return Err(StoreError::NotFound("friend request"));
        }
        if friendship_exists(&tx, accepter, requester)? {
            return Err(StoreError::AlreadyFriends);
        }

        delete_requests_between(&tx, accepter, requester)?;
        insert_friendship_pair(&tx, accepter, requester, Utc::now())?;

        tx.commit()?;
        Ok(())
    }

    /// Reject the pending request `requester` sent to `decliner`.  The
    /// requester may ask again later.
    pub fn decline_friend_request(&self, decliner: &str, requester: &str) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM friend_requests WHERE sender_mail = ?1 AND receiver_mail = ?2",
            params![requester, decliner],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound("friend request"));
        }
        Ok(())
    }

    /// Withdraw a request the sender no longer wants answered.
    pub fn cancel_sent_request(&self, sender: &str, receiver: &str) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM friend_requests WHERE sender_mail = ?1 AND receiver_mail = ?2",
            params![sender, receiver],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound("friend request"));
        }
        Ok(())
    }

    /// Dissolve a friendship.  The single statement removes both directed
    /// rows atomically.
    pub fn remove_friendship(&self, a: &str, b: &str) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM friendships
             WHERE (user_mail = ?1 AND friend_mail = ?2)
                OR (user_mail = ?2 AND friend_mail = ?1)",
            params![a, b],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound("friendship"));
        }
        Ok(())
    }

    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        Ok(friendship_exists(self.conn(), a, b)?)
    }

    /// The user's friends, ordered by when each friendship was formed.
    pub fn list_friends(&self, mail: &str) -> Result<Vec<PublicUser>> {
        ensure_user(self.conn(), mail)?;

        let mut stmt = self.conn().prepare(
            "SELECT u.mail, u.name
             FROM friendships f
             JOIN users u ON u.mail = f.friend_mail
             WHERE f.user_mail = ?1
             ORDER BY f.created_at ASC, u.mail ASC",
        )?;
        let rows = stmt.query_map(params![mail], row_to_peer)?;

        let mut friends = Vec::new();
        for row in rows {
            let peer = row?;
            friends.push(PublicUser {
                mail: peer.mail,
                name: peer.name,
            });
        }
        Ok(friends)
    }

    /// Requests waiting for the user's answer, oldest first.
    pub fn list_pending_requests(&self, mail: &str) -> Result<Vec<RequestPeer>> {
        ensure_user(self.conn(), mail)?;

        let mut stmt = self.conn().prepare(
            "SELECT u.mail, u.name
             FROM friend_requests fr
             JOIN users u ON u.mail = fr.sender_mail
             WHERE fr.receiver_mail = ?1
             ORDER BY fr.created_at ASC, u.mail ASC",
        )?;
        let rows = stmt.query_map(params![mail], row_to_peer)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Requests the user sent that are still unanswered, oldest first.
    pub fn list_sent_requests(&self, mail: &str) -> Result<Vec<RequestPeer>> {
        ensure_user(self.conn(), mail)?;

        let mut stmt = self.conn().prepare(
            "SELECT u.mail, u.name
             FROM friend_requests fr
             JOIN users u ON u.mail = fr.receiver_mail
             WHERE fr.sender_mail = ?1
             ORDER BY fr.created_at ASC, u.mail ASC",
        )?;
        let rows = stmt.query_map(params![mail], row_to_peer)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn friendship_exists(conn: &rusqlite::Connection, a: &str, b: &str) -> rusqlite::Result<bool> {
    // Rows come in symmetric pairs, so one direction answers for both.
    match conn.query_row(
        "SELECT 1 FROM friendships WHERE user_mail = ?1 AND friend_mail = ?2",
        params![a, b],
        |_| Ok(()),
    ) {
        Ok(()) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(other) => Err(other),
    }
}

fn request_pending(
    conn: &rusqlite::Connection,
    sender: &str,
    receiver: &str,
) -> rusqlite::Result<bool> {
    match conn.query_row(
        "SELECT 1 FROM friend_requests WHERE sender_mail = ?1 AND receiver_mail = ?2",
        params![sender, receiver],
        |_| Ok(()),
    ) {
        Ok(()) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(other) => Err(other),
    }
}

fn delete_requests_between(
    conn: &rusqlite::Connection,
    a: &str,
    b: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM friend_requests
         WHERE (sender_mail = ?1 AND receiver_mail = ?2)
            OR (sender_mail = ?2 AND receiver_mail = ?1)",
        params![a, b],
    )?;
    Ok(())
}

fn insert_friendship_pair(
    conn: &rusqlite::Connection,
    a: &str,
    b: &str,
    at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO friendships (user_mail, friend_mail, created_at) VALUES (?1, ?2, ?3)",
        params![a, b, at.to_rfc3339()],
    )?;
    conn.execute(
        "INSERT INTO friendships (user_mail, friend_mail, created_at) VALUES (?1, ?2, ?3)",
        params![b, a, at.to_rfc3339()],
    )?;
    Ok(())
}

fn row_to_peer(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestPeer> {
    Ok(RequestPeer {
        mail: row.get(0)?,
        name: row.get(1)?,
    })
}

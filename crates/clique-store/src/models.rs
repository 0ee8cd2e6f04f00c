//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as a response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.  The primary key is the mail address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Mail address, unique across the system.
    pub mail: String,
    /// Display name shown to friends and group members.
    pub name: String,
    /// Salted Argon2id digest of the password; never the plaintext.
    pub password_hash: String,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

/// The subset of [`User`] that may be shown to other users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    /// Mail address.
    pub mail: String,
    /// Display name.
    pub name: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            mail: user.mail,
            name: user.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Bearer token
// ---------------------------------------------------------------------------

/// The stored bearer token for one user.  A fresh login replaces the row;
/// logout flips `is_active` so the token stops working immediately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    /// Owning account.
    pub user_mail: String,
    /// The encoded token exactly as handed to the client.
    pub token: String,
    /// Cleared on logout.
    pub is_active: bool,
    /// Hard expiry; checks reject the token after this instant.
    pub expires_at: DateTime<Utc>,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Friend graph
// ---------------------------------------------------------------------------

/// One direction of a friendship.  Rows only ever exist in symmetric pairs,
/// written inside a single transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friendship {
    /// The user this row belongs to.
    pub user_mail: String,
    /// The counterpart.
    pub friend_mail: String,
    /// When the friendship was formed (same instant for both rows).
    pub created_at: DateTime<Utc>,
}

/// A pending directed friend request.  Accepted or declined requests are
/// deleted, so presence in the table means "pending".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    /// Who asked.
    pub sender_mail: String,
    /// Who is being asked.
    pub receiver_mail: String,
    /// When the request was sent.
    pub created_at: DateTime<Utc>,
}

/// The counterpart of a request as shown in pending/sent listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestPeer {
    /// Counterpart mail address.
    pub mail: String,
    /// Counterpart display name.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A private sharing circle.  The owner is always also a member; when the
/// owner leaves, ownership passes to the earliest-joined remaining member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    /// Unique group identifier.
    pub id: i64,
    /// Display name (not unique).
    pub name: String,
    /// Mail of the current owner.
    pub owner_mail: String,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// A shared item inside a group: either an uploaded image or an external
/// link.  Tags are stored normalized (`tags` / `media_tags` tables) and
/// flattened to a string list here, in attach order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    /// Unique media identifier.
    pub id: i64,
    /// The group this item was shared into.
    pub group_id: i64,
    /// Human-readable title.
    pub name: String,
    /// Discriminator: image upload vs. external link.
    pub is_image: bool,
    /// Public URL of the stored binary; empty for link media.
    pub image_key: String,
    /// External URL; empty for image media.
    pub link: String,
    /// Public URL of a preview image, or empty when none could be generated.
    pub preview_link: String,
    /// Mail of the uploader.
    pub uploaded_by: String,
    /// Resolved tag names in attach order.
    pub tags: Vec<String>,
    /// When the item was shared.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new media row.  `image_key` and `preview_link` start
/// empty and are filled in after the external upload succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMedia {
    /// Destination group.
    pub group_id: i64,
    /// Human-readable title.
    pub name: String,
    /// Discriminator: image upload vs. external link.
    pub is_image: bool,
    /// External URL for link media; empty for images.
    pub link: String,
    /// Mail of the uploader.
    pub uploaded_by: String,
}

/// Sparse update for a media row; only `Some` fields overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaPatch {
    /// New title.
    pub name: Option<String>,
    /// New stored-binary URL.
    pub image_key: Option<String>,
    /// New external URL.
    pub link: Option<String>,
    /// New preview URL.
    pub preview_link: Option<String>,
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A tag name shared across media.  Lookup is case-insensitive; the casing
/// of the first writer is preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique tag identifier.
    pub id: i64,
    /// Tag name as first written.
    pub name: String,
}

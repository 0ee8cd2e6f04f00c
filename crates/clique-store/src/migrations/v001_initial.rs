//! v001 -- Initial schema creation.
//!
//! Creates the eight core tables: `users`, `tokens`, `friendships`,
//! `friend_requests`, `groups`, `group_members`, `media`, `tags`, and the
//! `media_tags` association.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    mail          TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,               -- salted argon2id, never plaintext
    created_at    TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Bearer tokens (one live token per user; logout deactivates)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tokens (
    user_mail  TEXT PRIMARY KEY NOT NULL,
    token      TEXT NOT NULL,
    is_active  INTEGER NOT NULL DEFAULT 1,     -- boolean 0/1
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_mail) REFERENCES users(mail) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Friendships (always written as symmetric row pairs)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_mail   TEXT NOT NULL,
    friend_mail TEXT NOT NULL,
    created_at  TEXT NOT NULL,

    PRIMARY KEY (user_mail, friend_mail),
    FOREIGN KEY (user_mail)   REFERENCES users(mail) ON DELETE CASCADE,
    FOREIGN KEY (friend_mail) REFERENCES users(mail) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Friend requests (directed, pending only; resolved rows are deleted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    sender_mail   TEXT NOT NULL,
    receiver_mail TEXT NOT NULL,
    created_at    TEXT NOT NULL,

    PRIMARY KEY (sender_mail, receiver_mail),
    FOREIGN KEY (sender_mail)   REFERENCES users(mail) ON DELETE CASCADE,
    FOREIGN KEY (receiver_mail) REFERENCES users(mail) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
    ON friend_requests(receiver_mail);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    owner_mail TEXT NOT NULL,                  -- owner is always also a member
    created_at TEXT NOT NULL,

    FOREIGN KEY (owner_mail) REFERENCES users(mail)
);

-- ----------------------------------------------------------------
-- Group members
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_members (
    group_id  INTEGER NOT NULL,
    user_mail TEXT NOT NULL,
    joined_at TEXT NOT NULL,                   -- drives owner succession order

    PRIMARY KEY (group_id, user_mail),
    FOREIGN KEY (group_id)  REFERENCES groups(id) ON DELETE CASCADE,
    FOREIGN KEY (user_mail) REFERENCES users(mail) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_mail);

-- ----------------------------------------------------------------
-- Media
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS media (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id     INTEGER NOT NULL,
    name         TEXT NOT NULL,
    is_image     INTEGER NOT NULL,             -- boolean 0/1
    image_key    TEXT NOT NULL DEFAULT '',     -- object-store public URL for images
    link         TEXT NOT NULL DEFAULT '',     -- external URL for link media
    preview_link TEXT NOT NULL DEFAULT '',
    uploaded_by  TEXT NOT NULL,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_media_group ON media(group_id);

-- ----------------------------------------------------------------
-- Tags (case-preserving storage, case-insensitive uniqueness)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL COLLATE NOCASE UNIQUE
);

-- ----------------------------------------------------------------
-- Media <-> tag association (rowid preserves attach order)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS media_tags (
    media_id INTEGER NOT NULL,
    tag_id   INTEGER NOT NULL,

    PRIMARY KEY (media_id, tag_id),
    FOREIGN KEY (media_id) REFERENCES media(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id)   REFERENCES tags(id)
);

CREATE INDEX IF NOT EXISTS idx_media_tags_tag ON media_tags(tag_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

//! Tag rows and the media/tag association.
//!
//! Tags are global, shared across media and groups.  Lookup is
//! case-insensitive (`COLLATE NOCASE` on the name column); the casing of
//! the first writer is what everyone sees afterwards.

use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Tag;

impl Database {
    /// Fetch a tag by name, case-insensitively.
    pub fn get_tag(&self, name: &str) -> Result<Tag> {
        self.conn()
            .query_row(
                "SELECT id, name FROM tags WHERE name = ?1",
                params![name],
                row_to_tag,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("tag"),
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name FROM tags ORDER BY name ASC")?;
        let rows = stmt.query_map([], row_to_tag)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared with the media operations
// ---------------------------------------------------------------------------

/// Look a tag up by name (case-insensitively) or insert it with the given
/// casing.  Returns the tag id either way.
pub(crate) fn get_or_create_tag(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<i64> {
    match conn.query_row(
        "SELECT id FROM tags WHERE name = ?1",
        params![name],
        |row| row.get(0),
    ) {
        Ok(id) => Ok(id),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            conn.execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
            Ok(conn.last_insert_rowid())
        }
        Err(other) => Err(other),
    }
}

/// Attach tags to a media row.  Empty names are skipped; duplicates (in the
/// input or case-insensitively against already-attached tags) are ignored.
pub(crate) fn attach_tags(
    conn: &rusqlite::Connection,
    media_id: i64,
    tags: &[String],
) -> rusqlite::Result<()> {
    for name in tags {
        if name.is_empty() {
            continue;
        }
        let tag_id = get_or_create_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO media_tags (media_id, tag_id) VALUES (?1, ?2)",
            params![media_id, tag_id],
        )?;
    }
    Ok(())
}

/// Resolve a media's tag names in attach order.
pub(crate) fn tags_for_media(
    conn: &rusqlite::Connection,
    media_id: i64,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM media_tags mt
         JOIN tags t ON t.id = mt.tag_id
         WHERE mt.media_id = ?1
         ORDER BY mt.rowid ASC",
    )?;
    let rows = stmt.query_map(params![media_id], |row| row.get(0))?;
    rows.collect()
}

fn row_to_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

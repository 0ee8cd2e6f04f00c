//! Media rows and tag-driven search.
//!
//! Search walks the group's media and matches the term against each item's
//! tags.  The canonical mode is a case-insensitive substring match; the
//! fuzzy mode (normalized Levenshtein similarity) is kept for clients that
//! want typo tolerance and is opt-in per call.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::groups::ensure_group;
use crate::models::{Media, MediaPatch, NewMedia};
use crate::tags::{attach_tags, tags_for_media};

/// How a search term is matched against tag names.  Both modes compare
/// case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Substring containment; the canonical contract.
    #[default]
    Substring,
    /// Normalized Levenshtein similarity of at least
    /// [`FUZZY_THRESHOLD`]; tolerates small typos.
    Fuzzy,
}

/// Minimum similarity for a fuzzy hit.
pub const FUZZY_THRESHOLD: f64 = 0.65;

impl Database {
    /// Insert a media row and attach its tags, all in one transaction.
    /// Returns the stored record with the resolved tag list.
    pub fn create_media(&mut self, new: &NewMedia, tags: &[String]) -> Result<Media> {
        let tx = self.conn_mut().transaction()?;
        ensure_group(&tx, new.group_id)?;

        let now = Utc::now();
        tx.execute(
            "INSERT INTO media (group_id, name, is_image, image_key, link, preview_link,
                                uploaded_by, created_at)
             VALUES (?1, ?2, ?3, '', ?4, '', ?5, ?6)",
            params![
                new.group_id,
                new.name,
                new.is_image,
                new.link,
                new.uploaded_by,
                now.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        attach_tags(&tx, id, tags)?;
        let stored_tags = tags_for_media(&tx, id)?;

        tx.commit()?;
        Ok(Media {
            id,
            group_id: new.group_id,
            name: new.name.clone(),
            is_image: new.is_image,
            image_key: String::new(),
            link: new.link.clone(),
            preview_link: String::new(),
            uploaded_by: new.uploaded_by.clone(),
            tags: stored_tags,
            created_at: now,
        })
    }

    pub fn get_media(&self, id: i64) -> Result<Media> {
        let mut media = self
            .conn()
            .query_row(
                "SELECT id, group_id, name, is_image, image_key, link, preview_link,
                        uploaded_by, created_at
                 FROM media
                 WHERE id = ?1",
                params![id],
                row_to_media,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("media"),
                other => StoreError::Sqlite(other),
            })?;
        media.tags = tags_for_media(self.conn(), id)?;
        Ok(media)
    }

    /// Sparse update: only `Some` fields of the patch overwrite.  Returns
    /// the updated record.
    pub fn update_media(&mut self, id: i64, patch: &MediaPatch) -> Result<Media> {
        let tx = self.conn_mut().transaction()?;

        let mut media = tx
            .query_row(
                "SELECT id, group_id, name, is_image, image_key, link, preview_link,
                        uploaded_by, created_at
                 FROM media
                 WHERE id = ?1",
                params![id],
                row_to_media,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("media"),
                other => StoreError::Sqlite(other),
            })?;

        if let Some(name) = &patch.name {
            media.name = name.clone();
        }
        if let Some(image_key) = &patch.image_key {
            media.image_key = image_key.clone();
        }
        if let Some(link) = &patch.link {
            media.link = link.clone();
        }
        if let Some(preview_link) = &patch.preview_link {
            media.preview_link = preview_link.clone();
        }

        tx.execute(
            "UPDATE media SET name = ?2, image_key = ?3, link = ?4, preview_link = ?5
             WHERE id = ?1",
            params![
                id,
                media.name,
                media.image_key,
                media.link,
                media.preview_link,
            ],
        )?;

        media.tags = tags_for_media(&tx, id)?;
        tx.commit()?;
        Ok(media)
    }

    /// Delete a media row and its tag associations.  Shared tag rows stay;
    /// other media may point at them.
    pub fn delete_media(&mut self, id: i64) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        tx.execute("DELETE FROM media_tags WHERE media_id = ?1", params![id])?;
        let affected = tx.execute("DELETE FROM media WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound("media"));
        }
        tx.commit()?;
        Ok(())
    }

    /// A group's media in creation order, optionally filtered by a tag
    /// search term.  A missing or empty term returns everything.
    pub fn list_group_media(
        &self,
        group_id: i64,
        search_term: Option<&str>,
        mode: SearchMode,
    ) -> Result<Vec<Media>> {
        ensure_group(self.conn(), group_id)?;

        let mut stmt = self.conn().prepare(
            "SELECT id, group_id, name, is_image, image_key, link, preview_link,
                    uploaded_by, created_at
             FROM media
             WHERE group_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![group_id], row_to_media)?;

        let mut items = Vec::new();
        for row in rows {
            let mut media = row?;
            media.tags = tags_for_media(self.conn(), media.id)?;
            items.push(media);
        }

        if let Some(term) = search_term.map(str::trim).filter(|t| !t.is_empty()) {
            items.retain(|m| m.tags.iter().any(|tag| tag_matches(tag, term, mode)));
        }
        Ok(items)
    }

    /// Every media carrying the tag, across groups, in creation order.
    /// The lookup is exact up to case, not a search.
    pub fn list_media_by_tag(&self, tag_name: &str) -> Result<Vec<Media>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.group_id, m.name, m.is_image, m.image_key, m.link,
                    m.preview_link, m.uploaded_by, m.created_at
             FROM media m
             JOIN media_tags mt ON mt.media_id = m.id
             JOIN tags t ON t.id = mt.tag_id
             WHERE t.name = ?1
             ORDER BY m.created_at ASC, m.id ASC",
        )?;
        let rows = stmt.query_map(params![tag_name], row_to_media)?;

        let mut items = Vec::new();
        for row in rows {
            let mut media = row?;
            media.tags = tags_for_media(self.conn(), media.id)?;
            items.push(media);
        }
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Matching helpers
// ---------------------------------------------------------------------------

fn tag_matches(tag: &str, term: &str, mode: SearchMode) -> bool {
    let tag = tag.to_lowercase();
    let term = term.to_lowercase();
    match mode {
        SearchMode::Substring => tag.contains(&term),
        SearchMode::Fuzzy => similarity(&tag, &term) >= FUZZY_THRESHOLD,
    }
}

/// Normalized Levenshtein similarity in `[0.0, 1.0]`.
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Map a `rusqlite::Row` to a [`Media`] with an empty tag list; callers
/// resolve tags afterwards.
fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<Media> {
    let created_str: String = row.get(8)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Media {
        id: row.get(0)?,
        group_id: row.get(1)?,
        name: row.get(2)?,
        is_image: row.get(3)?,
        image_key: row.get(4)?,
        link: row.get(5)?,
        preview_link: row.get(6)?,
        uploaded_by: row.get(7)?,
        tags: Vec::new(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn seeded_group(db: &mut Database) -> i64 {
        db.create_user(&User {
            mail: "abc@gmail.com".to_string(),
            name: "Dominik".to_string(),
            password_hash: "salt:digest".to_string(),
            created_at: Utc::now(),
        })
        .unwrap();
        db.create_group("memes", "abc@gmail.com").unwrap().id
    }

    fn link_media(group_id: i64, name: &str) -> NewMedia {
        NewMedia {
            group_id,
            name: name.to_string(),
            is_image: false,
            link: format!("https://example.com/{name}"),
            uploaded_by: "abc@gmail.com".to_string(),
        }
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_resolves_tags_in_attach_order() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);

        let media = db
            .create_media(
                &link_media(group_id, "ride"),
                &tags(&["Bike", "FUNNY", "bike", "fall"]),
            )
            .unwrap();

        // "bike" deduplicates against "Bike" case-insensitively.
        assert_eq!(media.tags, tags(&["Bike", "FUNNY", "fall"]));
    }

    #[test]
    fn create_in_unknown_group_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db
            .create_media(&link_media(999, "orphan"), &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("group")));
    }

    #[test]
    fn search_substring_is_case_insensitive() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);
        db.create_media(&link_media(group_id, "ride"), &tags(&["Bike", "FUNNY"]))
            .unwrap();
        db.create_media(&link_media(group_id, "trip"), &tags(&["Travel"]))
            .unwrap();
        db.create_media(&link_media(group_id, "untagged"), &[]).unwrap();

        let hits = db
            .list_group_media(group_id, Some("fun"), SearchMode::Substring)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "ride");

        let hits = db
            .list_group_media(group_id, Some("BIKE"), SearchMode::Substring)
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = db
            .list_group_media(group_id, Some("xyz"), SearchMode::Substring)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_term_returns_all_in_creation_order() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);
        db.create_media(&link_media(group_id, "first"), &[]).unwrap();
        db.create_media(&link_media(group_id, "second"), &[]).unwrap();

        let all = db
            .list_group_media(group_id, None, SearchMode::Substring)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "first");
        assert_eq!(all[1].name, "second");

        let all = db
            .list_group_media(group_id, Some("  "), SearchMode::Substring)
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn search_unknown_group_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.list_group_media(999, None, SearchMode::Substring),
            Err(StoreError::NotFound("group"))
        ));
    }

    #[test]
    fn fuzzy_mode_tolerates_typos() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);
        db.create_media(&link_media(group_id, "trip"), &tags(&["travel"]))
            .unwrap();

        // Transposition: distance 2 over length 6 is similarity 0.67.
        let hits = db
            .list_group_media(group_id, Some("travle"), SearchMode::Fuzzy)
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = db
            .list_group_media(group_id, Some("travle"), SearchMode::Substring)
            .unwrap();
        assert!(hits.is_empty());

        let hits = db
            .list_group_media(group_id, Some("zzzzzz"), SearchMode::Fuzzy)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn update_media_is_sparse() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);
        let media = db
            .create_media(&link_media(group_id, "ride"), &tags(&["Bike"]))
            .unwrap();

        let updated = db
            .update_media(
                media.id,
                &MediaPatch {
                    preview_link: Some("https://cdn.example.com/p.png".to_string()),
                    ..MediaPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.preview_link, "https://cdn.example.com/p.png");
        assert_eq!(updated.name, "ride");
        assert_eq!(updated.link, media.link);
        assert_eq!(updated.tags, tags(&["Bike"]));
    }

    #[test]
    fn update_missing_media_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_media(42, &MediaPatch::default()),
            Err(StoreError::NotFound("media"))
        ));
    }

    #[test]
    fn delete_media_keeps_shared_tags() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);
        let first = db
            .create_media(&link_media(group_id, "one"), &tags(&["fall"]))
            .unwrap();
        let second = db
            .create_media(&link_media(group_id, "two"), &tags(&["fall"]))
            .unwrap();

        db.delete_media(first.id).unwrap();

        assert!(matches!(
            db.get_media(first.id),
            Err(StoreError::NotFound("media"))
        ));
        assert_eq!(db.get_media(second.id).unwrap().tags, tags(&["fall"]));
        assert!(db.get_tag("fall").is_ok());
    }

    #[test]
    fn reverse_lookup_by_tag() {
        let mut db = Database::open_in_memory().unwrap();
        let group_id = seeded_group(&mut db);
        db.create_media(&link_media(group_id, "one"), &tags(&["fall", "Bike"]))
            .unwrap();
        db.create_media(&link_media(group_id, "two"), &tags(&["FALL"]))
            .unwrap();
        db.create_media(&link_media(group_id, "three"), &tags(&["Travel"]))
            .unwrap();

        let hits = db.list_media_by_tag("Fall").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "one");
        assert_eq!(hits[1].name, "two");
    }
}

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use stashpad_types::content::{ChecklistItem, clean_checklist, make_preview, normalize_tag_name, parse_checklist};

use crate::Database;
use crate::error::{StoreError, is_constraint_violation};
use crate::models::{
    CollectionRow, CollectionSummary, StashDraft, StashFilter, StashRow, TagRemoval, TagSummary,
    UserRow,
};
use crate::time;

impl Database {
    // -- Users --

    /// A username or email that is already taken is `StoreError::DuplicateUser`.
    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        let now = time::now();
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, username, normalize_email(email), password_hash, now],
            ) {
                Err(e) if is_constraint_violation(&e) => Err(StoreError::DuplicateUser.into()),
                other => other.map(|_| ()).map_err(Into::into),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Email lookups ignore case.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let email = normalize_email(email);
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        Ok(self.get_user_by_username(username)?.is_some())
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        Ok(self.get_user_by_email(email)?.is_some())
    }

    /// Returns `false` when the address was already verified.
    pub fn mark_email_verified(&self, user_id: &str) -> Result<bool> {
        let now = time::now();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET email_verified = 1, email_verified_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND email_verified = 0",
                params![now, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_password_hash(&self, user_id: &str, password_hash: &str) -> Result<()> {
        let now = time::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password = ?1, updated_at = ?2 WHERE id = ?3",
                params![password_hash, now, user_id],
            )?;
            Ok(())
        })
    }

    /// Deletes the user with their stashes, collections and relays, then
    /// prunes tags nobody references any more.
    pub fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let tag_ids = collect_ids(
                tx,
                "SELECT DISTINCT st.tag_id FROM stash_tags st
                 JOIN stashes s ON s.id = st.stash_id
                 WHERE s.user_id = ?1",
                user_id,
            )?;
            let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
            prune_orphan_tags(tx, &tag_ids)?;
            Ok(deleted > 0)
        })
    }

    // -- Collections --

    pub fn create_collection(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<CollectionRow> {
        let now = time::now();
        self.with_conn_mut(|conn| {
            let id = match insert_collection(conn, user_id, name, description, &now) {
                Err(e) if e.downcast_ref::<rusqlite::Error>().is_some_and(is_constraint_violation) => {
                    return Err(StoreError::DuplicateCollection(name.to_string()).into());
                }
                other => other?,
            };
            Ok(CollectionRow {
                id,
                user_id: user_id.to_string(),
                name: name.to_string(),
                description: description.map(str::to_string),
                created_at: now,
            })
        })
    }

    /// Newest first, with the number of the owner's stashes in each.
    pub fn list_collections(&self, user_id: &str) -> Result<Vec<CollectionSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.user_id, c.name, c.description, c.created_at, COUNT(s.id)
                 FROM collections c
                 LEFT JOIN stashes s ON s.collection_id = c.id AND s.user_id = c.user_id
                 WHERE c.user_id = ?1
                 GROUP BY c.id
                 ORDER BY c.created_at DESC, c.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(CollectionSummary {
                        collection: collection_from_row(row)?,
                        stash_count: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Stashes in the collection are detached, not deleted. Returns the name
    /// of the deleted collection.
    pub fn delete_collection(&self, user_id: &str, collection_id: i64) -> Result<Option<String>> {
        self.with_tx(|tx| {
            let Some(collection) = owned_collection(tx, user_id, collection_id)? else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE stashes SET collection_id = NULL WHERE collection_id = ?1",
                [collection_id],
            )?;
            tx.execute("DELETE FROM collections WHERE id = ?1", [collection_id])?;
            Ok(Some(collection.name))
        })
    }

    // -- Tags --

    /// Tags on the user's stashes, by name, with per-user stash counts.
    pub fn list_tags(&self, user_id: &str) -> Result<Vec<TagSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name, COUNT(s.id)
                 FROM tags t
                 JOIN stash_tags st ON st.tag_id = t.id
                 JOIN stashes s ON s.id = st.stash_id
                 WHERE s.user_id = ?1
                 GROUP BY t.id
                 ORDER BY t.name",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(TagSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        stash_count: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Tags are global, so a user can only detach a tag from their own
    /// stashes. The tag row goes away once nothing references it.
    pub fn remove_tag_for_user(&self, user_id: &str, tag_id: i64) -> Result<TagRemoval> {
        self.with_tx(|tx| {
            let detached = tx.execute(
                "DELETE FROM stash_tags
                 WHERE tag_id = ?1 AND stash_id IN (SELECT id FROM stashes WHERE user_id = ?2)",
                params![tag_id, user_id],
            )?;
            if detached == 0 {
                return Ok(TagRemoval::NotFound);
            }
            if prune_orphan_tags(tx, &[tag_id])? > 0 {
                Ok(TagRemoval::Deleted)
            } else {
                Ok(TagRemoval::Detached)
            }
        })
    }

    // -- Stashes --

    pub fn create_stash(&self, user_id: &str, draft: &StashDraft) -> Result<StashRow> {
        let preview_length = self.preview_length;
        self.with_tx(|tx| {
            if let Some(collection_id) = draft.collection_id {
                if owned_collection(tx, user_id, collection_id)?.is_none() {
                    return Err(anyhow::Error::from(StoreError::CollectionNotFound(collection_id)));
                }
            }
            let id = uuid::Uuid::new_v4().to_string();
            let now = time::now();
            insert_stash(tx, &id, user_id, draft, preview_length, &now, &now)?;
            set_stash_tags(tx, &id, &draft.tags)?;
            load_stash(tx, user_id, &id)?.ok_or_else(|| anyhow::anyhow!("Stash {} vanished after insert", id))
        })
    }

    pub fn get_stash(&self, user_id: &str, stash_id: &str) -> Result<Option<StashRow>> {
        self.with_conn(|conn| load_stash(conn, user_id, stash_id))
    }

    pub fn list_stashes(&self, user_id: &str, filter: &StashFilter) -> Result<Vec<StashRow>> {
        self.with_conn(|conn| load_stashes(conn, user_id, filter))
    }

    /// Replaces every writable field. The preview is recomputed from the new
    /// body and tags that lose their last stash are pruned.
    pub fn update_stash(&self, user_id: &str, stash_id: &str, draft: &StashDraft) -> Result<Option<StashRow>> {
        let preview_length = self.preview_length;
        self.with_tx(|tx| {
            if let Some(collection_id) = draft.collection_id {
                if owned_collection(tx, user_id, collection_id)?.is_none() {
                    return Err(anyhow::Error::from(StoreError::CollectionNotFound(collection_id)));
                }
            }
            let checklist = serde_json::to_string(&clean_checklist(&draft.checklist))?;
            let changed = tx.execute(
                "UPDATE stashes
                 SET title = ?1, body = ?2, checklist = ?3, preview = ?4, collection_id = ?5, updated_at = ?6
                 WHERE id = ?7 AND user_id = ?8",
                params![
                    clean_title(draft.title.as_deref()),
                    draft.body,
                    checklist,
                    make_preview(&draft.body, preview_length),
                    draft.collection_id,
                    time::now(),
                    stash_id,
                    user_id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            set_stash_tags(tx, stash_id, &draft.tags)?;
            load_stash(tx, user_id, stash_id)
        })
    }

    pub fn update_checklist(&self, user_id: &str, stash_id: &str, items: &[ChecklistItem]) -> Result<bool> {
        let checklist = serde_json::to_string(&clean_checklist(items))?;
        let now = time::now();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE stashes SET checklist = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![checklist, now, stash_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_stash(&self, user_id: &str, stash_id: &str) -> Result<bool> {
        self.with_tx(|tx| delete_owned_stash(tx, user_id, stash_id))
    }

    /// Ids the user does not own are ignored. Returns how many were deleted.
    pub fn bulk_delete_stashes(&self, user_id: &str, stash_ids: &[String]) -> Result<usize> {
        self.with_tx(|tx| {
            let mut deleted = 0;
            for id in stash_ids {
                if delete_owned_stash(tx, user_id, id)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    /// Moves the user's stashes into `collection_id` (or out of any
    /// collection). The target must belong to the user.
    pub fn bulk_move_stashes(
        &self,
        user_id: &str,
        stash_ids: &[String],
        collection_id: Option<i64>,
    ) -> Result<usize> {
        self.with_tx(|tx| {
            if let Some(collection_id) = collection_id {
                if owned_collection(tx, user_id, collection_id)?.is_none() {
                    return Err(anyhow::Error::from(StoreError::CollectionNotFound(collection_id)));
                }
            }
            let now = time::now();
            let mut moved = 0;
            for id in stash_ids {
                moved += tx.execute(
                    "UPDATE stashes SET collection_id = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                    params![collection_id, now, id, user_id],
                )?;
            }
            Ok(moved)
        })
    }
}

// -- Shared helpers (also used by snapshot and relay) --

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn clean_title(title: Option<&str>) -> Option<String> {
    title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

pub(crate) fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, email_verified, email_verified_at, created_at, updated_at
         FROM users WHERE {predicate}"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                email_verified: row.get(4)?,
                email_verified_at: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn collection_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectionRow> {
    Ok(CollectionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn owned_collection(
    conn: &Connection,
    user_id: &str,
    collection_id: i64,
) -> Result<Option<CollectionRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, name, description, created_at FROM collections
             WHERE id = ?1 AND user_id = ?2",
            params![collection_id, user_id],
            collection_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn collection_by_name(conn: &Connection, user_id: &str, name: &str) -> Result<Option<CollectionRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, name, description, created_at FROM collections
             WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
            collection_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn list_user_collections(conn: &Connection, user_id: &str) -> Result<Vec<CollectionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, description, created_at FROM collections
         WHERE user_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map([user_id], collection_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn insert_collection(
    conn: &Connection,
    user_id: &str,
    name: &str,
    description: Option<&str>,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO collections (user_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, name, description, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_tag(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

pub(crate) fn insert_tag(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO tags (name, created_at) VALUES (?1, ?2)",
        params![name, time::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Tag id for a normalised name, creating the tag if needed.
pub(crate) fn ensure_tag(conn: &Connection, name: &str) -> Result<i64> {
    match find_tag(conn, name)? {
        Some(id) => Ok(id),
        None => insert_tag(conn, name),
    }
}

pub(crate) fn attach_tag(conn: &Connection, stash_id: &str, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO stash_tags (stash_id, tag_id) VALUES (?1, ?2)",
        params![stash_id, tag_id],
    )?;
    Ok(())
}

/// Deletes each given tag that no stash references. Returns how many went.
pub(crate) fn prune_orphan_tags(conn: &Connection, tag_ids: &[i64]) -> Result<usize> {
    let mut pruned = 0;
    for tag_id in tag_ids {
        pruned += conn.execute(
            "DELETE FROM tags WHERE id = ?1
             AND NOT EXISTS (SELECT 1 FROM stash_tags WHERE tag_id = ?1)",
            [tag_id],
        )?;
    }
    if pruned > 0 {
        debug!("Pruned {} orphaned tags", pruned);
    }
    Ok(pruned)
}

/// Normalised, de-duplicated tag names in first-seen order.
pub(crate) fn unique_tag_names(names: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for name in names.iter().filter_map(|n| normalize_tag_name(n)) {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Replace the stash's tag set, creating missing tags and pruning the ones
/// that lost their last reference.
fn set_stash_tags(conn: &Connection, stash_id: &str, names: &[String]) -> Result<()> {
    let previous = collect_ids(conn, "SELECT tag_id FROM stash_tags WHERE stash_id = ?1", stash_id)?;
    conn.execute("DELETE FROM stash_tags WHERE stash_id = ?1", [stash_id])?;
    for name in unique_tag_names(names) {
        let tag_id = ensure_tag(conn, &name)?;
        attach_tag(conn, stash_id, tag_id)?;
    }
    prune_orphan_tags(conn, &previous)?;
    Ok(())
}

fn collect_ids(conn: &Connection, sql: &str, key: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn delete_owned_stash(conn: &Connection, user_id: &str, stash_id: &str) -> Result<bool> {
    let tag_ids = collect_ids(conn, "SELECT tag_id FROM stash_tags WHERE stash_id = ?1", stash_id)?;
    let deleted = conn.execute(
        "DELETE FROM stashes WHERE id = ?1 AND user_id = ?2",
        params![stash_id, user_id],
    )?;
    if deleted > 0 {
        prune_orphan_tags(conn, &tag_ids)?;
    }
    Ok(deleted > 0)
}

/// Owner of a stash id, whoever it is.
pub(crate) fn stash_owner(conn: &Connection, stash_id: &str) -> Result<Option<String>> {
    let owner = conn
        .query_row("SELECT user_id FROM stashes WHERE id = ?1", [stash_id], |row| row.get(0))
        .optional()?;
    Ok(owner)
}

/// Insert the stash row only; tags are attached by the caller.
pub(crate) fn insert_stash(
    conn: &Connection,
    id: &str,
    user_id: &str,
    draft: &StashDraft,
    preview_length: usize,
    created_at: &str,
    updated_at: &str,
) -> Result<()> {
    let checklist = serde_json::to_string(&clean_checklist(&draft.checklist))?;
    conn.execute(
        "INSERT INTO stashes (id, user_id, title, body, checklist, preview, collection_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            user_id,
            clean_title(draft.title.as_deref()),
            draft.body,
            checklist,
            make_preview(&draft.body, preview_length),
            draft.collection_id,
            created_at,
            updated_at,
        ],
    )?;
    Ok(())
}

const STASH_SELECT: &str = "SELECT s.id, s.user_id, s.title, s.body, s.checklist, s.preview,
        s.collection_id, c.name, s.created_at, s.updated_at
     FROM stashes s
     LEFT JOIN collections c ON c.id = s.collection_id";

fn stash_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StashRow> {
    let checklist: Option<String> = row.get(4)?;
    Ok(StashRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        checklist: parse_checklist(checklist.as_deref()),
        preview: row.get(5)?,
        collection_id: row.get(6)?,
        collection_name: row.get(7)?,
        tags: Vec::new(),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub(crate) fn load_stash(conn: &Connection, user_id: &str, stash_id: &str) -> Result<Option<StashRow>> {
    let sql = format!("{STASH_SELECT} WHERE s.id = ?1 AND s.user_id = ?2");
    let Some(mut stash) = conn
        .query_row(&sql, params![stash_id, user_id], stash_from_row)
        .optional()?
    else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT t.name FROM stash_tags st JOIN tags t ON t.id = st.tag_id
         WHERE st.stash_id = ?1 ORDER BY t.name",
    )?;
    stash.tags = stmt
        .query_map([stash_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(Some(stash))
}

/// The user's stashes, newest first, with tags fetched in one batch.
pub(crate) fn load_stashes(conn: &Connection, user_id: &str, filter: &StashFilter) -> Result<Vec<StashRow>> {
    let sql = format!(
        "{STASH_SELECT}
         WHERE s.user_id = ?1
           AND (?2 IS NULL OR s.collection_id = ?2)
           AND (?3 IS NULL OR EXISTS (
                SELECT 1 FROM stash_tags st JOIN tags t ON t.id = st.tag_id
                WHERE st.stash_id = s.id AND t.name = ?3))
           AND (?4 IS NULL OR s.title LIKE ?4 OR s.body LIKE ?4 OR s.preview LIKE ?4)
         ORDER BY s.created_at DESC, s.id"
    );
    let tag = filter.tag.as_deref().and_then(normalize_tag_name);
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params![user_id, filter.collection_id, tag, search], stash_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut tag_map: HashMap<String, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT st.stash_id, t.name
         FROM stash_tags st
         JOIN tags t ON t.id = st.tag_id
         JOIN stashes s ON s.id = st.stash_id
         WHERE s.user_id = ?1
         ORDER BY t.name",
    )?;
    let pairs = stmt
        .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (stash_id, name) in pairs {
        tag_map.entry(stash_id).or_default().push(name);
    }
    for stash in &mut rows {
        stash.tags = tag_map.remove(&stash.id).unwrap_or_default();
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user(id: &str) -> Database {
        let db = Database::open_in_memory().unwrap().with_preview_length(10);
        db.create_user(id, id, &format!("{id}@example.com"), "hash").unwrap();
        db
    }

    fn draft(body: &str, tags: &[&str]) -> StashDraft {
        StashDraft {
            body: body.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..StashDraft::default()
        }
    }

    fn tag_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn duplicate_registration_is_a_store_error() {
        let db = db_with_user("alice");
        let err = db.create_user("alice-2", "alice", "other@example.com", "hash").unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::DuplicateUser)));
        let err = db.create_user("alice-3", "alice3", "ALICE@example.com", "hash").unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::DuplicateUser)));
    }

    #[test]
    fn email_lookup_ignores_case() {
        let db = db_with_user("alice");
        assert!(db.email_taken("ALICE@Example.com").unwrap());
        assert!(!db.email_taken("bob@example.com").unwrap());
    }

    #[test]
    fn email_verification_only_flips_once() {
        let db = db_with_user("alice");
        assert!(db.mark_email_verified("alice").unwrap());
        assert!(!db.mark_email_verified("alice").unwrap());
        assert!(db.get_user_by_id("alice").unwrap().unwrap().email_verified);
    }

    #[test]
    fn preview_is_refreshed_on_update() {
        let db = db_with_user("alice");
        let stash = db.create_stash("alice", &draft("short", &[])).unwrap();
        assert_eq!(stash.preview, "short");

        let updated = db
            .update_stash("alice", &stash.id, &draft("a much longer body", &[]))
            .unwrap()
            .unwrap();
        assert_eq!(updated.preview, "a much lon...");
        assert_eq!(updated.body, "a much longer body");
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let db = db_with_user("alice");
        let stash = db
            .create_stash("alice", &draft("body", &["Rust", "rust ", "  ", "sql"]))
            .unwrap();
        assert_eq!(stash.tags, vec!["rust", "sql"]);
        assert_eq!(tag_count(&db), 2);
    }

    #[test]
    fn orphaned_tags_are_pruned_when_stashes_change() {
        let db = db_with_user("alice");
        let first = db.create_stash("alice", &draft("one", &["shared", "solo"])).unwrap();
        db.create_stash("alice", &draft("two", &["shared"])).unwrap();
        assert_eq!(tag_count(&db), 2);

        db.update_stash("alice", &first.id, &draft("one", &["shared"])).unwrap();
        assert_eq!(tag_count(&db), 1);

        assert!(db.delete_stash("alice", &first.id).unwrap());
        assert_eq!(tag_count(&db), 1);
    }

    #[test]
    fn removing_a_tag_keeps_it_for_other_users() {
        let db = db_with_user("alice");
        db.create_user("bob", "bob", "bob@example.com", "hash").unwrap();
        db.create_stash("alice", &draft("a", &["work"])).unwrap();
        db.create_stash("bob", &draft("b", &["work"])).unwrap();
        let tag_id = db.list_tags("alice").unwrap()[0].id;

        assert_eq!(db.remove_tag_for_user("alice", tag_id).unwrap(), TagRemoval::Detached);
        assert!(db.list_tags("alice").unwrap().is_empty());
        assert_eq!(db.list_tags("bob").unwrap().len(), 1);

        assert_eq!(db.remove_tag_for_user("alice", tag_id).unwrap(), TagRemoval::NotFound);
        assert_eq!(db.remove_tag_for_user("bob", tag_id).unwrap(), TagRemoval::Deleted);
        assert_eq!(tag_count(&db), 0);
    }

    #[test]
    fn deleting_a_collection_detaches_its_stashes() {
        let db = db_with_user("alice");
        let collection = db.create_collection("alice", "Work", None).unwrap();
        let mut d = draft("body", &[]);
        d.collection_id = Some(collection.id);
        let stash = db.create_stash("alice", &d).unwrap();
        assert_eq!(stash.collection_name.as_deref(), Some("Work"));

        assert_eq!(db.delete_collection("alice", collection.id).unwrap().as_deref(), Some("Work"));
        let stash = db.get_stash("alice", &stash.id).unwrap().unwrap();
        assert_eq!(stash.collection_id, None);
    }

    #[test]
    fn collection_names_are_scoped_per_user() {
        let db = db_with_user("alice");
        db.create_user("bob", "bob", "bob@example.com", "hash").unwrap();
        db.create_collection("alice", "Work", None).unwrap();
        db.create_collection("bob", "Work", None).unwrap();
        let err = db.create_collection("alice", "Work", None).unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::DuplicateCollection(_))));
    }

    #[test]
    fn stashes_in_foreign_collections_are_refused() {
        let db = db_with_user("alice");
        db.create_user("bob", "bob", "bob@example.com", "hash").unwrap();
        let bobs = db.create_collection("bob", "Private", None).unwrap();
        let mut d = draft("body", &[]);
        d.collection_id = Some(bobs.id);
        let err = db.create_stash("alice", &d).unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::CollectionNotFound(_))));
    }

    #[test]
    fn list_filters_by_tag_collection_and_search() {
        let db = db_with_user("alice");
        let work = db.create_collection("alice", "Work", None).unwrap();
        let mut in_work = draft("Quarterly report", &["todo"]);
        in_work.collection_id = Some(work.id);
        db.create_stash("alice", &in_work).unwrap();
        db.create_stash("alice", &draft("grocery list", &["home"])).unwrap();

        let by_tag = db
            .list_stashes("alice", &StashFilter { tag: Some("TODO".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].tags, vec!["todo"]);

        let by_collection = db
            .list_stashes("alice", &StashFilter { collection_id: Some(work.id), ..Default::default() })
            .unwrap();
        assert_eq!(by_collection.len(), 1);

        let by_search = db
            .list_stashes("alice", &StashFilter { search: Some("GROCERY".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].tags, vec!["home"]);
    }

    #[test]
    fn bulk_actions_only_touch_own_stashes() {
        let db = db_with_user("alice");
        db.create_user("bob", "bob", "bob@example.com", "hash").unwrap();
        let mine = db.create_stash("alice", &draft("mine", &[])).unwrap();
        let theirs = db.create_stash("bob", &draft("theirs", &[])).unwrap();
        let ids = vec![mine.id.clone(), theirs.id.clone()];

        let work = db.create_collection("alice", "Work", None).unwrap();
        assert_eq!(db.bulk_move_stashes("alice", &ids, Some(work.id)).unwrap(), 1);
        assert_eq!(db.bulk_delete_stashes("alice", &ids).unwrap(), 1);
        assert!(db.get_stash("bob", &theirs.id).unwrap().is_some());
    }

    #[test]
    fn checklist_update_is_normalised() {
        let db = db_with_user("alice");
        let stash = db.create_stash("alice", &draft("body", &[])).unwrap();
        let items = vec![
            ChecklistItem { text: "  ".into(), done: true },
            ChecklistItem { text: " milk ".into(), done: false },
        ];
        assert!(db.update_checklist("alice", &stash.id, &items).unwrap());
        let stash = db.get_stash("alice", &stash.id).unwrap().unwrap();
        assert_eq!(stash.checklist, vec![ChecklistItem { text: "milk".into(), done: false }]);
    }

    #[test]
    fn deleting_a_user_cascades_and_prunes_tags() {
        let db = db_with_user("alice");
        db.create_collection("alice", "Work", None).unwrap();
        db.create_stash("alice", &draft("body", &["mine"])).unwrap();

        assert!(db.delete_user("alice").unwrap());
        assert_eq!(tag_count(&db), 0);
        assert!(db.list_collections("alice").unwrap().is_empty());
    }
}

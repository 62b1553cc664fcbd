//! Export of a user's data to a portable [`Snapshot`] and reconciliation of
//! a snapshot back into the store.
//!
//! Collections and tags are matched by name because their ids mean nothing
//! outside the database that wrote them. Stashes are matched by id, which
//! makes re-importing the same snapshot a no-op.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use stashpad_types::content::{checklist_from_value, normalize_tag_name};
use stashpad_types::snapshot::{
    ImportReport, SNAPSHOT_VERSION, Snapshot, SnapshotCollection, SnapshotStash, SnapshotTag,
    SnapshotUser, snapshot_id_key,
};

use crate::Database;
use crate::models::{StashDraft, StashFilter, StashRow};
use crate::queries::{
    attach_tag, collection_by_name, find_tag, insert_collection, insert_stash, insert_tag,
    list_user_collections, load_stashes, query_user, stash_owner,
};
use crate::time;

/// How an incoming stash id relates to what the store already holds.
#[derive(Debug, PartialEq, Eq)]
enum StashIdDecision {
    /// The importing user already owns this id.
    AlreadyImported,
    /// Another user owns this id; the row gets a fresh one.
    Remint(String),
    /// The id is free (or the snapshot had none and one was minted).
    Keep(String),
}

impl Database {
    /// Read-only snapshot of everything the user owns. Runs in one read
    /// transaction so the parts are consistent with each other.
    pub fn export_user_data(&self, user_id: &str) -> Result<Snapshot> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let snapshot = build_snapshot(&tx, user_id)?;
            tx.finish()?;
            Ok(snapshot)
        })
    }

    pub fn export_to_json(&self, user_id: &str) -> Result<String> {
        let snapshot = self.export_user_data(user_id)?;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Merge a snapshot into the user's data.
    ///
    /// Never fails outright: malformed input and storage errors come back as
    /// an unsuccessful report, and in both cases nothing was written.
    pub fn import_from_json(&self, user_id: &str, json: &str) -> ImportReport {
        let value: Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => return ImportReport::failed(format!("Invalid JSON: {e}")),
        };
        let snapshot: Snapshot = match serde_json::from_value(value) {
            Ok(snapshot) => snapshot,
            Err(e) => return ImportReport::failed(format!("Import failed: {e}")),
        };

        let preview_length = self.preview_length;
        match self.with_tx(|tx| merge_snapshot(tx, user_id, &snapshot, preview_length)) {
            Ok(report) => {
                info!(
                    "Import for {}: created {:?}, skipped {:?}",
                    user_id, report.created, report.skipped
                );
                report
            }
            Err(e) => {
                error!("Import for {} rolled back: {}", user_id, e);
                ImportReport::failed(format!("Import failed: {e}"))
            }
        }
    }
}

/// Human-readable single-stash document.
pub fn export_stash_to_text(stash: &StashRow) -> String {
    let title = stash.title.as_deref().unwrap_or(&stash.preview);
    let mut text = format!("# {title}\n\n");
    text.push_str(&format!("**Created:** {}\n", time::display_timestamp(&stash.created_at)));
    text.push_str(&format!("**Updated:** {}\n", time::display_timestamp(&stash.updated_at)));

    if let Some(collection) = &stash.collection_name {
        text.push_str(&format!("**Collection:** {collection}\n"));
    }
    if !stash.tags.is_empty() {
        text.push_str(&format!("**Tags:** {}\n", stash.tags.join(", ")));
    }
    if !stash.checklist.is_empty() {
        text.push_str("**Checklist:**\n");
        for item in &stash.checklist {
            let mark = if item.done { "x" } else { " " };
            text.push_str(&format!("- [{mark}] {}\n", item.text));
        }
    }

    text.push_str("\n---\n\n");
    text.push_str(&stash.body);
    text
}

fn build_snapshot(conn: &Connection, user_id: &str) -> Result<Snapshot> {
    let user = query_user(conn, "id = ?1", user_id)?.ok_or_else(|| anyhow!("User {} not found", user_id))?;

    let collections = list_user_collections(conn, user_id)?
        .into_iter()
        .map(|c| SnapshotCollection {
            id: Value::from(c.id),
            name: c.name,
            description: c.description,
            created_at: Some(c.created_at),
        })
        .collect();

    let mut stmt = conn.prepare(
        "SELECT DISTINCT t.id, t.name, t.created_at
         FROM tags t
         JOIN stash_tags st ON st.tag_id = t.id
         JOIN stashes s ON s.id = st.stash_id
         WHERE s.user_id = ?1
         ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map([user_id], |row| {
            Ok(SnapshotTag {
                id: Value::from(row.get::<_, i64>(0)?),
                name: row.get(1)?,
                created_at: Some(row.get(2)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stashes = load_stashes(conn, user_id, &StashFilter::default())?;
    stashes.reverse();
    let stashes = stashes
        .into_iter()
        .map(|s| SnapshotStash {
            id: Value::from(s.id),
            title: s.title,
            body: Some(s.body),
            text: None,
            checklist: Some(serde_json::to_value(&s.checklist).unwrap_or(Value::Array(Vec::new()))),
            preview: Some(s.preview),
            collection_id: s.collection_id.map(Value::from).unwrap_or(Value::Null),
            collection_name: s.collection_name,
            tags: s.tags,
            created_at: Some(s.created_at),
            updated_at: Some(s.updated_at),
        })
        .collect();

    Ok(Snapshot {
        version: Some(SNAPSHOT_VERSION.to_string()),
        exported_at: Some(time::now()),
        user: Some(SnapshotUser {
            username: user.username,
            email: user.email,
        }),
        collections,
        tags,
        stashes,
    })
}

fn merge_snapshot(
    conn: &Connection,
    user_id: &str,
    snapshot: &Snapshot,
    preview_length: usize,
) -> Result<ImportReport> {
    let mut report = ImportReport::succeeded();

    // Collections: reuse by name within the importing user's scope.
    let mut collection_map: HashMap<String, i64> = HashMap::new();
    for incoming in &snapshot.collections {
        let id = match collection_by_name(conn, user_id, &incoming.name)? {
            Some(existing) => {
                report.skipped.collections += 1;
                existing.id
            }
            None => {
                report.created.collections += 1;
                insert_collection(
                    conn,
                    user_id,
                    &incoming.name,
                    incoming.description.as_deref(),
                    &time::now(),
                )?
            }
        };
        if let Some(key) = snapshot_id_key(&incoming.id) {
            collection_map.insert(key, id);
        }
    }

    // Tags are global: match by name regardless of who created them.
    let mut tag_map: HashMap<String, i64> = HashMap::new();
    for incoming in &snapshot.tags {
        let Some(name) = normalize_tag_name(&incoming.name) else {
            continue;
        };
        let id = match find_tag(conn, &name)? {
            Some(id) => {
                report.skipped.tags += 1;
                id
            }
            None => {
                report.created.tags += 1;
                insert_tag(conn, &name)?
            }
        };
        tag_map.insert(name, id);
    }

    for incoming in &snapshot.stashes {
        let incoming_id = snapshot_id_key(&incoming.id);
        let stash_id = match decide_stash_id(conn, user_id, incoming_id.as_deref())? {
            StashIdDecision::AlreadyImported => {
                report.skipped.stashes += 1;
                continue;
            }
            StashIdDecision::Remint(id) => {
                debug!("Stash id {:?} belongs to another user, reminted as {}", incoming_id, id);
                id
            }
            StashIdDecision::Keep(id) => id,
        };

        let collection_id = match snapshot_id_key(&incoming.collection_id)
            .and_then(|key| collection_map.get(&key).copied())
        {
            Some(id) => Some(id),
            None => match incoming.collection_name.as_deref() {
                Some(name) => collection_by_name(conn, user_id, name)?.map(|c| c.id),
                None => None,
            },
        };

        let draft = StashDraft {
            title: incoming.title.clone(),
            body: incoming.effective_body(),
            checklist: checklist_from_value(incoming.checklist.as_ref()),
            collection_id,
            tags: Vec::new(),
        };

        let now = time::now();
        let created_at = restored_timestamp(incoming.created_at.as_deref()).unwrap_or_else(|| now.clone());
        let updated_at = restored_timestamp(incoming.updated_at.as_deref()).unwrap_or(now);
        insert_stash(conn, &stash_id, user_id, &draft, preview_length, &created_at, &updated_at)?;

        for name in incoming.tags.iter().filter_map(|n| normalize_tag_name(n)) {
            if let Some(tag_id) = tag_map.get(&name) {
                attach_tag(conn, &stash_id, *tag_id)?;
            }
        }

        report.created.stashes += 1;
    }

    Ok(report)
}

fn decide_stash_id(conn: &Connection, user_id: &str, incoming: Option<&str>) -> Result<StashIdDecision> {
    let Some(id) = incoming.map(str::trim).filter(|id| !id.is_empty()) else {
        return Ok(StashIdDecision::Keep(Uuid::new_v4().to_string()));
    };
    Ok(match stash_owner(conn, id)? {
        Some(owner) if owner == user_id => StashIdDecision::AlreadyImported,
        Some(_) => StashIdDecision::Remint(Uuid::new_v4().to_string()),
        None => StashIdDecision::Keep(id.to_string()),
    })
}

fn restored_timestamp(raw: Option<&str>) -> Option<String> {
    raw.and_then(time::parse_timestamp).map(time::format_timestamp)
}

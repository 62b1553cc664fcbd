//! Database row types. These map directly to SQLite rows and stay separate
//! from the stashpad-types API models to keep the DB layer independent.

use stashpad_types::content::ChecklistItem;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub email_verified: bool,
    pub email_verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CollectionRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub collection: CollectionRow,
    pub stash_count: i64,
}

#[derive(Debug, Clone)]
pub struct TagSummary {
    pub id: i64,
    pub name: String,
    pub stash_count: i64,
}

/// A stash with its checklist decoded and its tag names and collection name
/// joined in.
#[derive(Debug, Clone)]
pub struct StashRow {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub body: String,
    pub checklist: Vec<ChecklistItem>,
    pub preview: String,
    pub collection_id: Option<i64>,
    pub collection_name: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Writable stash fields. Preview is never part of a draft: it is always
/// derived from `body` on write.
#[derive(Debug, Clone, Default)]
pub struct StashDraft {
    pub title: Option<String>,
    pub body: String,
    pub checklist: Vec<ChecklistItem>,
    pub collection_id: Option<i64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default)]
pub struct StashFilter {
    pub collection_id: Option<i64>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

/// What happened when a user removed a tag from their stashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRemoval {
    /// The user has no stash carrying this tag.
    NotFound,
    /// Detached from the user's stashes; other users still use it.
    Detached,
    /// Detached and deleted because nothing references it any more.
    Deleted,
}

#[derive(Debug, Clone)]
pub struct RelaySessionRow {
    pub id: String,
    pub code: String,
    pub owner_id: String,
    pub title: String,
    pub prompt: Option<String>,
    pub is_closed: bool,
    pub max_entries: u32,
    pub created_at: String,
    pub closed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RelayEntryRow {
    pub id: i64,
    pub session_id: String,
    pub author_name: String,
    pub body: String,
    pub position: u32,
    pub created_at: String,
}

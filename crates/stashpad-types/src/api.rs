use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::ChecklistItem;
use crate::relay::RelayState;

// -- JWT Claims --

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

/// Claims of single-purpose links (email verification, password reset).
/// `pwd` pins the token to the password hash it was issued against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurposeClaims {
    pub sub: Uuid,
    pub purpose: String,
    pub pwd: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    /// Only issued when the server does not require email verification.
    pub token: Option<String>,
    pub verification_required: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// -- Stashes --

#[derive(Debug, Deserialize)]
pub struct StashRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub checklist: Option<Value>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChecklistRequest {
    #[serde(default)]
    pub checklist: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StashQuery {
    pub collection: Option<i64>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StashResponse {
    pub id: String,
    pub title: Option<String>,
    pub body: String,
    pub checklist: Vec<ChecklistItem>,
    pub preview: String,
    pub collection_id: Option<i64>,
    pub collection_name: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub stash_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMoveRequest {
    #[serde(default)]
    pub stash_ids: Vec<String>,
    #[serde(default)]
    pub collection_id: Option<i64>,
}

/// A single stash handed over by another user.
#[derive(Debug, Deserialize)]
pub struct SharedStashRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub checklist: Option<Value>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

// -- Collections & tags --

#[derive(Debug, Deserialize)]
pub struct CollectionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub stash_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub stash_count: i64,
}

// -- Relay --

#[derive(Debug, Deserialize)]
pub struct CreateRelayRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Number or numeric string; anything else falls back to the default.
    #[serde(default)]
    pub max_entries: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AppendEntryRequest {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RelayEntryResponse {
    pub position: u32,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub code: String,
    pub title: String,
    pub prompt: Option<String>,
    pub state: RelayState,
    pub is_closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub max_entries: u32,
    pub entry_count: u32,
    pub can_add: bool,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<RelayEntryResponse>,
}

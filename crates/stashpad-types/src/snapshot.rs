use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written into every exported snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Portable export/import document.
///
/// Every field is optional on the way in: snapshots may come from older
/// versions or other installations. Ids of collections and tags are kept as
/// raw JSON values because they are only meaningful inside the snapshot that
/// carries them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub exported_at: Option<String>,
    #[serde(default)]
    pub user: Option<SnapshotUser>,
    #[serde(default)]
    pub collections: Vec<SnapshotCollection>,
    #[serde(default)]
    pub tags: Vec<SnapshotTag>,
    #[serde(default)]
    pub stashes: Vec<SnapshotStash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotUser {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCollection {
    #[serde(default)]
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTag {
    #[serde(default)]
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotStash {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Body field of pre-1.0 snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub checklist: Option<Value>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub collection_id: Value,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SnapshotStash {
    /// Body, falling back to the legacy `text` field, then to empty.
    pub fn effective_body(&self) -> String {
        self.body
            .as_deref()
            .filter(|b| !b.is_empty())
            .or(self.text.as_deref().filter(|t| !t.is_empty()))
            .unwrap_or_default()
            .to_string()
    }
}

/// Map key for a snapshot-local id. `null` has no key.
pub fn snapshot_id_key(id: &Value) -> Option<String> {
    match id {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub collections: usize,
    pub stashes: usize,
    pub tags: usize,
}

/// Outcome of an import. A failed import never leaves rows behind, so its
/// counts are always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub success: bool,
    pub error: Option<String>,
    pub created: ImportCounts,
    pub skipped: ImportCounts,
}

impl ImportReport {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

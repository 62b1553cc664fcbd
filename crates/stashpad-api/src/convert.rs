use chrono::{DateTime, Utc};
use tracing::warn;

use stashpad_db::models::{CollectionSummary, StashRow, TagSummary};
use stashpad_db::relay::RelayView;
use stashpad_db::time;
use stashpad_types::api::{CollectionResponse, RelayEntryResponse, RelayResponse, StashResponse, TagResponse};

/// Stored timestamp as a `DateTime`; unreadable values are logged and shown
/// as the epoch rather than failing the whole response.
pub(crate) fn timestamp(raw: &str) -> DateTime<Utc> {
    time::parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Unparseable stored timestamp {:?}", raw);
        DateTime::<Utc>::UNIX_EPOCH
    })
}

pub(crate) fn stash_response(row: StashRow) -> StashResponse {
    StashResponse {
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
        id: row.id,
        title: row.title,
        body: row.body,
        checklist: row.checklist,
        preview: row.preview,
        collection_id: row.collection_id,
        collection_name: row.collection_name,
        tags: row.tags,
    }
}

pub(crate) fn collection_response(summary: CollectionSummary) -> CollectionResponse {
    let c = summary.collection;
    CollectionResponse {
        created_at: timestamp(&c.created_at),
        id: c.id,
        name: c.name,
        description: c.description,
        stash_count: summary.stash_count,
    }
}

pub(crate) fn tag_response(tag: TagSummary) -> TagResponse {
    TagResponse {
        id: tag.id,
        name: tag.name,
        stash_count: tag.stash_count,
    }
}

pub(crate) fn relay_response(view: RelayView) -> RelayResponse {
    let session = view.session;
    RelayResponse {
        code: session.code,
        title: session.title,
        prompt: session.prompt,
        state: view.state,
        is_closed: session.is_closed,
        closed_at: session.closed_at.as_deref().map(timestamp),
        max_entries: session.max_entries,
        entry_count: view.entries.len() as u32,
        can_add: view.can_add,
        is_owner: view.is_owner,
        created_at: timestamp(&session.created_at),
        entries: view
            .entries
            .into_iter()
            .map(|e| RelayEntryResponse {
                created_at: timestamp(&e.created_at),
                position: e.position,
                author_name: e.author_name,
                body: e.body,
            })
            .collect(),
    }
}

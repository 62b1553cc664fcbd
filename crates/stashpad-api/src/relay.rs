use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

use stashpad_db::relay::Contributor;
use stashpad_types::api::{AppendEntryRequest, Claims, CreateRelayRequest, RelayEntryResponse, RelayResponse};

use crate::auth::AppState;
use crate::convert::{relay_response, timestamp};
use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::run_db;

/// Requested capacity as the text the engine parses. Numbers and numeric
/// strings pass through; anything else means "use the default".
fn capacity_text(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

async fn view(state: &AppState, code: String, viewer: Option<String>) -> Result<RelayResponse, ApiError> {
    let view = run_db(state, move |db| db.view_relay(&code, viewer.as_deref())).await?;
    Ok(relay_response(view))
}

pub async fn create_relay(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRelayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub.to_string();
    let capacity = capacity_text(req.max_entries.as_ref());
    let viewer = owner_id.clone();
    let session = run_db(&state, move |db| {
        db.create_relay(&owner_id, req.title.as_deref(), req.prompt.as_deref(), capacity.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view(&state, session.code, Some(viewer)).await?)))
}

pub async fn create_relay_from_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stash_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub.to_string();
    let viewer = owner_id.clone();
    let session = run_db(&state, move |db| db.create_relay_from_stash(&owner_id, &stash_id)).await?;
    Ok((StatusCode::CREATED, Json(view(&state, session.code, Some(viewer)).await?)))
}

pub async fn view_relay(
    State(state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(code): Path<String>,
) -> Result<Json<RelayResponse>, ApiError> {
    let viewer = viewer.map(|claims| claims.sub.to_string());
    Ok(Json(view(&state, code, viewer).await?))
}

/// Signed-in contributors are credited by username; guests by the name they
/// typed, if any.
pub async fn append_entry(
    State(state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(code): Path<String>,
    Json(req): Json<AppendEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = run_db(&state, move |db| {
        let contributor = match &viewer {
            Some(claims) => Contributor::Member(&claims.username),
            None => Contributor::Guest(req.author_name.as_deref()),
        };
        db.append_entry(&code, contributor, &req.body)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RelayEntryResponse {
            created_at: timestamp(&entry.created_at),
            position: entry.position,
            author_name: entry.author_name,
            body: entry.body,
        }),
    ))
}

pub async fn close_relay(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<Json<RelayResponse>, ApiError> {
    let caller = claims.sub.to_string();
    let viewer = caller.clone();
    let session = run_db(&state, move |db| db.close_relay(&code, &caller)).await?;
    Ok(Json(view(&state, session.code, Some(viewer)).await?))
}

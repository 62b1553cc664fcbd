use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use stashpad_db::models::{StashDraft, StashFilter};
use stashpad_db::snapshot::export_stash_to_text;
use stashpad_types::api::{
    BulkDeleteRequest, BulkMoveRequest, ChecklistRequest, Claims, StashQuery, StashRequest, StashResponse,
};
use stashpad_types::content::{checklist_from_value, normalize_checklist};

use crate::auth::AppState;
use crate::convert::stash_response;
use crate::error::ApiError;
use crate::run_db;

fn draft_from_request(req: StashRequest) -> Result<StashDraft, ApiError> {
    if req.body.trim().is_empty() {
        return Err(ApiError::bad_request("body is required"));
    }
    Ok(StashDraft {
        title: req.title,
        checklist: checklist_from_value(req.checklist.as_ref()),
        body: req.body,
        collection_id: req.collection_id,
        tags: req.tags,
    })
}

pub async fn list_stashes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StashQuery>,
) -> Result<Json<Vec<StashResponse>>, ApiError> {
    let user_id = claims.sub.to_string();
    let filter = StashFilter {
        collection_id: query.collection,
        tag: query.tag,
        search: query.search,
    };
    let rows = run_db(&state, move |db| db.list_stashes(&user_id, &filter)).await?;
    Ok(Json(rows.into_iter().map(stash_response).collect()))
}

pub async fn create_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StashRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = draft_from_request(req)?;
    let user_id = claims.sub.to_string();
    let row = run_db(&state, move |db| db.create_stash(&user_id, &draft)).await?;
    info!("Stash {} created by {}", row.id, claims.username);
    Ok((StatusCode::CREATED, Json(stash_response(row))))
}

pub async fn get_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stash_id): Path<String>,
) -> Result<Json<StashResponse>, ApiError> {
    let user_id = claims.sub.to_string();
    run_db(&state, move |db| db.get_stash(&user_id, &stash_id))
        .await?
        .map(|row| Json(stash_response(row)))
        .ok_or(ApiError::NotFound("stash"))
}

pub async fn update_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stash_id): Path<String>,
    Json(req): Json<StashRequest>,
) -> Result<Json<StashResponse>, ApiError> {
    let draft = draft_from_request(req)?;
    let user_id = claims.sub.to_string();
    run_db(&state, move |db| db.update_stash(&user_id, &stash_id, &draft))
        .await?
        .map(|row| Json(stash_response(row)))
        .ok_or(ApiError::NotFound("stash"))
}

pub async fn update_checklist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stash_id): Path<String>,
    Json(req): Json<ChecklistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Value::Array(raw)) = req.checklist else {
        return Err(ApiError::bad_request("checklist must be a list"));
    };
    let items = normalize_checklist(&raw);
    let user_id = claims.sub.to_string();
    let response = json!({ "success": true, "checklist": &items });
    if !run_db(&state, move |db| db.update_checklist(&user_id, &stash_id, &items)).await? {
        return Err(ApiError::NotFound("stash"));
    }
    Ok(Json(response))
}

pub async fn delete_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stash_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = claims.sub.to_string();
    if run_db(&state, move |db| db.delete_stash(&user_id, &stash_id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("stash"))
    }
}

/// Markdown download of one stash.
pub async fn export_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stash_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let id = stash_id.clone();
    let row = run_db(&state, move |db| db.get_stash(&user_id, &id))
        .await?
        .ok_or(ApiError::NotFound("stash"))?;
    let text = export_stash_to_text(&row);
    let disposition = format!("attachment; filename=\"stash-{stash_id}.md\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    ))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.stash_ids.is_empty() {
        return Err(ApiError::bad_request("no stashes selected"));
    }
    let requested = req.stash_ids.len();
    let user_id = claims.sub.to_string();
    let deleted = run_db(&state, move |db| db.bulk_delete_stashes(&user_id, &req.stash_ids)).await?;
    if deleted != requested {
        warn!(
            "User {} asked to delete {} stashes but owns only {}",
            claims.sub, requested, deleted
        );
    }
    info!("User {} bulk-deleted {} stashes", claims.username, deleted);
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

pub async fn bulk_move(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkMoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.stash_ids.is_empty() {
        return Err(ApiError::bad_request("no stashes selected"));
    }
    let user_id = claims.sub.to_string();
    let moved = run_db(&state, move |db| db.bulk_move_stashes(&user_id, &req.stash_ids, req.collection_id))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(what) => ApiError::Forbidden(format!("{what} not found or not yours")),
            other => other,
        })?;
    info!("User {} bulk-moved {} stashes", claims.username, moved);
    Ok(Json(json!({ "success": true, "moved": moved })))
}

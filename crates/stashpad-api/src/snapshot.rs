use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use stashpad_db::models::StashDraft;
use stashpad_types::api::{Claims, SharedStashRequest};
use stashpad_types::content::checklist_from_value;
use stashpad_types::snapshot::ImportReport;

use crate::auth::AppState;
use crate::convert::stash_response;
use crate::error::ApiError;
use crate::run_db;

pub async fn export_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let json = run_db(&state, move |db| db.export_to_json(&user_id)).await?;
    info!("Data exported for {}", claims.username);

    let filename = format!("stashpad_export_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        json,
    ))
}

/// Body is the snapshot document itself, taken as raw bytes so that
/// malformed uploads, non-UTF-8 included, come back as a report.
pub async fn import_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let report = match String::from_utf8(body.to_vec()) {
        Ok(text) => {
            let user_id = claims.sub.to_string();
            run_db(&state, move |db| Ok::<_, ApiError>(db.import_from_json(&user_id, &text))).await?
        }
        Err(e) => ImportReport::failed(format!("Invalid JSON: {e}")),
    };
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(report)))
}

/// Save a stash someone shared with the caller. It lands outside any
/// collection.
pub async fn import_shared_stash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SharedStashRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.as_deref().map(str::trim).unwrap_or_default();
    if body.is_empty() {
        return Err(ApiError::bad_request("missing body"));
    }
    let draft = StashDraft {
        title: req.title,
        body: body.to_string(),
        checklist: checklist_from_value(req.checklist.as_ref()),
        collection_id: None,
        tags: req.tags.unwrap_or_default(),
    };

    let user_id = claims.sub.to_string();
    let row = run_db(&state, move |db| db.create_stash(&user_id, &draft)).await?;
    info!("Shared stash imported for {}: {}", claims.username, row.id);
    Ok((StatusCode::CREATED, Json(stash_response(row))))
}

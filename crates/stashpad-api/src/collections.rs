use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use stashpad_db::models::{CollectionSummary, TagRemoval};
use stashpad_types::api::{Claims, CollectionRequest, CollectionResponse, TagResponse};

use crate::auth::AppState;
use crate::convert::{collection_response, tag_response};
use crate::error::ApiError;
use crate::run_db;

const MAX_COLLECTION_NAME: usize = 100;

pub async fn list_collections(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<CollectionResponse>>, ApiError> {
    let user_id = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.list_collections(&user_id)).await?;
    Ok(Json(rows.into_iter().map(collection_response).collect()))
}

pub async fn create_collection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CollectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_COLLECTION_NAME {
        return Err(ApiError::bad_request(format!(
            "collection name must be 1-{MAX_COLLECTION_NAME} characters"
        )));
    }
    let description = req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

    let user_id = claims.sub.to_string();
    let collection = run_db(&state, move |db| db.create_collection(&user_id, &name, description.as_deref())).await?;
    info!("Collection {:?} created by {}", collection.name, claims.username);

    Ok((
        StatusCode::CREATED,
        Json(collection_response(CollectionSummary {
            collection,
            stash_count: 0,
        })),
    ))
}

/// Stashes inside are kept and simply leave the collection.
pub async fn delete_collection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(collection_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user_id = claims.sub.to_string();
    let name = run_db(&state, move |db| db.delete_collection(&user_id, collection_id))
        .await?
        .ok_or(ApiError::NotFound("collection"))?;
    info!("Collection {:?} deleted by {}", name, claims.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TagResponse>>, ApiError> {
    let user_id = claims.sub.to_string();
    let tags = run_db(&state, move |db| db.list_tags(&user_id)).await?;
    Ok(Json(tags.into_iter().map(tag_response).collect()))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tag_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let deleted = match run_db(&state, move |db| db.remove_tag_for_user(&user_id, tag_id)).await? {
        TagRemoval::NotFound => return Err(ApiError::NotFound("tag")),
        TagRemoval::Detached => false,
        TagRemoval::Deleted => true,
    };
    Ok(Json(serde_json::json!({ "success": true, "deleted": deleted })))
}

//! HTTP surface of Stashpad: auth, stash CRUD, snapshot import/export and
//! relay sessions, all as JSON over axum.

pub mod auth;
pub mod collections;
mod convert;
pub mod error;
pub mod health;
pub mod mailer;
pub mod middleware;
pub mod relay;
pub mod snapshot;
pub mod stashes;
pub mod tokens;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tracing::error;

use stashpad_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::{optional_auth, require_auth};

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_db<F, T, E>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("background task failed"))
        })?
        .map_err(Into::into)
}

/// Every route, without transport layers (CORS, tracing); the binary adds
/// those.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", post(auth::verify_email))
        .route("/auth/verify/resend", post(auth::resend_verification))
        .route("/auth/password/forgot", post(auth::forgot_password))
        .route("/auth/password/reset", post(auth::reset_password))
        .with_state(state.clone());

    let guest_routes = Router::new()
        .route("/relay/{code}", get(relay::view_relay))
        .route("/relay/{code}/entries", post(relay::append_entry))
        .layer(axum_middleware::from_fn_with_state(state.clone(), optional_auth))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/stashes", get(stashes::list_stashes).post(stashes::create_stash))
        .route(
            "/stashes/{stash_id}",
            get(stashes::get_stash).put(stashes::update_stash).delete(stashes::delete_stash),
        )
        .route("/stashes/{stash_id}/checklist", put(stashes::update_checklist))
        .route("/stashes/{stash_id}/export", get(stashes::export_stash))
        .route("/stashes/bulk/delete", post(stashes::bulk_delete))
        .route("/stashes/bulk/move", post(stashes::bulk_move))
        .route(
            "/collections",
            get(collections::list_collections).post(collections::create_collection),
        )
        .route("/collections/{collection_id}", delete(collections::delete_collection))
        .route("/tags", get(collections::list_tags))
        .route("/tags/{tag_id}", delete(collections::delete_tag))
        .route("/export", get(snapshot::export_data))
        .route("/import", post(snapshot::import_data))
        .route("/share/import", post(snapshot::import_shared_stash))
        .route("/relay", post(relay::create_relay))
        .route("/relay/from-stash/{stash_id}", post(relay::create_relay_from_stash))
        .route("/relay/{code}/close", post(relay::close_relay))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(guest_routes)
        .merge(protected_routes)
}

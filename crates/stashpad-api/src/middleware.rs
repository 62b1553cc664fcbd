use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use stashpad_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::tokens;

/// Signed-in user on routes where signing in is optional.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Claims>);

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = bearer_token(&req).and_then(|token| tokens::decode_session_token(&state.jwt_secret, token).ok());
    let Some(claims) = claims else {
        return ApiError::Unauthorized.into_response();
    };
    req.extensions_mut().insert(claims);
    next.run(req).await
}

/// Like [`require_auth`] but lets anonymous requests through. A present but
/// invalid token is still rejected so clients notice a stale session.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let viewer = match bearer_token(&req) {
        None => None,
        Some(token) => match tokens::decode_session_token(&state.jwt_secret, token) {
            Ok(claims) => Some(claims),
            Err(_) => return ApiError::Unauthorized.into_response(),
        },
    };
    req.extensions_mut().insert(Viewer(viewer));
    next.run(req).await
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use stashpad_db::{RelayError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Relay(RelayError),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::Relay(e) => {
                let status = match e {
                    RelayError::NotFound | RelayError::StashNotFound => StatusCode::NOT_FOUND,
                    RelayError::Closed | RelayError::Full => StatusCode::CONFLICT,
                    RelayError::EmptyBody | RelayError::TooLong(_) => StatusCode::BAD_REQUEST,
                    RelayError::NotOwner => StatusCode::FORBIDDEN,
                    RelayError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code())
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<StoreError>() {
            Ok(StoreError::CollectionNotFound(_)) => Self::NotFound("collection"),
            Ok(dup @ (StoreError::DuplicateCollection(_) | StoreError::DuplicateUser)) => Self::Conflict(dup.to_string()),
            Err(e) => Self::Internal(e),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

use thiserror::Error;

/// CRUD outcomes callers are expected to branch on. Carried inside
/// `anyhow::Error`; use `downcast_ref` to recover them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection {0} not found")]
    CollectionNotFound(i64),
    #[error("a collection named {0:?} already exists")]
    DuplicateCollection(String),
    #[error("username or email already registered")]
    DuplicateUser,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay not found")]
    NotFound,
    #[error("stash not found")]
    StashNotFound,
    #[error("relay is closed")]
    Closed,
    #[error("relay is full")]
    Full,
    #[error("entry is empty")]
    EmptyBody,
    #[error("entry is longer than {0} characters")]
    TooLong(usize),
    #[error("only the owner can do that")]
    NotOwner,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RelayError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.into())
    }
}

impl RelayError {
    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "relay_not_found",
            Self::StashNotFound => "stash_not_found",
            Self::Closed => "relay_closed",
            Self::Full => "relay_full",
            Self::EmptyBody => "empty_body",
            Self::TooLong(_) => "too_long",
            Self::NotOwner => "not_owner",
            Self::Storage(_) => "storage",
        }
    }

    pub(crate) fn is_constraint_violation(&self) -> bool {
        let Self::Storage(e) = self else {
            return false;
        };
        e.downcast_ref::<rusqlite::Error>()
            .is_some_and(is_constraint_violation)
    }
}

/// True when `e` is SQLite refusing a UNIQUE/foreign key/check constraint.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}

//! Wire types shared by the persistence layer and the HTTP surface.
//!
//! `content` holds the checklist/preview normalisation every stash write goes
//! through; `snapshot` is the portable export/import document.

pub mod api;
pub mod content;
pub mod relay;
pub mod snapshot;

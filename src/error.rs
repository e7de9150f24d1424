//! Per-module error taxonomy (spec §7).
//!
//! None of these are raised for user-caused conditions (missing/locked/
//! owned-by-another object, etc.) — those are structured results returned
//! by the action layer. These types cover class 2-5 failures: programmer
//! errors, resource failures, and invariant violations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {0} has unknown kind tag")]
    UnknownKind(String),
    #[error("object {0} is missing required property after migration: {1}")]
    IncompleteSchema(String, &'static str),
    #[error("crdt encode/decode failure: {0}")]
    Codec(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("clearAllSelections requested excludeDragging with no drag-state feed wired")]
    NoDragFeed,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("action error: {0}")]
    Action(#[from] ActionError),
    #[error("handler panicked: {0}")]
    HandlerPanic(String),
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("decode failed for {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("codec error: {0}")]
    Codec(String),
}

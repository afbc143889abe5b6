use thiserror::Error;

use crate::model::EntryId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("could not load seed menu from {source_name}: {reason}")]
    Seed { source_name: String, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("could not clear saved menu: {0}")]
    Clear(String),
    #[error("no free entry id after #{0}")]
    IdsExhausted(EntryId),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("entry #{0} not found")]
    NotFound(EntryId),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request failed: {0}")]
    Http(String),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("could not read response body: {0}")]
    Body(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Label is required")]
    EmptyLabel,
    #[error("Link must start with / or http(s)://")]
    InvalidHref,
    #[error("Parent ID must be a number")]
    InvalidParentId,
}

use crate::key::Key;
use crate::node::Kind;
use thiserror::Error;

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Node not found: {0}")]
    NotFound(Key),

    #[error("Node has no parent: {0}")]
    NoParent(Key),

    #[error("Offset {offset} is out of bounds for node {key} (length {len})")]
    OffsetOutOfBounds { key: Key, offset: isize, len: usize },

    #[error("Expected a document node, found {0:?}")]
    NotADocument(Kind),

    #[error("Duplicate node key: {0}")]
    DuplicateKey(Key),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid raw document: {0}")]
    InvalidRaw(String),
}

impl DocumentError {
    pub fn out_of_bounds(key: &Key, offset: isize, len: usize) -> Self {
        Self::OffsetOutOfBounds {
            key: key.clone(),
            offset,
            len,
        }
    }

    pub fn invalid_raw(message: impl Into<String>) -> Self {
        Self::InvalidRaw(message.into())
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        DocumentError::InvalidRaw(err.to_string())
    }
}

//! Error types for the editor

use folio_document::{DocumentError, Key};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Node not found: {0}")]
    NotFound(Key),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Normalization did not converge: rule {rule} still failing on {key} after {iterations} repairs")]
    NormalizationDivergence {
        rule: String,
        key: Key,
        iterations: usize,
    },

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Document error: {0}")]
    Document(DocumentError),
}

impl EditorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EditorError::InvalidOperation(message.into())
    }
}

impl From<DocumentError> for EditorError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound(key) => EditorError::NotFound(key),
            other => EditorError::Document(other),
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

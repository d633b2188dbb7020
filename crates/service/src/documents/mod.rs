//! Document store: where book entry records live.

pub mod firestore;
pub mod mock;

use async_trait::async_trait;
use models::{BookEntry, NewBookEntry};
use thiserror::Error;

use crate::google::TokenError;

pub use firestore::FirestoreDocumentStore;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),
    #[error("document store returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("document store unreachable: {0}")]
    Transport(String),
    #[error("malformed document: {0}")]
    Decode(String),
    #[error(transparent)]
    Auth(#[from] TokenError),
}

impl From<reqwest::Error> for DocumentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DocumentError::Decode(e.to_string())
        } else {
            DocumentError::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a record; the store assigns and returns the id.
    async fn create(&self, entry: &NewBookEntry) -> Result<BookEntry, DocumentError>;

    /// `Ok(None)` when no record has this id.
    async fn get(&self, id: &str) -> Result<Option<BookEntry>, DocumentError>;

    async fn delete(&self, id: &str) -> Result<(), DocumentError>;

    /// Every record in the collection, in store order.
    async fn list(&self) -> Result<Vec<BookEntry>, DocumentError>;
}

/// Ids are single path segments; anything else would address another
/// collection, a reserved name, or change the request URL.
pub fn validate_document_id(id: &str) -> Result<(), DocumentError> {
    let reserved = id.starts_with("__") && id.ends_with("__") && id.len() >= 4;
    let unsafe_char = id.chars().any(|c| c.is_control() || matches!(c, '/' | '?' | '#' | '%'));
    if id.is_empty() || unsafe_char || id == "." || id == ".." || reserved || id.len() > 1500 {
        return Err(DocumentError::InvalidId(id.to_string()));
    }
    Ok(())
}

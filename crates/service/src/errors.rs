use thiserror::Error;

use crate::documents::DocumentError;
use crate::media::MediaError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("model error: {0}")]
    Model(#[from] models::errors::ModelError),
    #[error("media upload failed: {0}")]
    MediaUpload(#[source] MediaError),
    #[error("media delete failed for {public_id}: {source}")]
    MediaDelete {
        public_id: String,
        #[source]
        source: MediaError,
    },
    #[error("signed url failed: {0}")]
    SignedUrl(#[source] MediaError),
    #[error("document store error: {0}")]
    Document(#[from] DocumentError),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }
}

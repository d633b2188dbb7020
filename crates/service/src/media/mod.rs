//! Media store: where signature images live.
//!
//! The remote implementation speaks the Cloudinary REST API; `mock` keeps
//! objects in memory and records every call in a [`CallJournal`].
//!
//! [`CallJournal`]: crate::journal::CallJournal

pub mod cloudinary;
pub mod mock;
pub mod signing;

use async_trait::async_trait;
use models::SignatureFile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cloudinary::CloudinaryMediaStore;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid public id: {0:?}")]
    InvalidPublicId(String),
    #[error("media host returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("media host unreachable: {0}")]
    Transport(String),
    #[error("unexpected media host response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            MediaError::Decode(e.to_string())
        } else {
            MediaError::Transport(e.to_string())
        }
    }
}

/// Result of a successful upload; `public_id` is what the record stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub public_id: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestroyOutcome {
    Deleted,
    /// The host had no such object; callers treat this as done.
    NotFound,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the image with authenticated (signed-URL only) access.
    async fn upload(&self, file: &SignatureFile) -> Result<UploadedMedia, MediaError>;

    async fn destroy(&self, public_id: &str) -> Result<DestroyOutcome, MediaError>;

    /// Build a time-boxed delivery URL. Pure computation, no network.
    fn signed_url(&self, public_id: &str, timestamp: i64) -> Result<String, MediaError>;
}

/// Reject ids that cannot be embedded in a delivery URL path.
pub fn validate_public_id(public_id: &str) -> Result<(), MediaError> {
    let bad = public_id.is_empty()
        || public_id.starts_with('/')
        || public_id.ends_with('/')
        || public_id.chars().any(|c| c.is_whitespace() || c.is_control() || c == '?' || c == '#')
        || public_id.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(MediaError::InvalidPublicId(public_id.to_string()));
    }
    Ok(())
}

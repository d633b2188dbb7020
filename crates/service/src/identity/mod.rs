//! Caller identity: bearer token in, verified identity out.

pub mod firebase;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use firebase::FirebaseIdentityVerifier;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("no signing key for kid {0:?}")]
    UnknownKey(String),
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

/// Decoded caller, attached to the request after the auth gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub auth_time: Option<i64>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;
}

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the reported expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("cannot read service account key: {0}")]
    Io(String),
    #[error("malformed service account key: {0}")]
    Parse(String),
    #[error("cannot sign token assertion: {0}")]
    Signing(String),
    #[error("token endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
}

fn default_token_uri() -> String { "https://oauth2.googleapis.com/token".into() }

/// The JSON key file downloaded for a service account.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, TokenError> {
        let key: Self = serde_json::from_str(json).map_err(|e| TokenError::Parse(e.to_string()))?;
        if key.project_id.trim().is_empty() || key.client_email.trim().is_empty() {
            return Err(TokenError::Parse("project_id and client_email are required".into()));
        }
        Ok(key)
    }

    pub async fn from_file(path: &str) -> Result<Self, TokenError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TokenError::Io(format!("{path}: {e}")))?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

pub(crate) fn assertion_claims(key: &ServiceAccountKey, scope: &str, now: DateTime<Utc>) -> AssertionClaims {
    let iat = now.timestamp();
    AssertionClaims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri.clone(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    }
}

pub(crate) fn sign_assertion(key: &ServiceAccountKey, claims: &AssertionClaims) -> Result<String, TokenError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| TokenError::Signing(e.to_string()))?;
    encode(&header, claims, &encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
}

/// Supplies bearer tokens for outbound calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, TokenError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 { ASSERTION_LIFETIME_SECS }

/// OAuth2 JWT-bearer flow with an in-process token cache.
///
/// Concurrent refreshes may each hit the token endpoint; the last one wins.
pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    key: ServiceAccountKey,
    scope: String,
    cached: ArcSwapOption<CachedToken>,
}

impl ServiceAccountTokenSource {
    pub fn new(client: reqwest::Client, key: ServiceAccountKey, scope: impl Into<String>) -> Self {
        Self { client, key, scope: scope.into(), cached: ArcSwapOption::from(None) }
    }

    fn cached_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.cached
            .load_full()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.token.clone())
    }

    #[instrument(skip(self), fields(client_email = %self.key.client_email))]
    async fn refresh(&self) -> Result<String, TokenError> {
        let now = Utc::now();
        let assertion = sign_assertion(&self.key, &assertion_claims(&self.key, &self.scope, now))?;
        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(TokenError::Endpoint { status, message });
        }
        let body: TokenResponse = resp.json().await.map_err(|e| TokenError::Parse(e.to_string()))?;
        let expires_at = now + Duration::seconds(body.expires_in);
        debug!(%expires_at, "access token refreshed");
        self.cached.store(Some(Arc::new(CachedToken { token: body.access_token.clone(), expires_at })));
        Ok(body.access_token)
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.cached_token(Utc::now()) {
            return Ok(token);
        }
        self.refresh().await
    }
}

/// Fixed token, for emulators and tests.
pub struct StaticTokenSource(pub String);

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

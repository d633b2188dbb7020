use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Identity, IdentityError, IdentityVerifier};

const JWKS_CACHE_KEY: &str = "jwks";
const JWKS_TTL: Duration = Duration::from_secs(3600);
/// Minimum gap between key set fetches triggered by unknown kids.
const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    auth_time: Option<i64>,
}

/// Verifies Firebase Authentication ID tokens against Google's published
/// signing keys. The key set is cached and refetched when a token names a
/// kid the cached set does not know, at most once per [`REFRESH_COOLDOWN`].
pub struct FirebaseIdentityVerifier {
    client: reqwest::Client,
    jwks_url: String,
    project_id: String,
    keys: Cache<&'static str, Arc<JwkSet>>,
    /// Present while the last fetch is younger than the cooldown.
    recently_fetched: Cache<&'static str, ()>,
}

impl FirebaseIdentityVerifier {
    pub fn new(client: reqwest::Client, jwks_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        let keys = Cache::builder().max_capacity(1).time_to_live(JWKS_TTL).build();
        let recently_fetched = Cache::builder().max_capacity(1).time_to_live(REFRESH_COOLDOWN).build();
        Self { client, jwks_url: jwks_url.into(), project_id: project_id.into(), keys, recently_fetched }
    }

    /// Seed the key cache, skipping the first fetch.
    pub async fn preload(&self, jwks: JwkSet) {
        self.keys.insert(JWKS_CACHE_KEY, Arc::new(jwks)).await;
    }

    async fn fetch_keys(client: reqwest::Client, url: String) -> Result<Arc<JwkSet>, IdentityError> {
        let resp = client
            .get(&url)
            .send()
            .await
            .map_err(|e| IdentityError::KeysUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(IdentityError::KeysUnavailable(format!("{url} returned {}", resp.status())));
        }
        let set: JwkSet = resp
            .json()
            .await
            .map_err(|e| IdentityError::KeysUnavailable(e.to_string()))?;
        debug!(keys = set.keys.len(), "identity signing keys fetched");
        Ok(Arc::new(set))
    }

    async fn key_set(&self) -> Result<Arc<JwkSet>, IdentityError> {
        let client = self.client.clone();
        let url = self.jwks_url.clone();
        let recently_fetched = self.recently_fetched.clone();
        let fetch = async move {
            let set = Self::fetch_keys(client, url).await?;
            recently_fetched.insert(JWKS_CACHE_KEY, ()).await;
            Ok::<_, IdentityError>(set)
        };
        self.keys
            .try_get_with(JWKS_CACHE_KEY, fetch)
            .await
            .map_err(|e| IdentityError::KeysUnavailable(e.to_string()))
    }

    /// Claims the refresh slot; false while the cooldown from the last fetch runs.
    async fn may_refresh(&self) -> bool {
        self.recently_fetched.entry(JWKS_CACHE_KEY).or_insert(()).await.is_fresh()
    }
}

/// Check signature, expiry, audience and issuer of a Firebase ID token.
pub fn decode_identity(token: &str, keys: &JwkSet, project_id: &str) -> Result<Identity, IdentityError> {
    let header = decode_header(token).map_err(|e| IdentityError::Invalid(e.to_string()))?;
    if header.alg != Algorithm::RS256 {
        return Err(IdentityError::Invalid(format!("unexpected alg {:?}", header.alg)));
    }
    let kid = header.kid.ok_or_else(|| IdentityError::Invalid("missing kid".into()))?;
    let jwk = keys.find(&kid).ok_or_else(|| IdentityError::UnknownKey(kid.clone()))?;
    let key = DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::Invalid(e.to_string()))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = LEEWAY_SECS;
    validation.set_audience(&[project_id]);
    validation.set_issuer(&[format!("https://securetoken.google.com/{project_id}")]);
    validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

    let data = decode::<FirebaseClaims>(token, &key, &validation)
        .map_err(|e| IdentityError::Invalid(e.to_string()))?;
    let claims = data.claims;
    if claims.sub.trim().is_empty() {
        return Err(IdentityError::Invalid("empty subject".into()));
    }
    if let Some(auth_time) = claims.auth_time {
        let now = chrono::Utc::now().timestamp();
        if auth_time > now + LEEWAY_SECS as i64 {
            return Err(IdentityError::Invalid("auth_time in the future".into()));
        }
    }
    Ok(Identity { uid: claims.sub, email: claims.email, auth_time: claims.auth_time })
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentityVerifier {
    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let keys = self.key_set().await?;
        match decode_identity(token, &keys, &self.project_id) {
            Err(IdentityError::UnknownKey(kid)) => {
                if !self.may_refresh().await {
                    debug!(%kid, "unknown signing key; key set fetched recently");
                    return Err(IdentityError::UnknownKey(kid));
                }
                warn!(%kid, "unknown signing key; refreshing key set");
                self.keys.invalidate(JWKS_CACHE_KEY).await;
                let keys = self.key_set().await?;
                decode_identity(token, &keys, &self.project_id)
            }
            other => other,
        }
    }
}

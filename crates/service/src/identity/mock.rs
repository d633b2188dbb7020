//! Fixed token table for tests and local wiring.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{Identity, IdentityError, IdentityVerifier};

#[derive(Default, Clone)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self { Self::default() }

    pub fn with_token(mut self, token: &str, uid: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity { uid: uid.to_string(), email: None, auth_time: None },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid("unknown token".into()))
    }
}

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use service::identity::IdentityVerifier;
use service::GuestbookService;
use tracing::{debug, warn};

use crate::errors::JsonApiError;
use crate::observability::AUTH_REJECTED_TOTAL;

pub const TOKEN_MISSING: &str = "Unauthorized: Token missing or invalid format";
pub const TOKEN_INVALID: &str = "Unauthorized: Invalid token";

#[derive(Clone)]
pub struct ServerState {
    pub guestbook: Arc<GuestbookService>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// `Authorization: Bearer <token>` with a non-empty token, else `None`.
fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Route layer for the entry routes: verify the bearer token and attach the
/// caller's `Identity` to the request extensions.
pub async fn require_bearer_token(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, JsonApiError> {
    let path = req.uri().path().to_string();

    let Some(token) = bearer_token(&req).map(str::to_string) else {
        warn!(path = %path, "missing or malformed Authorization header");
        AUTH_REJECTED_TOTAL.inc();
        return Err(JsonApiError::unauthorized(TOKEN_MISSING));
    };

    match state.verifier.verify(&token).await {
        Ok(identity) => {
            debug!(path = %path, uid = %identity.uid, "caller authenticated");
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        Err(e) => {
            warn!(path = %path, error = %e, "token verification failed");
            AUTH_REJECTED_TOTAL.inc();
            Err(JsonApiError::unauthorized(TOKEN_INVALID))
        }
    }
}

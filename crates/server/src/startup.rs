use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use configs::AppConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::observability;
use crate::routes::{self, auth::ServerState, RouterOptions};
use service::documents::FirestoreDocumentStore;
use service::google::{ServiceAccountKey, ServiceAccountTokenSource};
use service::google::service_account::DATASTORE_SCOPE;
use service::identity::FirebaseIdentityVerifier;
use service::media::CloudinaryMediaStore;
use service::{http, runtime, GuestbookService};

/// CORS from `server.cors_origins`; a `*` entry allows any origin.
pub fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Wire the remote collaborators from configuration.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<ServerState> {
    let client = http::build_client(&cfg.http)?;

    let key = ServiceAccountKey::from_file(&cfg.firebase.service_account_path).await?;
    let project_id = cfg
        .firebase
        .project_id
        .clone()
        .unwrap_or_else(|| key.project_id.clone());
    info!(%project_id, collection = %cfg.firebase.collection, "document store configured");

    let tokens = Arc::new(ServiceAccountTokenSource::new(client.clone(), key, DATASTORE_SCOPE));
    let documents = Arc::new(FirestoreDocumentStore::new(
        client.clone(),
        tokens,
        &cfg.firebase.firestore_base_url,
        &project_id,
        &cfg.firebase.collection,
    ));
    let media = Arc::new(CloudinaryMediaStore::new(client.clone(), cfg.media.clone()));
    let verifier = Arc::new(FirebaseIdentityVerifier::new(client, cfg.firebase.jwks_url.clone(), project_id));

    Ok(ServerState {
        guestbook: Arc::new(GuestbookService::new(media, documents)),
        verifier,
    })
}

pub fn build_app(state: ServerState, cfg: &AppConfig) -> Router {
    let opts = RouterOptions {
        static_dir: cfg.server.static_dir.clone(),
        max_upload_bytes: cfg.server.max_upload_bytes,
    };
    routes::build_router(state, build_cors(&cfg.server.cors_origins), &opts)
}

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    runtime::ensure_env(&cfg.server.static_dir, Some(&cfg.firebase.service_account_path))
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;
    observability::register_all();

    let state = build_state(&cfg)
        .await
        .map_err(|e| StartupError::InvalidConfig(format!("{e:#}")))?;
    let app = build_app(state, &cfg);

    let _admin = match cfg.server.admin_addr.as_deref() {
        Some(addr) => Some(common::admin_http::spawn_admin_server(addr).await?),
        None => None,
    };

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, static_dir = %cfg.server.static_dir, "guestbook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

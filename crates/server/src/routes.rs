pub mod auth;
pub mod entries;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;

use crate::openapi::ApiDoc;
use auth::ServerState;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (axum::http::StatusCode, String) {
    common::admin_http::encode_metrics()
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Router knobs that come from configuration rather than state.
#[derive(Clone, Debug)]
pub struct RouterOptions {
    pub static_dir: String,
    pub max_upload_bytes: usize,
}

/// Build the full application router: public routes, the authenticated entry
/// routes and the SPA fallback.
pub fn build_router(state: ServerState, cors: CorsLayer, opts: &RouterOptions) -> Router {
    let index = format!("{}/index.html", opts.static_dir.trim_end_matches('/'));
    let static_files = ServeDir::new(&opts.static_dir).fallback(ServeFile::new(index));

    // Public routes
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/signed-url", get(entries::signed_url_missing))
        .route("/signed-url/", get(entries::signed_url_missing))
        .route("/signed-url/*public_id", get(entries::signed_url));

    // Bearer-protected entry routes
    let protected = Router::new()
        .route("/upload", post(entries::upload))
        .route("/delete-entry/:id", delete(entries::delete_entry))
        .route("/delete-selected", delete(entries::delete_selected))
        .route("/entries", get(entries::list_entries))
        .route("/entries/:id", get(entries::get_entry))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer_token));

    public
        .merge(protected)
        .with_state(state)
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(opts.max_upload_bytes))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

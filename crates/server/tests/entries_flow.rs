use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use models::BookEntry;
use serde_json::{json, Value};
use service::documents::mock::InMemoryDocumentStore;
use service::identity::mock::StaticIdentityVerifier;
use service::journal::{Call, CallJournal};
use service::media::mock::InMemoryMediaStore;
use service::GuestbookService;
use tower::Service;
use tower_http::cors::CorsLayer;

use server::routes::{self, auth::ServerState, RouterOptions};

const TOKEN: &str = "valid-token";
const BOUNDARY: &str = "guestbook-test-boundary";

struct Harness {
    app: Router,
    media: Arc<InMemoryMediaStore>,
    docs: Arc<InMemoryDocumentStore>,
    journal: CallJournal,
}

fn build_app() -> Harness {
    let journal = CallJournal::new();
    let media = Arc::new(InMemoryMediaStore::new(journal.clone()));
    let docs = Arc::new(InMemoryDocumentStore::new(journal.clone()));
    let state = ServerState {
        guestbook: Arc::new(GuestbookService::new(media.clone(), docs.clone())),
        verifier: Arc::new(StaticIdentityVerifier::new().with_token(TOKEN, "user-1")),
    };
    let opts = RouterOptions {
        static_dir: "/nonexistent-static-for-tests".into(),
        max_upload_bytes: 1024 * 1024,
    };
    let app = routes::build_router(state, CorsLayer::very_permissive(), &opts);
    Harness { app, media, docs, journal }
}

fn seed(h: &Harness, id: &str, public_id: &str, minute: u32) {
    h.media.seed(public_id);
    h.docs.seed(BookEntry {
        id: id.into(),
        name: format!("visitor {id}"),
        address_or_license: "ABC 12345".into(),
        date_and_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap(),
        signature_file_id: public_id.into(),
    });
}

/// Hand-built multipart body; `None` parts are left out.
fn multipart(file: Option<&[u8]>, name: Option<&str>, address: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"sig.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (field, value) in [("name", name), ("address", address)] {
        if let Some(v) = value {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{v}\r\n").as_bytes(),
            );
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>, token: Option<&str>) -> anyhow::Result<Request<Body>> {
    let mut b = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    Ok(b.body(Body::from(body))?)
}

fn authed(method: &str, uri: &str, body: Body) -> anyhow::Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)?)
}

async fn send(app: &Router, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let resp = app.clone().call(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, json))
}

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

#[tokio::test]
async fn guestbook_round_trip_for_one_visitor() -> anyhow::Result<()> {
    let h = build_app();

    let req = upload_request(multipart(Some(PNG), Some("Jan Kowalski"), Some("ul. Test 1")), Some(TOKEN))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File uploaded and entry saved");
    let public_id = body["publicId"].as_str().unwrap().to_string();
    let doc_id = body["docId"].as_str().unwrap().to_string();

    let calls = h.journal.calls();
    assert_eq!(calls, vec![Call::MediaUpload(public_id.clone()), Call::DocCreate(doc_id.clone())]);

    let (status, entry) = send(&h.app, authed("GET", &format!("/entries/{doc_id}"), Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["name"], "Jan Kowalski");
    assert_eq!(entry["address_or_license"], "ul. Test 1");
    assert_eq!(entry["signature_file_id"], public_id.as_str());

    let req = Request::builder().uri(format!("/signed-url/{public_id}")).body(Body::empty())?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap();
    assert!(url.contains(&public_id));
    assert!(url.contains("/s--"));
    assert!(url.contains("/v"));

    let (status, body) = send(&h.app, authed("DELETE", &format!("/delete-entry/{doc_id}"), Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Entry deleted successfully"}));
    assert!(!h.media.contains(&public_id));

    let (status, body) = send(&h.app, authed("GET", &format!("/entries/{doc_id}"), Body::empty())?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Entry not found");
    Ok(())
}

#[tokio::test]
async fn upload_rejects_missing_parts_without_side_effects() -> anyhow::Result<()> {
    let h = build_app();

    let req = upload_request(multipart(None, Some("Jan"), Some("ul. Test 1")), Some(TOKEN))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let req = upload_request(multipart(Some(PNG), Some("Jan"), None), Some(TOKEN))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and address are required");

    let req = upload_request(multipart(Some(PNG), Some("   "), Some("x")), Some(TOKEN))?;
    let (status, _) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = upload_request(multipart(Some(&[]), Some("Jan"), Some("x")), Some(TOKEN))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    assert!(h.journal.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn upload_failure_writes_no_record() -> anyhow::Result<()> {
    let h = build_app();
    h.media.fail_uploads(true);
    let req = upload_request(multipart(Some(PNG), Some("Jan"), Some("x")), Some(TOKEN))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to upload file"}));
    assert!(h.docs.is_empty());
    Ok(())
}

#[tokio::test]
async fn record_failure_after_upload_is_500() -> anyhow::Result<()> {
    let h = build_app();
    h.docs.fail_creates(true);
    let req = upload_request(multipart(Some(PNG), Some("Jan"), Some("x")), Some(TOKEN))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to upload file");
    assert_eq!(h.media.len(), 1);
    Ok(())
}

#[tokio::test]
async fn oversized_upload_is_rejected() -> anyhow::Result<()> {
    let h = build_app();
    let big = vec![7u8; 2 * 1024 * 1024];
    let req = upload_request(multipart(Some(&big), Some("Jan"), Some("x")), Some(TOKEN))?;
    let (status, _) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(h.journal.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn auth_gate_distinguishes_missing_and_invalid_tokens() -> anyhow::Result<()> {
    let h = build_app();

    let req = upload_request(multipart(Some(PNG), Some("Jan"), Some("x")), None)?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: Token missing or invalid format");

    let req = Request::builder()
        .method("DELETE")
        .uri("/delete-entry/abc")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: Token missing or invalid format");

    let req = upload_request(multipart(Some(PNG), Some("Jan"), Some("x")), Some("forged"))?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: Invalid token");

    let req = Request::builder().uri("/entries").body(Body::empty())?;
    let (status, _) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(h.journal.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_one_orders_media_before_record() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "e1", "signatures/s1", 0);

    let (status, _) = send(&h.app, authed("DELETE", "/delete-entry/e1", Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    let destroy = h.journal.position(&Call::MediaDestroy("signatures/s1".into())).unwrap();
    let delete = h.journal.position(&Call::DocDelete("e1".into())).unwrap();
    assert!(destroy < delete);
    Ok(())
}

#[tokio::test]
async fn delete_one_stops_when_media_delete_fails() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "e1", "signatures/s1", 0);
    h.media.fail_destroy_for("signatures/s1");

    let (status, body) = send(&h.app, authed("DELETE", "/delete-entry/e1", Body::empty())?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to delete signature from media store");
    assert!(h.docs.contains("e1"));
    assert_eq!(h.journal.count(|c| matches!(c, Call::DocDelete(_))), 0);
    Ok(())
}

#[tokio::test]
async fn delete_one_record_failure_is_500() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "e1", "signatures/s1", 0);
    h.docs.fail_delete_for("e1");

    let (status, body) = send(&h.app, authed("DELETE", "/delete-entry/e1", Body::empty())?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to delete entry");
    Ok(())
}

#[tokio::test]
async fn delete_one_unknown_id_has_no_side_effects() -> anyhow::Result<()> {
    let h = build_app();
    let (status, body) = send(&h.app, authed("DELETE", "/delete-entry/ghost", Body::empty())?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Entry not found");
    assert_eq!(h.journal.calls(), vec![Call::DocGet("ghost".into())]);
    Ok(())
}

#[tokio::test]
async fn delete_one_with_url_metacharacters_touches_nothing() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "abc", "signatures/abc", 1);
    for uri in ["/delete-entry/abc%23x", "/delete-entry/abc%3FpageSize=1", "/delete-entry/abc%252F"] {
        let (status, body) = send(&h.app, authed("DELETE", uri, Body::empty())?).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"], "Entry not found");
    }
    assert!(h.docs.contains("abc"));
    assert!(h.journal.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_selected_processes_every_item() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "e1", "signatures/s1", 0);
    seed(&h, "e2", "signatures/s2", 1);
    seed(&h, "e3", "signatures/s3", 2);
    h.media.fail_destroy_for("signatures/s2");

    let body = Body::from(json!({"entryIds": ["e1", "e2", "missing", "e3"]}).to_string());
    let (status, body) = send(&h.app, authed("DELETE", "/delete-selected", body)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Selected entries deleted successfully"}));

    for (id, public_id) in [("e1", "signatures/s1"), ("e2", "signatures/s2"), ("e3", "signatures/s3")] {
        let destroy = h.journal.position(&Call::MediaDestroy(public_id.into())).unwrap();
        let delete = h.journal.position(&Call::DocDelete(id.into())).unwrap();
        assert!(destroy < delete, "{id}");
        assert!(!h.docs.contains(id));
    }
    assert!(h.media.contains("signatures/s2"));
    Ok(())
}

#[tokio::test]
async fn delete_selected_rejects_bad_id_lists() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "e1", "signatures/s1", 0);

    for raw in [
        "not json".to_string(),
        json!({}).to_string(),
        json!({"entryIds": "e1"}).to_string(),
        json!({"entryIds": ["e1", 7]}).to_string(),
    ] {
        let (status, body) = send(&h.app, authed("DELETE", "/delete-selected", Body::from(raw.clone()))?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
        assert_eq!(body["error"], "Invalid entry IDs");
    }
    assert!(h.docs.contains("e1"));
    assert_eq!(h.journal.count(|c| matches!(c, Call::MediaDestroy(_))), 0);
    Ok(())
}

#[tokio::test]
async fn signed_url_requires_public_id() -> anyhow::Result<()> {
    let h = build_app();
    for uri in ["/signed-url", "/signed-url/"] {
        let (status, body) = send(&h.app, Request::builder().uri(uri).body(Body::empty())?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "Public ID is required");
    }
    Ok(())
}

#[tokio::test]
async fn signed_url_for_unusable_id_is_404() -> anyhow::Result<()> {
    let h = build_app();
    let req = Request::builder().uri("/signed-url/signatures/../secret").body(Body::empty())?;
    let (status, body) = send(&h.app, req).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Signed URL could not be generated");
    Ok(())
}

#[tokio::test]
async fn list_returns_oldest_first_in_pages() -> anyhow::Result<()> {
    let h = build_app();
    seed(&h, "c", "signatures/c", 30);
    seed(&h, "a", "signatures/a", 1);
    seed(&h, "b", "signatures/b", 15);

    let (status, body) = send(&h.app, authed("GET", "/entries?page=1&per_page=2", Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["entries"].as_array().unwrap().iter().map(|e| e["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(body["total"], 3);
    assert_eq!(body["per_page"], 2);

    let (_, body) = send(&h.app, authed("GET", "/entries?page=2&per_page=2", Body::empty())?).await?;
    assert_eq!(body["entries"][0]["id"], "c");
    assert_eq!(body["page"], 2);
    Ok(())
}

#[tokio::test]
async fn public_routes_need_no_token() -> anyhow::Result<()> {
    let h = build_app();

    let (status, body) = send(&h.app, Request::builder().uri("/health").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, doc) = send(&h.app, Request::builder().uri("/api-docs/openapi.json").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/upload"].is_object());

    let resp = h.app.clone().call(Request::builder().uri("/metrics").body(Body::empty())?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use models::{BookEntry, NewBookEntry};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{validate_document_id, DocumentError, DocumentStore};
use crate::google::AccessTokenSource;

const PAGE_SIZE: u32 = 300;

/// Document store backed by the Firestore REST API.
pub struct FirestoreDocumentStore {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    collection_url: String,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl FirestoreDocumentStore {
    pub fn new(
        client: reqwest::Client,
        tokens: Arc<dyn AccessTokenSource>,
        base_url: &str,
        project_id: &str,
        collection: &str,
    ) -> Self {
        let collection_url = format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            base_url.trim_end_matches('/'),
            project_id,
            collection
        );
        Self { client, tokens, collection_url }
    }

    /// The id is pushed as one percent-encoded path segment.
    fn document_url(&self, id: &str) -> Result<Url, DocumentError> {
        let mut url = Url::parse(&self.collection_url)
            .map_err(|e| DocumentError::Transport(format!("bad collection url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DocumentError::Transport("collection url cannot take a path".into()))?
            .push(id);
        Ok(url)
    }

    async fn error_from(resp: reqwest::Response) -> DocumentError {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or(text);
        DocumentError::Upstream { status, message }
    }
}

/// Firestore typed-value encoding of a new record.
pub(crate) fn encode_fields(entry: &NewBookEntry) -> Value {
    json!({
        "fields": {
            "name": { "stringValue": entry.name },
            "address_or_license": { "stringValue": entry.address_or_license },
            "date_and_time": {
                "timestampValue": entry.date_and_time.to_rfc3339_opts(SecondsFormat::Micros, true)
            },
            "signature_file_id": { "stringValue": entry.signature_file_id },
        }
    })
}

fn string_field(fields: &HashMap<String, Value>, key: &str) -> Result<String, DocumentError> {
    fields
        .get(key)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DocumentError::Decode(format!("field {key} missing or not a string")))
}

fn timestamp_field(fields: &HashMap<String, Value>, key: &str) -> Result<DateTime<Utc>, DocumentError> {
    let raw = fields
        .get(key)
        .and_then(|v| v.get("timestampValue"))
        .and_then(Value::as_str)
        .ok_or_else(|| DocumentError::Decode(format!("field {key} missing or not a timestamp")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DocumentError::Decode(format!("field {key}: {e}")))
}

/// The id is the last segment of the resource name.
fn document_id(name: &str) -> Result<String, DocumentError> {
    name.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DocumentError::Decode(format!("bad document name {name:?}")))
}

fn decode_document(doc: Document) -> Result<BookEntry, DocumentError> {
    Ok(BookEntry {
        id: document_id(&doc.name)?,
        name: string_field(&doc.fields, "name")?,
        address_or_license: string_field(&doc.fields, "address_or_license")?,
        date_and_time: timestamp_field(&doc.fields, "date_and_time")?,
        signature_file_id: string_field(&doc.fields, "signature_file_id")?,
    })
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    #[instrument(skip(self, entry), fields(signature_file_id = %entry.signature_file_id))]
    async fn create(&self, entry: &NewBookEntry) -> Result<BookEntry, DocumentError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .client
            .post(&self.collection_url)
            .bearer_auth(token)
            .json(&encode_fields(entry))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        let doc: Document = resp.json().await?;
        let id = document_id(&doc.name)?;
        debug!(entry_id = %id, "document created");
        Ok(entry.clone().with_id(id))
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<BookEntry>, DocumentError> {
        validate_document_id(id)?;
        let token = self.tokens.access_token().await?;
        let resp = self.client.get(self.document_url(id)?).bearer_auth(token).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        let doc: Document = resp.json().await?;
        decode_document(doc).map(Some)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), DocumentError> {
        validate_document_id(id)?;
        let token = self.tokens.access_token().await?;
        let resp = self.client.delete(self.document_url(id)?).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<BookEntry>, DocumentError> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let token = self.tokens.access_token().await?;
            let mut req = self
                .client
                .get(&self.collection_url)
                .bearer_auth(token)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(pt) = &page_token {
                req = req.query(&[("pageToken", pt.as_str())]);
            }
            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(Self::error_from(resp).await);
            }
            let page: ListResponse = resp.json().await?;
            for doc in page.documents {
                let name = doc.name.clone();
                match decode_document(doc) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!(document = %name, error = %e, "skipping malformed document"),
                }
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::StaticTokenSource;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, Method, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::{Json, Router};
    use chrono::TimeZone;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    const COLLECTION_PATH: &str = "/v1/projects/proj/databases/(default)/documents/book_entries";

    type Seen = Arc<Mutex<Vec<String>>>;

    fn sample() -> NewBookEntry {
        NewBookEntry {
            name: "Jan Kowalski".into(),
            address_or_license: "ul. Test 1".into(),
            date_and_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            signature_file_id: "signatures/abc".into(),
        }
    }

    #[test]
    fn collection_url_targets_default_database() {
        let store = FirestoreDocumentStore::new(
            reqwest::Client::new(),
            Arc::new(StaticTokenSource("t".into())),
            "https://firestore.example.com/",
            "proj",
            "book_entries",
        );
        assert_eq!(
            store.document_url("abc").unwrap().as_str(),
            "https://firestore.example.com/v1/projects/proj/databases/(default)/documents/book_entries/abc"
        );
    }

    #[test]
    fn document_url_keeps_id_inside_one_segment() {
        let store = FirestoreDocumentStore::new(
            reqwest::Client::new(),
            Arc::new(StaticTokenSource("t".into())),
            "https://firestore.example.com",
            "proj",
            "book_entries",
        );
        let url = store.document_url("abc#x?pageSize=1").unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(url.path().ends_with("/book_entries/abc%23x%3FpageSize=1"), "{}", url.path());
    }

    #[test]
    fn encoded_fields_use_typed_values() {
        let v = encode_fields(&sample());
        assert_eq!(v["fields"]["name"]["stringValue"], "Jan Kowalski");
        assert_eq!(v["fields"]["signature_file_id"]["stringValue"], "signatures/abc");
        assert_eq!(v["fields"]["date_and_time"]["timestampValue"], "2024-05-01T12:30:00.000000Z");
    }

    #[test]
    fn document_decodes_into_entry() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/book_entries/XyZ123",
            "fields": {
                "name": {"stringValue": "Jan Kowalski"},
                "address_or_license": {"stringValue": "ul. Test 1"},
                "date_and_time": {"timestampValue": "2024-05-01T12:30:00.123456Z"},
                "signature_file_id": {"stringValue": "signatures/abc"}
            },
            "createTime": "2024-05-01T12:30:00.200000Z"
        }))
        .unwrap();
        let entry = decode_document(doc).unwrap();
        assert_eq!(entry.id, "XyZ123");
        assert_eq!(entry.address_or_license, "ul. Test 1");
        assert_eq!(entry.date_and_time.timestamp(), 1_714_566_600);
    }

    #[test]
    fn document_missing_signature_is_malformed() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/book_entries/a",
            "fields": {
                "name": {"stringValue": "x"},
                "address_or_license": {"stringValue": "y"},
                "date_and_time": {"timestampValue": "2024-05-01T12:30:00Z"}
            }
        }))
        .unwrap();
        assert!(matches!(decode_document(doc), Err(DocumentError::Decode(_))));
    }

    #[test]
    fn empty_list_page_has_no_documents() {
        let page: ListResponse = serde_json::from_str("{}").unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }

    fn stored(id: &str, minute: u32) -> Value {
        json!({
            "name": format!("projects/proj/databases/(default)/documents/book_entries/{id}"),
            "fields": {
                "name": {"stringValue": format!("visitor {id}")},
                "address_or_license": {"stringValue": "ul. Test 1"},
                "date_and_time": {"timestampValue": format!("2024-05-01T12:{minute:02}:00Z")},
                "signature_file_id": {"stringValue": format!("signatures/{id}")}
            }
        })
    }

    /// Stand-in for the Firestore REST surface the store uses.
    async fn firestore_stub(State(seen): State<Seen>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
        let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or_default();
        seen.lock().unwrap().push(format!("{method} {uri} [{auth}]"));
        let Some(rest) = uri.path().strip_prefix(COLLECTION_PATH) else {
            return axum::http::StatusCode::BAD_REQUEST.into_response();
        };
        let doc_id = rest.strip_prefix('/');
        match (method, doc_id) {
            (Method::POST, None) => Json(stored("NewDoc42", 30)).into_response(),
            (Method::GET, None) => {
                if uri.query().unwrap_or_default().contains("pageToken=p2") {
                    Json(json!({"documents": [stored("second", 1)]})).into_response()
                } else {
                    let broken = json!({"name": format!("{}/broken", &COLLECTION_PATH[1..]), "fields": {}});
                    Json(json!({"documents": [stored("first", 2), broken], "nextPageToken": "p2"})).into_response()
                }
            }
            (Method::GET, Some("first")) => Json(stored("first", 2)).into_response(),
            (Method::GET, Some("boom")) | (Method::DELETE, Some("boom")) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": {"code": 500, "message": "backend exploded", "status": "INTERNAL"}})),
            )
                .into_response(),
            (Method::GET, Some(_)) => (
                axum::http::StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": 404, "message": "Document not found", "status": "NOT_FOUND"}})),
            )
                .into_response(),
            (Method::DELETE, Some(_)) => Json(json!({})).into_response(),
            _ => axum::http::StatusCode::METHOD_NOT_ALLOWED.into_response(),
        }
    }

    async fn stub_store() -> (FirestoreDocumentStore, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new().fallback(firestore_stub).with_state(seen.clone());
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let store = FirestoreDocumentStore::new(
            reqwest::Client::new(),
            Arc::new(StaticTokenSource("tok".into())),
            &format!("http://{addr}"),
            "proj",
            "book_entries",
        );
        (store, seen)
    }

    #[tokio::test]
    async fn create_takes_id_from_returned_name() {
        let (store, seen) = stub_store().await;
        let entry = store.create(&sample()).await.unwrap();
        assert_eq!(entry.id, "NewDoc42");
        assert_eq!(entry.name, "Jan Kowalski");
        assert_eq!(seen.lock().unwrap()[0], format!("POST {COLLECTION_PATH} [Bearer tok]"));
    }

    #[tokio::test]
    async fn get_maps_404_to_none() {
        let (store, _) = stub_store().await;
        assert_eq!(store.get("first").await.unwrap().map(|e| e.id), Some("first".to_string()));
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upstream_error_body_becomes_message() {
        let (store, _) = stub_store().await;
        match store.get("boom").await {
            Err(DocumentError::Upstream { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "backend exploded");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(store.delete("boom").await, Err(DocumentError::Upstream { status: 500, .. })));
    }

    #[tokio::test]
    async fn list_follows_page_tokens_and_skips_malformed() {
        let (store, seen) = stub_store().await;
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["first", "second"]);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("pageSize=300"));
        assert!(seen[1].contains("pageToken=p2"));
    }

    #[tokio::test]
    async fn delete_sends_encoded_single_segment() {
        let (store, seen) = stub_store().await;
        store.delete("with space").await.unwrap();
        assert_eq!(seen.lock().unwrap()[0], format!("DELETE {COLLECTION_PATH}/with%20space [Bearer tok]"));
        assert!(matches!(store.delete("abc#x").await, Err(DocumentError::InvalidId(_))));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}

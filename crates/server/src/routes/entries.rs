use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use common::types::MessageResponse;
use models::{BookEntry, EntrySubmission, SignatureFile};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service::identity::Identity;
use service::media::MediaError;
use service::pagination::Pagination;
use service::ServiceError;
use tracing::{info, warn};

use crate::errors::JsonApiError;
use crate::observability::{
    BATCH_ITEMS_TOTAL, ENTRIES_CREATED_TOTAL, ENTRIES_DELETED_TOTAL, MEDIA_FAILURES_TOTAL,
};
use crate::routes::auth::ServerState;

pub const UPLOAD_FAILED: &str = "Failed to upload file";
pub const ENTRY_NOT_FOUND: &str = "Entry not found";
pub const MEDIA_DELETE_FAILED: &str = "Failed to delete signature from media store";
pub const DELETE_FAILED: &str = "Failed to delete entry";
pub const INVALID_IDS: &str = "Invalid entry IDs";
pub const PUBLIC_ID_REQUIRED: &str = "Public ID is required";
pub const URL_NOT_GENERATED: &str = "Signed URL could not be generated";
pub const URL_ERROR: &str = "Error generating signed URL";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub public_id: String,
    pub doc_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct EntriesPage {
    pub entries: Vec<BookEntry>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Collect the `file`, `name` and `address` parts; other parts are ignored.
async fn read_submission(mut multipart: Multipart) -> Result<EntrySubmission, JsonApiError> {
    let mut submission = EntrySubmission::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let part = field.name().unwrap_or_default().to_string();
        match part.as_str() {
            "file" => {
                let content_type = field.content_type().map(str::to_string);
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                submission.file = Some(SignatureFile { bytes: bytes.to_vec(), content_type, filename });
            }
            "name" => submission.name = Some(field.text().await.map_err(multipart_error)?),
            "address" => submission.address = Some(field.text().await.map_err(multipart_error)?),
            other => warn!(part = %other, "ignoring unexpected multipart part"),
        }
    }
    Ok(submission)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> JsonApiError {
    JsonApiError::new(e.status(), "Invalid multipart body", Some(e.body_text()))
}

#[utoipa::path(
    post, path = "/upload", tag = "entries",
    request_body(content = crate::openapi::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded and entry saved", body = crate::openapi::UploadResponseDoc),
        (status = 400, description = "No file provided / Name and address are required"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to upload file")
    ),
    security(("bearer" = []))
)]
pub async fn upload(
    State(state): State<ServerState>,
    Extension(identity): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, JsonApiError> {
    let multipart = multipart.map_err(|e| {
        JsonApiError::new(StatusCode::BAD_REQUEST, "Invalid multipart body", Some(e.body_text()))
    })?;
    let submission = read_submission(multipart).await?;

    match state.guestbook.create_entry(submission).await {
        Ok(stored) => {
            ENTRIES_CREATED_TOTAL.inc();
            info!(uid = %identity.uid, entry_id = %stored.entry.id, public_id = %stored.media.public_id, "upload_ok");
            Ok(Json(UploadResponse {
                message: "File uploaded and entry saved".into(),
                public_id: stored.media.public_id,
                doc_id: stored.entry.id,
            }))
        }
        Err(ServiceError::Model(e)) => Err(JsonApiError::bad_request(e.to_string())),
        Err(e @ ServiceError::MediaUpload(_)) => {
            MEDIA_FAILURES_TOTAL.inc();
            Err(JsonApiError::internal(UPLOAD_FAILED, &e))
        }
        Err(e) => Err(JsonApiError::internal(UPLOAD_FAILED, &e)),
    }
}

#[utoipa::path(
    delete, path = "/delete-entry/{id}", tag = "entries",
    params(("id" = String, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Entry deleted successfully", body = crate::openapi::MessageDoc),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found"),
        (status = 500, description = "Media or record delete failed")
    ),
    security(("bearer" = []))
)]
pub async fn delete_entry(
    State(state): State<ServerState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, JsonApiError> {
    match state.guestbook.delete_entry(&id).await {
        Ok(()) => {
            ENTRIES_DELETED_TOTAL.inc();
            info!(uid = %identity.uid, entry_id = %id, "delete_ok");
            Ok(Json(MessageResponse::new("Entry deleted successfully")))
        }
        Err(ServiceError::NotFound(_)) => Err(JsonApiError::not_found(ENTRY_NOT_FOUND)),
        Err(e @ ServiceError::MediaDelete { .. }) => {
            MEDIA_FAILURES_TOTAL.inc();
            Err(JsonApiError::internal(MEDIA_DELETE_FAILED, &e))
        }
        Err(e) => Err(JsonApiError::internal(DELETE_FAILED, &e)),
    }
}

/// `entryIds` must be an array of strings.
fn parse_entry_ids(body: &Value) -> Result<Vec<String>, String> {
    let ids = body
        .get("entryIds")
        .ok_or_else(|| "entryIds is missing".to_string())?
        .as_array()
        .ok_or_else(|| "entryIds is not an array".to_string())?;
    ids.iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| format!("{v} is not a string id")))
        .collect()
}

#[utoipa::path(
    delete, path = "/delete-selected", tag = "entries",
    request_body = crate::openapi::DeleteSelectedDoc,
    responses(
        (status = 200, description = "Selected entries deleted successfully", body = crate::openapi::MessageDoc),
        (status = 400, description = "Invalid entry IDs"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn delete_selected(
    State(state): State<ServerState>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, JsonApiError> {
    let Json(body) = body.map_err(|e| {
        JsonApiError::new(StatusCode::BAD_REQUEST, INVALID_IDS, Some(e.body_text()))
    })?;
    let ids = parse_entry_ids(&body)
        .map_err(|detail| JsonApiError::new(StatusCode::BAD_REQUEST, INVALID_IDS, Some(detail)))?;

    let report = state.guestbook.delete_entries(&ids).await;
    BATCH_ITEMS_TOTAL.inc_by(ids.len() as u64);
    ENTRIES_DELETED_TOTAL.inc_by(report.deleted.len() as u64);
    MEDIA_FAILURES_TOTAL.inc_by(report.media_failures.len() as u64);
    info!(
        uid = %identity.uid,
        requested = ids.len(),
        deleted = report.deleted.len(),
        missing = report.missing.len(),
        "delete_selected_done"
    );
    Ok(Json(MessageResponse::new("Selected entries deleted successfully")))
}

#[utoipa::path(
    get, path = "/signed-url/{public_id}", tag = "media",
    params(("public_id" = String, Path, description = "Media public id; may contain '/'")),
    responses(
        (status = 200, description = "Signed URL", body = crate::openapi::SignedUrlDoc),
        (status = 400, description = "Public ID is required"),
        (status = 404, description = "Signed URL could not be generated"),
        (status = 500, description = "Error generating signed URL")
    )
)]
pub async fn signed_url(
    State(state): State<ServerState>,
    Path(public_id): Path<String>,
) -> Result<Json<SignedUrlResponse>, JsonApiError> {
    if public_id.is_empty() {
        return Err(JsonApiError::bad_request(PUBLIC_ID_REQUIRED));
    }
    match state.guestbook.signed_url(&public_id) {
        Ok(url) => Ok(Json(SignedUrlResponse { url })),
        Err(ServiceError::SignedUrl(MediaError::InvalidPublicId(id))) => {
            warn!(public_id = %id, "signed url requested for unusable id");
            Err(JsonApiError::not_found(URL_NOT_GENERATED))
        }
        Err(e) => Err(JsonApiError::internal(URL_ERROR, &e)),
    }
}

/// `/signed-url` and `/signed-url/` with nothing after them.
pub async fn signed_url_missing() -> JsonApiError {
    JsonApiError::bad_request(PUBLIC_ID_REQUIRED)
}

#[utoipa::path(
    get, path = "/entries", tag = "entries",
    params(ListQuery),
    responses(
        (status = 200, description = "Entries, oldest first", body = crate::openapi::EntriesPageDoc),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to list entries")
    ),
    security(("bearer" = []))
)]
pub async fn list_entries(
    State(state): State<ServerState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<EntriesPage>, JsonApiError> {
    let defaults = Pagination::default();
    let pagination = Pagination {
        page: q.page.unwrap_or(defaults.page),
        per_page: q.per_page.unwrap_or(defaults.per_page),
    };
    let page = state
        .guestbook
        .list_entries(pagination)
        .await
        .map_err(|e| JsonApiError::internal("Failed to list entries", &e))?;
    Ok(Json(EntriesPage { entries: page.items, page: page.page, per_page: page.per_page, total: page.total }))
}

#[utoipa::path(
    get, path = "/entries/{id}", tag = "entries",
    params(("id" = String, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Entry", body = crate::openapi::BookEntryDoc),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_entry(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<BookEntry>, JsonApiError> {
    match state.guestbook.get_entry(&id).await {
        Ok(entry) => Ok(Json(entry)),
        Err(ServiceError::NotFound(_)) => Err(JsonApiError::not_found(ENTRY_NOT_FOUND)),
        Err(e) => Err(JsonApiError::internal("Failed to load entry", &e)),
    }
}

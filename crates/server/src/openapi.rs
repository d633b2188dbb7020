use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct MessageDoc { pub message: String }

#[derive(ToSchema)]
pub struct ErrorDoc { pub error: String, pub detail: Option<String> }

/// Multipart form of `POST /upload`.
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub name: String,
    pub address: String,
}

#[derive(ToSchema, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponseDoc { pub message: String, pub public_id: String, pub doc_id: String }

#[derive(ToSchema, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSelectedDoc { pub entry_ids: Vec<String> }

#[derive(ToSchema)]
pub struct SignedUrlDoc { pub url: String }

#[derive(ToSchema)]
pub struct BookEntryDoc {
    pub id: String,
    pub name: String,
    pub address_or_license: String,
    pub date_and_time: chrono::DateTime<chrono::Utc>,
    pub signature_file_id: String,
}

#[derive(ToSchema)]
pub struct EntriesPageDoc {
    pub entries: Vec<BookEntryDoc>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::entries::upload,
        crate::routes::entries::delete_entry,
        crate::routes::entries::delete_selected,
        crate::routes::entries::signed_url,
        crate::routes::entries::list_entries,
        crate::routes::entries::get_entry,
    ),
    components(
        schemas(
            HealthResponse,
            MessageDoc,
            ErrorDoc,
            UploadForm,
            UploadResponseDoc,
            DeleteSelectedDoc,
            SignedUrlDoc,
            BookEntryDoc,
            EntriesPageDoc,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health"),
        (name = "entries"),
        (name = "media")
    )
)]
pub struct ApiDoc;

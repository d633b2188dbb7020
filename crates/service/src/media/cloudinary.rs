use async_trait::async_trait;
use configs::MediaConfig;
use models::SignatureFile;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::signing::{api_signature, signed_delivery_url};
use super::{DestroyOutcome, MediaError, MediaStore, UploadedMedia};

const ACCESS_MODE: &str = "authenticated";
const DELIVERY_TYPE: &str = "authenticated";

/// Media store backed by the Cloudinary upload API.
pub struct CloudinaryMediaStore {
    client: reqwest::Client,
    cfg: MediaConfig,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryMediaStore {
    pub fn new(client: reqwest::Client, cfg: MediaConfig) -> Self {
        Self { client, cfg }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.cfg.api_base_url.trim_end_matches('/'),
            self.cfg.cloud_name,
            action
        )
    }

    /// Parameters covered by the upload signature.
    fn upload_params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("access_mode", ACCESS_MODE.to_string()),
            ("timestamp", timestamp.to_string()),
            ("type", DELIVERY_TYPE.to_string()),
        ];
        if let Some(preset) = self.cfg.upload_preset.as_ref().filter(|p| !p.is_empty()) {
            params.push(("upload_preset", preset.clone()));
        }
        params
    }

    async fn error_from(resp: reqwest::Response) -> MediaError {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or(text);
        MediaError::Upstream { status, message }
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    #[instrument(skip(self, file), fields(bytes = file.len(), mime = %file.mime()))]
    async fn upload(&self, file: &SignatureFile) -> Result<UploadedMedia, MediaError> {
        let timestamp = chrono::Utc::now().timestamp();
        let params = self.upload_params(timestamp);
        let signature = api_signature(&params, &self.cfg.api_secret);

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone().unwrap_or_else(|| "signature".to_string()))
            .mime_str(file.mime())
            .map_err(|e| MediaError::Transport(e.to_string()))?;
        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.cfg.api_key.clone())
            .text("signature", signature);
        for (k, v) in params {
            form = form.text(k, v);
        }

        let resp = self.client.post(self.endpoint("upload")).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        let uploaded: UploadedMedia = resp.json().await?;
        debug!(public_id = %uploaded.public_id, version = ?uploaded.version, "media uploaded");
        Ok(uploaded)
    }

    #[instrument(skip(self))]
    async fn destroy(&self, public_id: &str) -> Result<DestroyOutcome, MediaError> {
        let timestamp = chrono::Utc::now().timestamp();
        let params = vec![
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.to_string()),
            ("type", DELIVERY_TYPE.to_string()),
        ];
        let signature = api_signature(&params, &self.cfg.api_secret);
        let mut form: Vec<(&str, String)> = params;
        form.push(("api_key", self.cfg.api_key.clone()));
        form.push(("signature", signature));

        let resp = self.client.post(self.endpoint("destroy")).form(&form).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        let body: DestroyResponse = resp.json().await?;
        match body.result.as_str() {
            "ok" => Ok(DestroyOutcome::Deleted),
            "not found" => {
                warn!(%public_id, "media object already absent");
                Ok(DestroyOutcome::NotFound)
            }
            other => Err(MediaError::Decode(format!("unexpected destroy result {other:?}"))),
        }
    }

    fn signed_url(&self, public_id: &str, timestamp: i64) -> Result<String, MediaError> {
        signed_delivery_url(
            &self.cfg.delivery_base_url,
            &self.cfg.cloud_name,
            public_id,
            timestamp,
            &self.cfg.api_secret,
        )
    }
}

//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so the server crate checks its
//! filesystem prerequisites through `service::runtime`.

/// Check the SPA directory and, when configured, the service-account key file.
pub async fn ensure_env(static_dir: &str, credentials_path: Option<&str>) -> anyhow::Result<()> {
    common::env::ensure_static_dir(static_dir).await?;
    if let Some(path) = credentials_path {
        common::env::ensure_file(path, "service account key").await?;
    }
    Ok(())
}

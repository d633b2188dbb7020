//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before the listener binds.

use std::path::Path;

use tracing::warn;

/// Check that the SPA asset directory is usable.
///
/// A missing directory is not fatal: API routes keep working and only the
/// static fallback answers 404. A missing `index.html` is reported the same way.
pub async fn ensure_static_dir(static_dir: &str) -> anyhow::Result<()> {
    match tokio::fs::metadata(static_dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(anyhow::anyhow!("static dir {static_dir} exists but is not a directory"));
        }
        Err(_) => {
            warn!(%static_dir, "static assets directory not found; SPA shell will 404");
            return Ok(());
        }
    }
    let index = Path::new(static_dir).join("index.html");
    if tokio::fs::metadata(&index).await.is_err() {
        warn!(index = %index.display(), "index.html missing; client routes will 404");
    }
    Ok(())
}

/// Check that a credential file exists before any collaborator tries to read it.
pub async fn ensure_file(path: &str, what: &str) -> anyhow::Result<()> {
    tokio::fs::metadata(path)
        .await
        .map_err(|e| anyhow::anyhow!("{what} not readable at {path}: {e}"))?;
    Ok(())
}

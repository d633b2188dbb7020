use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub http: HttpClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub admin_addr: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: Some(4),
            static_dir: default_static_dir(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            admin_addr: None,
        }
    }
}

/// Credentials and endpoints of the signature media host.
#[derive(Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_upload_preset")]
    pub upload_preset: Option<String>,
    #[serde(default = "default_media_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_media_delivery_base")]
    pub delivery_base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            upload_preset: default_upload_preset(),
            api_base_url: default_media_api_base(),
            delivery_base_url: default_media_delivery_base(),
        }
    }
}

// api_secret must never reach the logs.
impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("upload_preset", &self.upload_preset)
            .field("api_base_url", &self.api_base_url)
            .field("delivery_base_url", &self.delivery_base_url)
            .finish()
    }
}

/// Document database and identity token settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    #[serde(default = "default_service_account_path")]
    pub service_account_path: String,
    /// Overrides the `project_id` found in the service-account key.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_firestore_base")]
    pub firestore_base_url: String,
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            service_account_path: default_service_account_path(),
            project_id: None,
            collection: default_collection(),
            firestore_base_url: default_firestore_base(),
            jwks_url: default_jwks_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }
fn default_static_dir() -> String { "public".into() }
fn default_cors_origins() -> Vec<String> { vec!["http://localhost:8080".into()] }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_upload_preset() -> Option<String> { Some("signatures".into()) }
fn default_media_api_base() -> String { "https://api.cloudinary.com".into() }
fn default_media_delivery_base() -> String { "https://res.cloudinary.com".into() }
fn default_service_account_path() -> String { "serviceAccountKey.json".into() }
fn default_collection() -> String { "book_entries".into() }
fn default_firestore_base() -> String { "https://firestore.googleapis.com".into() }
fn default_jwks_url() -> String {
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com".into()
}
fn default_connect_timeout() -> u64 { 5 }
fn default_request_timeout() -> u64 { 30 }

/// Read `CONFIG_PATH` (default `config.toml`); a missing file yields defaults.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !std::path::Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// File, then process environment, then validation.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Apply environment overrides through `lookup` so callers (and tests)
    /// choose where variables come from.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOST") { self.server.host = v; }
        if let Some(p) = get("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.server.port = p;
        }
        if let Some(w) = get("TOKIO_WORKER_THREADS").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.server.worker_threads = Some(w);
        }
        if let Some(v) = get("STATIC_DIR") { self.server.static_dir = v; }
        if let Some(v) = get("CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("ADMIN_ADDR") { self.server.admin_addr = Some(v); }

        if let Some(v) = get("CLOUDINARY_CLOUD_NAME") { self.media.cloud_name = v; }
        if let Some(v) = get("CLOUDINARY_API_KEY") { self.media.api_key = v; }
        if let Some(v) = get("CLOUDINARY_API_SECRET") { self.media.api_secret = v; }
        if let Some(v) = get("CLOUDINARY_UPLOAD_PRESET") { self.media.upload_preset = Some(v); }

        if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS") { self.firebase.service_account_path = v; }
        if let Some(v) = get("FIREBASE_PROJECT_ID") { self.firebase.project_id = Some(v); }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.media.validate()?;
        self.firebase.validate()?;
        self.http.validate()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        if self.static_dir.trim().is_empty() {
            self.static_dir = default_static_dir();
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("server.max_upload_bytes must be positive"));
        }
        Ok(())
    }
}

impl MediaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cloud_name.trim().is_empty() {
            return Err(anyhow!("media.cloud_name is empty; set it in config.toml or CLOUDINARY_CLOUD_NAME"));
        }
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("media.api_key is empty; set it in config.toml or CLOUDINARY_API_KEY"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(anyhow!("media.api_secret is empty; set it in config.toml or CLOUDINARY_API_SECRET"));
        }
        for (name, url) in [("api_base_url", &self.api_base_url), ("delivery_base_url", &self.delivery_base_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("media.{name} must start with http:// or https://"));
            }
        }
        Ok(())
    }
}

impl FirebaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.service_account_path.trim().is_empty() {
            return Err(anyhow!("firebase.service_account_path is empty"));
        }
        let collection = self.collection.trim();
        if collection.is_empty() || collection.contains('/') {
            return Err(anyhow!("firebase.collection must be a single non-empty path segment"));
        }
        Ok(())
    }
}

impl HttpClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(anyhow!("http timeouts must be positive seconds"));
        }
        Ok(())
    }
}

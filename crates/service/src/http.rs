//! Shared outbound HTTP client.

use std::time::Duration;

use configs::HttpClientConfig;

/// One client for every remote collaborator so they share the connection pool.
pub fn build_client(cfg: &HttpClientConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .user_agent(concat!("guestbook/", env!("CARGO_PKG_VERSION")))
        .build()
}

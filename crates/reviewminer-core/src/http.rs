//! Authenticated JSON GETs over a shared async runtime.
//!
//! Uses async reqwest internally but presents a blocking interface, so the
//! worker threads can call it directly.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

/// Connect timeout (the per-request timeout comes from [`HttpConfig`])
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error from a single HTTP request
#[derive(Debug)]
pub enum HttpError {
    /// Transport failure or non-2xx status
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Response body was not the expected JSON
    Decode(String),
    /// Client could not be constructed (bad header value, TLS init, ...)
    Client(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Decode(message) => write!(f, "invalid response body: {message}"),
            Self::Client(message) => write!(f, "HTTP client setup failed: {message}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Convert a reqwest error, dropping the URL so tokens in query strings
    /// never reach the logs
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Decode(_) | Self::Client(_) => None,
        }
    }

    /// 403 and 429 are what GitHub answers once the budget is spent
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status(), Some(403 | 429))
    }
}

/// Settings shared by every request of one client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Sent as `Authorization: token {token}` when present
    pub token: Option<String>,
    pub user_agent: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            token: None,
            user_agent: concat!("reviewminer/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Build a pooled client carrying the auth and identification headers.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, HttpError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|e| HttpError::Client(format!("invalid token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
        .timeout(config.timeout)
        .build()
        .map_err(|e| HttpError::Client(e.to_string()))
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// GET `url` and decode the JSON body, blocking the calling thread.
///
/// Non-2xx statuses become [`HttpError::Http`] with the status attached.
pub fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, HttpError> {
    SHARED_RUNTIME.handle().block_on(async {
        let response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(HttpError::from_reqwest)?;
        let body = response.bytes().await.map_err(HttpError::from_reqwest)?;
        serde_json::from_slice(&body).map_err(|e| HttpError::Decode(e.to_string()))
    })
}

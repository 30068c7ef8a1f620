//! Metabase HTTP client.
//!
//! Authenticates with an API key or a username/password session and downloads
//! card results as CSV.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metabase_export::client::MetabaseClient;
//! use metabase_export::config::Settings;
//!
//! let settings = Settings::from_env(false)?;
//! let client = MetabaseClient::connect(&settings).await?;
//! let csv = client.fetch_with_retry(123, &[], false, 2).await?;
//! ```

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::config::{Credentials, Settings};
use crate::error::{ApiError, ApiResult, ExportError, ExportResult};
use crate::logs::{log_info_indent, log_warning};

/// Timeout for the session login call
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a CSV export call; large cards take a while
const EXPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// Error bodies are cut to this many characters in messages
const LOGIN_BODY_EXCERPT: usize = 300;
const EXPORT_BODY_EXCERPT: usize = 400;

/// Header carrying a personal API key
pub const API_KEY_HEADER: &str = "X-Metabase-API-Key";

/// Header carrying a session token
pub const SESSION_HEADER: &str = "X-Metabase-Session";

/// Authentication attached to every export request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    ApiKey(String),
    Session(String),
}

impl Auth {
    /// Header name and value for this auth.
    pub fn header(&self) -> (&'static str, &str) {
        match self {
            Auth::ApiKey(key) => (API_KEY_HEADER, key),
            Auth::Session(token) => (SESSION_HEADER, token),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::ApiKey(_) => f.write_str("ApiKey(***)"),
            Auth::Session(_) => f.write_str("Session(***)"),
        }
    }
}

/// Session login response
#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: Option<String>,
}

impl ApiError {
    /// Transport failures, server errors and rate limits are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Request { .. } => true,
            ApiError::ExportFailed { status, .. } => *status >= 500 || *status == 429,
            ApiError::InvalidUrl(_) | ApiError::LoginFailed { .. } | ApiError::MissingSessionId => {
                false
            }
        }
    }
}

/// Metabase API client
#[derive(Debug, Clone)]
pub struct MetabaseClient {
    http: reqwest::Client,
    host: String,
    auth: Auth,
}

impl MetabaseClient {
    /// Create a client with explicit auth
    pub fn new(host: &str, auth: Auth) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Create a client from settings, logging in first for password credentials
    pub async fn connect(settings: &Settings) -> ApiResult<Self> {
        let auth = match &settings.credentials {
            Credentials::ApiKey(key) => Auth::ApiKey(key.clone()),
            Credentials::Password { username, password } => {
                let http = reqwest::Client::new();
                let token = login_with_password(&http, &settings.host, username, password).await?;
                Auth::Session(token)
            }
        };
        Ok(Self::new(&settings.host, auth))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// URL of a card's CSV export, with card parameters in the query string
    pub fn card_csv_url(
        &self,
        card_id: u64,
        params: &[(String, String)],
        format_rows: bool,
    ) -> ApiResult<Url> {
        let base = format!("{}/api/card/{}/query/csv", self.host, card_id);
        let mut url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;

        // Only touch the query when there is one, or the URL gains a bare `?`.
        if !params.is_empty() || format_rows {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(params);
            if format_rows {
                query.append_pair("format_rows", "true");
            }
        }

        Ok(url)
    }

    /// Single attempt to download a card as CSV
    pub async fn fetch_card_csv(
        &self,
        card_id: u64,
        params: &[(String, String)],
        format_rows: bool,
    ) -> ApiResult<Vec<u8>> {
        let url = self.card_csv_url(card_id, params, format_rows)?;
        let (name, value) = self.auth.header();

        let response = self
            .http
            .post(url)
            .header(name, value)
            .timeout(EXPORT_TIMEOUT)
            .send()
            .await
            .map_err(|source| ApiError::Request { context: "CSV export", source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::ExportFailed {
                status: status.as_u16(),
                body: excerpt(&body, EXPORT_BODY_EXCERPT),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Request { context: "CSV export", source })?;

        Ok(bytes.to_vec())
    }

    /// Download a card, retrying up to `retries` extra times.
    ///
    /// Waits `2 * (attempt + 1)` seconds between attempts. Errors that a retry
    /// cannot fix (bad URL, 4xx responses) are returned at once.
    pub async fn fetch_with_retry(
        &self,
        card_id: u64,
        params: &[(String, String)],
        format_rows: bool,
        retries: u32,
    ) -> ExportResult<Vec<u8>> {
        let attempts = retries + 1;
        let mut attempt = 0;

        loop {
            match self.fetch_card_csv(card_id, params, format_rows).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if !e.is_retryable() => return Err(e.into()),
                Err(e) if attempt + 1 >= attempts => {
                    return Err(ExportError::RetriesExhausted {
                        card_id,
                        attempts,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = retry_delay(attempt);
                    log_warning(format!("Attempt {}/{} failed: {}", attempt + 1, attempts, e));
                    log_info_indent(format!("Retrying in {}s...", delay.as_secs()), 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Log in with username and password, returning the session token
pub async fn login_with_password(
    http: &reqwest::Client,
    host: &str,
    username: &str,
    password: &str,
) -> ApiResult<String> {
    let url = format!("{}/api/session", host.trim_end_matches('/'));
    let body = serde_json::json!({ "username": username, "password": password });

    let response = http
        .post(&url)
        .json(&body)
        .timeout(LOGIN_TIMEOUT)
        .send()
        .await
        .map_err(|source| ApiError::Request { context: "Login", source })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::LoginFailed {
            status: status.as_u16(),
            body: excerpt(&body, LOGIN_BODY_EXCERPT),
        });
    }

    let session: SessionResponse = response
        .json()
        .await
        .map_err(|source| ApiError::Request { context: "Login", source })?;

    session
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingSessionId)
}

/// Delay before retry number `attempt + 1`
pub fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(2 * (u64::from(attempt) + 1))
}

/// First `max` characters of `body`
fn excerpt(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MetabaseClient {
        MetabaseClient::new("https://mb.example.com/", Auth::ApiKey("k".into()))
    }

    #[test]
    fn test_host_trailing_slash_is_stripped() {
        assert_eq!(client().host(), "https://mb.example.com");
    }

    #[test]
    fn test_card_csv_url_without_params() {
        let url = client().card_csv_url(123, &[], false).unwrap();
        assert_eq!(url.as_str(), "https://mb.example.com/api/card/123/query/csv");
    }

    #[test]
    fn test_card_csv_url_encodes_params() {
        let params = vec![
            ("status".to_string(), "active".to_string()),
            ("start_date".to_string(), "2025-08-01".to_string()),
            ("name".to_string(), "São Paulo & co".to_string()),
        ];
        let url = client().card_csv_url(7, &params, true).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[2], ("name".to_string(), "São Paulo & co".to_string()));
        assert_eq!(pairs[3], ("format_rows".to_string(), "true".to_string()));
    }

    #[test]
    fn test_invalid_host() {
        let bad = MetabaseClient::new("not a url", Auth::Session("t".into()));
        assert!(matches!(bad.card_csv_url(1, &[], false), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_auth_headers() {
        assert_eq!(Auth::ApiKey("k".into()).header(), (API_KEY_HEADER, "k"));
        assert_eq!(Auth::Session("t".into()).header(), (SESSION_HEADER, "t"));
        assert_eq!(format!("{:?}", Auth::Session("t0ken".into())), "Session(***)");
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        assert_eq!(retry_delay(0), Duration::from_secs(2));
        assert_eq!(retry_delay(1), Duration::from_secs(4));
        assert_eq!(retry_delay(2), Duration::from_secs(6));
    }

    #[test]
    fn test_retryable_errors() {
        let server = ApiError::ExportFailed { status: 503, body: String::new() };
        let limited = ApiError::ExportFailed { status: 429, body: String::new() };
        let missing = ApiError::ExportFailed { status: 404, body: String::new() };

        assert!(server.is_retryable());
        assert!(limited.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!ApiError::MissingSessionId.is_retryable());
    }

    #[test]
    fn test_excerpt_counts_chars() {
        assert_eq!(excerpt("ãããã", 2), "ãã");
        assert_eq!(excerpt("short", 300), "short");
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let bad = MetabaseClient::new("not a url", Auth::ApiKey("k".into()));
        let err = bad.fetch_with_retry(1, &[], false, 5).await.unwrap_err();

        assert!(matches!(err, ExportError::Api(ApiError::InvalidUrl(_))));
    }
}

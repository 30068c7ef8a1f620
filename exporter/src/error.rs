//! Error types for the exporter.
//!
//! The reformatting core never fails; these types cover the glue around it:
//!
//! - [`ConfigError`] - Environment and command-line configuration errors
//! - [`ApiError`] - Metabase HTTP errors
//! - [`ExportError`] - Top-level export orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while assembling settings from the environment and the CLI.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("Missing required env var: {0}")]
    MissingVar(String),

    /// Neither an API key nor a username/password pair is available.
    #[error("Provide METABASE_USERNAME & METABASE_PASSWORD or use --use-api-key with METABASE_API_KEY set.")]
    MissingCredentials,

    /// Card parameter not in `name=value` form.
    #[error("Invalid --param '{0}'. Use name=value.")]
    InvalidParam(String),

    /// Delimiter cannot be used in a CSV dialect.
    #[error("Invalid delimiter {0:?}: must be a single ASCII character other than a quote or line break")]
    InvalidDelimiter(char),

    /// A fixed filename only makes sense for a single card.
    #[error("--filename can only be used with a single --card-id")]
    FilenameWithManyCards,
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors from the Metabase HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("{context} request failed: {source}")]
    Request {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Host and card id do not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Session login returned a non-200 status.
    #[error("Login failed: {status} {body}")]
    LoginFailed { status: u16, body: String },

    /// Session login succeeded but carried no session id.
    #[error("Login response missing session id.")]
    MissingSessionId,

    /// CSV export returned a non-200 status.
    #[error("CSV export failed: {status} {body}")]
    ExportFailed { status: u16, body: String },
}

// =============================================================================
// Export Errors (top-level)
// =============================================================================

/// Top-level export errors, returned by [`crate::export::export_cards`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// API error that is not retried (login).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Every attempt to fetch a card failed.
    #[error("Failed after retries for card {card_id} ({attempts} attempts): {last}")]
    RetriesExhausted {
        card_id: u64,
        attempts: u32,
        last: ApiError,
    },

    /// Filesystem error while writing or backing up output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

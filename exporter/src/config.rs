//! Environment-derived settings.
//!
//! | Variable | Required | Meaning |
//! |----------|----------|---------|
//! | `METABASE_HOST` | yes | Base URL, e.g. `https://metabase.example.com` |
//! | `OUTPUT_DIR` | yes | Folder the CSV files are written to |
//! | `FILE_PREFIX` | no | Filename prefix (default `metabase_export`) |
//! | `METABASE_API_KEY` | no | Personal API key |
//! | `METABASE_USERNAME` / `METABASE_PASSWORD` | no | Session login |
//!
//! A `.env` file is loaded by the binary before these are read.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

/// Default filename prefix when `FILE_PREFIX` is unset.
pub const DEFAULT_FILE_PREFIX: &str = "metabase_export";

/// How to authenticate against Metabase.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Password { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Settings shared by every card of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub credentials: Credentials,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env(use_api_key: bool) -> ConfigResult<Self> {
        Self::from_lookup(use_api_key, |name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(use_api_key: bool, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let require = |name: &str| get(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()));

        let host = require("METABASE_HOST")?;
        let output_dir = PathBuf::from(require("OUTPUT_DIR")?);
        let file_prefix = get("FILE_PREFIX").unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string());

        let credentials = if use_api_key || get("METABASE_API_KEY").is_some() {
            Credentials::ApiKey(require("METABASE_API_KEY")?)
        } else {
            match (get("METABASE_USERNAME"), get("METABASE_PASSWORD")) {
                (Some(username), Some(password)) => Credentials::Password { username, password },
                _ => return Err(ConfigError::MissingCredentials),
            }
        };

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            output_dir,
            file_prefix,
            credentials,
        })
    }
}

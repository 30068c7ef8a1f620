//! # metabase-export - Metabase card results as locale-adapted CSV
//!
//! Downloads the CSV export of Metabase saved questions ("cards") and writes
//! them to disk, optionally re-encoded for spreadsheet users in a decimal-comma
//! locale: custom delimiter, strict quoting, pt-BR numbers and a UTF-8 BOM.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Metabase   │────▶│   Parser    │────▶│  Transform  │────▶│   Writer    │──▶ file
//! │  (HTTP CSV) │     │  (lenient)  │     │  (numbers)  │     │  (dialect)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use metabase_export::{reformat, ReformatOptions};
//!
//! let options = ReformatOptions {
//!     quote_all: true,
//!     numeric_rewrite: true,
//!     delimiter: ';',
//!     add_bom: false,
//! };
//! let out = reformat(b"total\n\"1,234.56\"\n", &options);
//! assert_eq!(out, b"\"total\"\n\"1.234,56\"\n");
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Document, rows and CSV dialects
//! - [`parser`] - Lenient CSV tokenizer
//! - [`transform`] - Numeric rewrite and the reformatting pipeline
//! - [`writer`] - Dialect-aware CSV serializer
//! - [`config`] - Environment settings
//! - [`client`] - Metabase HTTP client
//! - [`export`] - Filenames, backups and the export loop
//! - [`logs`] - Progress logging

// Core modules
pub mod error;
pub mod models;

// Reformatting pipeline
pub mod parser;
pub mod transform;
pub mod writer;

// Exporter
pub mod client;
pub mod config;
pub mod export;
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ApiError, ConfigError, ExportError};

// =============================================================================
// Re-exports - Reformatting pipeline
// =============================================================================

pub use models::{Dialect, Document, Quoting, Row};
pub use parser::{decode_content, parse};
pub use transform::{reformat, reformat_with_report, rewrite_number, ReformatOptions, ReformatReport};
pub use writer::{serialize, UTF8_BOM};

// =============================================================================
// Re-exports - Exporter
// =============================================================================

pub use client::{Auth, MetabaseClient};
pub use config::{Credentials, Settings};
pub use export::{backup_existing, export_cards, parse_params, safe_filename, ExportPlan};

//! Lenient CSV tokenizer.
//!
//! Turns a raw export body into a [`Document`]. Nothing here rejects input:
//! invalid UTF-8 is replaced, ragged rows are kept as they are, and an empty
//! body is an empty document.

use std::borrow::Cow;

use encoding_rs::UTF_8;

use crate::models::{Dialect, Document, Row};

/// Decode bytes as UTF-8, replacing malformed sequences with U+FFFD.
///
/// A leading UTF-8 byte-order mark is dropped so it never ends up inside the
/// first cell.
pub fn decode_content(bytes: &[u8]) -> Cow<'_, str> {
    let (content, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if had_errors {
        tracing::warn!("CSV body is not valid UTF-8; malformed sequences were replaced");
    }
    content
}

/// Parse raw CSV bytes written in `dialect`.
///
/// # Example
/// ```
/// use metabase_export::models::Dialect;
/// use metabase_export::parser::parse;
///
/// let doc = parse(b"name,total\n\"Silva, Ana\",\"1,234.50\"\n", &Dialect::SOURCE);
///
/// assert_eq!(doc.len(), 2);
/// assert_eq!(doc.rows()[1], vec!["Silva, Ana", "1,234.50"]);
/// ```
pub fn parse(bytes: &[u8], dialect: &Dialect) -> Document {
    let content = decode_content(bytes);
    parse_str(&content, dialect)
}

/// Parse already-decoded CSV text.
///
/// Lines with no content at all are skipped by the reader, so a blank line
/// between records yields no row rather than an empty one.
pub fn parse_str(content: &str, dialect: &Dialect) -> Document {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter())
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Row> = Vec::new();

    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(record) => rows.push(record.iter().map(String::from).collect()),
            // Decoded text cannot fail UTF-8 checks and an in-memory reader
            // has no I/O errors, so this arm is not expected to run.
            Err(e) => tracing::warn!(record = index + 1, error = %e, "skipping unreadable CSV record"),
        }
    }

    Document::new(rows)
}

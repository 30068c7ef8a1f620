//! CSV serializer for the target dialect.
//!
//! Rows are written with a line-feed terminator and the dialect's delimiter
//! and quoting policy. Serialization has no failure modes of its own: ragged
//! rows are written as they are, and the output buffer lives in memory.
//! Rows without cells produce no output line.

use csv::{QuoteStyle, Terminator};

use crate::models::{Dialect, Document, Quoting};

/// UTF-8 byte-order mark, for spreadsheet applications that sniff encodings.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize `document` in `dialect`, optionally prefixed with a UTF-8 BOM.
///
/// # Example
/// ```
/// use metabase_export::models::{Dialect, Document, Quoting};
/// use metabase_export::writer::serialize;
///
/// let doc = Document::new(vec![vec!["a,b".into(), "c".into()]]);
///
/// assert_eq!(serialize(&doc, &Dialect::SOURCE, false), b"\"a,b\",c\n");
/// let all = Dialect::SOURCE.with_quoting(Quoting::All);
/// assert_eq!(serialize(&doc, &all, false), b"\"a,b\",\"c\"\n");
/// ```
pub fn serialize(document: &Document, dialect: &Dialect, add_bom: bool) -> Vec<u8> {
    let mut out = Vec::new();
    if add_bom {
        out.extend_from_slice(UTF8_BOM);
    }

    if let Err(e) = write_rows(document, dialect, &mut out) {
        // Writing into a Vec cannot fail; keep whatever was produced.
        tracing::error!(error = %e, "CSV serialization stopped early");
    }

    out
}

fn write_rows(document: &Document, dialect: &Dialect, out: &mut Vec<u8>) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(dialect.delimiter())
        .quote_style(quote_style(dialect.quoting()))
        .terminator(Terminator::Any(b'\n'))
        .double_quote(true)
        .flexible(true)
        .has_headers(false)
        .from_writer(out);

    // A zero-cell row would come out as `""`, which reads back as one
    // empty cell; it has nothing to write.
    for row in document.rows().iter().filter(|row| !row.is_empty()) {
        writer.write_record(row)?;
    }

    writer.flush()?;
    Ok(())
}

fn quote_style(quoting: Quoting) -> QuoteStyle {
    match quoting {
        Quoting::All => QuoteStyle::Always,
        Quoting::Minimal => QuoteStyle::Necessary,
    }
}

//! Reformatting pipeline: parse, rewrite numbers, serialize.
//!
//! ```text
//! raw bytes ──▶ parser ──▶ Document ──▶ rewrite_number (optional) ──▶ writer ──▶ bytes
//! ```
//!
//! # Example
//!
//! ```
//! use metabase_export::transform::{reformat, ReformatOptions};
//!
//! let options = ReformatOptions {
//!     numeric_rewrite: true,
//!     delimiter: ';',
//!     ..ReformatOptions::default()
//! };
//! let out = reformat(b"name,total\nAna,\"1,234.5\"\n", &options);
//!
//! assert_eq!(out, b"name;total\nAna;1.234,50\n");
//! ```

use super::number::rewrite_number;
use crate::error::ConfigResult;
use crate::models::{Dialect, Document, Quoting};
use crate::parser::parse;
use crate::writer::serialize;

/// Options for the reformatting pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReformatOptions {
    /// Quote every cell instead of only the ones that need it.
    pub quote_all: bool,

    /// Rewrite en-US numbers into pt-BR notation.
    pub numeric_rewrite: bool,

    /// Target delimiter.
    pub delimiter: char,

    /// Prepend a UTF-8 byte-order mark.
    pub add_bom: bool,
}

impl Default for ReformatOptions {
    fn default() -> Self {
        Self {
            quote_all: false,
            numeric_rewrite: false,
            delimiter: ',',
            add_bom: false,
        }
    }
}

impl ReformatOptions {
    /// True when the options describe the source format unchanged.
    pub fn is_passthrough(&self) -> bool {
        *self == Self::default()
    }

    /// Target dialect for these options.
    ///
    /// Fails only for a delimiter no CSV dialect can use.
    pub fn target_dialect(&self) -> ConfigResult<Dialect> {
        let quoting = if self.quote_all {
            Quoting::All
        } else {
            Quoting::Minimal
        };
        Dialect::new(self.delimiter, quoting)
    }
}

/// What a reformat run did, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReformatReport {
    /// Input returned as-is.
    pub passthrough: bool,
    pub rows: usize,
    pub cells: usize,
    /// Cells whose text changed under the numeric rewrite.
    pub cells_rewritten: usize,
}

/// Reformat a raw CSV export.
///
/// Never fails: malformed input degrades gracefully. An unusable delimiter
/// falls back to `,` with a warning; validate it earlier with
/// [`ReformatOptions::target_dialect`] to reject it instead.
pub fn reformat(raw: &[u8], options: &ReformatOptions) -> Vec<u8> {
    reformat_with_report(raw, options).0
}

/// Same as [`reformat`], also returning a [`ReformatReport`].
pub fn reformat_with_report(raw: &[u8], options: &ReformatOptions) -> (Vec<u8>, ReformatReport) {
    if options.is_passthrough() {
        tracing::debug!(bytes = raw.len(), "reformat options are defaults, passing input through");
        let report = ReformatReport {
            passthrough: true,
            ..ReformatReport::default()
        };
        return (raw.to_vec(), report);
    }

    let target = options.target_dialect().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to comma delimiter");
        Dialect::SOURCE.with_quoting(if options.quote_all {
            Quoting::All
        } else {
            Quoting::Minimal
        })
    });

    let document = parse(raw, &Dialect::SOURCE);
    let (document, cells_rewritten) = if options.numeric_rewrite {
        rewrite_numbers(document)
    } else {
        (document, 0)
    };

    let report = ReformatReport {
        passthrough: false,
        rows: document.len(),
        cells: document.cell_count(),
        cells_rewritten,
    };
    tracing::debug!(
        rows = report.rows,
        cells = report.cells,
        rewritten = report.cells_rewritten,
        delimiter = %target.delimiter_char(),
        "reformatted CSV"
    );

    (serialize(&document, &target, options.add_bom), report)
}

/// Apply [`rewrite_number`] to every cell, counting the cells that changed.
pub fn rewrite_numbers(document: Document) -> (Document, usize) {
    let mut changed = 0;
    let document = document.map_cells(|cell| {
        let rewritten = rewrite_number(&cell);
        if rewritten != cell {
            changed += 1;
        }
        rewritten
    });
    (document, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(quote_all: bool, numeric_rewrite: bool, delimiter: char, add_bom: bool) -> ReformatOptions {
        ReformatOptions {
            quote_all,
            numeric_rewrite,
            delimiter,
            add_bom,
        }
    }

    #[test]
    fn test_default_options() {
        let opts = ReformatOptions::default();
        assert!(!opts.quote_all);
        assert!(!opts.numeric_rewrite);
        assert_eq!(opts.delimiter, ',');
        assert!(!opts.add_bom);
        assert!(opts.is_passthrough());
    }

    #[test]
    fn test_passthrough_returns_input() {
        let raw = b"a,  b\n\"x\",1.5\n";
        let (out, report) = reformat_with_report(raw, &ReformatOptions::default());

        assert_eq!(out, raw);
        assert!(report.passthrough);
    }

    #[test]
    fn test_full_regional_export() {
        let raw = b"Cliente,Total,Margem\n\"Silva, Ana\",\"1,234.56\",12%\nBob,-42,0.5\n";
        let (out, report) = reformat_with_report(raw, &opts(true, true, ';', true));

        let mut expected = b"\xEF\xBB\xBF".to_vec();
        expected.extend_from_slice(
            b"\"Cliente\";\"Total\";\"Margem\"\n\"Silva, Ana\";\"1.234,56\";\"12,00%\"\n\"Bob\";\"-42,00\";\"0,50\"\n",
        );
        assert_eq!(out, expected);
        assert_eq!(report.rows, 3);
        assert_eq!(report.cells, 9);
        assert_eq!(report.cells_rewritten, 4);
    }

    #[test]
    fn test_rewrite_quotes_values_containing_target_delimiter() {
        // With a comma delimiter the decimal comma forces quoting.
        let out = reformat(b"v\n1.5\n", &opts(false, true, ',', false));

        assert_eq!(out, b"v\n\"1,50\"\n");
    }

    #[test]
    fn test_numbers_untouched_without_rewrite() {
        let out = reformat(b"v,w\n1.5,x\n", &opts(false, false, ';', false));

        assert_eq!(out, b"v;w\n1.5;x\n");
    }

    #[test]
    fn test_non_numeric_cells_keep_whitespace() {
        let out = reformat(b"  left, right \n", &opts(false, true, ';', false));

        assert_eq!(out, b"  left; right \n");
    }

    #[test]
    fn test_arity_is_preserved() {
        let raw = b"a,b,c\n1\n1,2,3,4\n\"x\ny\",2\n";
        let before = parse(raw, &Dialect::SOURCE);
        let (after, _) = rewrite_numbers(before.clone());

        assert_eq!(after.shape(), before.shape());
        assert_eq!(after.shape(), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(reformat(b"", &opts(true, true, ';', false)).is_empty());
        assert_eq!(reformat(b"", &opts(false, false, ',', true)), b"\xEF\xBB\xBF");
    }

    #[test]
    fn test_bad_delimiter_falls_back_to_comma() {
        let out = reformat(b"a;b\n", &opts(false, false, '\n', false));

        assert_eq!(out, b"a;b\n");
    }

    #[test]
    fn test_target_dialect() {
        let dialect = opts(true, false, ';', false).target_dialect().unwrap();
        assert_eq!(dialect.delimiter(), b';');
        assert_eq!(dialect.quoting(), Quoting::All);

        assert!(opts(false, false, 'é', false).target_dialect().is_err());
    }
}

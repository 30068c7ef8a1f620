//! Data model shared by the reformatting pipeline.
//!
//! - [`Document`] - Ordered rows of one CSV export
//! - [`Row`] - Ordered cells of one record
//! - [`Dialect`] - Delimiter and quoting policy used to serialize a document
//! - [`Quoting`] - Quote-all or quote-minimal

use crate::error::ConfigError;

// =============================================================================
// Document
// =============================================================================

/// One record of a CSV document. Cells are already unescaped.
pub type Row = Vec<String>;

/// A complete, in-memory CSV document.
///
/// Rows may have unequal widths when the source was malformed; nothing here
/// pads or truncates them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    rows: Vec<Row>,
}

impl Document {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of cells across all rows.
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Apply `f` to every cell, keeping row and cell order.
    pub fn map_cells<F>(self, mut f: F) -> Self
    where
        F: FnMut(String) -> String,
    {
        let rows = self
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(&mut f).collect())
            .collect();
        Self { rows }
    }

    /// Per-row cell counts, used to check that a transformation kept the shape.
    pub fn shape(&self) -> Vec<usize> {
        self.rows.iter().map(Vec::len).collect()
    }
}

// =============================================================================
// Dialect
// =============================================================================

/// Quoting policy of a dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quoting {
    /// Quote only cells containing the delimiter, a quote or a line break.
    #[default]
    Minimal,
    /// Quote every cell.
    All,
}

/// Delimiter and quoting policy of a CSV serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    delimiter: u8,
    quoting: Quoting,
}

impl Dialect {
    /// The dialect Metabase exports in: comma, minimal quoting.
    pub const SOURCE: Dialect = Dialect {
        delimiter: b',',
        quoting: Quoting::Minimal,
    };

    /// Build a dialect from a user-supplied delimiter.
    ///
    /// The delimiter must be a single ASCII character other than `"`, `\r`
    /// or `\n`.
    pub fn new(delimiter: char, quoting: Quoting) -> Result<Self, ConfigError> {
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\r' | '\n') {
            return Err(ConfigError::InvalidDelimiter(delimiter));
        }
        Ok(Self {
            delimiter: delimiter as u8,
            quoting,
        })
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn delimiter_char(&self) -> char {
        char::from(self.delimiter)
    }

    pub fn quoting(&self) -> Quoting {
        self.quoting
    }

    pub fn with_quoting(mut self, quoting: Quoting) -> Self {
        self.quoting = quoting;
        self
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_rejects_unusable_delimiters() {
        assert!(Dialect::new(';', Quoting::Minimal).is_ok());
        assert!(Dialect::new('\t', Quoting::All).is_ok());
        assert!(matches!(
            Dialect::new('"', Quoting::Minimal),
            Err(ConfigError::InvalidDelimiter('"'))
        ));
        assert!(Dialect::new('\n', Quoting::Minimal).is_err());
        assert!(Dialect::new('§', Quoting::Minimal).is_err());
    }

    #[test]
    fn test_map_cells_keeps_shape() {
        let doc = Document::new(vec![
            vec!["a".into(), "b".into()],
            vec!["c".into()],
            vec![],
        ]);
        let mapped = doc.clone().map_cells(|c| c.to_uppercase());

        assert_eq!(mapped.shape(), doc.shape());
        assert_eq!(mapped.rows()[0], vec!["A", "B"]);
        assert_eq!(mapped.cell_count(), 3);
    }
}

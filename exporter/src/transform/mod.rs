//! Transformation module.
//!
//! - Number: Numeric-notation rewrite for single cells
//! - Pipeline: Parse, rewrite and serialize a whole export

pub mod number;
pub mod pipeline;

pub use number::{rewrite_number, NumericToken};
pub use pipeline::{reformat, reformat_with_report, rewrite_numbers, ReformatOptions, ReformatReport};

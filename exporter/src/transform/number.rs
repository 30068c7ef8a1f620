//! Numeric-notation rewrite for single cells.
//!
//! Cells written in en-US notation (`1,234.5`, `-42`, `12%`) are rewritten to
//! pt-BR notation with exactly two decimals (`1.234,50`, `-42,00`, `12,00%`).
//! Anything else is returned untouched.
//!
//! Rounding works on the decimal digits directly and rounds half away from
//! zero, so results never depend on floating-point representation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Anchored numeric token grammar: sign, plain or comma-grouped integer,
/// optional fraction, optional percent sign.
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?)([0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?:\.([0-9]+))?(%?)$")
        .expect("numeric token pattern compiles")
});

/// Number of fraction digits in rewritten values.
const FRACTION_DIGITS: usize = 2;

/// A cell recognized as a number in source notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericToken<'a> {
    /// `""`, `"+"` or `"-"`, reattached verbatim.
    pub sign: &'a str,
    /// Integer digits with grouping separators removed.
    pub integer: String,
    /// Fraction digits, if the token had a fractional part.
    pub fraction: Option<&'a str>,
    /// Whether the token ended with `%`.
    pub percent: bool,
}

impl<'a> NumericToken<'a> {
    /// Match `text` against the grammar. Surrounding whitespace is ignored,
    /// but the token must span the whole trimmed text.
    pub fn recognize(text: &'a str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let caps = NUMERIC_TOKEN.captures(trimmed)?;
        let sign = caps.get(1).map_or("", |m| m.as_str());
        let integer = caps.get(2)?.as_str().replace(',', "");
        let fraction = caps.get(3).map(|m| m.as_str());
        let percent = caps.get(4).is_some_and(|m| !m.as_str().is_empty());

        Some(Self {
            sign,
            integer,
            fraction,
            percent,
        })
    }

    /// Magnitude in canonical en-US form with two decimals, e.g. `1,234.50`.
    ///
    /// Returns `None` if the digits do not form a decimal number.
    pub fn canonical_magnitude(&self) -> Option<String> {
        let (integer, cents) = round_to_cents(&self.integer, self.fraction.unwrap_or(""))?;
        Some(format!("{}.{}", group_thousands(&integer), cents))
    }

    /// The full rewritten cell in target notation.
    pub fn to_target_notation(&self) -> Option<String> {
        let magnitude = swap_separators(&self.canonical_magnitude()?);
        let percent = if self.percent { "%" } else { "" };
        Some(format!("{}{}{}", self.sign, magnitude, percent))
    }
}

/// Rewrite a cell from en-US to pt-BR numeric notation.
///
/// Non-numeric cells come back byte-for-byte, whitespace included.
///
/// # Example
/// ```
/// use metabase_export::transform::rewrite_number;
///
/// assert_eq!(rewrite_number("1,234.56"), "1.234,56");
/// assert_eq!(rewrite_number("12%"), "12,00%");
/// assert_eq!(rewrite_number("not_a_number"), "not_a_number");
/// ```
pub fn rewrite_number(cell: &str) -> String {
    NumericToken::recognize(cell)
        .and_then(|token| token.to_target_notation())
        .unwrap_or_else(|| cell.to_string())
}

/// Round `integer.fraction` to two decimals, half away from zero.
///
/// Returns the integer digits (no leading zeros, at least `"0"`) and exactly
/// two fraction digits.
fn round_to_cents(integer: &str, fraction: &str) -> Option<(String, String)> {
    if integer.is_empty()
        || !integer.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let mut digits: Vec<u8> = integer.bytes().collect();
    digits.extend(
        fraction
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(FRACTION_DIGITS),
    );

    let round_up = fraction
        .as_bytes()
        .get(FRACTION_DIGITS)
        .is_some_and(|&d| d >= b'5');

    if round_up {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let split = digits.len() - FRACTION_DIGITS;
    let (int_digits, cents) = digits.split_at(split);

    let first_significant = int_digits
        .iter()
        .position(|&d| d != b'0')
        .unwrap_or(int_digits.len().saturating_sub(1));
    let int_digits = &int_digits[first_significant..];

    Some((
        String::from_utf8_lossy(int_digits).into_owned(),
        String::from_utf8_lossy(cents).into_owned(),
    ))
}

/// Insert `,` every three digits from the right.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Swap `,` and `.` in one pass so grouping and decimal marks never collide.
fn swap_separators(canonical: &str) -> String {
    canonical
        .chars()
        .map(|c| match c {
            ',' => '.',
            '.' => ',',
            other => other,
        })
        .collect()
}

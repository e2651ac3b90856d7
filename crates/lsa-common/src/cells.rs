//! Polars `AnyValue` helpers for survey tables.
//!
//! Instrument exports mix numeric and text columns for the same items
//! (`"3"`, `3`, `3.0`, `"NA"`), so every cell read goes through these helpers.

use polars::prelude::AnyValue;

/// Text tokens that mark a cell as missing.
pub const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", ".", "NAN", "NULL"];

/// Outcome of reading a cell as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericCell {
    /// Null or a missing-value token.
    Missing,
    /// A finite number.
    Value(f64),
    /// Text that is neither a number nor a missing token.
    Invalid(String),
}

impl NumericCell {
    /// Returns the number, treating missing and invalid cells as `None`.
    pub fn value(&self) -> Option<f64> {
        match self {
            NumericCell::Value(v) => Some(*v),
            NumericCell::Missing | NumericCell::Invalid(_) => None,
        }
    }
}

/// Returns true when `text` is one of [`MISSING_TOKENS`] (case-insensitive).
pub fn is_missing_token(text: &str) -> bool {
    let trimmed = text.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| token.eq_ignore_ascii_case(trimmed))
}

/// Converts a cell to trimmed text.
///
/// Integral floats print without a fractional part so that participant ids
/// stored as `1001.0` and `"1001"` compare equal.
///
/// ```
/// use polars::prelude::AnyValue;
/// use lsa_common::cell_text;
///
/// assert_eq!(cell_text(AnyValue::Null), "");
/// assert_eq!(cell_text(AnyValue::Float64(1001.0)), "1001");
/// assert_eq!(cell_text(AnyValue::String("  P-01 ")), "P-01");
/// ```
pub fn cell_text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.trim().to_string(),
        AnyValue::StringOwned(s) => s.trim().to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => {
            let s = other.to_string();
            let s = s.trim();
            if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
                s[1..s.len() - 1].to_string()
            } else {
                s.to_string()
            }
        }
    }
}

/// Reads a cell as a number.
pub fn numeric_cell(value: AnyValue<'_>) -> NumericCell {
    match value {
        AnyValue::Null => NumericCell::Missing,
        AnyValue::Int8(v) => NumericCell::Value(f64::from(v)),
        AnyValue::Int16(v) => NumericCell::Value(f64::from(v)),
        AnyValue::Int32(v) => NumericCell::Value(f64::from(v)),
        AnyValue::Int64(v) => NumericCell::Value(v as f64),
        AnyValue::UInt8(v) => NumericCell::Value(f64::from(v)),
        AnyValue::UInt16(v) => NumericCell::Value(f64::from(v)),
        AnyValue::UInt32(v) => NumericCell::Value(f64::from(v)),
        AnyValue::UInt64(v) => NumericCell::Value(v as f64),
        AnyValue::Float32(v) => float_cell(f64::from(v)),
        AnyValue::Float64(v) => float_cell(v),
        AnyValue::String(s) => text_cell(s),
        AnyValue::StringOwned(s) => text_cell(s.as_str()),
        other => text_cell(&cell_text(other)),
    }
}

fn float_cell(v: f64) -> NumericCell {
    if v.is_finite() {
        NumericCell::Value(v)
    } else {
        NumericCell::Missing
    }
}

fn text_cell(text: &str) -> NumericCell {
    if is_missing_token(text) {
        return NumericCell::Missing;
    }
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => NumericCell::Value(v),
        _ => NumericCell::Invalid(text.trim().to_string()),
    }
}

/// Formats a float without trailing fractional zeros.
///
/// Only trims when the rendering has a decimal point, so `40.0` becomes `"40"`
/// rather than `"4"`.
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "-" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_integers_and_floats() {
        assert_eq!(cell_text(AnyValue::Int32(42)), "42");
        assert_eq!(cell_text(AnyValue::Float64(3.0)), "3");
        assert_eq!(cell_text(AnyValue::Float64(2.5)), "2.5");
    }

    #[test]
    fn test_numeric_cell_missing_tokens() {
        assert_eq!(numeric_cell(AnyValue::Null), NumericCell::Missing);
        assert_eq!(numeric_cell(AnyValue::String("NA")), NumericCell::Missing);
        assert_eq!(numeric_cell(AnyValue::String(" n/a ")), NumericCell::Missing);
        assert_eq!(numeric_cell(AnyValue::String("")), NumericCell::Missing);
        assert_eq!(numeric_cell(AnyValue::Float64(f64::NAN)), NumericCell::Missing);
    }

    #[test]
    fn test_numeric_cell_values() {
        assert_eq!(numeric_cell(AnyValue::Int64(4)), NumericCell::Value(4.0));
        assert_eq!(numeric_cell(AnyValue::String(" 2.5")), NumericCell::Value(2.5));
        assert_eq!(numeric_cell(AnyValue::Float32(1.5)).value(), Some(1.5));
    }

    #[test]
    fn test_numeric_cell_invalid_text() {
        assert_eq!(
            numeric_cell(AnyValue::String("often")),
            NumericCell::Invalid("often".to_string())
        );
        assert_eq!(numeric_cell(AnyValue::String("often")).value(), None);
    }

    #[test]
    fn test_format_numeric() {
        assert_eq!(format_numeric(1.0), "1");
        assert_eq!(format_numeric(1.50), "1.5");
        assert_eq!(format_numeric(40.0), "40");
        assert_eq!(format_numeric(-0.0), "-0");
        assert_eq!(format_numeric(100.25), "100.25");
    }
}

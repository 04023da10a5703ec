//! Column type inference for untyped text

use crate::config::ParseOptions;
use crate::model::{format_float, Column, ValueType};

/// Per-column tallies gathered in the first pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnStats {
    pub integers: usize,
    pub floats: usize,
    pub strings: usize,
    pub blanks: usize,
    /// Longest token, in characters
    pub max_len: usize,
    /// Most fractional digits seen in a float token
    pub max_fraction: usize,
    /// Widest integer part of a numeric token, sign included
    pub max_whole: usize,
    /// Some integer token does not fit in 32 bits
    pub wide_integer: bool,
}

impl ColumnStats {
    /// Tally one token
    pub fn observe(&mut self, token: &str, nan_literal: &str) {
        let trimmed = token.trim();
        self.max_len = self.max_len.max(token.chars().count());
        if trimmed.is_empty() {
            self.blanks += 1;
            return;
        }
        match classify(trimmed, nan_literal) {
            TokenKind::Integer(fits_i32) => {
                self.integers += 1;
                self.wide_integer |= !fits_i32;
                self.max_whole = self.max_whole.max(trimmed.len());
            }
            TokenKind::Float(fraction) => {
                self.floats += 1;
                self.max_fraction = self.max_fraction.max(fraction);
                // Exponent notation can render wider than it was written
                if let Ok(value) = trimmed.parse::<f64>() {
                    let rendered = format_float(value, Some(0), "");
                    self.max_whole = self.max_whole.max(rendered.len());
                }
            }
            TokenKind::Text => self.strings += 1,
        }
    }

    /// Pick a column type from the tallies
    pub fn infer(&self, name: &str) -> Column {
        if self.strings == 0 && self.floats == 0 && self.integers > 0 {
            let value_type = if self.wide_integer {
                ValueType::Int64
            } else {
                ValueType::Int32
            };
            return Column::new(name, value_type).with_width(self.max_len);
        }
        if self.strings == 0 && self.floats > 0 {
            let point = usize::from(self.max_fraction > 0);
            let rendered = self.max_whole + point + self.max_fraction;
            return Column::new(name, ValueType::Float64)
                .with_width(self.max_len.max(rendered))
                .with_precision(self.max_fraction);
        }
        let width = if self.integers + self.floats + self.strings == 0 {
            name.chars().count()
        } else {
            self.max_len
        };
        Column::string(name, width)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TokenKind {
    Integer(bool),
    Float(usize),
    Text,
}

fn classify(token: &str, nan_literal: &str) -> TokenKind {
    if let Ok(i) = token.parse::<i64>() {
        return TokenKind::Integer(i32::try_from(i).is_ok());
    }
    if token == nan_literal || token.eq_ignore_ascii_case("nan") {
        return TokenKind::Float(0);
    }
    // Rust also parses "inf" and "infinity"; those stay text here
    if token.bytes().any(|b| b.is_ascii_digit()) && token.parse::<f64>().is_ok() {
        return TokenKind::Float(fraction_digits(token));
    }
    TokenKind::Text
}

/// Fractional digits the value needs once any exponent is applied
fn fraction_digits(token: &str) -> usize {
    let (mantissa, exponent) = match token.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i64>().unwrap_or(0)),
        None => (token, 0),
    };
    let digits = mantissa
        .split_once('.')
        .map(|(_, frac)| frac.chars().filter(|c| c.is_ascii_digit()).count())
        .unwrap_or(0);
    (digits as i64 - exponent).max(0) as usize
}

/// Two-pass inference over tokenized rows. `names` must already hold one entry per column.
pub fn infer_columns(names: &[String], rows: &[Vec<String>], options: &ParseOptions) -> Vec<Column> {
    let mut stats = vec![ColumnStats::default(); names.len()];
    for row in rows {
        for (col, token) in row.iter().enumerate().take(names.len()) {
            stats[col].observe(token, &options.nan_literal);
        }
    }

    names
        .iter()
        .zip(&stats)
        .map(|(name, stat)| {
            if let Some(value_type) = options.column_type(name) {
                let mut column = Column::new(name.clone(), value_type.clone()).with_width(stat.max_len);
                if value_type.is_float() {
                    column.precision = Some(stat.max_fraction);
                }
                column
            } else if !options.infer_types {
                let width = if stat.max_len == 0 { name.chars().count() } else { stat.max_len };
                Column::string(name.clone(), width)
            } else {
                stat.infer(name)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_infer_priorities() {
        let names = vec!["id".to_string(), "value".to_string(), "label".to_string(), "blank".to_string()];
        let data = rows(&[&["1", "1", "x", ""], &["2", "2.25", "3", ""], &["", "NaN", "yy", ""]]);
        let columns = infer_columns(&names, &data, &ParseOptions::default());

        assert_eq!(columns[0].value_type, ValueType::Int32);
        assert_eq!(columns[1].value_type, ValueType::Float64);
        assert_eq!(columns[1].precision, Some(2));
        assert_eq!(columns[1].width, Some(4));
        assert_eq!(columns[2].value_type, ValueType::String);
        assert_eq!(columns[2].width, Some(2));
        assert_eq!(columns[3].value_type, ValueType::String);
        assert_eq!(columns[3].width, Some(5));
    }

    #[test]
    fn test_override_wins() {
        let names = vec!["code".to_string()];
        let data = rows(&[&["007"], &["12"]]);
        let options = ParseOptions::default().with_column_type("CODE", ValueType::String);
        let columns = infer_columns(&names, &data, &options);
        assert_eq!(columns[0].value_type, ValueType::String);
    }

    #[test]
    fn test_wide_integers() {
        let names = vec!["n".to_string()];
        let data = rows(&[&["1"], &["9999999999"]]);
        let columns = infer_columns(&names, &data, &ParseOptions::default());
        assert_eq!(columns[0].value_type, ValueType::Int64);
    }

    #[test]
    fn test_exponent_tokens_keep_their_digits() {
        let names = vec!["x".to_string()];
        let data = rows(&[&["1.5e-3"], &["2"], &["4E5"]]);
        let columns = infer_columns(&names, &data, &ParseOptions::default());
        assert_eq!(columns[0].value_type, ValueType::Float64);
        assert_eq!(columns[0].precision, Some(4));
        assert_eq!(columns[0].width, Some(11));
        let small = columns[0].parse_text("1.5e-3").unwrap();
        assert_eq!(columns[0].format_value(&small).unwrap(), "0.0015");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("inf", "NaN"), TokenKind::Text);
        assert_eq!(classify("1.5e3", "NaN"), TokenKind::Float(0));
        assert_eq!(classify("1.5e-3", "NaN"), TokenKind::Float(4));
        assert_eq!(classify("2.50E+1", "NaN"), TokenKind::Float(1));
        assert_eq!(classify("-12", "NaN"), TokenKind::Integer(true));
    }
}

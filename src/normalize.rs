//! Row normalization: raw text cells to `(key, count)` pairs.
//!
//! Never fails. Rows without a key are dropped, counts that cannot be read
//! become zero.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::entity::{CountRow, RawRow};

/// Leading unsigned integer. Only `,` groups digits; whitespace ends the number.
static LEADING_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\+?([0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)").expect("static regex is valid")
});

/// Which raw columns hold the grouping key and the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ColumnSpec {
    pub key_column: usize,
    pub value_column: usize,
}

impl ColumnSpec {
    pub const fn new(key_column: usize, value_column: usize) -> Self {
        Self { key_column, value_column }
    }

    /// Project one row of text cells onto a `RawRow`.
    /// Out-of-range columns and blank cells read as `None`.
    pub fn project(&self, cells: &[Option<String>]) -> RawRow {
        let pick = |idx: usize| {
            cells
                .get(idx)
                .and_then(|c| c.as_deref())
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        };
        RawRow {
            key: pick(self.key_column),
            value_text: pick(self.value_column),
        }
    }
}

/// Parse a displayed count such as `"1,234"` or `" 17 shipments"`.
/// Anything without a leading digit parses as zero.
pub fn parse_count(text: &str) -> u64 {
    let Some(caps) = LEADING_COUNT.captures(text) else {
        return 0;
    };
    let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().unwrap_or(0)
}

/// Normalize already-projected rows.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<CountRow> {
    rows.iter()
        .filter_map(|row| {
            let key = row.key.as_deref()?.trim();
            if key.is_empty() {
                return None;
            }
            let count = row.value_text.as_deref().map(parse_count).unwrap_or(0);
            Some(CountRow::new(key, count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_handles_separators() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count(" 17 shipments"), 17);
        assert_eq!(parse_count("+8"), 8);
    }

    #[test]
    fn test_parse_count_stops_at_whitespace() {
        // A cell whose text nodes are joined with spaces, e.g. `45<span>12.5%</span>`
        assert_eq!(parse_count("45 12.5%"), 45);
        assert_eq!(parse_count("5 2024"), 5);
        assert_eq!(parse_count("1,204 (3.1%)"), 1204);
        assert_eq!(parse_count("1234"), 1234);
    }

    #[test]
    fn test_parse_count_malformed_is_zero() {
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count("-5"), 0);
        assert_eq!(parse_count("99999999999999999999999"), 0);
    }

    #[test]
    fn test_null_keys_are_dropped() {
        let rows = vec![
            RawRow::new(Some("Shanghai"), Some("5")),
            RawRow::new(None, Some("9")),
            RawRow::new(Some("   "), Some("9")),
            RawRow::new(Some("Busan"), None),
        ];
        let out = normalize_rows(&rows);
        assert_eq!(out, vec![CountRow::new("Shanghai", 5), CountRow::new("Busan", 0)]);
    }

    #[test]
    fn test_normalizer_is_total_on_garbage() {
        let rows = vec![
            RawRow::new(Some("A"), Some("abc")),
            RawRow::new(Some("B"), Some("")),
            RawRow::new(Some("C"), Some("∞")),
            RawRow::default(),
        ];
        let out = normalize_rows(&rows);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.count == 0));
    }

    #[test]
    fn test_project_selects_columns() {
        let cells = vec![
            Some("Shenzhen; Yantian".to_string()),
            Some("CN".to_string()),
            Some(" 1,020 ".to_string()),
        ];
        let row = ColumnSpec::new(0, 2).project(&cells);
        assert_eq!(row.key.as_deref(), Some("Shenzhen; Yantian"));
        assert_eq!(row.value_text.as_deref(), Some("1,020"));

        let missing = ColumnSpec::new(0, 7).project(&cells);
        assert_eq!(missing.value_text, None);
    }
}

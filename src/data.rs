//! Typed cell values and the in-memory [`Dataset`].
//!
//! Every CSV cell is resolved exactly once, at ingestion, into
//! `Option<Value>`: blank cells become `None`, cells that parse as a finite
//! float become [`Value::Number`], and everything else is kept verbatim as
//! [`Value::Text`]. Downstream engines only ever see `f64` slices pulled out
//! of this representation.

use std::{cmp::Ordering, fmt};

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Resolves a raw cell. `None` means the cell was blank.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Some(Value::Number(number)),
            _ => Some(Value::Text(trimmed.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Builds a dataset from raw string cells, typing each one.
    pub fn from_raw<S: AsRef<str>>(columns: &[S], raw_rows: &[Vec<S>]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = raw_rows
            .iter()
            .map(|raw| type_row(raw, columns.len()))
            .collect();
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)?.as_ref()
    }

    /// Reorders rows by the values of `column` when every non-blank value
    /// shares one orderable kind (numbers, dates, or datetimes). Returns
    /// whether the rows were sorted; mixed or free-text columns are left in
    /// their original order. The sort is stable.
    pub fn sort_chronologically(&mut self, column: usize) -> bool {
        let Some(kind) = TimeKind::detect(self.rows.iter().filter_map(|r| r.get(column)?.as_ref()))
        else {
            debug!(
                "Column '{}' is not uniformly numeric or date-like; row order kept",
                self.columns.get(column).map(String::as_str).unwrap_or("?")
            );
            return false;
        };
        self.rows.sort_by(|a, b| {
            let left = a.get(column).and_then(Option::as_ref);
            let right = b.get(column).and_then(Option::as_ref);
            kind.compare(left, right)
        });
        true
    }
}

pub fn type_row<S: AsRef<str>>(raw: &[S], width: usize) -> Row {
    let mut row: Row = raw
        .iter()
        .take(width)
        .map(|cell| Value::parse(cell.as_ref()))
        .collect();
    row.resize(width, None);
    row
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeKind {
    Numeric,
    Date,
    DateTime,
}

impl TimeKind {
    fn detect<'a, I>(values: I) -> Option<Self>
    where
        I: Iterator<Item = &'a Value>,
    {
        let mut kind = None;
        for value in values {
            let current = match value {
                Value::Number(_) => TimeKind::Numeric,
                Value::Text(text) if parse_naive_date(text).is_some() => TimeKind::Date,
                Value::Text(text) if parse_naive_datetime(text).is_some() => TimeKind::DateTime,
                Value::Text(_) => return None,
            };
            match kind {
                None => kind = Some(current),
                Some(existing) if existing == current => {}
                Some(_) => return None,
            }
        }
        kind
    }

    fn compare(self, left: Option<&Value>, right: Option<&Value>) -> Ordering {
        match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => match self {
                TimeKind::Numeric => l
                    .as_number()
                    .unwrap_or_default()
                    .total_cmp(&r.as_number().unwrap_or_default()),
                TimeKind::Date => text_of(l)
                    .and_then(parse_naive_date)
                    .cmp(&text_of(r).and_then(parse_naive_date)),
                TimeKind::DateTime => text_of(l)
                    .and_then(parse_naive_datetime)
                    .cmp(&text_of(r).and_then(parse_naive_datetime)),
            },
        }
    }
}

fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) => Some(s.as_str()),
        Value::Number(_) => None,
    }
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d-%b-%Y", "%b %d %Y",
    ];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| parse_year_month(value))
}

/// Accepts month-granularity labels such as `2024-03` or `Mar-24`.
fn parse_year_month(value: &str) -> Option<NaiveDate> {
    const MONTH_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%y", "%d-%b-%Y"];
    let candidates = [format!("{value}-01"), format!("01-{value}")];
    candidates.iter().find_map(|candidate| {
        MONTH_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
    })
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolves_numbers_text_and_blanks() {
        assert_eq!(Value::parse(" 42 "), Some(Value::Number(42.0)));
        assert_eq!(Value::parse("1e3"), Some(Value::Number(1000.0)));
        assert_eq!(Value::parse("Kerala"), Some(Value::Text("Kerala".into())));
        assert_eq!(Value::parse("   "), None);
    }

    #[test]
    fn non_finite_tokens_stay_text() {
        assert_eq!(Value::parse("NaN"), Some(Value::Text("NaN".into())));
        assert_eq!(Value::parse("inf"), Some(Value::Text("inf".into())));
    }

    #[test]
    fn short_rows_are_padded_with_blanks() {
        let dataset = Dataset::from_raw(&["a", "b", "c"], &[vec!["1"]]);
        assert_eq!(dataset.rows[0], vec![Some(Value::Number(1.0)), None, None]);
    }

    #[test]
    fn sort_orders_numeric_years() {
        let mut dataset = Dataset::from_raw(
            &["Year", "Total"],
            &[vec!["2022", "3"], vec!["2020", "1"], vec!["2021", "2"]],
        );
        assert!(dataset.sort_chronologically(0));
        let totals: Vec<_> = dataset
            .rows
            .iter()
            .filter_map(|r| r[1].as_ref().and_then(Value::as_number))
            .collect();
        assert_eq!(totals, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sort_orders_month_labels() {
        let mut dataset = Dataset::from_raw(
            &["Month", "Total"],
            &[vec!["2024-03", "3"], vec!["2024-01", "1"], vec!["2024-02", "2"]],
        );
        assert!(dataset.sort_chronologically(0));
        assert_eq!(dataset.value(0, 0), Some(&Value::Text("2024-01".into())));
    }

    #[test]
    fn sort_leaves_free_text_alone() {
        let mut dataset = Dataset::from_raw(
            &["Period", "Total"],
            &[vec!["late", "3"], vec!["early", "1"]],
        );
        assert!(!dataset.sort_chronologically(0));
        assert_eq!(dataset.value(0, 0), Some(&Value::Text("late".into())));
    }
}

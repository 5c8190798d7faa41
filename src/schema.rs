//! Column role detection and dataset classification.
//!
//! Roles are decided from column names and the first data row only:
//!
//! - the **time** column is the first header containing one of
//!   [`TIME_KEYWORDS`] (case-insensitive substring match);
//! - the **region** column is the first remaining header containing one of
//!   [`REGION_KEYWORDS`];
//! - every other column whose first-row value is numeric is a **metric**.
//!
//! A column whose first value is text or blank is never a metric, even when
//! later rows hold numbers. The dataset is [`DataType::TimeSeries`] when the
//! time column holds at least two distinct values, and forecasting is allowed
//! once it holds [`MIN_PREDICTION_POINTS`].

use std::{collections::HashSet, fmt};

use log::debug;
use serde::Serialize;

use crate::data::{Dataset, Value};

pub const TIME_KEYWORDS: &[&str] = &["year", "month", "date", "time", "period", "quarter"];
pub const REGION_KEYWORDS: &[&str] = &[
    "state", "district", "region", "level", "area", "zone", "location",
];

/// Fewest distinct time points that may be forecast from.
pub const MIN_PREDICTION_POINTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    TimeSeries,
    Snapshot,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::TimeSeries => write!(f, "TIME_SERIES"),
            DataType::Snapshot => write!(f, "SNAPSHOT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Time,
    Region,
    Metric,
    Ignored,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnRole::Time => "time",
            ColumnRole::Region => "region",
            ColumnRole::Metric => "metric",
            ColumnRole::Ignored => "ignored",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSchema {
    pub time_column: Option<String>,
    pub region_column: Option<String>,
    pub metric_columns: Vec<String>,
    pub data_type: DataType,
    pub can_predict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_reason: Option<String>,
    pub row_count: usize,
    #[serde(skip)]
    columns: Vec<String>,
    #[serde(skip)]
    time_points: usize,
}

impl DetectedSchema {
    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        if !self.columns.iter().any(|c| c == column) {
            return None;
        }
        let role = if self.time_column.as_deref() == Some(column) {
            ColumnRole::Time
        } else if self.region_column.as_deref() == Some(column) {
            ColumnRole::Region
        } else if self.metric_columns.iter().any(|m| m == column) {
            ColumnRole::Metric
        } else {
            ColumnRole::Ignored
        };
        Some(role)
    }

    pub fn roles(&self) -> Vec<(String, ColumnRole)> {
        self.columns
            .iter()
            .filter_map(|c| self.role_of(c).map(|role| (c.clone(), role)))
            .collect()
    }

    /// Distinct non-blank values observed in the time column.
    pub fn time_points(&self) -> usize {
        self.time_points
    }

    /// The requested metric when it was detected, otherwise the first metric.
    pub fn resolve_metric(&self, requested: Option<&str>) -> Option<&str> {
        requested
            .and_then(|name| self.metric_columns.iter().find(|m| *m == name))
            .or_else(|| self.metric_columns.first())
            .map(String::as_str)
    }
}

pub fn detect_time_column<S: AsRef<str>>(columns: &[S]) -> Option<String> {
    first_keyword_match(columns, TIME_KEYWORDS, None)
}

pub fn detect_region_column<S: AsRef<str>>(columns: &[S], time_column: Option<&str>) -> Option<String> {
    first_keyword_match(columns, REGION_KEYWORDS, time_column)
}

fn first_keyword_match<S: AsRef<str>>(
    columns: &[S],
    keywords: &[&str],
    exclude: Option<&str>,
) -> Option<String> {
    columns
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| Some(*name) != exclude)
        .find(|name| {
            let lowered = name.to_lowercase();
            keywords.iter().any(|keyword| lowered.contains(keyword))
        })
        .map(str::to_string)
}

pub fn detect_metric_columns(
    dataset: &Dataset,
    time_column: Option<&str>,
    region_column: Option<&str>,
) -> Vec<String> {
    let Some(first_row) = dataset.rows.first() else {
        return Vec::new();
    };
    dataset
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| Some(name.as_str()) != time_column && Some(name.as_str()) != region_column)
        .filter(|(idx, name)| {
            let numeric = matches!(first_row.get(*idx), Some(Some(Value::Number(_))));
            if !numeric {
                debug!("Column '{name}' has a non-numeric first value; not a metric");
            }
            numeric
        })
        .map(|(_, name)| name.clone())
        .collect()
}

pub fn count_distinct(dataset: &Dataset, column: usize) -> usize {
    dataset
        .rows
        .iter()
        .filter_map(|row| row.get(column)?.as_ref())
        .map(Value::as_display)
        .collect::<HashSet<_>>()
        .len()
}

/// Classifies every column of `dataset` and decides prediction eligibility.
pub fn detect(dataset: &Dataset) -> DetectedSchema {
    let time_column = detect_time_column(&dataset.columns);
    let region_column = detect_region_column(&dataset.columns, time_column.as_deref());
    let metric_columns =
        detect_metric_columns(dataset, time_column.as_deref(), region_column.as_deref());

    let time_points = time_column
        .as_deref()
        .and_then(|name| dataset.column_index(name))
        .map(|idx| count_distinct(dataset, idx))
        .unwrap_or(0);

    let data_type = if time_column.is_some() && time_points >= 2 {
        DataType::TimeSeries
    } else {
        DataType::Snapshot
    };
    let can_predict = data_type == DataType::TimeSeries && time_points >= MIN_PREDICTION_POINTS;
    let prediction_reason = match (data_type, can_predict) {
        (_, true) => None,
        (DataType::Snapshot, false) => Some("snapshot data does not support predictions".to_string()),
        (DataType::TimeSeries, false) => Some(format!(
            "only {time_points} time points found, need {MIN_PREDICTION_POINTS}"
        )),
    };

    debug!(
        "Detected time={:?} region={:?} metrics={:?} ({data_type}, {time_points} time point(s))",
        time_column, region_column, metric_columns
    );

    DetectedSchema {
        time_column,
        region_column,
        metric_columns,
        data_type,
        can_predict,
        prediction_reason,
        row_count: dataset.row_count(),
        columns: dataset.columns.clone(),
        time_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollments(years: &[&str]) -> Dataset {
        let rows: Vec<Vec<&str>> = years
            .iter()
            .enumerate()
            .map(|(i, year)| vec![*year, if i % 2 == 0 { "X" } else { "Y" }, "1000"])
            .collect();
        Dataset::from_raw(&["Year", "State", "Enrollments"], &rows)
    }

    #[test]
    fn detects_year_state_enrollments() {
        let schema = detect(&enrollments(&["2020"]));
        assert_eq!(schema.time_column.as_deref(), Some("Year"));
        assert_eq!(schema.region_column.as_deref(), Some("State"));
        assert_eq!(schema.metric_columns, vec!["Enrollments"]);
        assert_eq!(schema.data_type, DataType::Snapshot);
        assert!(!schema.can_predict);
    }

    #[test]
    fn two_distinct_years_make_a_time_series() {
        let schema = detect(&enrollments(&["2020", "2021", "2021"]));
        assert_eq!(schema.data_type, DataType::TimeSeries);
        assert_eq!(schema.time_points(), 2);
        assert_eq!(
            schema.prediction_reason.as_deref(),
            Some("only 2 time points found, need 6")
        );
    }

    #[test]
    fn six_distinct_years_enable_prediction() {
        let schema = detect(&enrollments(&["2018", "2019", "2020", "2021", "2022", "2023"]));
        assert!(schema.can_predict);
        assert!(schema.prediction_reason.is_none());
    }

    #[test]
    fn snapshot_reason_without_time_column() {
        let dataset = Dataset::from_raw(&["District", "Count"], &[vec!["A", "5"]]);
        let schema = detect(&dataset);
        assert!(schema.time_column.is_none());
        assert_eq!(schema.region_column.as_deref(), Some("District"));
        assert_eq!(
            schema.prediction_reason.as_deref(),
            Some("snapshot data does not support predictions")
        );
    }

    #[test]
    fn first_keyword_match_wins() {
        let columns = ["Reporting_Period", "Fiscal Year", "Zone", "State"];
        assert_eq!(detect_time_column(&columns).as_deref(), Some("Reporting_Period"));
        assert_eq!(detect_region_column(&columns, None).as_deref(), Some("Zone"));
    }

    #[test]
    fn time_column_is_not_reused_as_region() {
        let columns = ["State_Date", "State"];
        let time = detect_time_column(&columns);
        assert_eq!(time.as_deref(), Some("State_Date"));
        assert_eq!(
            detect_region_column(&columns, time.as_deref()).as_deref(),
            Some("State")
        );
    }

    #[test]
    fn first_row_decides_metric_membership() {
        let dataset = Dataset::from_raw(
            &["Year", "Late", "Count"],
            &[vec!["2020", "n/a", "1"], vec!["2021", "7", "2"]],
        );
        let schema = detect(&dataset);
        assert_eq!(schema.metric_columns, vec!["Count"]);
        assert_eq!(schema.role_of("Late"), Some(ColumnRole::Ignored));
        assert_eq!(schema.role_of("Year"), Some(ColumnRole::Time));
        assert_eq!(schema.role_of("Missing"), None);
    }

    #[test]
    fn empty_input_is_snapshot_without_metrics() {
        let schema = detect(&Dataset::default());
        assert!(schema.metric_columns.is_empty());
        assert_eq!(schema.data_type, DataType::Snapshot);
        assert_eq!(schema.row_count, 0);
    }

    #[test]
    fn resolve_metric_falls_back_to_first() {
        let dataset = Dataset::from_raw(&["Year", "A", "B"], &[vec!["2020", "1", "2"]]);
        let schema = detect(&dataset);
        assert_eq!(schema.resolve_metric(Some("B")), Some("B"));
        assert_eq!(schema.resolve_metric(Some("Nope")), Some("A"));
        assert_eq!(schema.resolve_metric(None), Some("A"));
    }

    #[test]
    fn serializes_with_wire_names() {
        let schema = detect(&enrollments(&["2020", "2021"]));
        let json = serde_json::to_value(&schema).expect("json");
        assert_eq!(json["dataType"], "TIME_SERIES");
        assert_eq!(json["timeColumn"], "Year");
        assert_eq!(json["rowCount"], 2);
    }
}

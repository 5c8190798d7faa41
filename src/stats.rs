use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::{data::Dataset, schema::DetectedSchema, trend};

/// Descriptive statistics for one metric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub column: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    pub growth_rate: Option<f64>,
}

/// Summarizes `values` in the order given.
///
/// Returns `None` when no finite values remain. Callers strip blanks and
/// text before calling; the growth rate compares the first and last value
/// as supplied, so values must already be in chronological order for it to
/// mean anything.
pub fn summarize(column: &str, values: &[f64]) -> Option<SummaryStats> {
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (&first, &last) = (values.first()?, values.last()?);
    let count = values.len();
    let sum: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Rounding in `sum` can push the mean of identical values past max.
    let mean = (sum / count as f64).clamp(min, max);

    Some(SummaryStats {
        column: column.to_string(),
        count,
        min,
        max,
        mean,
        sum,
        median: median(&values),
        std_dev: std_dev(&values, mean),
        growth_rate: if count >= 2 { growth_rate(first, last) } else { None },
    })
}

/// Percentage change from `first` to `last`; undefined when `first` is zero.
pub fn growth_rate(first: f64, last: f64) -> Option<f64> {
    if first == 0.0 {
        None
    } else {
        Some((last - first) / first * 100.0)
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn std_dev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((squares / (values.len() as f64 - 1.0)).sqrt())
}

/// Numeric values of `column` in row order, skipping blanks and text.
///
/// When `region` names a region (anything but `all`), only that region's
/// rows contribute.
pub fn column_values(
    dataset: &Dataset,
    schema: &DetectedSchema,
    column: &str,
    region: Option<&str>,
) -> Vec<f64> {
    let Some(idx) = dataset.column_index(column) else {
        return Vec::new();
    };
    trend::filter_rows(dataset, schema, region)
        .into_iter()
        .filter_map(|row| row.get(idx)?.as_ref()?.as_number())
        .collect()
}

/// Statistics for every detected metric, or only `column` when given, over
/// the rows of `region`.
///
/// Unknown columns and columns without numeric values are left out rather
/// than reported as errors.
pub fn dataset_stats(
    dataset: &Dataset,
    schema: &DetectedSchema,
    column: Option<&str>,
    region: Option<&str>,
) -> Vec<SummaryStats> {
    let targets: Vec<&str> = match column {
        Some(name) => vec![name],
        None => schema.metric_columns.iter().map(String::as_str).collect(),
    };
    targets
        .into_iter()
        .filter_map(|name| {
            let stats = summarize(name, &column_values(dataset, schema, name, region));
            if stats.is_none() {
                debug!("No numeric values for column '{name}'");
            }
            stats
        })
        .collect()
}

/// Mean of `metric` per distinct region value, keyed by region name.
pub fn region_means(dataset: &Dataset, region_column: &str, metric: &str) -> BTreeMap<String, f64> {
    let (Some(region_idx), Some(metric_idx)) = (
        dataset.column_index(region_column),
        dataset.column_index(metric),
    ) else {
        return BTreeMap::new();
    };
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for row in &dataset.rows {
        let (Some(Some(region)), Some(Some(value))) = (row.get(region_idx), row.get(metric_idx))
        else {
            continue;
        };
        let Some(number) = value.as_number() else {
            continue;
        };
        let entry = totals.entry(region.as_display()).or_insert((0.0, 0));
        entry.0 += number;
        entry.1 += 1;
    }
    totals
        .into_iter()
        .map(|(region, (sum, count))| (region, sum / count as f64))
        .collect()
}

/// Sorted distinct values of the region column.
pub fn distinct_regions(dataset: &Dataset, schema: &DetectedSchema) -> Vec<String> {
    let Some(idx) = schema
        .region_column
        .as_deref()
        .and_then(|name| dataset.column_index(name))
    else {
        return Vec::new();
    };
    let mut regions: Vec<String> = dataset
        .rows
        .iter()
        .filter_map(|row| row.get(idx)?.as_ref().map(|v| v.as_display()))
        .collect();
    regions.sort();
    regions.dedup();
    regions
}

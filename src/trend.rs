//! Time-grouped trend view with trailing moving averages.
//!
//! Rows are optionally narrowed to one region, grouped by the time column in
//! the order each period first appears, and the metric is aggregated within
//! each group. Datasets without a time column but with a region column get a
//! ranking of regions by summed metric instead.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Dataset, Row},
    schema::DetectedSchema,
    stats,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
}

impl Aggregation {
    fn apply(self, values: &[f64]) -> f64 {
        let total: f64 = values.iter().sum();
        match self {
            Aggregation::Sum => total,
            Aggregation::Mean => total / values.len() as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: String,
    pub value: f64,
    pub moving_avg: Option<f64>,
    pub growth_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeries {
    pub metric: String,
    pub region: Option<String>,
    pub data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Copy)]
pub struct TrendOptions {
    pub window: usize,
    pub aggregation: Aggregation,
    pub snapshot_top: usize,
}

/// `None` and `"all"` (any case) both select every region.
pub fn is_all_regions(region: Option<&str>) -> bool {
    region.is_none_or(|r| r.trim().is_empty() || r.trim().eq_ignore_ascii_case("all"))
}

/// Rows belonging to `region`, or every row when no region filter applies.
pub fn filter_rows<'a>(
    dataset: &'a Dataset,
    schema: &DetectedSchema,
    region: Option<&str>,
) -> Vec<&'a Row> {
    let region_idx = schema
        .region_column
        .as_deref()
        .and_then(|name| dataset.column_index(name));
    match (region_idx, region) {
        (Some(idx), Some(wanted)) if !is_all_regions(region) => dataset
            .rows
            .iter()
            .filter(|row| {
                row.get(idx)
                    .and_then(Option::as_ref)
                    .is_some_and(|value| value.as_display() == wanted.trim())
            })
            .collect(),
        _ => dataset.rows.iter().collect(),
    }
}

/// Aggregates `metric` per time period, keeping first-appearance order.
pub fn grouped_series(
    dataset: &Dataset,
    schema: &DetectedSchema,
    metric: &str,
    region: Option<&str>,
    aggregation: Aggregation,
) -> Vec<(String, f64)> {
    let (Some(time_idx), Some(metric_idx)) = (
        schema
            .time_column
            .as_deref()
            .and_then(|name| dataset.column_index(name)),
        dataset.column_index(metric),
    ) else {
        return Vec::new();
    };

    let mut order: Vec<(String, Vec<f64>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for row in filter_rows(dataset, schema, region) {
        let (Some(Some(period)), Some(Some(value))) = (row.get(time_idx), row.get(metric_idx))
        else {
            continue;
        };
        let Some(number) = value.as_number() else {
            continue;
        };
        let key = period.as_display();
        let slot = *positions.entry(key.clone()).or_insert_with(|| {
            order.push((key, Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(number);
    }

    order
        .into_iter()
        .map(|(period, values)| (period, aggregation.apply(&values)))
        .collect()
}

/// Trailing moving average; the first `window - 1` positions have none.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            (i + 1 >= window).then(|| values[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Period-over-period percentage change.
pub fn period_growth(values: &[f64]) -> Vec<Option<f64>> {
    let mut rates = Vec::with_capacity(values.len());
    if !values.is_empty() {
        rates.push(None);
    }
    rates.extend(
        values
            .iter()
            .tuple_windows()
            .map(|(prev, next)| stats::growth_rate(*prev, *next)),
    );
    rates
}

/// Builds the trend view for `metric` (or the first detected metric).
///
/// Returns `None` when the dataset has no metric columns.
pub fn trend(
    dataset: &Dataset,
    schema: &DetectedSchema,
    metric: Option<&str>,
    region: Option<&str>,
    options: TrendOptions,
) -> Option<TrendSeries> {
    let metric = schema.resolve_metric(metric)?.to_string();

    if schema.time_column.is_none() {
        debug!("No time column; ranking regions by '{metric}'");
        return Some(TrendSeries {
            data: rank_regions(dataset, schema, &metric, options.snapshot_top),
            metric,
            region: None,
        });
    }

    let series = grouped_series(dataset, schema, &metric, region, options.aggregation);
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let averages = moving_average(&values, options.window);
    let growth = period_growth(&values);

    let data = series
        .into_iter()
        .zip(averages)
        .zip(growth)
        .map(|(((period, value), moving_avg), growth_rate)| TrendPoint {
            period,
            value,
            moving_avg,
            growth_rate,
        })
        .collect();

    Some(TrendSeries {
        metric,
        region: region
            .filter(|r| !is_all_regions(Some(*r)))
            .map(|r| r.trim().to_string()),
        data,
    })
}

/// Regions ordered by summed `metric`, largest first, at most `top` entries.
pub fn rank_regions(
    dataset: &Dataset,
    schema: &DetectedSchema,
    metric: &str,
    top: usize,
) -> Vec<TrendPoint> {
    let (Some(region_idx), Some(metric_idx)) = (
        schema
            .region_column
            .as_deref()
            .and_then(|name| dataset.column_index(name)),
        dataset.column_index(metric),
    ) else {
        return Vec::new();
    };

    let mut totals: HashMap<String, f64> = HashMap::new();
    for row in &dataset.rows {
        if let (Some(Some(region)), Some(Some(value))) = (row.get(region_idx), row.get(metric_idx))
            && let Some(number) = value.as_number()
        {
            *totals.entry(region.as_display()).or_default() += number;
        }
    }

    totals
        .into_iter()
        .sorted_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .take(top)
        .map(|(period, value)| TrendPoint {
            period,
            value,
            moving_avg: None,
            growth_rate: None,
        })
        .collect()
}

//! Ordinary least-squares trend fitting and forward forecasts.
//!
//! [`fit`] is the pure engine over parallel `x`/`y` slices. [`predict`]
//! wires it to a dataset: the time-grouped series is indexed `1..=n`, fitted,
//! and projected `periods` steps past the last index. Forecast values and
//! their lower bounds never go below zero.

use log::debug;
use serde::Serialize;

use crate::{
    data::Dataset,
    schema::{DetectedSchema, MIN_PREDICTION_POINTS},
    trend::{self, Aggregation},
};

pub const DEFAULT_FORECAST_PERIODS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub period: String,
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
    pub can_predict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub forecast: Vec<ForecastPoint>,
}

impl RegressionResult {
    fn rejected(reason: String) -> Self {
        debug!("Regression skipped: {reason}");
        Self {
            slope: 0.0,
            intercept: 0.0,
            r2: 0.0,
            can_predict: false,
            reason: Some(reason),
            forecast: Vec::new(),
        }
    }
}

/// Fits `y = slope * x + intercept` and forecasts `periods` steps ahead.
///
/// Fewer than [`MIN_PREDICTION_POINTS`] pairs, mismatched lengths, non-finite
/// inputs, an `x` without variance, or magnitudes that overflow the fit all
/// produce a result with `can_predict == false` and a reason instead of
/// NaN-laden output.
pub fn fit(x: &[f64], y: &[f64], periods: usize) -> RegressionResult {
    let n = x.len();
    if n != y.len() {
        return RegressionResult::rejected(format!(
            "time index and values differ in length ({n} vs {})",
            y.len()
        ));
    }
    if n < MIN_PREDICTION_POINTS {
        return RegressionResult::rejected(format!(
            "requires at least {MIN_PREDICTION_POINTS} data points, has {n}"
        ));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return RegressionResult::rejected("inputs contain non-finite values".to_string());
    }

    let count = n as f64;
    let x_mean = x.iter().sum::<f64>() / count;
    let y_mean = y.iter().sum::<f64>() / count;
    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
            let dx = xi - x_mean;
            (sxy + dx * (yi - y_mean), sxx + dx * dx)
        });
    if sxx == 0.0 {
        return RegressionResult::rejected("time index has no variance".to_string());
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - (slope * xi + intercept))
        .collect();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    };

    let residual_mean = residuals.iter().sum::<f64>() / count;
    let sigma = (residuals
        .iter()
        .map(|r| (r - residual_mean).powi(2))
        .sum::<f64>()
        / count)
        .sqrt();

    let last_x = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let forecast = (1..=periods)
        .map(|step| {
            let raw = slope * (last_x + step as f64) + intercept;
            let value = raw.max(0.0);
            let margin = sigma * (1.5 + 0.1 * (step - 1) as f64);
            ForecastPoint {
                period: format!("Forecast {step}"),
                value,
                lower_bound: (value - margin).max(0.0),
                upper_bound: value + margin,
            }
        })
        .collect::<Vec<_>>();

    let overflowed = [slope, intercept, r2, sigma].iter().any(|v| !v.is_finite())
        || forecast.iter().any(|point| {
            [point.value, point.lower_bound, point.upper_bound]
                .iter()
                .any(|v| !v.is_finite())
        });
    if overflowed {
        return RegressionResult::rejected("values too large to fit".to_string());
    }

    RegressionResult {
        slope,
        intercept,
        r2,
        can_predict: true,
        reason: None,
        forecast,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalPoint {
    pub period: String,
    pub value: f64,
}

/// Forecast for one metric of a dataset, in the shape clients render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub can_predict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub metric: Option<String>,
    pub r2_score: Option<f64>,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub historical: Vec<HistoricalPoint>,
    pub predictions: Vec<ForecastPoint>,
}

impl Prediction {
    fn unavailable(metric: Option<String>, reason: String) -> Self {
        Self {
            can_predict: false,
            reason: Some(reason),
            metric,
            r2_score: None,
            slope: None,
            intercept: None,
            historical: Vec::new(),
            predictions: Vec::new(),
        }
    }
}

/// Fits the time-grouped series of `metric` and forecasts `periods` ahead.
///
/// Gated on the schema's prediction eligibility; an ineligible dataset yields
/// the schema's reason rather than an attempted fit.
pub fn predict(
    dataset: &Dataset,
    schema: &DetectedSchema,
    metric: Option<&str>,
    periods: usize,
    aggregation: Aggregation,
) -> Prediction {
    if !schema.can_predict {
        let reason = schema
            .prediction_reason
            .clone()
            .unwrap_or_else(|| "prediction is not available".to_string());
        return Prediction::unavailable(None, reason);
    }
    let Some(metric) = schema.resolve_metric(metric) else {
        return Prediction::unavailable(None, "no numeric metric columns detected".to_string());
    };

    let series = trend::grouped_series(dataset, schema, metric, None, aggregation);
    let x: Vec<f64> = (1..=series.len()).map(|i| i as f64).collect();
    let y: Vec<f64> = series.iter().map(|(_, value)| *value).collect();
    let result = fit(&x, &y, periods);
    if !result.can_predict {
        let reason = result.reason.unwrap_or_default();
        return Prediction::unavailable(Some(metric.to_string()), reason);
    }

    Prediction {
        can_predict: true,
        reason: None,
        metric: Some(metric.to_string()),
        r2_score: Some(result.r2),
        slope: Some(result.slope),
        intercept: Some(result.intercept),
        historical: series
            .into_iter()
            .map(|(period, value)| HistoricalPoint { period, value })
            .collect(),
        predictions: result.forecast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use proptest::prelude::*;

    fn index(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn recovers_exact_line() {
        let x = index(10);
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 2.0).collect();
        let result = fit(&x, &y, 6);
        assert!(result.can_predict);
        assert!((result.slope - 3.0).abs() < 1e-6);
        assert!((result.intercept - 2.0).abs() < 1e-6);
        assert!((result.r2 - 1.0).abs() < 1e-6);
        assert_eq!(result.forecast.len(), 6);
        assert_eq!(result.forecast[0].period, "Forecast 1");
        assert!((result.forecast[0].value - 35.0).abs() < 1e-6);
        assert!((result.forecast[5].value - 50.0).abs() < 1e-6);
    }

    #[test]
    fn fewer_than_six_points_cannot_predict() {
        let result = fit(&index(5), &[1.0, 2.0, 3.0, 4.0, 5.0], 6);
        assert!(!result.can_predict);
        assert!(result.forecast.is_empty());
        assert_eq!(result.slope, 0.0);
        assert_eq!(
            result.reason.as_deref(),
            Some("requires at least 6 data points, has 5")
        );
    }

    #[test]
    fn identical_x_cannot_predict() {
        let result = fit(&[4.0; 6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3);
        assert!(!result.can_predict);
        assert_eq!(result.reason.as_deref(), Some("time index has no variance"));
    }

    #[test]
    fn constant_y_has_perfect_fit() {
        let result = fit(&index(6), &[7.0; 6], 2);
        assert!(result.can_predict);
        assert_eq!(result.r2, 1.0);
        assert_eq!(result.slope, 0.0);
        assert_eq!(result.forecast[1].value, 7.0);
    }

    #[test]
    fn declining_series_is_floored_at_zero() {
        let x = index(6);
        let y = [50.0, 40.0, 30.0, 20.0, 10.0, 5.0];
        let result = fit(&x, &y, 6);
        assert!(result.slope < 0.0);
        assert!(result.forecast.iter().all(|p| p.value >= 0.0 && p.lower_bound >= 0.0));
        assert_eq!(result.forecast[5].value, 0.0);
    }

    #[test]
    fn bands_widen_with_horizon() {
        let x = index(8);
        let y = [10.0, 14.0, 11.0, 17.0, 15.0, 20.0, 18.0, 24.0];
        let result = fit(&x, &y, 4);
        let widths: Vec<f64> = result
            .forecast
            .iter()
            .map(|p| p.upper_bound - p.value)
            .collect();
        assert!(widths.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = fit(&index(6), &[1.0; 7], 1);
        assert!(!result.can_predict);
    }

    #[test]
    fn huge_values_are_rejected_instead_of_overflowing() {
        let y = [1e200, 3e200, 2e200, 5e200, 4e200, 6e200];
        let result = fit(&index(6), &y, 2);
        assert!(!result.can_predict);
        assert_eq!(result.reason.as_deref(), Some("values too large to fit"));
        assert!(result.forecast.is_empty());
        assert!(result.r2.is_finite() && result.slope.is_finite());
    }

    #[test]
    fn predict_uses_grouped_series() {
        let rows: Vec<Vec<String>> = (2015..2023)
            .flat_map(|year| {
                let base = (year - 2014) * 10;
                [
                    vec![year.to_string(), "A".to_string(), base.to_string()],
                    vec![year.to_string(), "B".to_string(), (base + 10).to_string()],
                ]
            })
            .collect();
        let dataset = Dataset::from_raw(&["Year".to_string(), "State".into(), "Count".into()], &rows);
        let schema = schema::detect(&dataset);
        let prediction = predict(&dataset, &schema, None, 3, Aggregation::Mean);
        assert!(prediction.can_predict);
        assert_eq!(prediction.historical.len(), 8);
        assert_eq!(prediction.historical[0].value, 15.0);
        assert_eq!(prediction.predictions.len(), 3);
        assert!((prediction.slope.expect("slope") - 10.0).abs() < 1e-9);
    }

    #[test]
    fn predict_reports_schema_reason() {
        let dataset = Dataset::from_raw(
            &["Year", "Count"],
            &[vec!["2020", "1"], vec!["2021", "2"], vec!["2022", "3"]],
        );
        let schema = schema::detect(&dataset);
        let prediction = predict(&dataset, &schema, None, 6, Aggregation::Mean);
        assert!(!prediction.can_predict);
        assert_eq!(
            prediction.reason.as_deref(),
            Some("only 3 time points found, need 6")
        );
        assert!(prediction.predictions.is_empty());
    }

    proptest! {
        #[test]
        fn short_inputs_never_predict(y in prop::collection::vec(-1.0e6f64..1.0e6, 0..6)) {
            let x = index(y.len());
            let result = fit(&x, &y, 6);
            prop_assert!(!result.can_predict);
            prop_assert!(result.forecast.is_empty());
        }

        #[test]
        fn forecasts_are_never_negative(y in prop::collection::vec(-1.0e6f64..1.0e6, 6..40)) {
            let x = index(y.len());
            let result = fit(&x, &y, 6);
            prop_assert!(result.forecast.iter().all(|p| p.value >= 0.0 && p.lower_bound >= 0.0));
            prop_assert!(result.r2.is_finite());
        }
    }
}

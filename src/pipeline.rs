//! Runs the detection, statistics, trend, forecast, and policy stages over
//! one registered dataset.

use log::debug;
use serde::Serialize;

use crate::{
    config::AnalysisConfig,
    data::Dataset,
    policy::{self, PolicyInput, PolicyRecommendation},
    regression::{self, Prediction},
    schema::DetectedSchema,
    stats::{self, SummaryStats},
    trend::{self, TrendSeries},
};

/// Which metric/region a request is about. Unset fields fall back to the
/// first detected metric and all regions.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub metric: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub schema: DetectedSchema,
    pub stats: Vec<SummaryStats>,
    pub trend: Option<TrendSeries>,
    pub prediction: Prediction,
    pub recommendations: Vec<PolicyRecommendation>,
}

pub fn trend_for(
    dataset: &Dataset,
    schema: &DetectedSchema,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Option<TrendSeries> {
    trend::trend(
        dataset,
        schema,
        request.metric.as_deref(),
        request.region.as_deref(),
        config.trend_options(),
    )
}

pub fn prediction_for(
    dataset: &Dataset,
    schema: &DetectedSchema,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Prediction {
    regression::predict(
        dataset,
        schema,
        request.metric.as_deref(),
        config.forecast_periods,
        config.aggregation,
    )
}

/// Evaluates the policy rules for the requested metric.
///
/// The growth rate and mean come from the metric's summary statistics in row
/// order over the requested region. Regional aggregates are per-region means
/// of the same metric and are only compared when no single region is
/// selected.
pub fn recommendations_for(
    dataset: &Dataset,
    schema: &DetectedSchema,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Vec<PolicyRecommendation> {
    let input = schema
        .resolve_metric(request.metric.as_deref())
        .and_then(|metric| {
            let region = request.region.as_deref();
            let values = stats::column_values(dataset, schema, metric, region);
            let summary = stats::summarize(metric, &values)?;
            let regions = schema
                .region_column
                .as_deref()
                .filter(|_| trend::is_all_regions(region))
                .map(|column| stats::region_means(dataset, column, metric))
                .unwrap_or_default();
            Some(PolicyInput::from_stats(&summary, schema.data_type, regions))
        })
        .unwrap_or_else(|| {
            debug!("No metric statistics available; evaluating rules on empty input");
            PolicyInput {
                data_type: Some(schema.data_type),
                ..PolicyInput::default()
            }
        });
    policy::evaluate(&input, &config.thresholds)
}

pub fn analyze(
    dataset: &Dataset,
    schema: &DetectedSchema,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> AnalysisReport {
    AnalysisReport {
        schema: schema.clone(),
        stats: stats::dataset_stats(dataset, schema, None, request.region.as_deref()),
        trend: trend_for(dataset, schema, request, config),
        prediction: prediction_for(dataset, schema, request, config),
        recommendations: recommendations_for(dataset, schema, request, config),
    }
}

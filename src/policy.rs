//! Threshold rules that turn statistics into policy recommendations.
//!
//! Rules are independent and evaluated in a fixed order; more than one may
//! fire. The three growth rules cover disjoint ranges so at most one of them
//! fires. When nothing fires a single "maintain current strategy"
//! recommendation is emitted. Every recommendation restates the numeric
//! condition that produced it in its `trigger` text.

use std::{collections::BTreeMap, fmt};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{schema::DataType, stats::SummaryStats};

/// Tunable rule thresholds. Growth thresholds are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyThresholds {
    pub decline_growth: f64,
    pub rapid_growth: f64,
    pub stagnant_growth: f64,
    pub disparity_ratio: f64,
    pub high_volume_mean: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            decline_growth: -5.0,
            rapid_growth: 25.0,
            stagnant_growth: 5.0,
            disparity_ratio: 2.0,
            high_volume_mean: 1_000_000_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Outreach,
    Infrastructure,
    Disparity,
    Growth,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Outreach => "outreach",
            Category::Infrastructure => "infrastructure",
            Category::Disparity => "disparity",
            Category::Growth => "growth",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecommendation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub trigger: String,
    pub expected_impact: String,
    pub confidence: Confidence,
    pub confidence_reason: String,
    pub category: Category,
    pub is_ai_generated: bool,
}

/// What the rules look at.
#[derive(Debug, Clone, Default)]
pub struct PolicyInput {
    pub data_type: Option<DataType>,
    pub growth_rate: Option<f64>,
    pub mean: Option<f64>,
    /// Aggregate metric value per region.
    pub regions: BTreeMap<String, f64>,
}

impl PolicyInput {
    pub fn from_stats(
        stats: &SummaryStats,
        data_type: DataType,
        regions: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            data_type: Some(data_type),
            growth_rate: stats.growth_rate,
            mean: Some(stats.mean),
            regions,
        }
    }
}

struct Rule {
    id: &'static str,
    title: &'static str,
    expected_impact: &'static str,
    confidence: Confidence,
    confidence_reason: &'static str,
    category: Category,
}

impl Rule {
    fn recommend(&self, description: String, trigger: String) -> PolicyRecommendation {
        debug!("Rule '{}' fired: {trigger}", self.id);
        PolicyRecommendation {
            id: self.id.to_string(),
            title: self.title.to_string(),
            description,
            trigger,
            expected_impact: self.expected_impact.to_string(),
            confidence: self.confidence,
            confidence_reason: self.confidence_reason.to_string(),
            category: self.category,
            is_ai_generated: false,
        }
    }
}

const GROWTH_DECLINE: Rule = Rule {
    id: "awareness-campaign",
    title: "Launch Awareness Campaign",
    expected_impact: "10-15% improvement in adoption rates within 6 months",
    confidence: Confidence::High,
    confidence_reason: "Sustained decline across the observed time range",
    category: Category::Outreach,
};

const RAPID_GROWTH: Rule = Rule {
    id: "infrastructure-scaling",
    title: "Scale Infrastructure Capacity",
    expected_impact: "Prevent service disruptions and keep processing times stable",
    confidence: Confidence::High,
    confidence_reason: "Clear upward movement between the first and last observation",
    category: Category::Infrastructure,
};

const STAGNANT_GROWTH: Rule = Rule {
    id: "growth-stimulus",
    title: "Stimulate Stagnant Uptake",
    expected_impact: "Restore growth above 5% through targeted enrolment drives",
    confidence: Confidence::Medium,
    confidence_reason: "Flat movement may reflect saturation rather than lost demand",
    category: Category::Outreach,
};

const REGIONAL_DISPARITY: Rule = Rule {
    id: "regional-intervention",
    title: "Targeted Regional Intervention",
    expected_impact: "Reduce regional disparity by 30% within 12 months",
    confidence: Confidence::High,
    confidence_reason: "Clear gap between regional averages",
    category: Category::Disparity,
};

const HIGH_VOLUME: Rule = Rule {
    id: "capacity-planning",
    title: "Plan for National-Scale Volume",
    expected_impact: "Keep throughput ahead of demand at billion-scale volumes",
    confidence: Confidence::Medium,
    confidence_reason: "Absolute volume alone does not indicate a trend",
    category: Category::Infrastructure,
};

const MAINTAIN: Rule = Rule {
    id: "continue-monitoring",
    title: "Maintain Current Strategy",
    expected_impact: "Sustained performance with minimal intervention",
    confidence: Confidence::Medium,
    confidence_reason: "Stable patterns but continued observation is advised",
    category: Category::Growth,
};

/// Evaluates every rule against `input` in order.
///
/// The returned list is never empty.
pub fn evaluate(input: &PolicyInput, thresholds: &PolicyThresholds) -> Vec<PolicyRecommendation> {
    let mut recommendations = Vec::new();

    if let Some(growth) = input.growth_rate {
        if input.data_type == Some(DataType::TimeSeries) && growth < thresholds.decline_growth {
            recommendations.push(GROWTH_DECLINE.recommend(
                "The metric is falling over the observed period. Public outreach and awareness programs can recover adoption.".to_string(),
                format!(
                    "Growth rate is {growth:.2}% (declining by more than {:.0}%)",
                    -thresholds.decline_growth
                ),
            ));
        }
        if growth > thresholds.rapid_growth {
            recommendations.push(RAPID_GROWTH.recommend(
                "Demand is rising quickly. Expand processing capacity before it becomes a bottleneck.".to_string(),
                format!(
                    "Growth rate is {growth:.2}% (above {:.0}% threshold)",
                    thresholds.rapid_growth
                ),
            ));
        }
        if (0.0..=thresholds.stagnant_growth).contains(&growth) {
            recommendations.push(STAGNANT_GROWTH.recommend(
                "Growth has stalled. Targeted drives in low-coverage segments can restart momentum.".to_string(),
                format!(
                    "Growth rate is {growth:.2}% (between 0% and {:.0}%)",
                    thresholds.stagnant_growth
                ),
            ));
        }
    }

    if let Some(disparity) = regional_disparity(&input.regions)
        && disparity.ratio > thresholds.disparity_ratio
    {
        recommendations.push(REGIONAL_DISPARITY.recommend(
            format!(
                "{} averages {:.1} while {} averages {:.1}. Direct support to the lowest-performing regions.",
                disparity.highest, disparity.highest_value, disparity.lowest, disparity.lowest_value
            ),
            format!(
                "Regional ratio is {:.1}x between {} and {} (above {:.0}x threshold)",
                disparity.ratio, disparity.highest, disparity.lowest, thresholds.disparity_ratio
            ),
        ));
    }

    if let Some(mean) = input.mean
        && mean > thresholds.high_volume_mean
    {
        recommendations.push(HIGH_VOLUME.recommend(
            "Volumes are at national scale. Capacity, redundancy, and audit processes should be sized accordingly.".to_string(),
            format!(
                "Mean value is {mean:.0} (above {:.0})",
                thresholds.high_volume_mean
            ),
        ));
    }

    if recommendations.is_empty() {
        recommendations.push(MAINTAIN.recommend(
            "Current metrics are within expected ranges. Maintain monitoring and existing programs.".to_string(),
            match input.growth_rate {
                Some(growth) => format!("Growth rate is {growth:.2}% and no other threshold was crossed"),
                None => "No rule threshold was crossed".to_string(),
            },
        ));
    }

    recommendations
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disparity {
    pub highest: String,
    pub highest_value: f64,
    pub lowest: String,
    pub lowest_value: f64,
    pub ratio: f64,
}

/// Highest and lowest region with their ratio.
///
/// Needs at least two regions and a positive lowest value; ties keep the
/// alphabetically first region.
pub fn regional_disparity(regions: &BTreeMap<String, f64>) -> Option<Disparity> {
    if regions.len() < 2 {
        return None;
    }
    let mut iter = regions.iter().filter(|(_, v)| v.is_finite());
    let (first_name, first_value) = iter.next()?;
    let (mut high, mut low) = ((first_name, *first_value), (first_name, *first_value));
    for (name, value) in iter {
        if *value > high.1 {
            high = (name, *value);
        }
        if *value < low.1 {
            low = (name, *value);
        }
    }
    if low.1 <= 0.0 {
        return None;
    }
    Some(Disparity {
        highest: high.0.clone(),
        highest_value: high.1,
        lowest: low.0.clone(),
        lowest_value: low.1,
        ratio: high.1 / low.1,
    })
}

/// Recommendations from the rule engine followed by externally supplied ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyReport {
    pub recommendations: Vec<serde_json::Value>,
}

/// Appends opaque recommendations from an outside generator after the rule
/// output. External items are tagged `isAiGenerated: true` and otherwise
/// passed through untouched; anything that is not a JSON object is dropped.
pub fn merge_external(
    rules: Vec<PolicyRecommendation>,
    external: Vec<serde_json::Value>,
) -> serde_json::Result<PolicyReport> {
    let mut recommendations = rules
        .into_iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    for item in external {
        match item {
            serde_json::Value::Object(mut fields) => {
                fields.insert("isAiGenerated".to_string(), serde_json::Value::Bool(true));
                recommendations.push(serde_json::Value::Object(fields));
            }
            other => warn!("Ignoring external recommendation that is not an object: {other}"),
        }
    }
    Ok(PolicyReport { recommendations })
}

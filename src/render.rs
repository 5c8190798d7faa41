//! Plain-text tables and JSON for every pipeline output.

use std::{borrow::Cow, fmt::Write as _};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    policy::PolicyReport,
    regression::Prediction,
    schema::DetectedSchema,
    stats::SummaryStats,
    trend::TrendSeries,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Serializing output as JSON")
}

/// Renders `value` in the requested format.
pub fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    table: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(value).map(|mut text| {
            text.push('\n');
            text
        }),
        OutputFormat::Table => Ok(table(value)),
    }
}

pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn format_percent(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}%")).unwrap_or_default()
}

pub fn schema_table(schema: &DetectedSchema) -> String {
    let headers = vec!["column".to_string(), "role".to_string()];
    let rows: Vec<Vec<String>> = schema
        .roles()
        .into_iter()
        .map(|(column, role)| vec![column, role.to_string()])
        .collect();
    let mut output = render_table(&headers, &rows);
    let _ = writeln!(output);
    let _ = writeln!(output, "data type:   {}", schema.data_type);
    let _ = writeln!(output, "rows:        {}", schema.row_count);
    let _ = writeln!(output, "time points: {}", schema.time_points());
    match &schema.prediction_reason {
        Some(reason) => {
            let _ = writeln!(output, "prediction:  disabled ({reason})");
        }
        None => {
            let _ = writeln!(output, "prediction:  enabled");
        }
    }
    output
}

pub fn stats_table(stats: &[SummaryStats]) -> String {
    let headers = [
        "column", "count", "min", "max", "mean", "median", "std_dev", "sum", "growth",
    ]
    .map(str::to_string);
    let rows: Vec<Vec<String>> = stats
        .iter()
        .map(|s| {
            vec![
                s.column.clone(),
                s.count.to_string(),
                format_number(s.min),
                format_number(s.max),
                format_number(s.mean),
                format_number(s.median),
                format_optional(s.std_dev),
                format_number(s.sum),
                format_percent(s.growth_rate),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn trend_table(series: &Option<TrendSeries>) -> String {
    let Some(series) = series else {
        return "No numeric metric columns to chart.\n".to_string();
    };
    let headers = ["period", "value", "moving_avg", "growth"].map(str::to_string);
    let rows: Vec<Vec<String>> = series
        .data
        .iter()
        .map(|point| {
            vec![
                point.period.clone(),
                format_number(point.value),
                format_optional(point.moving_avg),
                format_percent(point.growth_rate),
            ]
        })
        .collect();
    let mut output = format!(
        "metric: {} ({})\n",
        series.metric,
        series.region.as_deref().unwrap_or("all regions")
    );
    output.push_str(&render_table(&headers, &rows));
    output
}

pub fn prediction_table(prediction: &Prediction) -> String {
    if !prediction.can_predict {
        return format!(
            "Prediction unavailable: {}\n",
            prediction.reason.as_deref().unwrap_or("unknown reason")
        );
    }
    let headers = ["period", "value", "lower", "upper", "kind"].map(str::to_string);
    let mut rows: Vec<Vec<String>> = prediction
        .historical
        .iter()
        .map(|point| {
            vec![
                point.period.clone(),
                format_number(point.value),
                String::new(),
                String::new(),
                "observed".to_string(),
            ]
        })
        .collect();
    rows.extend(prediction.predictions.iter().map(|point| {
        vec![
            point.period.clone(),
            format_number(point.value),
            format_number(point.lower_bound),
            format_number(point.upper_bound),
            "forecast".to_string(),
        ]
    }));
    let mut output = format!(
        "metric: {}  slope: {}  intercept: {}  r2: {}\n",
        prediction.metric.as_deref().unwrap_or("-"),
        format_optional(prediction.slope),
        format_optional(prediction.intercept),
        prediction.r2_score.map(|r| format!("{r:.4}")).unwrap_or_default()
    );
    output.push_str(&render_table(&headers, &rows));
    output
}

pub fn policy_text(report: &PolicyReport) -> String {
    let mut output = String::new();
    for (idx, item) in report.recommendations.iter().enumerate() {
        let field = |name: &str| item.get(name).and_then(|v| v.as_str()).unwrap_or("");
        let ai = item
            .get("isAiGenerated")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let _ = writeln!(
            output,
            "{}. {} [{} / {}]{}",
            idx + 1,
            field("title"),
            field("category"),
            field("confidence"),
            if ai { " (AI)" } else { "" }
        );
        let _ = writeln!(output, "   {}", field("description"));
        let _ = writeln!(output, "   trigger: {}", field("trigger"));
        let _ = writeln!(output, "   impact:  {}", field("expectedImpact"));
    }
    output
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(sanitize_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));
    let separator = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &[]));

    // Right-align columns whose cells are all numeric (blanks allowed).
    let numeric: Vec<bool> = (0..column_count)
        .map(|idx| {
            !rows.is_empty()
                && rows.iter().all(|row| {
                    row.get(idx).is_none_or(|cell| {
                        let trimmed = cell.trim_end_matches('%');
                        trimmed.is_empty() || trimmed.parse::<f64>().is_ok()
                    })
                })
        })
        .collect();
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let cell = sanitize_cell(value);
            if right_align.get(idx).copied().unwrap_or(false) {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

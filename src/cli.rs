use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{render::OutputFormat, trend::Aggregation};

#[derive(Debug, Parser)]
#[command(author, version, about = "Explore tabular CSV data: schema, trends, forecasts, and policy hints", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect the time, region, and metric columns of a CSV file
    Schema(SchemaArgs),
    /// Produce summary statistics for metric columns
    Stats(StatsArgs),
    /// Aggregate a metric per period with a moving average and growth
    Trend(TrendArgs),
    /// Fit a linear trend and forecast future periods
    Predict(PredictArgs),
    /// Evaluate the policy rules against a metric
    Policies(PoliciesArgs),
    /// Run every analysis stage and emit one JSON document
    Report(ReportArgs),
    /// List the distinct values of the region column
    Regions(RegionsArgs),
    /// Preview the first few rows of a CSV file in a formatted table
    Preview(PreviewArgs),
}

/// Options shared by every command that reads a dataset.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8 with a windows-1252 fallback)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML file with analysis settings and policy thresholds
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Keep rows in file order instead of sorting by the time column
    #[arg(long = "keep-order")]
    pub keep_order: bool,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Restrict statistics to a single column
    #[arg(short = 'C', long)]
    pub column: Option<String>,
    /// Region value to filter on (`all` keeps every region)
    #[arg(short, long)]
    pub region: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct TrendArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Metric column (defaults to the first detected metric)
    #[arg(short, long)]
    pub metric: Option<String>,
    /// Region value to filter on (`all` keeps every region)
    #[arg(short, long)]
    pub region: Option<String>,
    /// Moving average window, overriding the config file
    #[arg(long)]
    pub window: Option<usize>,
    /// How rows sharing a period are combined, overriding the config file
    #[arg(long, value_enum)]
    pub aggregation: Option<Aggregation>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Metric column (defaults to the first detected metric)
    #[arg(short, long)]
    pub metric: Option<String>,
    /// Number of periods to forecast, overriding the config file
    #[arg(long)]
    pub periods: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct PoliciesArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Metric column (defaults to the first detected metric)
    #[arg(short, long)]
    pub metric: Option<String>,
    /// Region value to filter on (`all` keeps every region)
    #[arg(short, long)]
    pub region: Option<String>,
    /// JSON array of externally generated recommendations to append
    #[arg(long)]
    pub augment: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Metric column (defaults to the first detected metric)
    #[arg(short, long)]
    pub metric: Option<String>,
    /// Region value to filter statistics, trend, and rules on
    #[arg(short, long)]
    pub region: Option<String>,
    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RegionsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

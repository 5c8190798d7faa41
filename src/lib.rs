pub mod cli;
pub mod config;
pub mod data;
pub mod ingest;
pub mod io_utils;
pub mod pipeline;
pub mod policy;
pub mod regression;
pub mod render;
pub mod schema;
pub mod session;
pub mod stats;
pub mod trend;

use std::{
    env,
    fs::{self, File},
    io::{self, BufReader, Write},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputArgs},
    config::AnalysisConfig,
    ingest::IngestOptions,
    pipeline::AnalysisRequest,
    render::OutputFormat,
    session::Session,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_insight", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Schema(args) => handle_schema(&args),
        Commands::Stats(args) => handle_stats(&args),
        Commands::Trend(args) => handle_trend(&args),
        Commands::Predict(args) => handle_predict(&args),
        Commands::Policies(args) => handle_policies(&args),
        Commands::Report(args) => handle_report(&args),
        Commands::Regions(args) => handle_regions(&args),
        Commands::Preview(args) => handle_preview(&args),
    }
}

/// Loads the config, applies command-line overrides, and registers the input.
fn open_session(
    input: &InputArgs,
    overrides: impl FnOnce(&mut AnalysisConfig),
) -> Result<(Session, String)> {
    let mut config = match &input.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if input.keep_order {
        config.sort_by_time = false;
    }
    overrides(&mut config);
    config.validate()?;
    debug!("Analysis config: {config:?}");

    let options = IngestOptions {
        delimiter: io_utils::resolve_input_delimiter(&input.input, input.delimiter),
        decoding: io_utils::resolve_decoding(input.input_encoding.as_deref())?,
    };
    let mut session = Session::new(config);
    let id = session
        .load_file(&input.input, options)
        .with_context(|| format!("Loading dataset from {:?}", input.input))?;
    Ok((session, id))
}

fn emit(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .context("Writing to stdout")
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |_| {})?;
    let (_, detected) = session.get(&id)?;
    info!(
        "Detected {} data with {} metric column(s)",
        detected.data_type,
        detected.metric_columns.len()
    );
    emit(&render::render(args.format, detected, render::schema_table)?)
}

fn handle_stats(args: &cli::StatsArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |_| {})?;
    let (dataset, detected) = session.get(&id)?;
    let summaries = stats::dataset_stats(
        dataset,
        detected,
        args.column.as_deref(),
        args.region.as_deref(),
    );
    if summaries.is_empty() {
        info!("No numeric columns to summarize");
    } else {
        info!("Computed statistics for {} column(s)", summaries.len());
    }
    emit(&render::render(args.format, &summaries, |s| render::stats_table(s))?)
}

fn handle_trend(args: &cli::TrendArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |config| {
        if let Some(window) = args.window {
            config.moving_average_window = window;
        }
        if let Some(aggregation) = args.aggregation {
            config.aggregation = aggregation;
        }
    })?;
    let (dataset, detected) = session.get(&id)?;
    let request = AnalysisRequest {
        metric: args.metric.clone(),
        region: args.region.clone(),
    };
    let series = pipeline::trend_for(dataset, detected, &request, session.config());
    if let Some(series) = &series {
        info!(
            "Trend for '{}' spans {} point(s)",
            series.metric,
            series.data.len()
        );
    }
    emit(&render::render(args.format, &series, render::trend_table)?)
}

fn handle_predict(args: &cli::PredictArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |config| {
        if let Some(periods) = args.periods {
            config.forecast_periods = periods;
        }
    })?;
    let (dataset, detected) = session.get(&id)?;
    let request = AnalysisRequest {
        metric: args.metric.clone(),
        region: None,
    };
    let prediction = pipeline::prediction_for(dataset, detected, &request, session.config());
    match &prediction.reason {
        Some(reason) => info!("Prediction unavailable: {reason}"),
        None => info!(
            "Forecast {} period(s) from {} observation(s)",
            prediction.predictions.len(),
            prediction.historical.len()
        ),
    }
    emit(&render::render(args.format, &prediction, render::prediction_table)?)
}

fn load_external_recommendations(path: &Path) -> Result<Vec<serde_json::Value>> {
    let file = File::open(path).with_context(|| format!("Opening {path:?}"))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing recommendations from {path:?} as a JSON array"))
}

fn handle_policies(args: &cli::PoliciesArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |_| {})?;
    let (dataset, detected) = session.get(&id)?;
    let request = AnalysisRequest {
        metric: args.metric.clone(),
        region: args.region.clone(),
    };
    let rules = pipeline::recommendations_for(dataset, detected, &request, session.config());
    let external = match &args.augment {
        Some(path) => load_external_recommendations(path)?,
        None => Vec::new(),
    };
    let external_count = external.len();
    let report = policy::merge_external(rules, external)
        .context("Serializing policy recommendations")?;
    info!(
        "Produced {} recommendation(s) ({} supplied externally)",
        report.recommendations.len(),
        external_count
    );
    emit(&render::render(args.format, &report, render::policy_text)?)
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |_| {})?;
    let (dataset, detected) = session.get(&id)?;
    let request = AnalysisRequest {
        metric: args.metric.clone(),
        region: args.region.clone(),
    };
    let report = pipeline::analyze(dataset, detected, &request, session.config());
    let mut json = render::to_json(&report)?;
    json.push('\n');
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Writing report to {path:?}"))?;
            info!("Report for '{id}' written to {path:?}");
            Ok(())
        }
        None => emit(&json),
    }
}

fn handle_regions(args: &cli::RegionsArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |_| {})?;
    let (dataset, detected) = session.get(&id)?;
    let regions = stats::distinct_regions(dataset, detected);
    info!("Found {} distinct region(s)", regions.len());
    let text = match args.format {
        OutputFormat::Json => {
            let mut json = render::to_json(&regions)?;
            json.push('\n');
            json
        }
        OutputFormat::Table => regions.iter().map(|r| format!("{r}\n")).collect(),
    };
    emit(&text)
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let (session, id) = open_session(&args.input, |_| {})?;
    let (dataset, _) = session.get(&id)?;
    let rows: Vec<Vec<String>> = dataset
        .rows
        .iter()
        .take(args.rows)
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
                .collect()
        })
        .collect();
    info!(
        "Displaying {} of {} row(s) from '{id}'",
        rows.len(),
        dataset.row_count()
    );
    emit(&render::render_table(&dataset.columns, &rows))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

//! Analysis configuration, loadable from YAML.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```yaml
//! moving_average_window: 4
//! aggregation: sum
//! thresholds:
//!   rapid_growth: 30.0
//! ```

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    policy::PolicyThresholds,
    regression::DEFAULT_FORECAST_PERIODS,
    trend::{Aggregation, TrendOptions},
};

pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 3;
pub const DEFAULT_SNAPSHOT_TOP: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub moving_average_window: usize,
    pub forecast_periods: usize,
    pub aggregation: Aggregation,
    pub snapshot_top: usize,
    pub sort_by_time: bool,
    pub thresholds: PolicyThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
            forecast_periods: DEFAULT_FORECAST_PERIODS,
            aggregation: Aggregation::default(),
            snapshot_top: DEFAULT_SNAPSHOT_TOP,
            sort_by_time: true,
            thresholds: PolicyThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.moving_average_window > 0,
            "moving_average_window must be at least 1"
        );
        ensure!(
            self.thresholds.disparity_ratio >= 1.0,
            "thresholds.disparity_ratio must be at least 1.0"
        );
        ensure!(
            self.thresholds.decline_growth <= 0.0,
            "thresholds.decline_growth must not be positive"
        );
        Ok(())
    }

    pub fn trend_options(&self) -> TrendOptions {
        TrendOptions {
            window: self.moving_average_window,
            aggregation: self.aggregation,
            snapshot_top: self.snapshot_top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_documented_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.moving_average_window, 3);
        assert_eq!(config.forecast_periods, 6);
        assert_eq!(config.aggregation, Aggregation::Mean);
        assert_eq!(config.thresholds.decline_growth, -5.0);
        assert_eq!(config.thresholds.rapid_growth, 25.0);
        assert_eq!(config.thresholds.stagnant_growth, 5.0);
        assert_eq!(config.thresholds.disparity_ratio, 2.0);
        assert_eq!(config.thresholds.high_volume_mean, 1_000_000_000.0);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = AnalysisConfig::from_yaml(
            "moving_average_window: 4\naggregation: sum\nthresholds:\n  rapid_growth: 30.0\n",
        )
        .expect("parse");
        assert_eq!(config.moving_average_window, 4);
        assert_eq!(config.aggregation, Aggregation::Sum);
        assert_eq!(config.thresholds.rapid_growth, 30.0);
        assert_eq!(config.thresholds.disparity_ratio, 2.0);
        assert_eq!(config.forecast_periods, 6);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AnalysisConfig::from_yaml("windw: 3\n").unwrap_err();
        assert!(format!("{err:#}").contains("windw"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = AnalysisConfig::from_yaml("moving_average_window: 0\n").unwrap_err();
        assert!(err.to_string().contains("moving_average_window"));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "forecast_periods: 12").expect("write");
        let config = AnalysisConfig::load(file.path()).expect("load");
        assert_eq!(config.forecast_periods, 12);
    }
}

//! Configuration module for mtf-analyst.
//!
//! Runtime settings come from environment variables (after `.env` loading in
//! the binary); analysis policy comes from an optional TOML file plus `MTF_*`
//! overrides.

mod analysis_config;
mod provider_config;

pub use analysis_config::{
    AnalysisConfig, FetchParams, FusionWeights, IndicatorParams, LevelParams, PatternParams,
    RetryPolicy, SetupWeights, StructureParams, TrendParams,
};
pub use provider_config::{BinanceConfig, CsvConfig, ProviderEnvConfig, ProviderKind};

use crate::domain::analysis::indicators::AnalysisDepth;
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderEnvConfig,
    pub timeframes: Vec<Timeframe>,
    pub depth: AnalysisDepth,
    /// Whole-request deadline; `None` waits indefinitely
    pub request_timeout_secs: Option<u64>,
    pub analysis_config_path: Option<PathBuf>,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider =
            ProviderEnvConfig::from_lookup(&lookup).context("Failed to load provider config")?;

        let timeframes = match lookup("TIMEFRAMES") {
            Some(raw) => Timeframe::parse_list(&raw).context("Failed to parse TIMEFRAMES")?,
            None => Timeframe::all(),
        };

        let depth = match lookup("ANALYSIS_DEPTH") {
            Some(raw) => AnalysisDepth::from_str(&raw)?,
            None => AnalysisDepth::default(),
        };

        let request_timeout_secs = lookup("ANALYSIS_TIMEOUT_SECS")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("Failed to parse ANALYSIS_TIMEOUT_SECS")?;

        let analysis_config_path = lookup("ANALYSIS_CONFIG").map(PathBuf::from);
        let mut analysis = match &analysis_config_path {
            Some(path) => AnalysisConfig::from_toml_file(path)?,
            None => AnalysisConfig::default(),
        };
        analysis
            .apply_overrides(&lookup)
            .context("Failed to apply MTF_* overrides")?;

        Ok(Self {
            provider,
            timeframes,
            depth,
            request_timeout_secs,
            analysis_config_path,
            analysis,
        })
    }
}

//! Multi-timeframe analysis CLI
//!
//! Fetches candles for one symbol across the requested timeframes, runs the
//! analysis engine and prints the report as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result, bail};
use clap::Parser;
use mtf_analyst::application::engine::AnalysisEngine;
use mtf_analyst::config::{AnalysisConfig, Config, ProviderKind};
use mtf_analyst::domain::analysis::indicators::AnalysisDepth;
use mtf_analyst::domain::market::timeframe::Timeframe;
use mtf_analyst::domain::ports::PriceDataProvider;
use mtf_analyst::infrastructure::{BinanceCandleProvider, CsvReplayProvider};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Multi-timeframe market analysis", long_about = None)]
struct Cli {
    /// Symbol to analyze (e.g. BTCUSDT)
    #[arg(short, long)]
    symbol: String,

    /// Comma-separated timeframes (1m,5m,15m,1h,4h,1d); defaults to TIMEFRAMES or all
    #[arg(short, long)]
    timeframes: Option<String>,

    /// Analysis depth (basic, comprehensive)
    #[arg(short, long)]
    depth: Option<String>,

    /// Candle provider (binance, csv)
    #[arg(short, long)]
    provider: Option<String>,

    /// Directory of CSV replay files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML analysis policy file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Whole-request deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = apply_cli(Config::from_env()?, &cli)?;

    let provider: Arc<dyn PriceDataProvider> = match config.provider.kind {
        ProviderKind::Binance => Arc::new(BinanceCandleProvider::new(&config.provider.binance)),
        ProviderKind::Csv => Arc::new(CsvReplayProvider::new(config.provider.csv.data_dir.clone())),
    };
    info!(
        "Analyzing {} on {} timeframe(s) via {}",
        cli.symbol,
        config.timeframes.len(),
        provider.name()
    );

    let engine = AnalysisEngine::new(provider, config.analysis.clone());
    let cancel = CancellationToken::new();

    let analysis =
        engine.analyze_with_cancel(&cli.symbol, &config.timeframes, config.depth, cancel.clone());
    let report = match config.request_timeout_secs {
        Some(secs) => {
            tokio::select! {
                result = analysis => result?,
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    cancel.cancel();
                    warn!("Analysis deadline of {}s exceeded", secs);
                    bail!("analysis of {} timed out after {}s", cli.symbol, secs);
                }
            }
        }
        None => analysis.await?,
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn apply_cli(mut config: Config, cli: &Cli) -> Result<Config> {
    if let Some(raw) = &cli.timeframes {
        config.timeframes = Timeframe::parse_list(raw).context("Invalid --timeframes")?;
    }
    if let Some(raw) = &cli.depth {
        config.depth = AnalysisDepth::from_str(raw)?;
    }
    if let Some(raw) = &cli.provider {
        config.provider.kind = ProviderKind::from_str(raw)?;
    }
    if let Some(dir) = &cli.data_dir {
        config.provider.csv.data_dir = dir.clone();
    }
    if let Some(path) = &cli.config {
        config.analysis = AnalysisConfig::from_toml_file(path)?;
        config
            .analysis
            .apply_overrides(|key| std::env::var(key).ok())?;
        config.analysis_config_path = Some(path.clone());
    }
    if cli.timeout_secs.is_some() {
        config.request_timeout_secs = cli.timeout_secs;
    }
    Ok(config)
}

//! Price data provider configuration parsing from environment variables.
//!
//! - Binance (REST klines)
//! - CSV replay files

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::str::FromStr;

/// Which candle source backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Binance,
    Csv,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(ProviderKind::Binance),
            "csv" | "replay" => Ok(ProviderKind::Csv),
            _ => bail!("Invalid PROVIDER: {}. Must be 'binance' or 'csv'", s),
        }
    }
}

/// Binance API configuration
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl BinanceConfig {
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: lookup("BINANCE_API_KEY").unwrap_or_default(),
            base_url: lookup("BINANCE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            request_timeout_secs: lookup("BINANCE_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        }
    }
}

/// CSV replay configuration
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Directory holding `<SYMBOL>_<timeframe>.csv` files
    pub data_dir: PathBuf,
}

impl CsvConfig {
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            data_dir: lookup("CSV_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
        }
    }
}

/// Aggregated provider configuration
#[derive(Debug, Clone)]
pub struct ProviderEnvConfig {
    pub kind: ProviderKind,
    pub binance: BinanceConfig,
    pub csv: CsvConfig,
}

impl ProviderEnvConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = ProviderKind::from_str(
            &lookup("PROVIDER").unwrap_or_else(|| "binance".to_string()),
        )?;
        Ok(Self {
            kind,
            binance: BinanceConfig::from_lookup(lookup),
            csv: CsvConfig::from_lookup(lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_provider_defaults() {
        let config = ProviderEnvConfig::from_lookup(&empty).unwrap();
        assert_eq!(config.kind, ProviderKind::Binance);
        assert!(config.binance.base_url.contains("binance.com"));
        assert_eq!(config.binance.request_timeout_secs, 30);
        assert_eq!(config.csv.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(ProviderKind::from_str("CSV").unwrap(), ProviderKind::Csv);
        assert_eq!(
            ProviderKind::from_str("replay").unwrap(),
            ProviderKind::Csv
        );
        assert!(ProviderKind::from_str("alpaca").is_err());
    }
}

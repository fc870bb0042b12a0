use crate::domain::errors::ProviderError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::PriceDataProvider;
use async_trait::async_trait;
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// One row of a replay file: `timestamp,open,high,low,close,volume`
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

/// Replays recorded candles from `<data_dir>/<SYMBOL>_<timeframe>.csv`.
///
/// Timestamps may be unix milliseconds or RFC3339. Rows are returned in file
/// order; the engine's validator rejects anything out of sequence.
pub struct CsvReplayProvider {
    data_dir: PathBuf,
}

impl CsvReplayProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn file_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        let symbol = symbol.replace('/', "").to_uppercase();
        self.data_dir.join(format!("{}_{}.csv", symbol, timeframe))
    }
}

#[async_trait]
impl PriceDataProvider for CsvReplayProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let path = self.file_path(symbol, timeframe);
        if !path.exists() {
            debug!(path = %path.display(), "CsvReplayProvider: no replay file");
            return Err(ProviderError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }

        // csv is blocking; keep it off the runtime threads
        let read_path = path.clone();
        let mut candles = tokio::task::spawn_blocking(move || read_candles(&read_path))
            .await
            .map_err(|e| ProviderError::Unavailable {
                reason: format!("CSV reader task failed: {}", e),
            })??;

        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        info!(
            "CsvReplayProvider: Loaded {} {} bars for {} from {}",
            candles.len(),
            timeframe,
            symbol,
            path.display()
        );
        Ok(candles)
    }

    fn name(&self) -> &str {
        "csv-replay"
    }
}

fn read_candles(path: &Path) -> Result<Vec<Candle>, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ProviderError::Unavailable {
            reason: format!("Failed to open {}: {}", path.display(), e),
        })?;

    let mut candles = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| invalid(path, line, &e.to_string()))?;
        let candle = parse_row(&row).map_err(|reason| invalid(path, line, &reason))?;
        candles.push(candle);
    }
    Ok(candles)
}

fn invalid(path: &Path, line: usize, reason: &str) -> ProviderError {
    ProviderError::InvalidResponse {
        reason: format!("{} row {}: {}", path.display(), line + 1, reason),
    }
}

fn parse_row(row: &CsvRow) -> Result<Candle, String> {
    let decimal = |field: &str, raw: &str| {
        Decimal::from_str(raw).map_err(|e| format!("bad {} '{}': {}", field, raw, e))
    };
    Ok(Candle::new(
        parse_timestamp(&row.timestamp)?,
        decimal("open", &row.open)?,
        decimal("high", &row.high)?,
        decimal("low", &row.low)?,
        decimal("close", &row.close)?,
        decimal("volume", &row.volume)?,
    ))
}

fn parse_timestamp(raw: &str) -> Result<i64, String> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| format!("bad timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mtf-analyst-csv-{}-{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("1700000000000").unwrap(), 1_700_000_000_000);
        assert_eq!(
            parse_timestamp("2023-11-14T22:13:20Z").unwrap(),
            1_700_000_000_000
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_reads_last_rows() {
        let dir = temp_dir("last");
        fs::write(
            dir.join("BTCUSDT_1h.csv"),
            "timestamp,open,high,low,close,volume\n\
             1700000000000,100,101,99,100.5,10\n\
             2023-11-14T23:13:20Z,100.5,102,100,101.5,12\n\
             1700007200000,101.5,103,101,102.5,9\n",
        )
        .unwrap();

        let provider = CsvReplayProvider::new(&dir);
        let candles = provider
            .fetch_candles("BTC/USDT", Timeframe::OneHour, 2)
            .await
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_003_600_000);
        assert_eq!(candles[1].close, dec!(102.5));
        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_unknown_symbol() {
        let provider = CsvReplayProvider::new(temp_dir("missing"));
        let err = provider
            .fetch_candles("NOPE", Timeframe::OneDay, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownSymbol { .. }));
    }

    #[tokio::test]
    async fn test_bad_row_is_invalid_response() {
        let dir = temp_dir("bad");
        fs::write(
            dir.join("ETHUSDT_4h.csv"),
            "timestamp,open,high,low,close,volume\n1700000000000,abc,1,1,1,1\n",
        )
        .unwrap();
        let provider = CsvReplayProvider::new(&dir);
        let err = provider
            .fetch_candles("ETHUSDT", Timeframe::FourHour, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
        fs::remove_dir_all(dir).ok();
    }
}

use crate::domain::market::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the pure indicator functions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IndicatorError {
    #[error("Insufficient data for {indicator}: need {required} values, got {available}")]
    InsufficientData {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("Invalid parameter for {indicator}: {reason}")]
    InvalidParameter { indicator: String, reason: String },
}

impl IndicatorError {
    pub fn insufficient(indicator: &str, required: usize, available: usize) -> Self {
        IndicatorError::InsufficientData {
            indicator: indicator.to_string(),
            required,
            available,
        }
    }
}

/// Errors returned by a price data provider
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    #[error("Provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid provider response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable { .. } | ProviderError::RateLimited { .. }
        )
    }
}

/// A candle rejected by the data quality gate
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Invalid candle #{index} (ts={timestamp}): {reason}")]
pub struct InvalidCandle {
    pub index: usize,
    pub timestamp: i64,
    pub reason: String,
}

/// Why a single timeframe slot could not produce a signal
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TimeframeFailure {
    #[error("provider failed after {attempts} attempt(s): {error}")]
    Provider { error: ProviderError, attempts: u32 },

    #[error("insufficient history: {available} valid candles, need {required}")]
    InsufficientData { required: usize, available: usize },

    #[error("pipeline task aborted: {reason}")]
    TaskFailed { reason: String },
}

/// Whole-request errors surfaced to the caller
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No timeframes requested for {symbol}")]
    NoTimeframes { symbol: String },

    #[error("All {} timeframe(s) failed for {symbol}", failures.len())]
    AllTimeframesFailed {
        symbol: String,
        failures: Vec<(Timeframe, TimeframeFailure)>,
    },

    #[error("Analysis cancelled for {symbol}")]
    Cancelled { symbol: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_formatting() {
        let err = IndicatorError::insufficient("sma_50", 50, 3);
        let msg = err.to_string();
        assert!(msg.contains("sma_50"));
        assert!(msg.contains("50"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_provider_error_retryable() {
        assert!(
            ProviderError::Unavailable {
                reason: "timeout".to_string()
            }
            .is_retryable()
        );
        assert!(ProviderError::RateLimited { retry_after_secs: 2 }.is_retryable());
        assert!(
            !ProviderError::UnknownSymbol {
                symbol: "NOPE".to_string()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::InvalidResponse {
                reason: "bad json".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_all_failed_formatting() {
        let err = AnalysisError::AllTimeframesFailed {
            symbol: "BTCUSDT".to_string(),
            failures: vec![(
                Timeframe::OneHour,
                TimeframeFailure::InsufficientData {
                    required: 20,
                    available: 3,
                },
            )],
        };
        let msg = err.to_string();
        assert!(msg.contains("All 1 timeframe(s)"));
        assert!(msg.contains("BTCUSDT"));
    }
}

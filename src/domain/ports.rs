use crate::domain::errors::ProviderError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use async_trait::async_trait;

/// Source of candle history consumed by the analysis engine.
///
/// Implementations return the most recent `limit` candles in ascending
/// timestamp order. The engine validates everything it receives.
#[async_trait]
pub trait PriceDataProvider: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError>;

    /// Identifier used in logs
    fn name(&self) -> &str {
        "provider"
    }
}

use crate::domain::errors::ProviderError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::PriceDataProvider;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
struct MockState {
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
    /// Errors returned, in order, before the fixture is served
    queued_failures: HashMap<Timeframe, VecDeque<ProviderError>>,
    permanent_failures: HashMap<Timeframe, ProviderError>,
    calls: HashMap<Timeframe, usize>,
    latency: Option<Duration>,
}

/// Fixture-backed provider with failure injection and call counting.
#[derive(Clone, Default)]
pub struct InMemoryCandleProvider {
    state: Arc<RwLock<MockState>>,
}

impl InMemoryCandleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.state
            .write()
            .await
            .candles
            .insert((symbol.to_string(), timeframe), candles);
    }

    /// Serve `errors` one per call before falling back to the fixture
    pub async fn fail_next(&self, timeframe: Timeframe, errors: Vec<ProviderError>) {
        self.state
            .write()
            .await
            .queued_failures
            .entry(timeframe)
            .or_default()
            .extend(errors);
    }

    pub async fn fail_always(&self, timeframe: Timeframe, error: ProviderError) {
        self.state
            .write()
            .await
            .permanent_failures
            .insert(timeframe, error);
    }

    /// Delay every fetch, for cancellation and timeout tests
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = Some(latency);
    }

    pub async fn calls(&self, timeframe: Timeframe) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(&timeframe)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PriceDataProvider for InMemoryCandleProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let latency = {
            let mut state = self.state.write().await;
            *state.calls.entry(timeframe).or_insert(0) += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().await;
        if let Some(error) = state.permanent_failures.get(&timeframe) {
            return Err(error.clone());
        }
        if let Some(error) = state
            .queued_failures
            .get_mut(&timeframe)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let candles = state
            .candles
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| ProviderError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(ts: i64) -> Candle {
        Candle::new(ts, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(100))
    }

    #[tokio::test]
    async fn test_serves_most_recent_limit() {
        let provider = InMemoryCandleProvider::new();
        provider
            .insert("ETHUSDT", Timeframe::OneHour, (0..10).map(candle).collect())
            .await;
        let candles = provider
            .fetch_candles("ETHUSDT", Timeframe::OneHour, 3)
            .await
            .unwrap();
        assert_eq!(
            candles.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![7, 8, 9]
        );
        assert_eq!(provider.calls(Timeframe::OneHour).await, 1);
    }

    #[tokio::test]
    async fn test_queued_failures_drain_in_order() {
        let provider = InMemoryCandleProvider::new();
        provider
            .insert("ETHUSDT", Timeframe::OneDay, vec![candle(0)])
            .await;
        provider
            .fail_next(
                Timeframe::OneDay,
                vec![ProviderError::RateLimited {
                    retry_after_secs: 1,
                }],
            )
            .await;

        assert!(
            provider
                .fetch_candles("ETHUSDT", Timeframe::OneDay, 10)
                .await
                .is_err()
        );
        assert!(
            provider
                .fetch_candles("ETHUSDT", Timeframe::OneDay, 10)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let provider = InMemoryCandleProvider::new();
        let err = provider
            .fetch_candles("NOPE", Timeframe::OneMin, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownSymbol { .. }));
    }
}

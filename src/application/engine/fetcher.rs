use crate::config::RetryPolicy;
use crate::domain::errors::{ProviderError, TimeframeFailure};
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::PriceDataProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches one timeframe's candles with bounded exponential backoff.
///
/// Only retryable provider errors are retried. A rate-limit hint stretches
/// the delay up to the policy's cap. Retries never leave the timeframe they
/// were started for.
#[derive(Clone)]
pub struct CandleFetcher {
    provider: Arc<dyn PriceDataProvider>,
    policy: RetryPolicy,
}

impl CandleFetcher {
    pub fn new(provider: Arc<dyn PriceDataProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, TimeframeFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.provider.fetch_candles(symbol, timeframe, limit).await {
                Ok(candles) => {
                    debug!(
                        provider = self.provider.name(),
                        symbol,
                        timeframe = %timeframe,
                        attempt,
                        candles = candles.len(),
                        "CandleFetcher: fetched candles"
                    );
                    return Ok(candles);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_after(&error, attempt);
                    warn!(
                        provider = self.provider.name(),
                        symbol,
                        timeframe = %timeframe,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "CandleFetcher: retryable provider error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        provider = self.provider.name(),
                        symbol,
                        timeframe = %timeframe,
                        attempt,
                        error = %error,
                        "CandleFetcher: giving up on timeframe"
                    );
                    return Err(TimeframeFailure::Provider {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    fn delay_after(&self, error: &ProviderError, attempt: u32) -> Duration {
        let backoff = self.policy.delay_for(attempt);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                let hinted = Duration::from_secs(*retry_after_secs);
                backoff
                    .max(hinted)
                    .min(Duration::from_millis(self.policy.max_delay_ms))
            }
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::InMemoryCandleProvider;
    use rust_decimal_macros::dec;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    fn candle(ts: i64) -> Candle {
        Candle::new(ts, dec!(100), dec!(101), dec!(99), dec!(100.5), dec!(10))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let provider = Arc::new(InMemoryCandleProvider::new());
        provider
            .insert("BTCUSDT", Timeframe::OneHour, vec![candle(0), candle(1)])
            .await;
        provider
            .fail_next(
                Timeframe::OneHour,
                vec![
                    ProviderError::Unavailable {
                        reason: "timeout".to_string(),
                    },
                    ProviderError::RateLimited {
                        retry_after_secs: 0,
                    },
                ],
            )
            .await;

        let fetcher = CandleFetcher::new(provider.clone(), fast_policy(3));
        let candles = fetcher
            .fetch("BTCUSDT", Timeframe::OneHour, 250)
            .await
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(provider.calls(Timeframe::OneHour).await, 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_report_failure() {
        let provider = Arc::new(InMemoryCandleProvider::new());
        provider
            .fail_always(
                Timeframe::FourHour,
                ProviderError::Unavailable {
                    reason: "down".to_string(),
                },
            )
            .await;

        let fetcher = CandleFetcher::new(provider.clone(), fast_policy(3));
        let err = fetcher
            .fetch("BTCUSDT", Timeframe::FourHour, 250)
            .await
            .unwrap_err();
        assert!(matches!(err, TimeframeFailure::Provider { attempts: 3, .. }));
        assert_eq!(provider.calls(Timeframe::FourHour).await, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let provider = Arc::new(InMemoryCandleProvider::new());
        provider
            .fail_always(
                Timeframe::OneDay,
                ProviderError::UnknownSymbol {
                    symbol: "NOPE".to_string(),
                },
            )
            .await;

        let fetcher = CandleFetcher::new(provider.clone(), fast_policy(3));
        let err = fetcher
            .fetch("NOPE", Timeframe::OneDay, 250)
            .await
            .unwrap_err();
        assert!(matches!(err, TimeframeFailure::Provider { attempts: 1, .. }));
        assert_eq!(provider.calls(Timeframe::OneDay).await, 1);
    }

    #[test]
    fn test_rate_limit_hint_is_capped() {
        let provider = Arc::new(InMemoryCandleProvider::new());
        let fetcher = CandleFetcher::new(provider, RetryPolicy::default());
        let delay = fetcher.delay_after(
            &ProviderError::RateLimited {
                retry_after_secs: 60,
            },
            1,
        );
        assert_eq!(delay, Duration::from_millis(5_000));
        let delay = fetcher.delay_after(
            &ProviderError::Unavailable {
                reason: "x".to_string(),
            },
            2,
        );
        assert_eq!(delay, Duration::from_millis(400));
    }
}

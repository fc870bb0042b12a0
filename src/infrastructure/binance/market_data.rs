use crate::config::BinanceConfig;
use crate::domain::errors::ProviderError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::PriceDataProvider;
use crate::infrastructure::core::HttpClientFactory;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Binance caps a single klines request at this many candles
const MAX_KLINES_PER_REQUEST: usize = 1000;
/// Binance error code for an unknown trading pair
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Candle provider backed by the Binance REST klines endpoint
pub struct BinanceCandleProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BinanceCandleProvider {
    pub fn new(config: &BinanceConfig) -> Self {
        Self {
            client: HttpClientFactory::create_client(Duration::from_secs(
                config.request_timeout_secs,
            )),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl PriceDataProvider for BinanceCandleProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST).to_string();
        let api_symbol = symbol.replace('/', "").to_uppercase();

        let mut request = self.client.get(&url).query(&[
            ("symbol", api_symbol.as_str()),
            ("interval", timeframe.as_str()),
            ("limit", limit.as_str()),
        ]);
        if !self.api_key.is_empty() {
            request = request.header("X-MBX-APIKEY", &self.api_key);
        }

        let response = request.send().await.map_err(|e| ProviderError::Unavailable {
            reason: format!("Failed to fetch klines from Binance: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            debug!(
                symbol = %api_symbol,
                status = status.as_u16(),
                body = %body,
                "BinanceCandleProvider: klines request rejected"
            );
            return Err(map_error_status(status, retry_after, &body, &api_symbol));
        }

        // Binance klines format: [open_time, open, high, low, close, volume, ...]
        let klines: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                reason: format!("Failed to parse Binance klines response: {}", e),
            })?;

        let candles = parse_klines(&klines)?;
        info!(
            "BinanceCandleProvider: Fetched {} {} bars for {}",
            candles.len(),
            timeframe,
            api_symbol
        );
        Ok(candles)
    }

    fn name(&self) -> &str {
        "binance"
    }
}

fn map_error_status(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
    symbol: &str,
) -> ProviderError {
    // 418 is Binance's escalation of repeated 429s
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        };
    }
    if status.is_server_error() {
        return ProviderError::Unavailable {
            reason: format!("Binance returned {}", status),
        };
    }

    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(Value::as_i64));
    if code == Some(INVALID_SYMBOL_CODE) {
        return ProviderError::UnknownSymbol {
            symbol: symbol.to_string(),
        };
    }

    ProviderError::InvalidResponse {
        reason: format!("Binance returned {}: {}", status, body),
    }
}

fn parse_klines(klines: &[Value]) -> Result<Vec<Candle>, ProviderError> {
    klines
        .iter()
        .enumerate()
        .map(|(i, k)| {
            parse_kline(k).ok_or_else(|| ProviderError::InvalidResponse {
                reason: format!("malformed kline at position {}", i),
            })
        })
        .collect()
}

fn parse_kline(kline: &Value) -> Option<Candle> {
    let arr = kline.as_array()?;
    if arr.len() < 6 {
        return None;
    }
    let decimal = |v: &Value| v.as_str().and_then(|s| Decimal::from_str(s).ok());

    Some(Candle::new(
        arr[0].as_i64()?,
        decimal(&arr[1])?,
        decimal(&arr[2])?,
        decimal(&arr[3])?,
        decimal(&arr[4])?,
        decimal(&arr[5])?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_klines() {
        let raw = r#"[
            [1700000000000, "37000.10", "37100.00", "36950.50", "37050.00", "12.5",
             1700000059999, "0", 10, "0", "0", "0"],
            [1700000060000, "37050.00", "37080.00", "37010.00", "37020.00", "8.25",
             1700000119999, "0", 7, "0", "0", "0"]
        ]"#;
        let klines: Vec<Value> = serde_json::from_str(raw).unwrap();
        let candles = parse_klines(&klines).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
        assert_eq!(candles[0].open, dec!(37000.10));
        assert_eq!(candles[1].volume, dec!(8.25));
    }

    #[test]
    fn test_malformed_kline_is_invalid_response() {
        let klines: Vec<Value> =
            serde_json::from_str(r#"[[1700000000000, "1.0", "2.0"]]"#).unwrap();
        assert!(matches!(
            parse_klines(&klines),
            Err(ProviderError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            map_error_status(StatusCode::TOO_MANY_REQUESTS, Some(7), "", "BTCUSDT"),
            ProviderError::RateLimited {
                retry_after_secs: 7
            }
        );
        assert!(matches!(
            map_error_status(StatusCode::BAD_GATEWAY, None, "", "BTCUSDT"),
            ProviderError::Unavailable { .. }
        ));
        assert_eq!(
            map_error_status(
                StatusCode::BAD_REQUEST,
                None,
                r#"{"code":-1121,"msg":"Invalid symbol."}"#,
                "NOPEUSDT"
            ),
            ProviderError::UnknownSymbol {
                symbol: "NOPEUSDT".to_string()
            }
        );
        assert!(matches!(
            map_error_status(StatusCode::BAD_REQUEST, None, "{}", "BTCUSDT"),
            ProviderError::InvalidResponse { .. }
        ));
    }
}

use crate::domain::errors::InvalidCandle;
use crate::domain::market::candle::{Candle, CandleSeries};
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

/// Centralized validator for candle integrity.
///
/// Rejects candles that are physically impossible. Rejected candles are
/// dropped from the series and reported back, never kept.
pub struct CandleValidator;

impl CandleValidator {
    /// Checks a single candle against the OHLCV invariants.
    pub fn validate_candle(candle: &Candle) -> Result<(), String> {
        if candle.open <= Decimal::ZERO
            || candle.high <= Decimal::ZERO
            || candle.low <= Decimal::ZERO
            || candle.close <= Decimal::ZERO
        {
            return Err("non-positive price component".to_string());
        }

        // ta's DataItem builder enforces low <= {open, close} <= high and volume >= 0
        ta::DataItem::builder()
            .open(candle.open.to_f64().unwrap_or(0.0))
            .high(candle.high.to_f64().unwrap_or(0.0))
            .low(candle.low.to_f64().unwrap_or(0.0))
            .close(candle.close.to_f64().unwrap_or(0.0))
            .volume(candle.volume.to_f64().unwrap_or(-1.0))
            .build()
            .map(|_| ())
            .map_err(|_| {
                format!(
                    "OHLCV invariant violated (o={} h={} l={} c={} v={})",
                    candle.open, candle.high, candle.low, candle.close, candle.volume
                )
            })
    }

    /// Builds a series from raw provider candles.
    ///
    /// Invalid candles and candles whose timestamp does not strictly exceed the
    /// last accepted one are removed; the survivors keep their original order.
    pub fn sanitize(
        symbol: &str,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> (CandleSeries, Vec<InvalidCandle>) {
        let mut accepted: Vec<Candle> = Vec::with_capacity(candles.len());
        let mut rejected = Vec::new();

        for (index, candle) in candles.into_iter().enumerate() {
            let verdict = match accepted.last() {
                Some(prev) if candle.timestamp <= prev.timestamp => Err(format!(
                    "timestamp not increasing (prev={})",
                    prev.timestamp
                )),
                _ => Self::validate_candle(&candle),
            };

            match verdict {
                Ok(()) => accepted.push(candle),
                Err(reason) => {
                    warn!(
                        symbol,
                        timeframe = %timeframe,
                        index,
                        timestamp = candle.timestamp,
                        reason = %reason,
                        "rejected invalid candle"
                    );
                    rejected.push(InvalidCandle {
                        index,
                        timestamp: candle.timestamp,
                        reason,
                    });
                }
            }
        }

        (
            CandleSeries::from_validated(symbol.to_string(), timeframe, accepted),
            rejected,
        )
    }
}

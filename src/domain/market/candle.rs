use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// One OHLCV interval as delivered by a price data provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    /// Interval open time, unix milliseconds
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn new(
        timestamp: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Ordered candle history for one symbol/timeframe pair.
///
/// Only built from candles that passed `CandleValidator`, so timestamps are
/// strictly increasing and every candle satisfies the OHLCV invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub(crate) fn from_validated(
        symbol: String,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            candles,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Float columns used by the indicator math
    pub fn columns(&self) -> SeriesColumns {
        SeriesColumns::from_candles(&self.candles)
    }
}

/// Column-oriented `f64` view of a candle series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesColumns {
    pub timestamps: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl SeriesColumns {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut cols = SeriesColumns {
            timestamps: Vec::with_capacity(candles.len()),
            open: Vec::with_capacity(candles.len()),
            high: Vec::with_capacity(candles.len()),
            low: Vec::with_capacity(candles.len()),
            close: Vec::with_capacity(candles.len()),
            volume: Vec::with_capacity(candles.len()),
        };
        for c in candles {
            cols.timestamps.push(c.timestamp);
            cols.open.push(c.open.to_f64().unwrap_or(0.0));
            cols.high.push(c.high.to_f64().unwrap_or(0.0));
            cols.low.push(c.low.to_f64().unwrap_or(0.0));
            cols.close.push(c.close.to_f64().unwrap_or(0.0));
            cols.volume.push(c.volume.to_f64().unwrap_or(0.0));
        }
        cols
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Highest high and lowest low over the trailing `lookback` candles
    pub fn recent_range(&self, lookback: usize) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let start = self.len().saturating_sub(lookback.max(1));
        let high = self.high[start..]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let low = self.low[start..].iter().copied().fold(f64::INFINITY, f64::min);
        Some((high, low))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle::new(ts, o, h, l, c, dec!(10))
    }

    #[test]
    fn test_columns_convert_decimal_fields() {
        let candles = vec![
            candle(1, dec!(10.5), dec!(11.0), dec!(10.0), dec!(10.75)),
            candle(2, dec!(10.75), dec!(12.25), dec!(10.5), dec!(12.0)),
        ];
        let cols = SeriesColumns::from_candles(&candles);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.timestamps, vec![1, 2]);
        assert_eq!(cols.close, vec![10.75, 12.0]);
        assert_eq!(cols.high, vec![11.0, 12.25]);
        assert_eq!(cols.volume, vec![10.0, 10.0]);
    }

    #[test]
    fn test_recent_range() {
        let candles = vec![
            candle(1, dec!(10), dec!(20), dec!(5), dec!(10)),
            candle(2, dec!(10), dec!(12), dec!(8), dec!(11)),
            candle(3, dec!(11), dec!(13), dec!(9), dec!(12)),
        ];
        let cols = SeriesColumns::from_candles(&candles);
        assert_eq!(cols.recent_range(2), Some((13.0, 8.0)));
        assert_eq!(cols.recent_range(10), Some((20.0, 5.0)));
        assert_eq!(SeriesColumns::default().recent_range(5), None);
    }
}

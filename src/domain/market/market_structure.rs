use crate::domain::analysis::indicators::IndicatorSet;
use crate::domain::analysis::trend::{TrendAssessment, TrendDirection};
use crate::domain::market::candle::SeriesColumns;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current market regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegimeType {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
    Unknown,
}

impl fmt::Display for MarketRegimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegimeType::TrendingUp => write!(f, "Trending Up"),
            MarketRegimeType::TrendingDown => write!(f, "Trending Down"),
            MarketRegimeType::Ranging => write!(f, "Ranging"),
            MarketRegimeType::Volatile => write!(f, "Volatile"),
            MarketRegimeType::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

/// Structure flags describing the reference timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStructure {
    pub regime: MarketRegimeType,
    pub higher_highs: bool,
    pub higher_lows: bool,
    pub lower_highs: bool,
    pub lower_lows: bool,
    pub volatility: VolatilityRegime,
    /// ATR as a percentage of the last close
    pub atr_pct: Option<f64>,
    pub volume_expanding: bool,
    pub overbought: bool,
    pub oversold: bool,
}

impl MarketStructure {
    pub fn unknown() -> Self {
        Self {
            regime: MarketRegimeType::Unknown,
            higher_highs: false,
            higher_lows: false,
            lower_highs: false,
            lower_lows: false,
            volatility: VolatilityRegime::Normal,
            atr_pct: None,
            volume_expanding: false,
            overbought: false,
            oversold: false,
        }
    }
}

/// Service for classifying market structure from price action
pub struct MarketStructureDetector {
    swing_window: usize,
    adx_threshold: f64,
    high_volatility_pct: f64,
    low_volatility_pct: f64,
    volume_surge_multiplier: f64,
}

impl MarketStructureDetector {
    pub fn new(
        swing_window: usize,
        adx_threshold: f64,
        high_volatility_pct: f64,
        low_volatility_pct: f64,
        volume_surge_multiplier: f64,
    ) -> Self {
        Self {
            swing_window: swing_window.max(1),
            adx_threshold,
            high_volatility_pct,
            low_volatility_pct,
            volume_surge_multiplier,
        }
    }

    pub fn detect(
        &self,
        columns: &SeriesColumns,
        indicators: &IndicatorSet,
        trend: &TrendAssessment,
    ) -> MarketStructure {
        let n = self.swing_window;
        if columns.len() < 2 * n {
            return MarketStructure::unknown();
        }

        // Compare the latest swing window against the one before it
        let len = columns.len();
        let (recent_high, recent_low) = window_extremes(columns, len - n, len);
        let (prior_high, prior_low) = window_extremes(columns, len - 2 * n, len - n);

        let last_close = indicators.last_close;
        let atr_pct = indicators
            .volatility
            .atr
            .filter(|_| last_close > 0.0)
            .map(|atr| atr / last_close * 100.0);

        let volatility = match atr_pct {
            Some(pct) if pct > self.high_volatility_pct => VolatilityRegime::High,
            Some(pct) if pct < self.low_volatility_pct => VolatilityRegime::Low,
            _ => VolatilityRegime::Normal,
        };

        let regime = match indicators.trend_strength.adx {
            None => MarketRegimeType::Unknown,
            Some(adx) if adx > self.adx_threshold => match trend.direction {
                TrendDirection::Bullish => MarketRegimeType::TrendingUp,
                TrendDirection::Bearish => MarketRegimeType::TrendingDown,
                TrendDirection::Sideways => {
                    if volatility == VolatilityRegime::High {
                        MarketRegimeType::Volatile
                    } else {
                        MarketRegimeType::Ranging
                    }
                }
            },
            Some(_) => {
                if volatility == VolatilityRegime::High {
                    MarketRegimeType::Volatile
                } else {
                    MarketRegimeType::Ranging
                }
            }
        };

        let volume_expanding = match (indicators.volume.volume_sma, columns.volume.last()) {
            (Some(avg), Some(&last)) if avg > 0.0 => last > avg * self.volume_surge_multiplier,
            _ => false,
        };

        let rsi = indicators.oscillators.rsi;

        MarketStructure {
            regime,
            higher_highs: recent_high > prior_high,
            higher_lows: recent_low > prior_low,
            lower_highs: recent_high < prior_high,
            lower_lows: recent_low < prior_low,
            volatility,
            atr_pct,
            volume_expanding,
            overbought: rsi.is_some_and(|r| r > 70.0),
            oversold: rsi.is_some_and(|r| r < 30.0),
        }
    }
}

fn window_extremes(columns: &SeriesColumns, start: usize, end: usize) -> (f64, f64) {
    let high = columns.high[start..end]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let low = columns.low[start..end]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    (high, low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::trend::TrendQuality;

    fn rising_columns(n: usize) -> SeriesColumns {
        let mut cols = SeriesColumns::default();
        for i in 0..n {
            let c = 100.0 + i as f64;
            cols.timestamps.push(i as i64);
            cols.open.push(c - 0.5);
            cols.high.push(c + 0.5);
            cols.low.push(c - 1.0);
            cols.close.push(c);
            cols.volume.push(1000.0);
        }
        cols
    }

    fn trend(direction: TrendDirection) -> TrendAssessment {
        TrendAssessment {
            direction,
            strength: 0.8,
            slope_angle: 36.0,
            quality: TrendQuality::Strong,
            confirming_signals: vec![],
            divergences: vec![],
        }
    }

    fn detector() -> MarketStructureDetector {
        MarketStructureDetector::new(10, 25.0, 3.0, 0.5, 1.5)
    }

    #[test]
    fn test_rising_series_is_trending_up_with_higher_highs() {
        let cols = rising_columns(40);
        let mut ind = IndicatorSet {
            last_close: 139.0,
            ..Default::default()
        };
        ind.trend_strength.adx = Some(60.0);
        ind.volatility.atr = Some(1.5);
        ind.volume.volume_sma = Some(1000.0);
        ind.oscillators.rsi = Some(100.0);

        let ms = detector().detect(&cols, &ind, &trend(TrendDirection::Bullish));
        assert_eq!(ms.regime, MarketRegimeType::TrendingUp);
        assert!(ms.higher_highs && ms.higher_lows);
        assert!(!ms.lower_highs && !ms.lower_lows);
        assert_eq!(ms.volatility, VolatilityRegime::Normal);
        assert!(ms.overbought);
        assert!(!ms.volume_expanding);
    }

    #[test]
    fn test_short_series_is_unknown() {
        let cols = rising_columns(5);
        let ms = detector().detect(
            &cols,
            &IndicatorSet::default(),
            &trend(TrendDirection::Bullish),
        );
        assert_eq!(ms, MarketStructure::unknown());
    }

    #[test]
    fn test_weak_adx_with_wide_atr_is_volatile() {
        let cols = rising_columns(30);
        let mut ind = IndicatorSet {
            last_close: 100.0,
            ..Default::default()
        };
        ind.trend_strength.adx = Some(12.0);
        ind.volatility.atr = Some(5.0);
        let ms = detector().detect(&cols, &ind, &trend(TrendDirection::Sideways));
        assert_eq!(ms.regime, MarketRegimeType::Volatile);
        assert_eq!(ms.volatility, VolatilityRegime::High);
    }
}

use crate::domain::errors::IndicatorError;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much of the indicator catalogue a request computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    /// Core families only
    Basic,
    /// Core families plus Ichimoku, Williams %R and CCI
    #[default]
    Comprehensive,
}

impl FromStr for AnalysisDepth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(AnalysisDepth::Basic),
            "comprehensive" | "full" => Ok(AnalysisDepth::Comprehensive),
            _ => Err(anyhow!(
                "Invalid depth: '{}'. Must be 'basic' or 'comprehensive'",
                s
            )),
        }
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisDepth::Basic => write!(f, "basic"),
            AnalysisDepth::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

/// An indicator the calculator abstained from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorGap {
    pub indicator: String,
    pub required: usize,
    pub available: usize,
}

impl IndicatorGap {
    pub fn from_error(error: &IndicatorError) -> Self {
        match error {
            IndicatorError::InsufficientData {
                indicator,
                required,
                available,
            } => IndicatorGap {
                indicator: indicator.clone(),
                required: *required,
                available: *available,
            },
            IndicatorError::InvalidParameter { indicator, .. } => IndicatorGap {
                indicator: indicator.clone(),
                required: 0,
                available: 0,
            },
        }
    }
}

/// An indicator computed over a shorter window than configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedIndicator {
    pub indicator: String,
    pub requested_window: usize,
    pub used_window: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Oscillators {
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStrength {
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub aroon_up: Option<f64>,
    pub aroon_down: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volatility {
    pub atr: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeIndicators {
    pub obv: Option<f64>,
    pub volume_sma: Option<f64>,
    pub vwap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ichimoku {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
}

/// Families only computed at `AnalysisDepth::Comprehensive`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedIndicators {
    pub ichimoku: Option<Ichimoku>,
    pub williams_r: Option<f64>,
    pub cci: Option<f64>,
}

/// Indicator snapshot for one candle series at its last candle.
///
/// A `None` value always has a matching entry in `gaps`; a value computed
/// over a widened window has one in `degraded`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub last_close: f64,
    pub moving_averages: MovingAverages,
    pub oscillators: Oscillators,
    pub trend_strength: TrendStrength,
    pub volatility: Volatility,
    pub volume: VolumeIndicators,
    pub extended: Option<ExtendedIndicators>,
    pub gaps: Vec<IndicatorGap>,
    pub degraded: Vec<DegradedIndicator>,
}

impl IndicatorSet {
    pub fn is_degraded(&self) -> bool {
        !self.gaps.is_empty() || !self.degraded.is_empty()
    }

    pub fn has_gap(&self, indicator: &str) -> bool {
        self.gaps.iter().any(|g| g.indicator == indicator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_from_str() {
        assert_eq!(
            AnalysisDepth::from_str("basic").unwrap(),
            AnalysisDepth::Basic
        );
        assert_eq!(
            AnalysisDepth::from_str("Comprehensive").unwrap(),
            AnalysisDepth::Comprehensive
        );
        assert!(AnalysisDepth::from_str("deep").is_err());
    }

    #[test]
    fn test_gap_from_error() {
        let gap = IndicatorGap::from_error(&IndicatorError::insufficient("rsi", 15, 3));
        assert_eq!(gap.indicator, "rsi");
        assert_eq!(gap.required, 15);
        assert_eq!(gap.available, 3);
    }
}

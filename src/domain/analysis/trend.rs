use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Sideways,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Bullish => write!(f, "bullish"),
            TrendDirection::Bearish => write!(f, "bearish"),
            TrendDirection::Sideways => write!(f, "sideways"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendQuality {
    Strong,
    Moderate,
    Weak,
}

/// Discrete, auditable evidence gathered while assessing a trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum TrendSignal {
    /// Fast EMA ordering relative to the slow EMA
    EmaAlignment { fast_above_slow: bool },
    /// RSI position relative to the 50 midline
    RsiMidline { rsi: f64 },
    /// ADX above the trending threshold
    AdxTrending { adx: f64, threshold: f64 },
}

impl fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendSignal::EmaAlignment { fast_above_slow } => {
                if *fast_above_slow {
                    write!(f, "fast EMA above slow EMA")
                } else {
                    write!(f, "fast EMA below slow EMA")
                }
            }
            TrendSignal::RsiMidline { rsi } => {
                if *rsi >= 50.0 {
                    write!(f, "RSI {:.1} above 50", rsi)
                } else {
                    write!(f, "RSI {:.1} below 50", rsi)
                }
            }
            TrendSignal::AdxTrending { adx, threshold } => {
                write!(f, "ADX {:.1} above {:.0}", adx, threshold)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAssessment {
    pub direction: TrendDirection,
    /// `min(|angle| / 45°, 1)`
    pub strength: f64,
    /// Regression slope as an angle in degrees
    pub slope_angle: f64,
    pub quality: TrendQuality,
    pub confirming_signals: Vec<TrendSignal>,
    pub divergences: Vec<TrendSignal>,
}

impl TrendAssessment {
    /// True when the trend is bullish with strong quality
    pub fn is_strong_bullish(&self) -> bool {
        self.direction == TrendDirection::Bullish && self.quality == TrendQuality::Strong
    }

    pub fn is_strong_bearish(&self) -> bool {
        self.direction == TrendDirection::Bearish && self.quality == TrendQuality::Strong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_display() {
        assert_eq!(
            TrendSignal::EmaAlignment {
                fast_above_slow: true
            }
            .to_string(),
            "fast EMA above slow EMA"
        );
        assert_eq!(
            TrendSignal::RsiMidline { rsi: 42.04 }.to_string(),
            "RSI 42.0 below 50"
        );
        assert_eq!(
            TrendSignal::AdxTrending {
                adx: 31.25,
                threshold: 25.0
            }
            .to_string(),
            "ADX 31.2 above 25"
        );
    }

    #[test]
    fn test_signal_serializes_tagged() {
        let json = serde_json::to_string(&TrendSignal::AdxTrending {
            adx: 30.0,
            threshold: 25.0,
        })
        .unwrap();
        assert!(json.contains("\"signal\":\"adx_trending\""));
    }
}

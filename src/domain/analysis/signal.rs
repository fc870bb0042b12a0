use crate::domain::analysis::indicators::IndicatorSet;
use crate::domain::analysis::levels::SupportResistanceLevel;
use crate::domain::analysis::patterns::{PatternMatch, Polarity};
use crate::domain::analysis::trend::TrendAssessment;
use crate::domain::errors::{InvalidCandle, TimeframeFailure};
use crate::domain::market::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Buy => write!(f, "BUY"),
            SignalDirection::Sell => write!(f, "SELL"),
            SignalDirection::Hold => write!(f, "HOLD"),
        }
    }
}

/// One weighted contribution to a fused timeframe signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum SignalFactor {
    EmaBullishCross { fast: f64, slow: f64, weight: f64 },
    EmaBearishCross { fast: f64, slow: f64, weight: f64 },
    RsiHealthy { rsi: f64, weight: f64 },
    RsiOversold { rsi: f64, weight: f64 },
    RsiOverbought { rsi: f64, weight: f64 },
    StrongUptrend { strength: f64, weight: f64 },
    StrongDowntrend { strength: f64, weight: f64 },
    PatternMajority {
        polarity: Polarity,
        bullish: usize,
        bearish: usize,
        weight: f64,
    },
}

impl SignalFactor {
    /// Signed contribution to the accumulator
    pub fn weight(&self) -> f64 {
        match self {
            SignalFactor::EmaBullishCross { weight, .. }
            | SignalFactor::EmaBearishCross { weight, .. }
            | SignalFactor::RsiHealthy { weight, .. }
            | SignalFactor::RsiOversold { weight, .. }
            | SignalFactor::RsiOverbought { weight, .. }
            | SignalFactor::StrongUptrend { weight, .. }
            | SignalFactor::StrongDowntrend { weight, .. }
            | SignalFactor::PatternMajority { weight, .. } => *weight,
        }
    }
}

impl fmt::Display for SignalFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalFactor::EmaBullishCross { fast, slow, .. } => {
                write!(f, "EMA fast {:.4} above slow {:.4}", fast, slow)
            }
            SignalFactor::EmaBearishCross { fast, slow, .. } => {
                write!(f, "EMA fast {:.4} below slow {:.4}", fast, slow)
            }
            SignalFactor::RsiHealthy { rsi, .. } => write!(f, "RSI {:.1} in healthy range", rsi),
            SignalFactor::RsiOversold { rsi, .. } => {
                write!(f, "RSI {:.1} oversold, bullish reversal potential", rsi)
            }
            SignalFactor::RsiOverbought { rsi, .. } => write!(f, "RSI {:.1} overbought", rsi),
            SignalFactor::StrongUptrend { strength, .. } => {
                write!(f, "strong uptrend (strength {:.2})", strength)
            }
            SignalFactor::StrongDowntrend { strength, .. } => {
                write!(f, "strong downtrend (strength {:.2})", strength)
            }
            SignalFactor::PatternMajority {
                polarity,
                bullish,
                bearish,
                ..
            } => write!(
                f,
                "{:?} pattern majority ({} bullish / {} bearish)",
                polarity, bullish, bearish
            ),
        }
    }
}

/// How much of the fetched history survived validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub candles_received: usize,
    pub candles_used: usize,
    pub rejected: Vec<InvalidCandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSignal {
    pub timeframe: Timeframe,
    pub indicators: IndicatorSet,
    pub trend: TrendAssessment,
    pub levels: Vec<SupportResistanceLevel>,
    pub patterns: Vec<PatternMatch>,
    pub direction: SignalDirection,
    /// `clamp(|score|, 0, 1)`
    pub strength: f64,
    /// Signed accumulator before clamping
    pub score: f64,
    pub confluences: Vec<SignalFactor>,
    pub divergences: Vec<SignalFactor>,
    pub data_quality: DataQuality,
}

/// Result slot for one requested timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimeframeOutcome {
    Ready(Box<TimeframeSignal>),
    /// Placeholder for a slot whose pipeline failed; carries no numbers
    Degraded { failure: TimeframeFailure },
}

impl TimeframeOutcome {
    pub fn signal(&self) -> Option<&TimeframeSignal> {
        match self {
            TimeframeOutcome::Ready(signal) => Some(signal),
            TimeframeOutcome::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, TimeframeOutcome::Degraded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_weight_and_display() {
        let f = SignalFactor::RsiOversold {
            rsi: 24.0,
            weight: 0.15,
        };
        assert_eq!(f.weight(), 0.15);
        assert!(f.to_string().contains("oversold"));

        let f = SignalFactor::PatternMajority {
            polarity: Polarity::Bearish,
            bullish: 0,
            bearish: 2,
            weight: -0.1,
        };
        assert_eq!(f.weight(), -0.1);
        assert!(f.to_string().contains("2 bearish"));
    }

    #[test]
    fn test_degraded_outcome_has_no_signal() {
        let outcome = TimeframeOutcome::Degraded {
            failure: TimeframeFailure::InsufficientData {
                required: 20,
                available: 4,
            },
        };
        assert!(outcome.is_degraded());
        assert!(outcome.signal().is_none());
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"degraded\""));
    }
}

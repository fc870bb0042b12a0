use crate::domain::market::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
    Doji,
}

/// Catalogue of recognized formations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Run of consecutive higher closes
    AscendingTrend { run: usize },
    /// Run of consecutive lower closes
    DescendingTrend { run: usize },
    Doji,
    BullishCandle,
    BearishCandle,
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    ShootingStar,
}

impl PatternKind {
    pub fn polarity(&self) -> Polarity {
        match self {
            PatternKind::AscendingTrend { .. }
            | PatternKind::BullishCandle
            | PatternKind::BullishEngulfing
            | PatternKind::Hammer => Polarity::Bullish,
            PatternKind::DescendingTrend { .. }
            | PatternKind::BearishCandle
            | PatternKind::BearishEngulfing
            | PatternKind::ShootingStar => Polarity::Bearish,
            PatternKind::Doji => Polarity::Doji,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::AscendingTrend { run } => write!(f, "ascending trend ({} closes)", run),
            PatternKind::DescendingTrend { run } => {
                write!(f, "descending trend ({} closes)", run)
            }
            PatternKind::Doji => write!(f, "doji"),
            PatternKind::BullishCandle => write!(f, "bullish candle"),
            PatternKind::BearishCandle => write!(f, "bearish candle"),
            PatternKind::BullishEngulfing => write!(f, "bullish engulfing"),
            PatternKind::BearishEngulfing => write!(f, "bearish engulfing"),
            PatternKind::Hammer => write!(f, "hammer"),
            PatternKind::ShootingStar => write!(f, "shooting star"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub polarity: Polarity,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub target: Option<f64>,
    pub invalidation: Option<f64>,
    pub timeframe: Timeframe,
}

impl PatternMatch {
    pub fn new(kind: PatternKind, confidence: f64, timeframe: Timeframe) -> Self {
        Self {
            kind,
            polarity: kind.polarity(),
            confidence: confidence.clamp(0.0, 1.0),
            target: None,
            invalidation: None,
            timeframe,
        }
    }

    pub fn with_levels(mut self, target: f64, invalidation: f64) -> Self {
        self.target = Some(target);
        self.invalidation = Some(invalidation);
        self
    }
}

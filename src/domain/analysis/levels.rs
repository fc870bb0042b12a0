use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelKind::Support => write!(f, "support"),
            LevelKind::Resistance => write!(f, "resistance"),
        }
    }
}

/// Ordered so that `max` picks the most significant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceLevel {
    pub price: f64,
    /// 1 (weak) to 10 (strong)
    pub strength: u8,
    pub touch_count: usize,
    /// Timestamp (ms) of the last candle that touched the level
    pub last_tested: i64,
    pub kind: LevelKind,
    pub significance: Significance,
    /// Number of raw pivots merged into this level
    pub confirmations: usize,
}

impl SupportResistanceLevel {
    /// Major or critical levels qualify as stop/target anchors
    pub fn is_qualifying(&self) -> bool {
        self.significance >= Significance::Major
    }

    /// Relative distance from `price`, as a fraction of `price`
    pub fn distance_pct(&self, price: f64) -> f64 {
        if price == 0.0 {
            return f64::INFINITY;
        }
        ((self.price - price) / price).abs()
    }
}

use crate::domain::analysis::indicators::AnalysisDepth;
use crate::domain::analysis::levels::SupportResistanceLevel;
use crate::domain::analysis::signal::{TimeframeOutcome, TimeframeSignal};
use crate::domain::analysis::trend::TrendDirection;
use crate::domain::market::market_structure::MarketStructure;
use crate::domain::market::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Every requested timeframe produced a signal
    Complete,
    /// Some timeframes were degraded; their slots hold no numbers
    Partial { degraded: Vec<Timeframe> },
}

impl AnalysisStatus {
    pub fn is_partial(&self) -> bool {
        matches!(self, AnalysisStatus::Partial { .. })
    }
}

/// Cross-horizon trend summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallTrend {
    /// Majority vote of 1m/5m/15m; `None` when no short-term slot is valid
    pub short_term: Option<TrendDirection>,
    pub medium_term: Option<TrendDirection>,
    pub long_term: Option<TrendDirection>,
    pub dominant: TrendDirection,
    /// Fraction of valid timeframes agreeing with `dominant`
    pub alignment_score: f64,
    pub valid_timeframes: usize,
}

/// Classic floor-trader pivots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

impl PivotPoints {
    pub fn levels(&self) -> [f64; 7] {
        [
            self.s3, self.s2, self.s1, self.pivot, self.r1, self.r2, self.r3,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevel {
    pub ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalLevels {
    /// Consolidated levels below the current price, nearest first
    pub support: Vec<SupportResistanceLevel>,
    /// Consolidated levels at or above the current price, nearest first
    pub resistance: Vec<SupportResistanceLevel>,
    pub pivot_points: Option<PivotPoints>,
    pub fibonacci: Vec<FibonacciLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeBias {
    Long,
    Short,
    Neutral,
}

/// Where a stop or target price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    QualifyingLevel,
    CriticalLevel,
    PivotOrFibonacci,
    AtrProjection,
    /// No reference on that side; the price equals the entry
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupQuality {
    /// 0 to 100
    pub score: f64,
    pub bias: TradeBias,
    pub risk_reward_ratio: f64,
    /// Capped at 0.85
    pub win_probability: f64,
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub target_source: LevelSource,
    pub stop_source: LevelSource,
    pub entry_triggers: Vec<String>,
    pub exit_conditions: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// The engine's sole output: an immutable snapshot of one analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAnalysis {
    pub symbol: String,
    pub depth: AnalysisDepth,
    pub status: AnalysisStatus,
    pub current_price: f64,
    /// Timestamp (ms) of the latest candle used for `current_price`
    pub as_of: i64,
    pub timeframes: BTreeMap<Timeframe, TimeframeOutcome>,
    pub overall_trend: OverallTrend,
    pub critical_levels: CriticalLevels,
    pub setup_quality: SetupQuality,
    pub market_structure: MarketStructure,
}

impl ComprehensiveAnalysis {
    pub fn is_degraded(&self) -> bool {
        self.status.is_partial()
    }

    pub fn valid_signals(&self) -> impl Iterator<Item = &TimeframeSignal> {
        self.timeframes.values().filter_map(TimeframeOutcome::signal)
    }
}

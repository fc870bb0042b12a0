use crate::application::analysis::level_detector::{self, consolidate};
use crate::application::engine::pipeline::TimeframeRun;
use crate::config::{LevelParams, StructureParams};
use crate::domain::analysis::levels::{LevelKind, SupportResistanceLevel};
use crate::domain::analysis::report::{CriticalLevels, OverallTrend};
use crate::domain::analysis::trend::TrendDirection;
use crate::domain::market::market_structure::{MarketStructure, MarketStructureDetector};
use crate::domain::market::timeframe::{Horizon, Timeframe};
use std::collections::BTreeMap;

/// Cross-timeframe view computed from the healthy timeframe runs
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub current_price: f64,
    pub as_of: i64,
    pub overall_trend: OverallTrend,
    pub critical_levels: CriticalLevels,
    pub market_structure: MarketStructure,
    /// ATR of the longest timeframe that has one
    pub reference_atr: Option<f64>,
}

/// Combines per-timeframe runs into horizon trends, alignment and levels.
pub struct CrossTimeframeAggregator {
    levels: LevelParams,
    structure: MarketStructureDetector,
}

impl CrossTimeframeAggregator {
    pub fn new(levels: LevelParams, structure: StructureParams, adx_threshold: f64) -> Self {
        Self {
            levels,
            structure: MarketStructureDetector::new(
                structure.swing_window,
                adx_threshold,
                structure.high_volatility_pct,
                structure.low_volatility_pct,
                structure.volume_surge_multiplier,
            ),
        }
    }

    /// `runs` holds only valid timeframes; degraded slots never reach here.
    pub fn aggregate(&self, runs: &BTreeMap<Timeframe, TimeframeRun>) -> Aggregate {
        // Shortest timeframe carries the freshest close
        let freshest = runs.values().next();
        let current_price = freshest.and_then(TimeframeRun::last_close).unwrap_or(0.0);
        let as_of = freshest.and_then(TimeframeRun::last_timestamp).unwrap_or(0);

        let overall_trend = overall_trend(runs);
        let critical_levels = self.critical_levels(runs, current_price);

        let longest = runs.values().next_back();
        let market_structure = longest
            .map(|run| {
                self.structure.detect(
                    &run.columns,
                    &run.signal.indicators,
                    &run.signal.trend,
                )
            })
            .unwrap_or_else(MarketStructure::unknown);

        let reference_atr = runs
            .values()
            .rev()
            .find_map(|run| run.signal.indicators.volatility.atr);

        Aggregate {
            current_price,
            as_of,
            overall_trend,
            critical_levels,
            market_structure,
            reference_atr,
        }
    }

    fn critical_levels(
        &self,
        runs: &BTreeMap<Timeframe, TimeframeRun>,
        current_price: f64,
    ) -> CriticalLevels {
        let all: Vec<SupportResistanceLevel> = runs
            .values()
            .flat_map(|run| run.signal.levels.iter().cloned())
            .collect();
        let merged = consolidate(
            all,
            self.levels.merge_tolerance_pct,
            self.levels.max_critical_levels,
        );

        let (mut support, mut resistance): (Vec<_>, Vec<_>) =
            merged.into_iter().partition(|l| l.price < current_price);
        for level in &mut support {
            level.kind = LevelKind::Support;
        }
        for level in &mut resistance {
            level.kind = LevelKind::Resistance;
        }
        // nearest first
        support.sort_by(|a, b| b.price.total_cmp(&a.price));
        resistance.sort_by(|a, b| a.price.total_cmp(&b.price));

        let longest = runs.values().next_back();
        let lookback = self.levels.pivot_lookback;
        CriticalLevels {
            support,
            resistance,
            pivot_points: longest
                .and_then(|run| level_detector::pivot_points(&run.columns, lookback)),
            fibonacci: longest
                .map(|run| level_detector::fibonacci_levels(&run.columns, lookback))
                .unwrap_or_default(),
        }
    }
}

fn overall_trend(runs: &BTreeMap<Timeframe, TimeframeRun>) -> OverallTrend {
    let directions: Vec<(Timeframe, TrendDirection)> = runs
        .iter()
        .map(|(tf, run)| (*tf, run.signal.trend.direction))
        .collect();

    let horizon_vote = |horizon: Horizon| {
        let members: Vec<TrendDirection> = directions
            .iter()
            .filter(|(tf, _)| tf.horizon() == horizon)
            .map(|(_, d)| *d)
            .collect();
        majority(&members)
    };

    let all: Vec<TrendDirection> = directions.iter().map(|(_, d)| *d).collect();
    let dominant = dominant(&all);
    let agreeing = all.iter().filter(|d| **d == dominant).count();
    let alignment_score = if all.is_empty() {
        0.0
    } else {
        agreeing as f64 / all.len() as f64
    };

    OverallTrend {
        short_term: horizon_vote(Horizon::ShortTerm),
        medium_term: horizon_vote(Horizon::MediumTerm),
        long_term: horizon_vote(Horizon::LongTerm),
        dominant,
        alignment_score,
        valid_timeframes: all.len(),
    }
}

/// Strict majority; a split vote is sideways and no voters is `None`
fn majority(votes: &[TrendDirection]) -> Option<TrendDirection> {
    if votes.is_empty() {
        return None;
    }
    let dominant = dominant(votes);
    let count = votes.iter().filter(|d| **d == dominant).count();
    if count * 2 > votes.len() {
        Some(dominant)
    } else {
        Some(TrendDirection::Sideways)
    }
}

/// Most frequent direction; ties prefer bullish, then bearish
fn dominant(votes: &[TrendDirection]) -> TrendDirection {
    let count = |d: TrendDirection| votes.iter().filter(|v| **v == d).count();
    let bullish = count(TrendDirection::Bullish);
    let bearish = count(TrendDirection::Bearish);
    let sideways = count(TrendDirection::Sideways);

    if bullish >= bearish && bullish >= sideways && bullish > 0 {
        TrendDirection::Bullish
    } else if bearish >= sideways && bearish > 0 {
        TrendDirection::Bearish
    } else {
        TrendDirection::Sideways
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TrendDirection::{Bearish, Bullish, Sideways};

    #[test]
    fn test_majority_vote() {
        assert_eq!(majority(&[]), None);
        assert_eq!(majority(&[Bullish]), Some(Bullish));
        assert_eq!(majority(&[Bullish, Bearish]), Some(Sideways));
        assert_eq!(majority(&[Bearish, Bearish, Bullish]), Some(Bearish));
        assert_eq!(majority(&[Bullish, Bearish, Sideways]), Some(Sideways));
    }

    #[test]
    fn test_dominant_tie_breaks() {
        assert_eq!(dominant(&[Bullish, Bearish]), Bullish);
        assert_eq!(dominant(&[Bearish, Sideways]), Bearish);
        assert_eq!(dominant(&[Sideways, Sideways, Bullish]), Sideways);
        assert_eq!(dominant(&[]), Sideways);
    }
}

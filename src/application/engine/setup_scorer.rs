use crate::config::SetupWeights;
use crate::domain::analysis::levels::SupportResistanceLevel;
use crate::domain::analysis::report::{
    CriticalLevels, LevelSource, OverallTrend, SetupQuality, TradeBias,
};
use crate::domain::analysis::signal::{SignalDirection, TimeframeSignal};
use crate::domain::analysis::trend::TrendDirection;
use crate::domain::errors::TimeframeFailure;
use crate::domain::market::timeframe::Timeframe;

/// Inputs the scorer reads; all borrowed from the assembled analysis
pub struct SetupContext<'a> {
    pub current_price: f64,
    pub overall_trend: &'a OverallTrend,
    pub critical_levels: &'a CriticalLevels,
    pub signals: Vec<&'a TimeframeSignal>,
    pub degraded: Vec<(Timeframe, &'a TimeframeFailure)>,
    pub reference_atr: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Above,
    Below,
}

/// Grades the cross-timeframe setup and derives entry, stop and target.
pub struct SetupScorer {
    weights: SetupWeights,
}

impl SetupScorer {
    pub fn new(weights: SetupWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, ctx: &SetupContext<'_>) -> SetupQuality {
        let w = &self.weights;
        let entry = ctx.current_price;

        let bias = match ctx.overall_trend.dominant {
            TrendDirection::Bullish => TradeBias::Long,
            TrendDirection::Bearish => TradeBias::Short,
            TrendDirection::Sideways => TradeBias::Neutral,
        };
        // Neutral setups are scored with long geometry
        let (target_side, stop_side) = match bias {
            TradeBias::Short => (Side::Below, Side::Above),
            TradeBias::Long | TradeBias::Neutral => (Side::Above, Side::Below),
        };

        let (take_profit, target_source) = self.locate(ctx, target_side, w.atr_target_multiplier);
        let (stop_loss, stop_source) = self.locate(ctx, stop_side, w.atr_stop_multiplier);

        let reward = (take_profit - entry).abs();
        let risk = (entry - stop_loss).abs();
        let risk_reward_ratio = if risk > 0.0 { reward / risk } else { 0.0 };

        let avg_strength = if ctx.signals.is_empty() {
            0.0
        } else {
            ctx.signals.iter().map(|s| s.strength).sum::<f64>() / ctx.signals.len() as f64
        };
        let confluences: usize = ctx.signals.iter().map(|s| s.confluences.len()).sum();
        let cap = w.confluence_cap.max(1);

        let rr_term = if w.risk_reward_cap > 0.0 {
            (risk_reward_ratio / w.risk_reward_cap).min(1.0)
        } else {
            0.0
        };
        let score = (ctx.overall_trend.alignment_score * w.alignment
            + avg_strength * w.trend_strength
            + confluences.min(cap) as f64 / cap as f64 * w.confluence
            + rr_term * w.risk_reward)
            .clamp(0.0, 100.0);

        let win_probability =
            (w.win_probability_base + w.win_probability_span * score / 100.0)
                .min(w.win_probability_cap);

        SetupQuality {
            score,
            bias,
            risk_reward_ratio,
            win_probability,
            entry,
            take_profit,
            stop_loss,
            target_source,
            stop_source,
            entry_triggers: entry_triggers(ctx, bias, stop_loss),
            exit_conditions: exit_conditions(bias, take_profit, target_source, stop_loss),
            risk_factors: self.risk_factors(ctx, risk_reward_ratio),
        }
    }

    /// Nearest reference price on `side` of the entry, walking the fallback ladder
    fn locate(
        &self,
        ctx: &SetupContext<'_>,
        side: Side,
        atr_multiplier: f64,
    ) -> (f64, LevelSource) {
        let entry = ctx.current_price;
        let levels = match side {
            Side::Above => &ctx.critical_levels.resistance,
            Side::Below => &ctx.critical_levels.support,
        };
        let beyond = |price: f64| match side {
            Side::Above => price > entry,
            Side::Below => price < entry,
        };

        if let Some(level) = nearest(levels, entry, |l| beyond(l.price) && l.is_qualifying()) {
            return (level.price, LevelSource::QualifyingLevel);
        }
        if let Some(level) = nearest(levels, entry, |l| beyond(l.price)) {
            return (level.price, LevelSource::CriticalLevel);
        }

        let pivots = ctx
            .critical_levels
            .pivot_points
            .iter()
            .flat_map(|p| p.levels());
        let fibs = ctx.critical_levels.fibonacci.iter().map(|f| f.price);
        let reference = pivots
            .chain(fibs)
            .filter(|p| beyond(*p))
            .min_by(|a, b| (a - entry).abs().total_cmp(&(b - entry).abs()));
        if let Some(price) = reference {
            return (price, LevelSource::PivotOrFibonacci);
        }

        match ctx.reference_atr.filter(|atr| *atr > 0.0) {
            Some(atr) => {
                let offset = atr * atr_multiplier;
                let price = match side {
                    Side::Above => entry + offset,
                    Side::Below => entry - offset,
                };
                (price, LevelSource::AtrProjection)
            }
            None => (entry, LevelSource::Unavailable),
        }
    }

    fn risk_factors(&self, ctx: &SetupContext<'_>, risk_reward_ratio: f64) -> Vec<String> {
        let mut factors = Vec::new();
        for signal in &ctx.signals {
            for divergence in &signal.divergences {
                factors.push(format!("{}: {}", signal.timeframe, divergence));
            }
        }
        for (timeframe, failure) in &ctx.degraded {
            factors.push(format!("{}: degraded ({})", timeframe, failure));
        }
        if risk_reward_ratio < self.weights.min_risk_reward {
            factors.push(format!(
                "risk/reward {:.2} below {:.2}",
                risk_reward_ratio, self.weights.min_risk_reward
            ));
        }
        if ctx.overall_trend.alignment_score < 0.5 {
            factors.push(format!(
                "low timeframe alignment ({:.0}%)",
                ctx.overall_trend.alignment_score * 100.0
            ));
        }
        factors
    }
}

fn nearest<'a, P>(
    levels: &'a [SupportResistanceLevel],
    entry: f64,
    predicate: P,
) -> Option<&'a SupportResistanceLevel>
where
    P: Fn(&SupportResistanceLevel) -> bool,
{
    levels
        .iter()
        .filter(|l| predicate(l))
        .min_by(|a, b| a.distance_pct(entry).total_cmp(&b.distance_pct(entry)))
}

fn entry_triggers(ctx: &SetupContext<'_>, bias: TradeBias, stop_loss: f64) -> Vec<String> {
    let wanted = match bias {
        TradeBias::Long => SignalDirection::Buy,
        TradeBias::Short => SignalDirection::Sell,
        TradeBias::Neutral => {
            return vec!["no directional bias, wait for timeframes to align".to_string()];
        }
    };

    let mut triggers: Vec<String> = ctx
        .signals
        .iter()
        .filter(|s| s.direction == wanted)
        .map(|s| format!("{}: {} signal (score {:.2})", s.timeframe, s.direction, s.score))
        .collect();
    match bias {
        TradeBias::Long => triggers.push(format!("price holds above {:.4}", stop_loss)),
        TradeBias::Short => triggers.push(format!("price holds below {:.4}", stop_loss)),
        TradeBias::Neutral => {}
    }
    triggers
}

fn exit_conditions(
    bias: TradeBias,
    take_profit: f64,
    target_source: LevelSource,
    stop_loss: f64,
) -> Vec<String> {
    let mut exits = vec![
        format!("take profit at {:.4} ({:?})", take_profit, target_source),
        format!("stop loss at {:.4}", stop_loss),
    ];
    match bias {
        TradeBias::Long => exits.push("dominant trend turns bearish".to_string()),
        TradeBias::Short => exits.push("dominant trend turns bullish".to_string()),
        TradeBias::Neutral => exits.push("no position while trend is sideways".to_string()),
    }
    exits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::levels::{LevelKind, Significance};

    fn trend(dominant: TrendDirection, alignment: f64) -> OverallTrend {
        OverallTrend {
            short_term: None,
            medium_term: None,
            long_term: Some(dominant),
            dominant,
            alignment_score: alignment,
            valid_timeframes: 1,
        }
    }

    fn level(price: f64, kind: LevelKind, significance: Significance) -> SupportResistanceLevel {
        SupportResistanceLevel {
            price,
            strength: 5,
            touch_count: 3,
            last_tested: 0,
            kind,
            significance,
            confirmations: 1,
        }
    }

    fn empty_levels() -> CriticalLevels {
        CriticalLevels {
            support: Vec::new(),
            resistance: Vec::new(),
            pivot_points: None,
            fibonacci: Vec::new(),
        }
    }

    #[test]
    fn test_long_uses_qualifying_levels() {
        let overall = trend(TrendDirection::Bullish, 1.0);
        let levels = CriticalLevels {
            support: vec![
                level(98.0, LevelKind::Support, Significance::Minor),
                level(95.0, LevelKind::Support, Significance::Major),
            ],
            resistance: vec![level(110.0, LevelKind::Resistance, Significance::Critical)],
            ..empty_levels()
        };
        let ctx = SetupContext {
            current_price: 100.0,
            overall_trend: &overall,
            critical_levels: &levels,
            signals: Vec::new(),
            degraded: Vec::new(),
            reference_atr: Some(2.0),
        };
        let setup = SetupScorer::new(SetupWeights::default()).score(&ctx);

        assert_eq!(setup.bias, TradeBias::Long);
        assert_eq!(setup.take_profit, 110.0);
        assert_eq!(setup.stop_loss, 95.0);
        assert_eq!(setup.target_source, LevelSource::QualifyingLevel);
        assert!((setup.risk_reward_ratio - 2.0).abs() < 1e-12);
        // 30 + 0 + 0 + 2/3 * 25
        assert!((setup.score - (30.0 + 50.0 / 3.0)).abs() < 1e-9);
        assert!(setup.win_probability <= 0.85);
    }

    #[test]
    fn test_atr_fallback_for_short() {
        let overall = trend(TrendDirection::Bearish, 1.0);
        let levels = empty_levels();
        let ctx = SetupContext {
            current_price: 100.0,
            overall_trend: &overall,
            critical_levels: &levels,
            signals: Vec::new(),
            degraded: Vec::new(),
            reference_atr: Some(2.0),
        };
        let setup = SetupScorer::new(SetupWeights::default()).score(&ctx);

        assert_eq!(setup.bias, TradeBias::Short);
        assert_eq!(setup.take_profit, 94.0);
        assert_eq!(setup.stop_loss, 103.0);
        assert_eq!(setup.stop_source, LevelSource::AtrProjection);
        assert!((setup.risk_reward_ratio - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_risk_gives_zero_ratio() {
        let overall = trend(TrendDirection::Sideways, 1.0);
        let levels = empty_levels();
        let ctx = SetupContext {
            current_price: 100.0,
            overall_trend: &overall,
            critical_levels: &levels,
            signals: Vec::new(),
            degraded: Vec::new(),
            reference_atr: None,
        };
        let setup = SetupScorer::new(SetupWeights::default()).score(&ctx);

        assert_eq!(setup.bias, TradeBias::Neutral);
        assert_eq!(setup.risk_reward_ratio, 0.0);
        assert_eq!(setup.stop_source, LevelSource::Unavailable);
        assert!(setup.risk_factors.iter().any(|f| f.contains("risk/reward")));
        assert!((0.0..=100.0).contains(&setup.score));
    }

    #[test]
    fn test_degraded_slots_are_risk_factors() {
        let overall = trend(TrendDirection::Bullish, 0.25);
        let levels = empty_levels();
        let failure = TimeframeFailure::InsufficientData {
            required: 20,
            available: 2,
        };
        let ctx = SetupContext {
            current_price: 100.0,
            overall_trend: &overall,
            critical_levels: &levels,
            signals: Vec::new(),
            degraded: vec![(Timeframe::OneMin, &failure)],
            reference_atr: Some(1.0),
        };
        let setup = SetupScorer::new(SetupWeights::default()).score(&ctx);
        assert!(setup.risk_factors.iter().any(|f| f.starts_with("1m: degraded")));
        assert!(setup.risk_factors.iter().any(|f| f.contains("alignment")));
    }
}

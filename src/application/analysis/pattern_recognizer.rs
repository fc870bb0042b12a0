use crate::config::PatternParams;
use crate::domain::analysis::patterns::{PatternKind, PatternMatch};
use crate::domain::market::candle::SeriesColumns;
use crate::domain::market::timeframe::Timeframe;

/// Rule-based recognizer for directional runs and single/double candle formations.
pub struct PatternRecognizer {
    params: PatternParams,
}

#[derive(Debug, Clone, Copy)]
struct Bar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Bar {
    fn at(cols: &SeriesColumns, i: usize) -> Self {
        Self {
            open: cols.open[i],
            high: cols.high[i],
            low: cols.low[i],
            close: cols.close[i],
        }
    }

    fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

impl PatternRecognizer {
    pub fn new(params: PatternParams) -> Self {
        Self { params }
    }

    pub fn recognize(&self, cols: &SeriesColumns, timeframe: Timeframe) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        if cols.is_empty() {
            return matches;
        }

        if let Some(m) = self.directional_run(cols, timeframe) {
            matches.push(m);
        }

        let last = Bar::at(cols, cols.len() - 1);
        matches.push(self.candle_body(last, timeframe));

        if cols.len() >= 2 {
            let prev = Bar::at(cols, cols.len() - 2);
            if let Some(m) = engulfing(prev, last, timeframe) {
                matches.push(m);
            }
        }
        if let Some(m) = shadow_reversal(last, timeframe) {
            matches.push(m);
        }

        matches
    }

    fn directional_run(&self, cols: &SeriesColumns, timeframe: Timeframe) -> Option<PatternMatch> {
        let closes = &cols.close;
        let len = closes.len();
        if len < 2 {
            return None;
        }

        let rising = closes[len - 1] > closes[len - 2];
        let falling = closes[len - 1] < closes[len - 2];
        if !rising && !falling {
            return None;
        }

        let mut run = 0;
        for i in (1..len).rev() {
            let step_holds = if rising {
                closes[i] > closes[i - 1]
            } else {
                closes[i] < closes[i - 1]
            };
            if !step_holds {
                break;
            }
            run += 1;
        }

        let min_run = self.params.min_run.max(1);
        if run < min_run {
            return None;
        }

        let first = len - 1 - run;
        let last_close = closes[len - 1];
        let half_move = (last_close - closes[first]) / 2.0;
        let confidence = (0.5 + 0.1 * (run - min_run) as f64).min(0.95);

        let (kind, invalidation) = if rising {
            (PatternKind::AscendingTrend { run }, cols.low[first])
        } else {
            (PatternKind::DescendingTrend { run }, cols.high[first])
        };

        Some(
            PatternMatch::new(kind, confidence, timeframe)
                .with_levels(last_close + half_move, invalidation),
        )
    }

    fn candle_body(&self, bar: Bar, timeframe: Timeframe) -> PatternMatch {
        let range = bar.range();
        if range <= 0.0 {
            return PatternMatch::new(PatternKind::Doji, 1.0, timeframe);
        }

        let ratio = bar.body() / range;
        if ratio < self.params.doji_body_ratio {
            return PatternMatch::new(PatternKind::Doji, 1.0 - ratio, timeframe);
        }

        let kind = if bar.is_bullish() {
            PatternKind::BullishCandle
        } else {
            PatternKind::BearishCandle
        };
        PatternMatch::new(kind, ratio, timeframe)
    }
}

fn engulfing(prev: Bar, last: Bar, timeframe: Timeframe) -> Option<PatternMatch> {
    let prev_body = prev.body();
    let last_body = last.body();
    if prev_body <= 0.0 || last_body <= prev_body {
        return None;
    }
    let confidence = (0.5 + 0.5 * (1.0 - prev_body / last_body)).min(0.9);

    if prev.is_bearish() && last.is_bullish() && last.open <= prev.close && last.close >= prev.open
    {
        return Some(PatternMatch::new(
            PatternKind::BullishEngulfing,
            confidence,
            timeframe,
        ));
    }
    if prev.is_bullish() && last.is_bearish() && last.open >= prev.close && last.close <= prev.open
    {
        return Some(PatternMatch::new(
            PatternKind::BearishEngulfing,
            confidence,
            timeframe,
        ));
    }
    None
}

fn shadow_reversal(bar: Bar, timeframe: Timeframe) -> Option<PatternMatch> {
    let body = bar.body();
    let range = bar.range();
    if body <= 0.0 || range <= 0.0 {
        return None;
    }

    let lower = bar.lower_shadow();
    let upper = bar.upper_shadow();
    if lower >= 2.0 * body && upper <= body {
        return Some(PatternMatch::new(
            PatternKind::Hammer,
            (lower / range).min(0.9),
            timeframe,
        ));
    }
    if upper >= 2.0 * body && lower <= body {
        return Some(PatternMatch::new(
            PatternKind::ShootingStar,
            (upper / range).min(0.9),
            timeframe,
        ));
    }
    None
}

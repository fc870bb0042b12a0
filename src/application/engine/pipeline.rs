use crate::application::analysis::level_detector::LevelDetector;
use crate::application::analysis::pattern_recognizer::PatternRecognizer;
use crate::application::analysis::signal_fuser::SignalFuser;
use crate::application::analysis::trend_analyzer::TrendAnalyzer;
use crate::application::market_data::indicator_calculator::IndicatorCalculator;
use crate::config::AnalysisConfig;
use crate::domain::analysis::indicators::AnalysisDepth;
use crate::domain::analysis::signal::{DataQuality, TimeframeSignal};
use crate::domain::errors::TimeframeFailure;
use crate::domain::market::candle::{Candle, SeriesColumns};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::validation::data_quality::CandleValidator;
use tracing::debug;

/// Everything one healthy timeframe hands to the aggregator
#[derive(Debug, Clone)]
pub struct TimeframeRun {
    pub signal: TimeframeSignal,
    pub columns: SeriesColumns,
}

impl TimeframeRun {
    pub fn last_close(&self) -> Option<f64> {
        self.columns.close.last().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.columns.timestamps.last().copied()
    }
}

/// Validate, compute indicators, assess trend, find levels and patterns, fuse.
///
/// Synchronous and pure over its input candles; the engine runs one per
/// timeframe task.
pub struct TimeframePipeline {
    min_candles: usize,
    calculator: IndicatorCalculator,
    trend: TrendAnalyzer,
    levels: LevelDetector,
    patterns: PatternRecognizer,
    fuser: SignalFuser,
}

impl TimeframePipeline {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            min_candles: config.fetch.min_candles,
            calculator: IndicatorCalculator::new(config.indicators.clone()),
            trend: TrendAnalyzer::new(config.trend.clone()),
            levels: LevelDetector::new(config.levels.clone()),
            patterns: PatternRecognizer::new(config.patterns.clone()),
            fuser: SignalFuser::new(config.fusion.clone()),
        }
    }

    pub fn run(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        depth: AnalysisDepth,
    ) -> Result<TimeframeRun, TimeframeFailure> {
        let candles_received = candles.len();
        let (series, rejected) = CandleValidator::sanitize(symbol, timeframe, candles);

        if series.len() < self.min_candles {
            return Err(TimeframeFailure::InsufficientData {
                required: self.min_candles,
                available: series.len(),
            });
        }

        let columns = series.columns();
        let indicators = self.calculator.calculate(&columns, depth);
        let trend = self.trend.analyze(&columns.close, &indicators);
        let levels = self.levels.detect(&columns);
        let patterns = self.patterns.recognize(&columns, timeframe);

        let data_quality = DataQuality {
            candles_received,
            candles_used: series.len(),
            rejected,
        };

        let signal = self.fuser.fuse(
            timeframe,
            indicators,
            trend,
            levels,
            patterns,
            data_quality,
        );

        debug!(
            symbol,
            timeframe = %timeframe,
            candles = columns.len(),
            indicators_degraded = signal.indicators.is_degraded(),
            direction = %signal.direction,
            score = signal.score,
            "TimeframePipeline: signal fused"
        );

        Ok(TimeframeRun { signal, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::signal::SignalDirection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn rising(n: usize) -> Vec<Candle> {
        rising_from(100, n)
    }

    fn rising_from(start: i64, n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = Decimal::from(start + i as i64);
                Candle::new(
                    i as i64 * 3_600_000,
                    c - dec!(0.5),
                    c + dec!(0.5),
                    c - dec!(1),
                    c,
                    dec!(1000),
                )
            })
            .collect()
    }

    #[test]
    fn test_rising_series_produces_buy() {
        let pipeline = TimeframePipeline::new(&AnalysisConfig::default());
        for start in [100_i64, 1_000, 30_000] {
            let run = pipeline
                .run(
                    "BTCUSDT",
                    Timeframe::OneHour,
                    rising_from(start, 60),
                    AnalysisDepth::Comprehensive,
                )
                .unwrap();
            assert_eq!(run.signal.direction, SignalDirection::Buy, "start {}", start);
            assert!(run.signal.trend.is_strong_bullish(), "start {}", start);
            assert_eq!(run.signal.data_quality.candles_used, 60);
            assert_eq!(run.last_close(), Some((start + 59) as f64));
        }
    }

    #[test]
    fn test_invalid_candles_are_dropped_and_counted() {
        let mut candles = rising(30);
        // high below low
        candles[10].high = dec!(1);
        let pipeline = TimeframePipeline::new(&AnalysisConfig::default());
        let run = pipeline
            .run("BTCUSDT", Timeframe::OneHour, candles, AnalysisDepth::Basic)
            .unwrap();
        assert_eq!(run.signal.data_quality.candles_received, 30);
        assert_eq!(run.signal.data_quality.candles_used, 29);
        assert_eq!(run.signal.data_quality.rejected.len(), 1);
        assert_eq!(run.signal.data_quality.rejected[0].index, 10);
    }

    #[test]
    fn test_short_history_is_a_failure() {
        let pipeline = TimeframePipeline::new(&AnalysisConfig::default());
        let err = pipeline
            .run("BTCUSDT", Timeframe::OneHour, rising(5), AnalysisDepth::Basic)
            .unwrap_err();
        assert_eq!(
            err,
            TimeframeFailure::InsufficientData {
                required: 20,
                available: 5
            }
        );
    }
}

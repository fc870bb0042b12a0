use crate::application::market_data::indicators::{self, IndicatorResult};
use crate::config::IndicatorParams;
use crate::domain::analysis::indicators::{
    AnalysisDepth, DegradedIndicator, ExtendedIndicators, Ichimoku, IndicatorGap, IndicatorSet,
    MovingAverages, Oscillators, TrendStrength, Volatility, VolumeIndicators,
};
use crate::domain::market::candle::SeriesColumns;
use ta::Next;
use ta::indicators::SimpleMovingAverage;
use tracing::debug;

/// Computes the indicator catalogue for one candle series.
///
/// Indicators whose window exceeds the available history are left as `None`
/// and recorded in `IndicatorSet::gaps`. The medium and long SMAs widen to the
/// available length when at least the short SMA window is present, and are
/// recorded in `IndicatorSet::degraded`.
pub struct IndicatorCalculator {
    params: IndicatorParams,
}

impl IndicatorCalculator {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn calculate(&self, cols: &SeriesColumns, depth: AnalysisDepth) -> IndicatorSet {
        let p = &self.params;
        let mut gaps = Vec::new();
        let mut degraded = Vec::new();

        let moving_averages = MovingAverages {
            sma_20: keep(&mut gaps, indicators::sma(&cols.close, p.sma_short_period)),
            sma_50: self.widening_sma(cols, p.sma_medium_period, &mut gaps, &mut degraded),
            sma_200: self.widening_sma(cols, p.sma_long_period, &mut gaps, &mut degraded),
            ema_fast: keep(&mut gaps, indicators::ema(&cols.close, p.ema_fast_period)),
            ema_slow: keep(&mut gaps, indicators::ema(&cols.close, p.ema_slow_period)),
        };

        let stoch = keep(
            &mut gaps,
            indicators::stochastic(
                &cols.high,
                &cols.low,
                &cols.close,
                p.stoch_k_period,
                p.stoch_d_period,
            ),
        );
        let macd = keep(
            &mut gaps,
            indicators::macd(
                &cols.close,
                p.macd_fast_period,
                p.macd_slow_period,
                p.macd_signal_period,
            ),
        );
        let oscillators = Oscillators {
            rsi: keep(&mut gaps, indicators::rsi(&cols.close, p.rsi_period)),
            stoch_k: stoch.map(|s| s.k),
            stoch_d: stoch.map(|s| s.d),
            macd_line: macd.map(|m| m.line),
            macd_signal: macd.map(|m| m.signal),
            macd_histogram: macd.map(|m| m.histogram),
        };

        let adx = keep(
            &mut gaps,
            indicators::adx(&cols.high, &cols.low, &cols.close, p.adx_period),
        );
        let aroon = keep(
            &mut gaps,
            indicators::aroon(&cols.high, &cols.low, p.aroon_period),
        );
        let trend_strength = TrendStrength {
            adx: adx.map(|a| a.adx),
            plus_di: adx.map(|a| a.plus_di),
            minus_di: adx.map(|a| a.minus_di),
            aroon_up: aroon.map(|a| a.up),
            aroon_down: aroon.map(|a| a.down),
        };

        let bands = keep(
            &mut gaps,
            indicators::bollinger(&cols.close, p.bb_period, p.bb_std_dev),
        );
        let volatility = Volatility {
            atr: keep(
                &mut gaps,
                indicators::atr(&cols.high, &cols.low, &cols.close, p.atr_period),
            ),
            bb_upper: bands.map(|b| b.upper),
            bb_middle: bands.map(|b| b.middle),
            bb_lower: bands.map(|b| b.lower),
            bb_width: bands.map(|b| b.width),
        };

        let volume = VolumeIndicators {
            obv: keep(&mut gaps, indicators::obv(&cols.close, &cols.volume)),
            volume_sma: self.volume_sma(cols, &mut gaps),
            vwap: keep(
                &mut gaps,
                indicators::vwap(&cols.high, &cols.low, &cols.close, &cols.volume),
            ),
        };

        let extended = match depth {
            AnalysisDepth::Basic => None,
            AnalysisDepth::Comprehensive => Some(self.extended(cols, &mut gaps)),
        };

        if !gaps.is_empty() {
            debug!(
                candles = cols.len(),
                gaps = gaps.len(),
                "IndicatorCalculator: abstained on indicators with insufficient history"
            );
        }

        IndicatorSet {
            last_close: cols.close.last().copied().unwrap_or(0.0),
            moving_averages,
            oscillators,
            trend_strength,
            volatility,
            volume,
            extended,
            gaps,
            degraded,
        }
    }

    fn extended(&self, cols: &SeriesColumns, gaps: &mut Vec<IndicatorGap>) -> ExtendedIndicators {
        let p = &self.params;
        let ichimoku = keep(
            gaps,
            indicators::ichimoku(
                &cols.high,
                &cols.low,
                p.ichimoku_tenkan_period,
                p.ichimoku_kijun_period,
                p.ichimoku_senkou_b_period,
            ),
        )
        .map(|v| Ichimoku {
            tenkan: v.tenkan,
            kijun: v.kijun,
            senkou_a: v.senkou_a,
            senkou_b: v.senkou_b,
        });

        ExtendedIndicators {
            ichimoku,
            williams_r: keep(
                gaps,
                indicators::williams_r(&cols.high, &cols.low, &cols.close, p.williams_r_period),
            ),
            cci: keep(
                gaps,
                indicators::cci(&cols.high, &cols.low, &cols.close, p.cci_period),
            ),
        }
    }

    fn widening_sma(
        &self,
        cols: &SeriesColumns,
        period: usize,
        gaps: &mut Vec<IndicatorGap>,
        degraded: &mut Vec<DegradedIndicator>,
    ) -> Option<f64> {
        let available = cols.close.len();
        let floor = self.params.sma_short_period.max(2);
        if available < period && available >= floor {
            let value = keep(gaps, indicators::sma(&cols.close, available))?;
            degraded.push(DegradedIndicator {
                indicator: format!("sma_{}", period),
                requested_window: period,
                used_window: available,
            });
            return Some(value);
        }
        keep(gaps, indicators::sma(&cols.close, period))
    }

    fn volume_sma(&self, cols: &SeriesColumns, gaps: &mut Vec<IndicatorGap>) -> Option<f64> {
        let period = self.params.volume_sma_period;
        let name = format!("volume_sma_{}", period);
        if cols.volume.len() < period {
            gaps.push(IndicatorGap {
                indicator: name,
                required: period,
                available: cols.volume.len(),
            });
            return None;
        }
        let mut sma = match SimpleMovingAverage::new(period) {
            Ok(sma) => sma,
            Err(_) => {
                gaps.push(IndicatorGap {
                    indicator: name,
                    required: period,
                    available: cols.volume.len(),
                });
                return None;
            }
        };
        // Only the trailing window matters for the last value
        let mut last = 0.0;
        for &v in &cols.volume[cols.volume.len() - period..] {
            last = sma.next(v);
        }
        Some(last)
    }
}

fn keep<T>(gaps: &mut Vec<IndicatorGap>, result: IndicatorResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            gaps.push(IndicatorGap::from_error(&e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(n: usize, step: f64) -> SeriesColumns {
        let mut cols = SeriesColumns::default();
        for i in 0..n {
            let c = 100.0 + i as f64 * step;
            cols.timestamps.push(i as i64 * 60_000);
            cols.open.push(c);
            cols.high.push(c + 0.5);
            cols.low.push(c - 0.5);
            cols.close.push(c);
            cols.volume.push(1000.0 + i as f64);
        }
        cols
    }

    #[test]
    fn test_full_history_has_no_gaps() {
        let calc = IndicatorCalculator::new(IndicatorParams::default());
        let set = calc.calculate(&columns(250, 0.5), AnalysisDepth::Comprehensive);
        assert!(set.gaps.is_empty(), "gaps: {:?}", set.gaps);
        assert!(set.degraded.is_empty());
        assert!(!set.is_degraded());
        assert!(set.moving_averages.sma_200.is_some());
        let extended = set.extended.unwrap();
        assert!(extended.ichimoku.is_some());
        assert!(extended.cci.is_some());
    }

    #[test]
    fn test_sixty_candles_widen_long_sma() {
        let calc = IndicatorCalculator::new(IndicatorParams::default());
        let cols = columns(60, 1.0);
        let set = calc.calculate(&cols, AnalysisDepth::Basic);

        let expected = cols.close.iter().sum::<f64>() / 60.0;
        assert_eq!(set.moving_averages.sma_200, Some(expected));
        assert_eq!(set.degraded.len(), 1);
        assert_eq!(set.degraded[0].indicator, "sma_200");
        assert_eq!(set.degraded[0].used_window, 60);
        assert!(set.is_degraded());
        assert!(set.moving_averages.sma_50.is_some());
        assert!(set.extended.is_none());
        assert_eq!(set.oscillators.rsi, Some(100.0));
    }

    #[test]
    fn test_three_candles_abstain() {
        let calc = IndicatorCalculator::new(IndicatorParams::default());
        let set = calc.calculate(&columns(3, 1.0), AnalysisDepth::Comprehensive);

        assert!(set.moving_averages.sma_20.is_none());
        assert!(set.moving_averages.sma_50.is_none());
        assert!(set.moving_averages.sma_200.is_none());
        assert!(set.oscillators.rsi.is_none());
        assert!(set.oscillators.macd_line.is_none());
        assert!(set.trend_strength.adx.is_none());
        assert!(set.volatility.atr.is_none());
        assert!(set.volatility.bb_upper.is_none());
        assert!(set.has_gap("sma_200"));
        assert!(set.has_gap("rsi_14"));
        assert!(set.has_gap("macd_12_26_9"));
        assert!(set.degraded.is_empty());
        // Whole-series indicators still compute
        assert!(set.volume.obv.is_some());
        assert!(set.volume.vwap.is_some());
        assert_eq!(set.last_close, 102.0);
    }

    #[test]
    fn test_volume_sma_uses_trailing_window() {
        let calc = IndicatorCalculator::new(IndicatorParams::default());
        let cols = columns(40, 1.0);
        let set = calc.calculate(&cols, AnalysisDepth::Basic);
        let expected = cols.volume[20..].iter().sum::<f64>() / 20.0;
        let got = set.volume.volume_sma.unwrap();
        assert!((got - expected).abs() < 1e-9);
    }
}

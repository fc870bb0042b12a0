use crate::config::TrendParams;
use crate::domain::analysis::indicators::IndicatorSet;
use crate::domain::analysis::trend::{TrendAssessment, TrendDirection, TrendQuality, TrendSignal};

/// Classifies trend direction and strength from a regression over recent closes.
pub struct TrendAnalyzer {
    params: TrendParams,
}

impl TrendAnalyzer {
    pub fn new(params: TrendParams) -> Self {
        Self { params }
    }

    pub fn analyze(&self, closes: &[f64], indicators: &IndicatorSet) -> TrendAssessment {
        let lookback = self.params.lookback.max(2).min(closes.len());
        let window = &closes[closes.len() - lookback..];

        let slope_angle = slope_angle_degrees(window).unwrap_or(0.0);
        let threshold = self.params.sideways_angle_deg;
        let direction = if slope_angle > threshold {
            TrendDirection::Bullish
        } else if slope_angle < -threshold {
            TrendDirection::Bearish
        } else {
            TrendDirection::Sideways
        };

        let strength = (slope_angle.abs() / 45.0).min(1.0);
        let quality = if strength > self.params.strong_threshold {
            TrendQuality::Strong
        } else if strength > self.params.moderate_threshold {
            TrendQuality::Moderate
        } else {
            TrendQuality::Weak
        };

        let (confirming_signals, divergences) = self.collect_signals(direction, indicators);

        TrendAssessment {
            direction,
            strength,
            slope_angle,
            quality,
            confirming_signals,
            divergences,
        }
    }

    fn collect_signals(
        &self,
        direction: TrendDirection,
        indicators: &IndicatorSet,
    ) -> (Vec<TrendSignal>, Vec<TrendSignal>) {
        let mut confirming = Vec::new();
        let mut divergences = Vec::new();
        if direction == TrendDirection::Sideways {
            return (confirming, divergences);
        }
        let bullish = direction == TrendDirection::Bullish;

        let ma = &indicators.moving_averages;
        if let (Some(fast), Some(slow)) = (ma.ema_fast, ma.ema_slow)
            && fast != slow
        {
            let fast_above_slow = fast > slow;
            let signal = TrendSignal::EmaAlignment { fast_above_slow };
            if fast_above_slow == bullish {
                confirming.push(signal);
            } else {
                divergences.push(signal);
            }
        }

        if let Some(rsi) = indicators.oscillators.rsi
            && rsi != 50.0
        {
            let signal = TrendSignal::RsiMidline { rsi };
            if (rsi > 50.0) == bullish {
                confirming.push(signal);
            } else {
                divergences.push(signal);
            }
        }

        if let Some(adx) = indicators.trend_strength.adx
            && adx > self.params.adx_threshold
        {
            confirming.push(TrendSignal::AdxTrending {
                adx,
                threshold: self.params.adx_threshold,
            });
        }

        (confirming, divergences)
    }
}

/// OLS slope in price units per candle, as an angle
fn slope_angle_degrees(window: &[f64]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;

    let x_mean = (n - 1.0) / 2.0;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in window.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - mean);
        den += dx * dx;
    }
    if den.abs() < 1e-12 {
        return None;
    }

    Some((num / den).atan().to_degrees())
}

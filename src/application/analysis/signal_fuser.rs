use crate::config::FusionWeights;
use crate::domain::analysis::indicators::IndicatorSet;
use crate::domain::analysis::levels::SupportResistanceLevel;
use crate::domain::analysis::patterns::{PatternMatch, Polarity};
use crate::domain::analysis::signal::{DataQuality, SignalDirection, SignalFactor, TimeframeSignal};
use crate::domain::analysis::trend::TrendAssessment;
use crate::domain::market::timeframe::Timeframe;

/// Weighted scoring of one timeframe's indicators, trend and patterns.
///
/// The accumulator starts at zero; each rule that fires adds its signed
/// weight. Positive contributions are confluences, negative ones divergences.
pub struct SignalFuser {
    weights: FusionWeights,
}

impl SignalFuser {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn fuse(
        &self,
        timeframe: Timeframe,
        indicators: IndicatorSet,
        trend: TrendAssessment,
        levels: Vec<SupportResistanceLevel>,
        patterns: Vec<PatternMatch>,
        data_quality: DataQuality,
    ) -> TimeframeSignal {
        let factors = self.factors(&indicators, &trend, &patterns);
        let score: f64 = factors.iter().map(SignalFactor::weight).sum();

        let direction = if score > self.weights.buy_threshold {
            SignalDirection::Buy
        } else if score < self.weights.sell_threshold {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        };

        let (confluences, divergences): (Vec<_>, Vec<_>) =
            factors.into_iter().partition(|f| f.weight() > 0.0);

        TimeframeSignal {
            timeframe,
            indicators,
            trend,
            levels,
            patterns,
            direction,
            strength: score.abs().clamp(0.0, 1.0),
            score,
            confluences,
            divergences,
            data_quality,
        }
    }

    fn factors(
        &self,
        indicators: &IndicatorSet,
        trend: &TrendAssessment,
        patterns: &[PatternMatch],
    ) -> Vec<SignalFactor> {
        let w = &self.weights;
        let mut factors = Vec::new();

        let ma = &indicators.moving_averages;
        if let (Some(fast), Some(slow)) = (ma.ema_fast, ma.ema_slow) {
            if fast > slow {
                factors.push(SignalFactor::EmaBullishCross {
                    fast,
                    slow,
                    weight: w.ema_confluence,
                });
            } else if fast < slow {
                factors.push(SignalFactor::EmaBearishCross {
                    fast,
                    slow,
                    weight: w.ema_divergence,
                });
            }
        }

        if let Some(rsi) = indicators.oscillators.rsi {
            let factor = if rsi < w.rsi_lower_bound {
                SignalFactor::RsiOversold {
                    rsi,
                    weight: w.rsi_oversold,
                }
            } else if rsi > w.rsi_upper_bound {
                SignalFactor::RsiOverbought {
                    rsi,
                    weight: w.rsi_overbought,
                }
            } else {
                SignalFactor::RsiHealthy {
                    rsi,
                    weight: w.rsi_healthy,
                }
            };
            factors.push(factor);
        }

        if trend.is_strong_bullish() {
            factors.push(SignalFactor::StrongUptrend {
                strength: trend.strength,
                weight: w.strong_uptrend,
            });
        } else if trend.is_strong_bearish() {
            factors.push(SignalFactor::StrongDowntrend {
                strength: trend.strength,
                weight: w.strong_downtrend,
            });
        }

        let bullish = patterns
            .iter()
            .filter(|p| p.polarity == Polarity::Bullish)
            .count();
        let bearish = patterns
            .iter()
            .filter(|p| p.polarity == Polarity::Bearish)
            .count();
        if bullish != bearish {
            let (polarity, weight) = if bullish > bearish {
                (Polarity::Bullish, w.pattern_majority)
            } else {
                (Polarity::Bearish, -w.pattern_majority)
            };
            factors.push(SignalFactor::PatternMajority {
                polarity,
                bullish,
                bearish,
                weight,
            });
        }

        factors.retain(|f| f.weight() != 0.0);
        factors
    }
}

//! Pure technical indicator functions.
//!
//! No I/O, no state between calls. Every function takes `f64` columns in
//! ascending time order and returns the value at the last element, or
//! `IndicatorError::InsufficientData` when the series is shorter than the
//! indicator's minimum window. Nothing here substitutes a default number for
//! missing history.
//!
//! Indicators implemented:
//! - Moving averages: SMA, EMA (SMA-seeded)
//! - Oscillators: RSI (Wilder), Stochastic %K/%D, MACD, Williams %R, CCI
//! - Trend strength: ADX / +DI / -DI (Wilder), Aroon up/down
//! - Volatility: ATR, Bollinger Bands
//! - Volume: OBV, VWAP
//! - Extended: Ichimoku (non-displaced lines)

use crate::domain::errors::IndicatorError;
use statrs::statistics::Statistics;
use ta::Next;
use ta::indicators::{Maximum, Minimum};

pub type IndicatorResult<T> = Result<T, IndicatorError>;

fn require(indicator: &str, available: usize, required: usize) -> IndicatorResult<()> {
    if available < required {
        return Err(IndicatorError::insufficient(indicator, required, available));
    }
    Ok(())
}

fn require_period(indicator: &str, period: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter {
            indicator: indicator.to_string(),
            reason: "period must be > 0".to_string(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Moving averages
// ═══════════════════════════════════════════════════════════════════════════

/// Arithmetic mean of the trailing `period` values.
pub fn sma(values: &[f64], period: usize) -> IndicatorResult<f64> {
    let name = format!("sma_{}", period);
    require_period(&name, period)?;
    require(&name, values.len(), period)?;
    let window = &values[values.len() - period..];
    Ok(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series.
///
/// Multiplier `k = 2 / (period + 1)`, seeded with the SMA of the first
/// `period` values. The output has `len - period + 1` entries, the first
/// being the seed.
pub fn ema_series(values: &[f64], period: usize) -> IndicatorResult<Vec<f64>> {
    let name = format!("ema_{}", period);
    require_period(&name, period)?;
    require(&name, values.len(), period)?;

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    Ok(out)
}

pub fn ema(values: &[f64], period: usize) -> IndicatorResult<f64> {
    let series = ema_series(values, period)?;
    // ema_series always yields at least the seed
    Ok(series[series.len() - 1])
}

// ═══════════════════════════════════════════════════════════════════════════
// Oscillators
// ═══════════════════════════════════════════════════════════════════════════

/// Relative Strength Index with Wilder's smoothing (`1/period`).
///
/// 100 when the average loss is zero and the average gain positive; 50 when
/// both are zero (a perfectly flat window has no momentum either way).
pub fn rsi(closes: &[f64], period: usize) -> IndicatorResult<f64> {
    let name = format!("rsi_{}", period);
    require_period(&name, period)?;
    require(&name, closes.len(), period + 1)?;

    let n = period as f64;
    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / n;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / n;

    for &c in &changes[period..] {
        avg_gain = (avg_gain * (n - 1.0) + c.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-c).max(0.0)) / n;
    }

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Ok((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

fn percent_k(close: f64, highest: f64, lowest: f64) -> f64 {
    let range = highest - lowest;
    if range <= 0.0 {
        return 50.0;
    }
    ((close - lowest) / range * 100.0).clamp(0.0, 100.0)
}

/// Stochastic oscillator; %D is the SMA of the last `d_period` %K values.
pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
) -> IndicatorResult<StochasticValue> {
    let name = format!("stochastic_{}_{}", k_period, d_period);
    require_period(&name, k_period)?;
    require_period(&name, d_period)?;
    require(&name, close.len(), k_period + d_period - 1)?;

    let invalid = |_| IndicatorError::InvalidParameter {
        indicator: name.clone(),
        reason: "invalid window".to_string(),
    };
    let mut highest = Maximum::new(k_period).map_err(invalid)?;
    let mut lowest = Minimum::new(k_period).map_err(invalid)?;

    let mut k_values = Vec::with_capacity(close.len());
    for i in 0..close.len() {
        let hh = highest.next(high[i]);
        let ll = lowest.next(low[i]);
        if i + 1 >= k_period {
            k_values.push(percent_k(close[i], hh, ll));
        }
    }

    let k = k_values[k_values.len() - 1];
    let d = k_values[k_values.len() - d_period..].iter().sum::<f64>() / d_period as f64;
    Ok(StochasticValue { k, d })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line, signal line and histogram at the last close.
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> IndicatorResult<MacdValue> {
    let name = format!("macd_{}_{}_{}", fast, slow, signal);
    require_period(&name, fast)?;
    require_period(&name, signal)?;
    if fast >= slow {
        return Err(IndicatorError::InvalidParameter {
            indicator: name,
            reason: "fast period must be below slow period".to_string(),
        });
    }
    require(&name, closes.len(), slow + signal - 1)?;

    let fast_series = ema_series(closes, fast)?;
    let slow_series = ema_series(closes, slow)?;
    let offset = slow - fast;

    let macd_line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(j, s)| fast_series[j + offset] - s)
        .collect();

    let signal_value = ema(&macd_line, signal)?;
    let line = macd_line[macd_line.len() - 1];
    Ok(MacdValue {
        line,
        signal: signal_value,
        histogram: line - signal_value,
    })
}

/// Williams %R in `[-100, 0]`; -50 when the window has no range.
pub fn williams_r(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> IndicatorResult<f64> {
    let name = format!("williams_r_{}", period);
    require_period(&name, period)?;
    require(&name, close.len(), period)?;

    let (hh, ll) = extremes(&high[high.len() - period..], &low[low.len() - period..]);
    let range = hh - ll;
    if range <= 0.0 {
        return Ok(-50.0);
    }
    Ok(((hh - close[close.len() - 1]) / range * -100.0).clamp(-100.0, 0.0))
}

/// Commodity Channel Index over the typical price.
pub fn cci(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<f64> {
    let name = format!("cci_{}", period);
    require_period(&name, period)?;
    require(&name, close.len(), period)?;

    let start = close.len() - period;
    let typical: Vec<f64> = (start..close.len())
        .map(|i| (high[i] + low[i] + close[i]) / 3.0)
        .collect();
    let mean = typical.iter().sum::<f64>() / period as f64;
    let mean_dev = typical.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
    if mean_dev == 0.0 {
        return Ok(0.0);
    }
    Ok((typical[typical.len() - 1] - mean) / (0.015 * mean_dev))
}

// ═══════════════════════════════════════════════════════════════════════════
// Trend strength
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Streaming ADX using standard Wilder's smoothing.
///
/// Accumulates the first `period` values as a sum, then applies Wilder's
/// recurrence; ADX is seeded with the first DX.
struct WilderAdx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr_sum: f64,
    plus_dm_sum: f64,
    minus_dm_sum: f64,
    tr_smooth: f64,
    plus_dm_smooth: f64,
    minus_dm_smooth: f64,
    adx_smooth: f64,
    count: usize,
}

impl WilderAdx {
    fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            tr_sum: 0.0,
            plus_dm_sum: 0.0,
            minus_dm_sum: 0.0,
            tr_smooth: 0.0,
            plus_dm_smooth: 0.0,
            minus_dm_smooth: 0.0,
            adx_smooth: 0.0,
            count: 0,
        }
    }

    fn next(&mut self, high: f64, low: f64, close: f64) -> Option<AdxValue> {
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close)) else {
            return None;
        };

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        let up_move = high - prev_high;
        let down_move = prev_low - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        self.count += 1;
        let n = self.period as f64;

        if self.count <= self.period {
            self.tr_sum += tr;
            self.plus_dm_sum += plus_dm;
            self.minus_dm_sum += minus_dm;
            if self.count < self.period {
                return None;
            }
            self.tr_smooth = self.tr_sum;
            self.plus_dm_smooth = self.plus_dm_sum;
            self.minus_dm_smooth = self.minus_dm_sum;
        } else {
            self.tr_smooth = self.tr_smooth - (self.tr_smooth / n) + tr;
            self.plus_dm_smooth = self.plus_dm_smooth - (self.plus_dm_smooth / n) + plus_dm;
            self.minus_dm_smooth = self.minus_dm_smooth - (self.minus_dm_smooth / n) + minus_dm;
        }

        let (plus_di, minus_di) = if self.tr_smooth > 0.0 {
            (
                100.0 * self.plus_dm_smooth / self.tr_smooth,
                100.0 * self.minus_dm_smooth / self.tr_smooth,
            )
        } else {
            (0.0, 0.0)
        };
        let sum_di = plus_di + minus_di;
        let dx = if sum_di > 0.0 {
            100.0 * (plus_di - minus_di).abs() / sum_di
        } else {
            0.0
        };

        if self.count == self.period {
            self.adx_smooth = dx;
        } else {
            self.adx_smooth = (self.adx_smooth * (n - 1.0) + dx) / n;
        }

        Some(AdxValue {
            adx: self.adx_smooth,
            plus_di,
            minus_di,
        })
    }
}

/// Average Directional Index with +DI / -DI. Requires `2 * period` candles.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<AdxValue> {
    let name = format!("adx_{}", period);
    require_period(&name, period)?;
    require(&name, close.len(), 2 * period)?;

    let mut state = WilderAdx::new(period);
    let mut last = None;
    for i in 0..close.len() {
        if let Some(v) = state.next(high[i], low[i], close[i]) {
            last = Some(v);
        }
    }
    last.ok_or_else(|| IndicatorError::insufficient(&name, 2 * period, close.len()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AroonValue {
    pub up: f64,
    pub down: f64,
}

/// Aroon up/down over the last `period + 1` bars.
///
/// Ties resolve to the most recent extreme.
pub fn aroon(high: &[f64], low: &[f64], period: usize) -> IndicatorResult<AroonValue> {
    let name = format!("aroon_{}", period);
    require_period(&name, period)?;
    require(&name, high.len(), period + 1)?;

    let start = high.len() - (period + 1);
    let window_high = &high[start..];
    let window_low = &low[start..];

    let mut high_idx = 0;
    let mut low_idx = 0;
    for i in 0..window_high.len() {
        if window_high[i] >= window_high[high_idx] {
            high_idx = i;
        }
        if window_low[i] <= window_low[low_idx] {
            low_idx = i;
        }
    }

    let since_high = period - high_idx;
    let since_low = period - low_idx;
    let p = period as f64;
    Ok(AroonValue {
        up: (p - since_high as f64) / p * 100.0,
        down: (p - since_low as f64) / p * 100.0,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Volatility
// ═══════════════════════════════════════════════════════════════════════════

/// Mean of the last `period` true ranges. Requires `period + 1` candles.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<f64> {
    let name = format!("atr_{}", period);
    require_period(&name, period)?;
    require(&name, close.len(), period + 1)?;

    let start = close.len() - period;
    let total: f64 = (start..close.len())
        .map(|i| {
            let prev_close = close[i - 1];
            (high[i] - low[i])
                .max((high[i] - prev_close).abs())
                .max((low[i] - prev_close).abs())
        })
        .sum();
    Ok(total / period as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// `(upper - lower) / middle * 100`
    pub width: f64,
}

/// Bollinger Bands around the SMA with a population standard deviation.
pub fn bollinger(closes: &[f64], period: usize, std_dev: f64) -> IndicatorResult<BollingerValue> {
    let name = format!("bollinger_{}", period);
    require_period(&name, period)?;
    if !(std_dev >= 0.0) {
        return Err(IndicatorError::InvalidParameter {
            indicator: name,
            reason: "std_dev multiplier must be >= 0".to_string(),
        });
    }
    require(&name, closes.len(), period)?;

    let middle = sma(closes, period)?;
    let window = &closes[closes.len() - period..];
    let sd = window.population_std_dev();
    let sd = if sd.is_finite() { sd.max(0.0) } else { 0.0 };

    let upper = middle + std_dev * sd;
    let lower = middle - std_dev * sd;
    let width = if middle != 0.0 {
        (upper - lower) / middle * 100.0
    } else {
        0.0
    };
    Ok(BollingerValue {
        upper,
        middle,
        lower,
        width,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Volume
// ═══════════════════════════════════════════════════════════════════════════

/// On-balance volume; the first bar contributes nothing.
pub fn obv(closes: &[f64], volumes: &[f64]) -> IndicatorResult<f64> {
    require("obv", closes.len(), 1)?;
    let mut total = 0.0;
    for i in 1..closes.len() {
        if closes[i] > closes[i - 1] {
            total += volumes[i];
        } else if closes[i] < closes[i - 1] {
            total -= volumes[i];
        }
    }
    Ok(total)
}

/// Volume-weighted average of the typical price over the whole series.
///
/// Falls back to the plain typical-price mean when no volume traded.
pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> IndicatorResult<f64> {
    require("vwap", close.len(), 1)?;
    let mut pv = 0.0;
    let mut vol = 0.0;
    let mut tp_sum = 0.0;
    for i in 0..close.len() {
        let tp = (high[i] + low[i] + close[i]) / 3.0;
        pv += tp * volume[i];
        vol += volume[i];
        tp_sum += tp;
    }
    if vol > 0.0 {
        Ok(pv / vol)
    } else {
        Ok(tp_sum / close.len() as f64)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Extended
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IchimokuValue {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
}

fn extremes(high: &[f64], low: &[f64]) -> (f64, f64) {
    let hh = high.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ll = low.iter().copied().fold(f64::INFINITY, f64::min);
    (hh, ll)
}

fn midpoint(high: &[f64], low: &[f64], period: usize) -> f64 {
    let (hh, ll) = extremes(&high[high.len() - period..], &low[low.len() - period..]);
    (hh + ll) / 2.0
}

/// Ichimoku lines at the last candle, without forward displacement.
pub fn ichimoku(
    high: &[f64],
    low: &[f64],
    tenkan_period: usize,
    kijun_period: usize,
    senkou_b_period: usize,
) -> IndicatorResult<IchimokuValue> {
    let name = format!(
        "ichimoku_{}_{}_{}",
        tenkan_period, kijun_period, senkou_b_period
    );
    require_period(&name, tenkan_period)?;
    require_period(&name, kijun_period)?;
    require_period(&name, senkou_b_period)?;
    let longest = tenkan_period.max(kijun_period).max(senkou_b_period);
    require(&name, high.len(), longest)?;

    let tenkan = midpoint(high, low, tenkan_period);
    let kijun = midpoint(high, low, kijun_period);
    Ok(IchimokuValue {
        tenkan,
        kijun,
        senkou_a: (tenkan + kijun) / 2.0,
        senkou_b: midpoint(high, low, senkou_b_period),
    })
}

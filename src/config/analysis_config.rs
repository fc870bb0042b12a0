//! Analysis policy configuration.
//!
//! Every window, threshold and weight the engine uses lives here. None of the
//! weights are derived; they are policy and can be tuned per deployment from a
//! TOML file and environment overrides.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub sma_short_period: usize,
    pub sma_medium_period: usize,
    pub sma_long_period: usize,
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub rsi_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub adx_period: usize,
    pub aroon_period: usize,
    pub atr_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub volume_sma_period: usize,
    pub ichimoku_tenkan_period: usize,
    pub ichimoku_kijun_period: usize,
    pub ichimoku_senkou_b_period: usize,
    pub williams_r_period: usize,
    pub cci_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_short_period: 20,
            sma_medium_period: 50,
            sma_long_period: 200,
            ema_fast_period: 12,
            ema_slow_period: 26,
            rsi_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            adx_period: 14,
            aroon_period: 25,
            atr_period: 14,
            bb_period: 20,
            bb_std_dev: 2.0,
            volume_sma_period: 20,
            ichimoku_tenkan_period: 9,
            ichimoku_kijun_period: 26,
            ichimoku_senkou_b_period: 52,
            williams_r_period: 14,
            cci_period: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendParams {
    /// Closes fed to the regression
    pub lookback: usize,
    /// Angles within +/- this many degrees are sideways
    pub sideways_angle_deg: f64,
    pub adx_threshold: f64,
    pub strong_threshold: f64,
    pub moderate_threshold: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            lookback: 20,
            sideways_angle_deg: 1.0,
            adx_threshold: 25.0,
            strong_threshold: 0.7,
            moderate_threshold: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelParams {
    /// Candles on each side a pivot must exceed
    pub pivot_window: usize,
    pub touch_tolerance_pct: f64,
    /// Distance from the series extreme that makes a level major
    pub major_extreme_pct: f64,
    pub merge_tolerance_pct: f64,
    pub max_levels: usize,
    pub max_critical_levels: usize,
    /// Candles of the reference timeframe used for pivots and Fibonacci
    pub pivot_lookback: usize,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            pivot_window: 2,
            touch_tolerance_pct: 0.5,
            major_extreme_pct: 2.0,
            merge_tolerance_pct: 1.0,
            max_levels: 10,
            max_critical_levels: 5,
            pivot_lookback: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    pub min_run: usize,
    pub doji_body_ratio: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            min_run: 3,
            doji_body_ratio: 0.3,
        }
    }
}

/// Signed contributions used by the timeframe signal fuser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub ema_confluence: f64,
    pub ema_divergence: f64,
    pub rsi_healthy: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_lower_bound: f64,
    pub rsi_upper_bound: f64,
    pub strong_uptrend: f64,
    pub strong_downtrend: f64,
    pub pattern_majority: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            ema_confluence: 0.2,
            ema_divergence: -0.1,
            rsi_healthy: 0.1,
            rsi_oversold: 0.15,
            rsi_overbought: -0.1,
            rsi_lower_bound: 30.0,
            rsi_upper_bound: 70.0,
            strong_uptrend: 0.3,
            strong_downtrend: -0.2,
            pattern_majority: 0.1,
            buy_threshold: 0.3,
            sell_threshold: -0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupWeights {
    pub alignment: f64,
    pub trend_strength: f64,
    pub confluence: f64,
    /// Confluence count that earns the full confluence weight
    pub confluence_cap: usize,
    pub risk_reward: f64,
    /// Risk/reward ratio that earns the full risk/reward weight
    pub risk_reward_cap: f64,
    pub win_probability_base: f64,
    pub win_probability_span: f64,
    pub win_probability_cap: f64,
    pub atr_stop_multiplier: f64,
    pub atr_target_multiplier: f64,
    /// Ratios below this are flagged as a risk factor
    pub min_risk_reward: f64,
}

impl Default for SetupWeights {
    fn default() -> Self {
        Self {
            alignment: 30.0,
            trend_strength: 25.0,
            confluence: 20.0,
            confluence_cap: 10,
            risk_reward: 25.0,
            risk_reward_cap: 3.0,
            win_probability_base: 0.30,
            win_probability_span: 0.55,
            win_probability_cap: 0.85,
            atr_stop_multiplier: 1.5,
            atr_target_multiplier: 3.0,
            min_risk_reward: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureParams {
    pub swing_window: usize,
    pub high_volatility_pct: f64,
    pub low_volatility_pct: f64,
    pub volume_surge_multiplier: f64,
}

impl Default for StructureParams {
    fn default() -> Self {
        Self {
            swing_window: 10,
            high_volatility_pct: 3.0,
            low_volatility_pct: 0.5,
            volume_surge_multiplier: 1.5,
        }
    }
}

/// Bounded exponential backoff for candle fetches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        std::time::Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub indicators: IndicatorParams,
    pub trend: TrendParams,
    pub levels: LevelParams,
    pub patterns: PatternParams,
    pub fusion: FusionWeights,
    pub setup: SetupWeights,
    pub structure: StructureParams,
    pub retry: RetryPolicy,
    pub fetch: FetchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchParams {
    /// Candles requested per timeframe
    pub limit: usize,
    /// Valid candles a timeframe needs before its pipeline runs
    pub min_candles: usize,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            limit: 250,
            min_candles: 20,
        }
    }
}

impl AnalysisConfig {
    /// Parses a TOML policy file; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig =
            toml::from_str(content).context("Failed to parse analysis config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Applies `MTF_*` overrides read through `lookup`.
    ///
    /// Production passes `std::env::var`; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_opt::<usize, _>(&lookup, "MTF_FETCH_LIMIT")? {
            self.fetch.limit = v;
        }
        if let Some(v) = parse_opt::<usize, _>(&lookup, "MTF_MIN_CANDLES")? {
            self.fetch.min_candles = v;
        }
        if let Some(v) = parse_opt::<usize, _>(&lookup, "MTF_TREND_LOOKBACK")? {
            self.trend.lookback = v;
        }
        if let Some(v) = parse_opt::<f64, _>(&lookup, "MTF_ADX_THRESHOLD")? {
            self.trend.adx_threshold = v;
        }
        if let Some(v) = parse_opt::<f64, _>(&lookup, "MTF_LEVEL_MERGE_TOLERANCE_PCT")? {
            self.levels.merge_tolerance_pct = v;
        }
        if let Some(v) = parse_opt::<u32, _>(&lookup, "MTF_RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = v;
        }
        if let Some(v) = parse_opt::<u64, _>(&lookup, "MTF_RETRY_BASE_DELAY_MS")? {
            self.retry.base_delay_ms = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        let periods = [
            ("sma_short_period", ind.sma_short_period),
            ("sma_medium_period", ind.sma_medium_period),
            ("sma_long_period", ind.sma_long_period),
            ("ema_fast_period", ind.ema_fast_period),
            ("ema_slow_period", ind.ema_slow_period),
            ("rsi_period", ind.rsi_period),
            ("stoch_k_period", ind.stoch_k_period),
            ("stoch_d_period", ind.stoch_d_period),
            ("macd_fast_period", ind.macd_fast_period),
            ("macd_slow_period", ind.macd_slow_period),
            ("macd_signal_period", ind.macd_signal_period),
            ("adx_period", ind.adx_period),
            ("aroon_period", ind.aroon_period),
            ("atr_period", ind.atr_period),
            ("bb_period", ind.bb_period),
            ("volume_sma_period", ind.volume_sma_period),
            ("williams_r_period", ind.williams_r_period),
            ("cci_period", ind.cci_period),
            ("trend.lookback", self.trend.lookback),
            ("patterns.min_run", self.patterns.min_run),
        ];
        for (name, value) in periods {
            if value == 0 {
                bail!("{} must be > 0", name);
            }
        }
        if ind.ema_fast_period >= ind.ema_slow_period {
            bail!(
                "ema_fast_period ({}) must be below ema_slow_period ({})",
                ind.ema_fast_period,
                ind.ema_slow_period
            );
        }
        if ind.macd_fast_period >= ind.macd_slow_period {
            bail!(
                "macd_fast_period ({}) must be below macd_slow_period ({})",
                ind.macd_fast_period,
                ind.macd_slow_period
            );
        }
        if self.trend.lookback < 2 {
            bail!("trend.lookback must be at least 2");
        }
        if self.fetch.min_candles < 2 {
            bail!("fetch.min_candles must be at least 2");
        }
        if self.fetch.limit < self.fetch.min_candles {
            bail!(
                "fetch.limit ({}) must be >= fetch.min_candles ({})",
                self.fetch.limit,
                self.fetch.min_candles
            );
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.setup.win_probability_cap) {
            bail!("setup.win_probability_cap must be within [0, 1]");
        }
        if self.fusion.sell_threshold >= self.fusion.buy_threshold {
            bail!("fusion.sell_threshold must be below fusion.buy_threshold");
        }
        Ok(())
    }
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .context(format!("Failed to parse {}", key)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.setup.alignment, 30.0);
        assert_eq!(config.setup.trend_strength, 25.0);
        assert_eq!(config.setup.confluence, 20.0);
        assert_eq!(config.setup.risk_reward, 25.0);
        assert_eq!(config.trend.lookback, 20);
        assert_eq!(config.levels.max_critical_levels, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [setup]
            alignment = 40.0

            [indicators]
            rsi_period = 21
            "#,
        )
        .unwrap();
        assert_eq!(config.setup.alignment, 40.0);
        assert_eq!(config.setup.trend_strength, 25.0);
        assert_eq!(config.indicators.rsi_period, 21);
        assert_eq!(config.indicators.macd_slow_period, 26);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = AnalysisConfig::from_toml_str(
            r#"
            [indicators]
            ema_fast_period = 30
            ema_slow_period = 26
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ema_fast_period"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MTF_FETCH_LIMIT", "500"),
            ("MTF_TREND_LOOKBACK", "30"),
            ("MTF_RETRY_MAX_ATTEMPTS", "5"),
        ]
        .into_iter()
        .collect();
        let mut config = AnalysisConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.fetch.limit, 500);
        assert_eq!(config.trend.lookback, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 200);
    }

    #[test]
    fn test_env_override_parse_error() {
        let mut config = AnalysisConfig::default();
        let err = config
            .apply_overrides(|k| (k == "MTF_FETCH_LIMIT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MTF_FETCH_LIMIT"));
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 200,
            max_delay_ms: 1_000,
        };
        assert_eq!(policy.delay_for(1).as_millis(), 200);
        assert_eq!(policy.delay_for(2).as_millis(), 400);
        assert_eq!(policy.delay_for(3).as_millis(), 800);
        assert_eq!(policy.delay_for(4).as_millis(), 1_000);
        assert_eq!(policy.delay_for(30).as_millis(), 1_000);
    }
}

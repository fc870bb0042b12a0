use crate::config::LevelParams;
use crate::domain::analysis::levels::{LevelKind, Significance, SupportResistanceLevel};
use crate::domain::analysis::report::{FibonacciLevel, PivotPoints};
use crate::domain::market::candle::SeriesColumns;

pub const FIBONACCI_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Finds support and resistance levels from local pivots.
pub struct LevelDetector {
    params: LevelParams,
}

impl LevelDetector {
    pub fn new(params: LevelParams) -> Self {
        Self { params }
    }

    /// Raw pivot levels merged and cut to the strongest `max_levels`
    pub fn detect(&self, cols: &SeriesColumns) -> Vec<SupportResistanceLevel> {
        let raw = self.pivots(cols);
        consolidate(raw, self.params.merge_tolerance_pct, self.params.max_levels)
    }

    /// Every strict pivot high and low, unmerged
    pub fn pivots(&self, cols: &SeriesColumns) -> Vec<SupportResistanceLevel> {
        let w = self.params.pivot_window.max(1);
        let len = cols.len();
        if len < 2 * w + 1 {
            return Vec::new();
        }

        let series_high = cols.high.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let series_low = cols.low.iter().copied().fold(f64::INFINITY, f64::min);

        let mut levels = Vec::new();
        for i in w..len - w {
            let is_pivot_high =
                (1..=w).all(|j| cols.high[i] > cols.high[i - j] && cols.high[i] > cols.high[i + j]);
            if is_pivot_high {
                levels.push(self.build_level(cols, i, LevelKind::Resistance, series_high));
            }
            let is_pivot_low =
                (1..=w).all(|j| cols.low[i] < cols.low[i - j] && cols.low[i] < cols.low[i + j]);
            if is_pivot_low {
                levels.push(self.build_level(cols, i, LevelKind::Support, series_low));
            }
        }
        levels
    }

    fn build_level(
        &self,
        cols: &SeriesColumns,
        pivot: usize,
        kind: LevelKind,
        extreme: f64,
    ) -> SupportResistanceLevel {
        let (price, side) = match kind {
            LevelKind::Resistance => (cols.high[pivot], &cols.high),
            LevelKind::Support => (cols.low[pivot], &cols.low),
        };
        let tolerance = self.params.touch_tolerance_pct / 100.0;

        let mut touch_count = 0;
        let mut last_tested = cols.timestamps[pivot];
        for k in pivot..cols.len() {
            if within(side[k], price, tolerance) {
                touch_count += 1;
                last_tested = cols.timestamps[k];
            }
        }

        let significance = if within(price, extreme, self.params.major_extreme_pct / 100.0) {
            Significance::Major
        } else {
            Significance::Minor
        };

        SupportResistanceLevel {
            price,
            strength: (2 * touch_count as i64 - 1).clamp(1, 10) as u8,
            touch_count,
            last_tested,
            kind,
            significance,
            confirmations: 1,
        }
    }
}

fn within(value: f64, reference: f64, tolerance: f64) -> bool {
    if reference == 0.0 {
        return value == 0.0;
    }
    ((value - reference) / reference).abs() <= tolerance
}

/// Merge neighbouring levels and keep the `max` strongest.
///
/// Levels within `tolerance_pct` of the running group price are merged: price
/// averaged over members, touches and confirmations summed, strength bumped
/// one above the strongest member. Levels confirmed at least three times, or
/// major with strength 9 or more, are promoted to critical. The result is
/// sorted by price.
pub fn consolidate(
    mut levels: Vec<SupportResistanceLevel>,
    tolerance_pct: f64,
    max: usize,
) -> Vec<SupportResistanceLevel> {
    levels.sort_by(|a, b| a.price.total_cmp(&b.price));
    let tolerance = tolerance_pct / 100.0;

    let mut groups: Vec<Vec<SupportResistanceLevel>> = Vec::new();
    for level in levels {
        match groups.last_mut() {
            Some(group) if within(level.price, group_price(group), tolerance) => group.push(level),
            _ => groups.push(vec![level]),
        }
    }

    let mut merged: Vec<SupportResistanceLevel> =
        groups.into_iter().filter_map(merge_group).collect();
    for level in &mut merged {
        if level.confirmations >= 3
            || (level.strength >= 9 && level.significance >= Significance::Major)
        {
            level.significance = Significance::Critical;
        }
    }

    merged.sort_by(|a, b| {
        b.strength
            .cmp(&a.strength)
            .then(b.touch_count.cmp(&a.touch_count))
            .then(a.price.total_cmp(&b.price))
    });
    merged.truncate(max);
    merged.sort_by(|a, b| a.price.total_cmp(&b.price));
    merged
}

fn group_price(group: &[SupportResistanceLevel]) -> f64 {
    group.iter().map(|l| l.price).sum::<f64>() / group.len() as f64
}

fn merge_group(group: Vec<SupportResistanceLevel>) -> Option<SupportResistanceLevel> {
    let price = group_price(&group);
    let mut iter = group.into_iter();
    let mut merged = iter.next()?;
    let mut members = 1;
    for level in iter {
        members += 1;
        if level.strength > merged.strength {
            merged.kind = level.kind;
            merged.strength = level.strength;
        }
        merged.touch_count += level.touch_count;
        merged.confirmations += level.confirmations;
        merged.last_tested = merged.last_tested.max(level.last_tested);
        merged.significance = merged.significance.max(level.significance);
    }
    merged.price = price;
    if members > 1 {
        merged.strength = (merged.strength + 1).min(10);
    }
    Some(merged)
}

/// Classic floor pivots from the high, low and last close of the trailing window
pub fn pivot_points(cols: &SeriesColumns, lookback: usize) -> Option<PivotPoints> {
    let (high, low) = cols.recent_range(lookback)?;
    let close = *cols.close.last()?;

    let pivot = (high + low + close) / 3.0;
    let range = high - low;
    Some(PivotPoints {
        pivot,
        r1: 2.0 * pivot - low,
        r2: pivot + range,
        r3: high + 2.0 * (pivot - low),
        s1: 2.0 * pivot - high,
        s2: pivot - range,
        s3: low - 2.0 * (high - pivot),
    })
}

/// Retracements measured down from the trailing window's high
pub fn fibonacci_levels(cols: &SeriesColumns, lookback: usize) -> Vec<FibonacciLevel> {
    let Some((high, low)) = cols.recent_range(lookback) else {
        return Vec::new();
    };
    FIBONACCI_RATIOS
        .iter()
        .map(|&ratio| FibonacciLevel {
            ratio,
            price: high - ratio * (high - low),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(highs: &[f64], lows: &[f64]) -> SeriesColumns {
        let mut cols = SeriesColumns::default();
        for (i, (&h, &l)) in highs.iter().zip(lows).enumerate() {
            let c = (h + l) / 2.0;
            cols.timestamps.push(i as i64 * 60_000);
            cols.open.push(c);
            cols.high.push(h);
            cols.low.push(l);
            cols.close.push(c);
            cols.volume.push(100.0);
        }
        cols
    }

    fn level(price: f64, strength: u8, kind: LevelKind) -> SupportResistanceLevel {
        SupportResistanceLevel {
            price,
            strength,
            touch_count: 1,
            last_tested: 0,
            kind,
            significance: Significance::Minor,
            confirmations: 1,
        }
    }

    #[test]
    fn test_detects_strict_pivots_with_touches() {
        // Peak at index 2 revisited at index 7
        let highs = [100.0, 101.0, 105.0, 101.0, 100.0, 102.0, 103.0, 105.2, 103.0, 102.0];
        let lows = [99.0, 99.5, 104.0, 95.0, 99.0, 101.0, 102.0, 104.0, 102.0, 101.0];
        let detector = LevelDetector::new(LevelParams::default());
        let raw = detector.pivots(&columns(&highs, &lows));

        let first = raw
            .iter()
            .find(|l| l.kind == LevelKind::Resistance && l.price == 105.0)
            .unwrap();
        assert_eq!(first.touch_count, 2);
        assert_eq!(first.strength, 3);
        assert_eq!(first.last_tested, 7 * 60_000);
        assert_eq!(first.significance, Significance::Major);

        let support = raw
            .iter()
            .find(|l| l.kind == LevelKind::Support)
            .unwrap();
        assert_eq!(support.price, 95.0);
        assert_eq!(support.significance, Significance::Major);
    }

    #[test]
    fn test_flat_series_has_no_pivots() {
        let flat = [100.0; 20];
        let detector = LevelDetector::new(LevelParams::default());
        assert!(detector.detect(&columns(&flat, &flat)).is_empty());
    }

    #[test]
    fn test_consolidate_merges_neighbours() {
        let levels = vec![
            level(100.0, 3, LevelKind::Support),
            level(100.5, 5, LevelKind::Resistance),
            level(110.0, 1, LevelKind::Resistance),
        ];
        let merged = consolidate(levels, 1.0, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].price, 100.25);
        assert_eq!(merged[0].strength, 6);
        assert_eq!(merged[0].touch_count, 2);
        assert_eq!(merged[0].confirmations, 2);
        assert_eq!(merged[0].kind, LevelKind::Resistance);
        assert_eq!(merged[1].price, 110.0);
    }

    #[test]
    fn test_consolidate_promotes_critical_and_caps() {
        let levels = vec![
            level(50.0, 2, LevelKind::Support),
            level(50.1, 2, LevelKind::Support),
            level(50.2, 2, LevelKind::Support),
            level(60.0, 9, LevelKind::Resistance),
            level(70.0, 1, LevelKind::Resistance),
            level(80.0, 2, LevelKind::Resistance),
        ];
        let merged = consolidate(levels, 1.0, 2);
        assert_eq!(merged.len(), 2);
        // 60 (strength 9) and the merged 50.1 group (strength 3)
        assert_eq!(merged[0].significance, Significance::Critical);
        assert_eq!(merged[0].confirmations, 3);
        assert_eq!(merged[1].price, 60.0);
        // strength 9 but minor stays minor
        assert_eq!(merged[1].significance, Significance::Minor);
        assert!(merged.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn test_pivot_points_and_fibonacci() {
        let cols = columns(&[110.0, 120.0], &[100.0, 90.0]);
        let pivots = pivot_points(&cols, 20).unwrap();
        // H 120, L 90, C 105
        assert_eq!(pivots.pivot, 105.0);
        assert_eq!(pivots.r1, 120.0);
        assert_eq!(pivots.s1, 90.0);
        assert_eq!(pivots.r2, 135.0);
        assert_eq!(pivots.s2, 75.0);
        assert!(pivots.levels().windows(2).all(|w| w[0] <= w[1]));

        let fib = fibonacci_levels(&cols, 20);
        assert_eq!(fib.len(), 7);
        assert_eq!(fib[0].price, 120.0);
        assert_eq!(fib[3].price, 105.0);
        assert_eq!(fib[6].price, 90.0);
    }
}

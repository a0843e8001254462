//! Technical indicators computed over a plain price sequence.
//!
//! Every function here is pure and takes the sequence by slice. When a
//! historical snapshot is built the caller must pass a prefix of the full
//! series (`prices[0..=i]`) so that no value ever depends on future prices.

use crate::domain::types::IndicatorSnapshot;

pub const RSI_PERIOD: usize = 14;
pub const MA_FAST: usize = 20;
pub const MA_SLOW: usize = 50;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Relative Strength Index over the trailing `period` steps.
///
/// Returns the neutral `50.0` when the series is too short, and `100.0`
/// when there are no losses in the window.
pub fn rsi(series: &[f64], period: usize) -> f64 {
    if series.len() < period + 1 {
        return 50.0;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in series.len() - period..series.len() {
        let change = series[i] - series[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    round2(100.0 - 100.0 / (1.0 + rs))
}

/// Simple moving average of the last `period` values; `0.0` signals
/// "not enough data" rather than an error.
pub fn moving_average(series: &[f64], period: usize) -> f64 {
    if period == 0 || series.len() < period {
        return 0.0;
    }
    let sum: f64 = series[series.len() - period..].iter().sum();
    round2(sum / period as f64)
}

/// Exponential moving average seeded with the first element.
pub fn ema(series: &[f64], period: usize) -> f64 {
    let Some(&first) = series.first() else {
        return 0.0;
    };
    let k = 2.0 / (period as f64 + 1.0);
    series[1..]
        .iter()
        .fold(first, |acc, &value| value * k + acc * (1.0 - k))
}

/// MACD line: EMA(12) minus EMA(26); `0.0` when the series is shorter
/// than the slow period.
pub fn macd(series: &[f64]) -> f64 {
    if series.len() < MACD_SLOW {
        return 0.0;
    }
    round2(ema(series, MACD_FAST) - ema(series, MACD_SLOW))
}

/// Indicator values for the full series (the live snapshot).
pub fn snapshot(series: &[f64]) -> IndicatorSnapshot {
    IndicatorSnapshot {
        rsi: rsi(series, RSI_PERIOD),
        ma20: moving_average(series, MA_FAST),
        ma50: moving_average(series, MA_SLOW),
        macd: macd(series),
    }
}

/// Replay the indicators over every prefix of the series, producing one
/// causal snapshot per index. `out[i]` depends on `series[0..=i]` only.
pub fn snapshot_series(series: &[f64]) -> Vec<IndicatorSnapshot> {
    (0..series.len())
        .map(|i| snapshot(&series[..=i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_defaults_to_neutral_on_short_series() {
        let series: Vec<f64> = (0..RSI_PERIOD).map(|i| i as f64).collect();
        assert_eq!(rsi(&series, RSI_PERIOD), 50.0);
    }

    #[test]
    fn rsi_is_100_without_losses() {
        let series: Vec<f64> = (0..=RSI_PERIOD).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&series, RSI_PERIOD), 100.0);
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let series = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28, 46.00,
        ];
        let value = rsi(&series, RSI_PERIOD);
        assert!((0.0..=100.0).contains(&value), "rsi out of range: {}", value);
    }

    #[test]
    fn rsi_balanced_moves_is_50() {
        // Alternating +1/-1 deltas: equal average gain and loss.
        let mut series = vec![100.0];
        for i in 0..RSI_PERIOD {
            let last = *series.last().unwrap();
            series.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        assert_eq!(rsi(&series, RSI_PERIOD), 50.0);
    }

    #[test]
    fn moving_average_sentinel_and_value() {
        assert_eq!(moving_average(&[1.0, 2.0], 3), 0.0);
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), 3.5);
    }

    #[test]
    fn ema_with_period_one_tracks_last_value() {
        // k = 1 collapses the recursion onto the newest value.
        assert_eq!(ema(&[3.0, 7.0, 2.0], 1), 2.0);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let series = vec![42.0; 30];
        assert!((ema(&series, 12) - 42.0).abs() < 1e-12);
    }

    #[test]
    fn macd_sentinel_below_slow_period() {
        let series: Vec<f64> = (0..25).map(|i| i as f64).collect();
        assert_eq!(macd(&series), 0.0);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let series: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert!(macd(&series) > 0.0);
    }

    #[test]
    fn snapshot_series_is_causal() {
        let mut series: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64).sin()).collect();
        let snapshots = snapshot_series(&series);
        assert_eq!(snapshots.len(), series.len());

        // Perturbing the future must not change an earlier snapshot.
        let frozen = snapshots[30];
        for value in series.iter_mut().skip(31) {
            *value += 500.0;
        }
        let recomputed = snapshot_series(&series);
        assert_eq!(recomputed[30], frozen);
    }
}

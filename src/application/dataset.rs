//! Supervised feature/label construction from the price history.
//!
//! Window prices are normalized relative to the window's own last element
//! (`v / last - 1`). This is the single canonical normalization for both
//! training and live inference; a model trained under one scheme silently
//! misreads features from another, so no alternative is supported.

use crate::domain::types::IndicatorSnapshot;

/// Parallel feature/label arrays. `x[i]` and `y[i]` describe the same
/// window; labels are 1.0 when the next price is strictly higher.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Feature vector width: window + 1 normalized prices plus 4 indicator
    /// features.
    pub fn input_dim(window: usize) -> usize {
        window + 5
    }
}

fn normalize_window(window: &[f64]) -> Vec<f64> {
    let last = window[window.len() - 1];
    window.iter().map(|v| v / last - 1.0).collect()
}

fn indicator_features(snapshot: &IndicatorSnapshot, price: f64) -> [f64; 4] {
    // MA sentinels (0.0 = not enough data) degrade to a ratio of 1, i.e.
    // "price sits exactly on its average".
    let ma_ratio = |ma: f64| if ma > 0.0 { ma / price } else { 1.0 };
    [
        snapshot.rsi / 100.0,
        ma_ratio(snapshot.ma20),
        ma_ratio(snapshot.ma50),
        snapshot.macd,
    ]
}

/// Build the supervised dataset from the price sequence and its causal,
/// index-aligned indicator snapshots.
///
/// Returns `None` when the history cannot produce a single row
/// (`prices.len() < window + 2`); this is an expected outcome, not a fault.
pub fn build(
    prices: &[f64],
    snapshots: &[IndicatorSnapshot],
    window: usize,
) -> Option<Dataset> {
    let n = prices.len();
    if n < window + 2 || snapshots.len() != n {
        return None;
    }

    let rows = n - window - 1;
    let mut x = Vec::with_capacity(rows);
    let mut y = Vec::with_capacity(rows);

    for i in window..n - 1 {
        let mut features = normalize_window(&prices[i - window..=i]);
        features.extend(indicator_features(&snapshots[i], prices[i]));
        x.push(features);
        y.push(if prices[i + 1] > prices[i] { 1.0 } else { 0.0 });
    }

    Some(Dataset { x, y })
}

/// Build the single live feature vector from the most recent `window + 1`
/// prices and the current indicator snapshot. Same formula as [`build`],
/// without a label.
pub fn live_features(
    prices: &[f64],
    snapshot: &IndicatorSnapshot,
    window: usize,
) -> Option<Vec<f64>> {
    let n = prices.len();
    if n < window + 1 {
        return None;
    }
    let mut features = normalize_window(&prices[n - window - 1..]);
    features.extend(indicator_features(snapshot, prices[n - 1]));
    Some(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indicators;

    fn snapshots_for(prices: &[f64]) -> Vec<IndicatorSnapshot> {
        indicators::snapshot_series(prices)
    }

    #[test]
    fn too_short_history_yields_none() {
        let window = 24;
        for n in 0..window + 2 {
            let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
            let snapshots = snapshots_for(&prices);
            assert!(build(&prices, &snapshots, window).is_none(), "n = {}", n);
        }
    }

    #[test]
    fn row_count_matches_history_length() {
        let window = 24;
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let snapshots = snapshots_for(&prices);
        let ds = build(&prices, &snapshots, window).unwrap();
        assert_eq!(ds.x.len(), ds.y.len());
        assert_eq!(ds.len(), prices.len() - window - 1);
        for row in &ds.x {
            assert_eq!(row.len(), Dataset::input_dim(window));
        }
    }

    #[test]
    fn two_point_window_scenario() {
        let window = 2;
        let prices = [10.0, 12.0, 11.0, 13.0, 14.0];
        let snapshots = snapshots_for(&prices);
        let ds = build(&prices, &snapshots, window).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.y, vec![1.0, 1.0]);

        // i = 2: window [10, 12, 11], last = 11.
        assert!((ds.x[0][0] - (10.0 / 11.0 - 1.0)).abs() < 1e-12);
        assert!((ds.x[0][1] - (12.0 / 11.0 - 1.0)).abs() < 1e-12);
        assert_eq!(ds.x[0][2], 0.0);

        // i = 3: window [12, 11, 13], last = 13.
        assert!((ds.x[1][0] - (12.0 / 13.0 - 1.0)).abs() < 1e-12);
        assert!((ds.x[1][1] - (11.0 / 13.0 - 1.0)).abs() < 1e-12);
        assert_eq!(ds.x[1][2], 0.0);
    }

    #[test]
    fn last_window_feature_is_exactly_zero() {
        let window = 24;
        let prices: Vec<f64> = (0..80).map(|i| 145.0 + (i as f64 * 1.3).cos() * 4.0).collect();
        let snapshots = snapshots_for(&prices);
        let ds = build(&prices, &snapshots, window).unwrap();
        for row in &ds.x {
            assert_eq!(row[window], 0.0);
        }
    }

    #[test]
    fn flat_price_labels_are_zero() {
        // Ties must not label as "up".
        let window = 2;
        let prices = [10.0, 10.0, 10.0, 10.0, 10.0];
        let snapshots = snapshots_for(&prices);
        let ds = build(&prices, &snapshots, window).unwrap();
        assert!(ds.y.iter().all(|&label| label == 0.0));
    }

    #[test]
    fn short_history_ma_features_fall_back_to_one() {
        // With only a handful of points both MAs are sentinels.
        let window = 2;
        let prices = [10.0, 12.0, 11.0, 13.0, 14.0];
        let snapshots = snapshots_for(&prices);
        let ds = build(&prices, &snapshots, window).unwrap();
        let row = &ds.x[0];
        assert_eq!(row[window + 2], 1.0); // ma20 ratio
        assert_eq!(row[window + 3], 1.0); // ma50 ratio
    }

    #[test]
    fn live_features_match_training_formula() {
        let window = 4;
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let snapshots = snapshots_for(&prices);
        let current = snapshots[prices.len() - 1];
        let features = live_features(&prices, &current, window).unwrap();
        assert_eq!(features.len(), Dataset::input_dim(window));
        assert_eq!(features[window], 0.0);
        assert!((features[window + 1] - current.rsi / 100.0).abs() < 1e-12);
    }

    #[test]
    fn live_features_need_a_full_window() {
        let snapshot = IndicatorSnapshot {
            rsi: 50.0,
            ma20: 0.0,
            ma50: 0.0,
            macd: 0.0,
        };
        assert!(live_features(&[1.0, 2.0], &snapshot, 4).is_none());
    }
}

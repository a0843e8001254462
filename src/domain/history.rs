use crate::domain::types::PricePoint;
use std::collections::VecDeque;

const MS_PER_HOUR: i64 = 3_600_000;

/// Rolling, hourly-deduplicated price buffer.
///
/// A point landing in the same hour bucket as the newest entry replaces it
/// (live ticks refine the current candle); a point in a new hour appends and
/// evicts the oldest entry once the buffer is at capacity.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    points: VecDeque<PricePoint>,
    capacity: usize,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the whole buffer with a backfilled history, keeping only the
    /// most recent `capacity` points.
    pub fn replace_all(&mut self, mut points: Vec<PricePoint>) {
        if points.len() > self.capacity {
            points.drain(..points.len() - self.capacity);
        }
        self.points = points.into();
    }

    pub fn push(&mut self, point: PricePoint) {
        if let Some(last) = self.points.back_mut() {
            if last.timestamp / MS_PER_HOUR == point.timestamp / MS_PER_HOUR {
                *last = point;
                return;
            }
        }
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// The price sequence in chronological order.
    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(hour: i64, price: f64) -> PricePoint {
        PricePoint {
            timestamp: hour * MS_PER_HOUR + 1_000,
            price,
        }
    }

    #[test]
    fn appends_across_hours() {
        let mut history = PriceHistory::new(10);
        history.push(point(0, 100.0));
        history.push(point(1, 101.0));
        history.push(point(2, 102.0));
        assert_eq!(history.len(), 3);
        assert_eq!(history.prices(), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn same_hour_tick_replaces_last_point() {
        let mut history = PriceHistory::new(10);
        history.push(point(0, 100.0));
        history.push(PricePoint {
            timestamp: MS_PER_HOUR / 2,
            price: 105.0,
        });
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().price, 105.0);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut history = PriceHistory::new(3);
        for h in 0..5 {
            history.push(point(h, 100.0 + h as f64));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.prices(), vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn replace_all_truncates_to_capacity() {
        let mut history = PriceHistory::new(3);
        history.replace_all((0..5).map(|h| point(h, h as f64)).collect());
        assert_eq!(history.prices(), vec![2.0, 3.0, 4.0]);
    }
}

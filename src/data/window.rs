use crate::models::Bar;
use std::collections::VecDeque;

/// Bounded in-memory window of bars for one (symbol, duration) series
///
/// Owned by a single strategy runner. Bars are kept in time order and the
/// oldest bar is evicted once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl RollingWindow {
    /// Create an empty window
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of bars to keep
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Build a window from historical bars, keeping the newest `capacity`
    pub fn from_bars(bars: Vec<Bar>, capacity: usize) -> Self {
        let mut window = Self::new(capacity);
        for bar in bars {
            window.push(bar);
        }
        window
    }

    /// Append a bar, evicting from the front while over capacity
    ///
    /// Returns the number of bars evicted.
    pub fn push(&mut self, bar: Bar) -> usize {
        self.bars.push_back(bar);

        let mut evicted = 0;
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Replace the newest bar (used when the source revises an open bar)
    pub fn replace_last(&mut self, bar: Bar) {
        match self.bars.back_mut() {
            Some(last) => *last = bar,
            None => {
                self.push(bar);
            }
        }
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Copy of the bars, oldest first
    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().cloned().collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_bar(i: i64, price: f64) -> Bar {
        let open_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i);
        Bar {
            open_time,
            close_time: open_time + Duration::hours(1),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Some(1000.0),
        }
    }

    #[test]
    fn test_new_window() {
        let window = RollingWindow::new(100);
        assert!(window.is_empty());
        assert!(window.last().is_none());
    }

    #[test]
    fn test_push_keeps_order() {
        let mut window = RollingWindow::new(10);
        window.push(create_test_bar(0, 100.0));
        window.push(create_test_bar(1, 101.0));
        window.push(create_test_bar(2, 102.0));

        assert_eq!(window.closes(), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut window = RollingWindow::new(5);

        for i in 0..10 {
            window.push(create_test_bar(i, 100.0 + i as f64));
            assert!(window.len() <= 5);
        }

        // Should have prices 105-109
        assert_eq!(window.closes(), vec![105.0, 106.0, 107.0, 108.0, 109.0]);
    }

    #[test]
    fn test_push_reports_eviction() {
        let mut window = RollingWindow::new(2);
        assert_eq!(window.push(create_test_bar(0, 1.0)), 0);
        assert_eq!(window.push(create_test_bar(1, 2.0)), 0);
        assert_eq!(window.push(create_test_bar(2, 3.0)), 1);
    }

    #[test]
    fn test_from_bars_keeps_newest() {
        let bars: Vec<Bar> = (0..8).map(|i| create_test_bar(i, i as f64)).collect();
        let window = RollingWindow::from_bars(bars, 3);

        assert_eq!(window.closes(), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_replace_last() {
        let mut window = RollingWindow::new(5);
        window.push(create_test_bar(0, 100.0));
        window.push(create_test_bar(1, 101.0));

        window.replace_last(create_test_bar(1, 99.0));

        assert_eq!(window.len(), 2);
        assert_eq!(window.last().unwrap().close, 99.0);
    }
}

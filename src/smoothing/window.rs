use std::collections::VecDeque;

/// Fixed-capacity window of the most recent readings for one anchor
///
/// Newest value sits at the head; pushing onto a full window evicts the
/// oldest. The mean is taken over however many values are held, so it is
/// usable (if noisy) before the window fills.
#[derive(Debug, Clone)]
pub struct AnchorWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl AnchorWindow {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert `value` as the newest entry and return the updated mean
    pub fn push(&mut self, value: f64) -> f64 {
        if self.values.len() == self.capacity {
            self.values.pop_back();
        }
        self.values.push_front(value);
        self.mean().unwrap_or(value)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }

    /// Most recent value
    pub fn latest(&self) -> Option<f64> {
        self.values.front().copied()
    }

    /// Held values, newest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_before_full() {
        let mut w = AnchorWindow::new(10);
        assert!(w.mean().is_none());
        assert_relative_eq!(w.push(-70.0), -70.0);
        assert_relative_eq!(w.push(-72.0), -71.0);
        assert_relative_eq!(w.push(-77.0), -73.0);
        assert!(!w.is_full());
    }

    #[test]
    fn test_evicts_oldest() {
        let mut w = AnchorWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        assert!(w.is_full());
        assert_relative_eq!(w.push(4.0), 3.0); // (2+3+4)/3
        assert_relative_eq!(w.push(5.0), 4.0); // (3+4+5)/3
        assert_eq!(w.values().collect::<Vec<_>>(), vec![5.0, 4.0, 3.0]);
        assert_eq!(w.latest(), Some(5.0));
    }

    #[test]
    fn test_single_slot_tracks_latest() {
        let mut w = AnchorWindow::new(1);
        assert_relative_eq!(w.push(-60.0), -60.0);
        assert_relative_eq!(w.push(-80.0), -80.0);
        assert_eq!(w.len(), 1);
    }
}

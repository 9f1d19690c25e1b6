mod window;

pub use window::AnchorWindow;

use crate::constants::ANCHOR_COUNT;
use crate::telemetry::AnchorId;

/// Per-anchor sliding-window mean of RSSI readings
///
/// Owned by the producer; one window per anchor lives for the whole run.
pub struct SmoothingFilter {
    windows: [AnchorWindow; ANCHOR_COUNT],
}

impl SmoothingFilter {
    pub fn new(window_size: usize) -> Self {
        Self {
            windows: std::array::from_fn(|_| AnchorWindow::new(window_size)),
        }
    }

    /// Add a reading for `anchor` and return that anchor's new mean
    pub fn push(&mut self, anchor: AnchorId, value: f64) -> f64 {
        self.windows[anchor.index()].push(value)
    }

    pub fn mean(&self, anchor: AnchorId) -> Option<f64> {
        self.windows[anchor.index()].mean()
    }

    /// Means for all anchors, once each has at least one reading
    pub fn means(&self) -> Option<[f64; ANCHOR_COUNT]> {
        let [a, b, c] = &self.windows;
        Some([a.mean()?, b.mean()?, c.mean()?])
    }

    pub fn window(&self, anchor: AnchorId) -> &AnchorWindow {
        &self.windows[anchor.index()]
    }

    /// Every anchor window is at capacity
    pub fn is_converged(&self) -> bool {
        self.windows.iter().all(AnchorWindow::is_full)
    }

    pub fn reset(&mut self) {
        self.windows.iter_mut().for_each(AnchorWindow::clear);
    }
}

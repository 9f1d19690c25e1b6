//! Synthetic anchors for exercising the full pipeline without hardware.

mod anchor;
mod target;

pub use anchor::{SimulatedAnchor, SimulationConfig, simulated_anchors};
pub use target::TargetPath;

/// RSSI an ideal anchor would report at `distance` under the log-distance
/// model (inverse of [`crate::ranging::estimate_distance`])
pub fn ideal_rssi(distance: f64, p0: f64, n: f64) -> f64 {
    p0 - 10.0 * n * distance.max(f64::MIN_POSITIVE).log10()
}

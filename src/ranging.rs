use crate::config::{PathLossConfig, RangingMode};

/// Log-distance path-loss inversion
///
/// `distance = 10 ^ ((p0 - rssi) / (10 n))`, where `p0` is the received power
/// at one reference unit and `n` the path-loss exponent. Positive for every
/// finite input; a stronger signal (higher RSSI) gives a shorter distance.
pub fn estimate_distance(mean_rssi: f64, p0: f64, n: f64) -> f64 {
    10.0_f64.powf((p0 - mean_rssi) / (10.0 * n))
}

/// Converts smoothed telemetry values into ranges
#[derive(Debug, Clone, Copy)]
pub struct PathLossModel {
    mode: RangingMode,
    reference_power_dbm: f64,
    exponent: f64,
}

impl PathLossModel {
    pub fn new(config: &PathLossConfig) -> Self {
        Self {
            mode: config.mode,
            reference_power_dbm: config.reference_power_dbm,
            exponent: config.exponent,
        }
    }

    pub fn distance(&self, value: f64) -> f64 {
        match self.mode {
            RangingMode::PathLoss => {
                estimate_distance(value, self.reference_power_dbm, self.exponent)
            }
            // Firmware already reports a range; only guard the sign
            RangingMode::Direct => value.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_power_is_unit_distance() {
        for n in [1.6, 2.0, 3.5, -2.0] {
            assert_relative_eq!(estimate_distance(-76.0, -76.0, n), 1.0);
        }
    }

    #[test]
    fn test_monotonically_decreasing_in_rssi() {
        let mut last = f64::INFINITY;
        for rssi in (-100..=-40).map(f64::from) {
            let d = estimate_distance(rssi, -76.0, 2.0);
            assert!(d > 0.0);
            assert!(d < last, "distance at {} dBm did not shrink", rssi);
            last = d;
        }
    }

    #[test]
    fn test_twenty_db_per_decade_in_free_space() {
        assert_relative_eq!(estimate_distance(-96.0, -76.0, 2.0), 10.0, epsilon = 1e-12);
        assert_relative_eq!(estimate_distance(-56.0, -76.0, 2.0), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_direct_mode_passes_through() {
        let model = PathLossModel::new(&PathLossConfig {
            mode: RangingMode::Direct,
            ..PathLossConfig::default()
        });
        assert_eq!(model.distance(2.25), 2.25);
        assert_eq!(model.distance(-0.5), 0.0);
    }
}

use std::f64::consts::PI;

use serde::Deserialize;

use crate::trilateration::Point2;

/// Where the simulated transmitter is when the `n`th line is emitted
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetPath {
    Fixed { at: Point2 },
    Orbit {
        center: Point2,
        radius: f64,
        lines_per_orbit: u64,
    },
}

impl TargetPath {
    pub fn position(&self, line: u64) -> Point2 {
        match *self {
            TargetPath::Fixed { at } => at,
            TargetPath::Orbit {
                center,
                radius,
                lines_per_orbit,
            } => {
                let phase = 2.0 * PI * (line % lines_per_orbit.max(1)) as f64
                    / lines_per_orbit.max(1) as f64;
                Point2::new(
                    center.x + radius * phase.cos(),
                    center.y + radius * phase.sin(),
                )
            }
        }
    }
}

impl Default for TargetPath {
    fn default() -> Self {
        TargetPath::Fixed {
            at: Point2::new(1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orbit_wraps() {
        let path = TargetPath::Orbit {
            center: Point2::new(1.5, 1.5),
            radius: 1.0,
            lines_per_orbit: 4,
        };
        let p0 = path.position(0);
        let p1 = path.position(1);
        let p4 = path.position(4);
        assert_relative_eq!(p0.x, 2.5);
        assert_relative_eq!(p1.y, 2.5);
        assert_relative_eq!(p4.x, p0.x);
        assert_relative_eq!(p4.y, p0.y);
    }
}

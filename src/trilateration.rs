//! Closed-form 2-D trilateration from three anchor distances.
//!
//! Subtracting the first circle equation from the second, and the second from
//! the third, removes the quadratic terms and leaves a 2x2 linear system:
//!
//! ```text
//! A x + B y = C        A = 2(x2 - x1)   B = 2(y2 - y1)
//! D x + E y = F        D = 2(x3 - x2)   E = 2(y3 - y2)
//!
//! C = d1² - d2² - x1² + x2² - y1² + y2²
//! F = d2² - d3² - x2² + x3² - y2² + y3²
//! ```
//!
//! which is solved with Cramer's rule. The shared determinant `E*A - B*D`
//! only depends on the anchor layout, so a singular system always means the
//! anchors are collinear.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::SINGULAR_DETERMINANT_EPSILON;
use crate::error::LocatorError;

/// A point in the anchor plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Parses `"x,y"` (whitespace around either number is ignored)
///
/// # Example
/// ```
/// use rssitrack::trilateration::Point2;
///
/// let p: Point2 = "3, 0.5".parse().unwrap();
/// assert_eq!(p, Point2::new(3.0, 0.5));
/// ```
impl FromStr for Point2 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected \"x,y\", got {:?}", s))?;
        let x: f64 = x
            .trim()
            .parse()
            .map_err(|_| format!("invalid x coordinate: {}", s))?;
        let y: f64 = y
            .trim()
            .parse()
            .map_err(|_| format!("invalid y coordinate: {}", s))?;
        let p = Point2::new(x, y);
        if !p.is_finite() {
            return Err(format!("coordinates must be finite: {}", s));
        }
        Ok(p)
    }
}

/// The solve failed because the anchor layout has no unique intersection
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("singular trilateration system (determinant {determinant:.3e})")]
pub struct Singular {
    pub determinant: f64,
}

/// Fixed coordinates of the three anchors, in anchor order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorGeometry {
    pub positions: [Point2; 3],
}

impl AnchorGeometry {
    pub fn new(positions: [Point2; 3]) -> Self {
        Self { positions }
    }

    /// Shared Cramer denominator `E*A - B*D` for this layout
    pub fn determinant(&self) -> f64 {
        let [p1, p2, p3] = self.positions;
        let a = -2.0 * p1.x + 2.0 * p2.x;
        let b = -2.0 * p1.y + 2.0 * p2.y;
        let d = -2.0 * p2.x + 2.0 * p3.x;
        let e = -2.0 * p2.y + 2.0 * p3.y;
        e * a - b * d
    }

    /// Reject layouts the solver can never handle
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(LocatorError::Config(
                "anchor coordinates must be finite".to_string(),
            ));
        }
        let determinant = self.determinant();
        if determinant.abs() < SINGULAR_DETERMINANT_EPSILON {
            return Err(LocatorError::CollinearAnchors { determinant });
        }
        Ok(())
    }

    pub fn solve(&self, distances: [f64; 3]) -> Result<Point2, Singular> {
        solve(distances, &self.positions)
    }
}

impl Default for AnchorGeometry {
    fn default() -> Self {
        Self::new([
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(0.0, 3.0),
        ])
    }
}

/// Solve for the transmitter position
///
/// `distances[i]` is the estimated range to `anchors[i]`. The raw result is
/// returned unclamped; it may lie outside the anchor triangle when the
/// distance estimates are noisy.
///
/// # Example
/// ```
/// use rssitrack::trilateration::{Point2, solve};
///
/// let anchors = [Point2::new(0.0, 0.0), Point2::new(3.0, 0.0), Point2::new(0.0, 3.0)];
/// let truth = Point2::new(1.0, 1.0);
/// let d = anchors.map(|a| a.distance_to(&truth));
/// let p = solve(d, &anchors).unwrap();
/// assert!((p.x - 1.0).abs() < 1e-9 && (p.y - 1.0).abs() < 1e-9);
/// ```
pub fn solve(distances: [f64; 3], anchors: &[Point2; 3]) -> Result<Point2, Singular> {
    let [d1, d2, d3] = distances;
    let [p1, p2, p3] = *anchors;
    let (x1, y1) = (p1.x, p1.y);
    let (x2, y2) = (p2.x, p2.y);
    let (x3, y3) = (p3.x, p3.y);

    let a = -2.0 * x1 + 2.0 * x2;
    let b = -2.0 * y1 + 2.0 * y2;
    let c = d1 * d1 - d2 * d2 - x1 * x1 + x2 * x2 - y1 * y1 + y2 * y2;
    let d = -2.0 * x2 + 2.0 * x3;
    let e = -2.0 * y2 + 2.0 * y3;
    let f = d2 * d2 - d3 * d3 - x2 * x2 + x3 * x3 - y2 * y2 + y3 * y3;

    let determinant = e * a - b * d;
    if determinant.abs() < SINGULAR_DETERMINANT_EPSILON {
        return Err(Singular { determinant });
    }

    let x = (c * e - f * b) / determinant;
    let y = (c * d - a * f) / (b * d - a * e);

    let p = Point2::new(x, y);
    if !p.is_finite() {
        // Overflow from absurd distances; treat like a degenerate system
        return Err(Singular { determinant });
    }
    Ok(p)
}

/// RMS disagreement between `point` and the three distance circles
pub fn residual(point: &Point2, distances: [f64; 3], anchors: &[Point2; 3]) -> f64 {
    let sum_sq: f64 = anchors
        .iter()
        .zip(distances)
        .map(|(anchor, d)| {
            let err = point.distance_to(anchor) - d;
            err * err
        })
        .sum();
    (sum_sq / anchors.len() as f64).sqrt()
}

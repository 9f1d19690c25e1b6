//! Numeric constants for solver stability and protocol defaults.

/// Below this magnitude the trilateration determinant `E*A - B*D` is treated
/// as zero. Anchor coordinates are expected in metres, so a genuine layout
/// produces determinants many orders of magnitude above this.
pub const SINGULAR_DETERMINANT_EPSILON: f64 = 1e-9;

/// Field separator in anchor telemetry lines.
pub const TELEMETRY_DELIMITER: u8 = b'|';

/// Number of anchors the solver works with.
pub const ANCHOR_COUNT: usize = 3;

mod csv;
mod json;
mod text;

use chrono::Utc;
use serde::Serialize;

use crate::config::Viewport;
use crate::constants::ANCHOR_COUNT;
use crate::state::EstimateSnapshot;
use crate::trilateration::Point2;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// One rendered tick: the raw estimate plus its display-clamped position
#[derive(Debug, Clone, Default, Serialize)]
pub struct EstimateOutput {
    pub iteration: Option<u64>,
    /// Unclamped solver output
    pub position: Option<Point2>,
    /// Position after viewport clamping; what a plot would draw
    pub shown: Option<Point2>,
    pub residual: Option<f64>,
    pub distances: Option<[f64; ANCHOR_COUNT]>,
}

impl EstimateOutput {
    pub fn from_snapshot(snapshot: Option<&EstimateSnapshot>, viewport: Option<&Viewport>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::default();
        };
        let position = snapshot.position.as_ref().map(|p| p.point());
        Self {
            iteration: Some(snapshot.iteration),
            position,
            shown: position.map(|p| viewport.map_or(p, |vp| vp.clamp(p))),
            residual: snapshot.position.as_ref().map(|p| p.residual),
            distances: snapshot.distances.map(|d| d.map(|e| e.distance)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.position.is_some()
    }
}

pub trait Formatter: Send {
    fn format(&self, output: &EstimateOutput) -> String;

    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

pub fn iso8601_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DistanceEstimate, PositionEstimate};
    use crate::telemetry::AnchorId;

    fn snapshot(x: f64, y: f64) -> EstimateSnapshot {
        EstimateSnapshot {
            iteration: 7,
            position: Some(PositionEstimate {
                x,
                y,
                source_distances: [1.0, 2.0, 3.0],
                residual: 0.25,
                iteration: 7,
                timestamp: Utc::now(),
            }),
            distances: Some(AnchorId::ALL.map(|anchor| DistanceEstimate {
                anchor,
                distance: 1.0 + anchor.index() as f64,
            })),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_clamps_only_shown_position() {
        let vp = Viewport {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(3.0, 3.0),
        };
        let snap = snapshot(-0.5, 4.0);
        let out = EstimateOutput::from_snapshot(Some(&snap), Some(&vp));
        assert_eq!(out.position, Some(Point2::new(-0.5, 4.0)));
        assert_eq!(out.shown, Some(Point2::new(0.0, 3.0)));
        assert_eq!(out.distances, Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_unavailable() {
        let out = EstimateOutput::from_snapshot(None, None);
        assert!(!out.is_available());
        assert!(TextFormatter::new(false).format(&out).contains("unavailable"));
        assert!(JsonFormatter.format(&out).contains("\"position\":null"));
    }

    #[test]
    fn test_csv_column_count_matches_header() {
        let snap = snapshot(1.0, 2.0);
        let out = EstimateOutput::from_snapshot(Some(&snap), None);
        let header_cols = CsvFormatter.header().unwrap().split(',').count();
        assert_eq!(CsvFormatter.format(&out).split(',').count(), header_cols);
        let empty = EstimateOutput::default();
        assert_eq!(CsvFormatter.format(&empty).split(',').count(), header_cols);
    }
}

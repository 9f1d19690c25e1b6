//! Hand-off point between the estimation producer and its readers.
//!
//! The producer builds a complete, immutable [`EstimateSnapshot`] and swaps it
//! into a single slot; readers load an `Arc` to whichever snapshot is current.
//! A reader therefore sees either the old snapshot or the new one, never a
//! mixture of fields from both. Readers never block the producer and may
//! skip snapshots.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::ANCHOR_COUNT;
use crate::telemetry::AnchorId;
use crate::trilateration::Point2;

/// Range to one anchor derived this iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceEstimate {
    pub anchor: AnchorId,
    pub distance: f64,
}

/// Result of a successful trilateration solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    /// Distances the solve was computed from, in anchor order
    pub source_distances: [f64; ANCHOR_COUNT],
    /// RMS mismatch between the solution and the distance circles
    pub residual: f64,
    /// Pipeline iteration that produced this solve
    pub iteration: u64,
    pub timestamp: DateTime<Utc>,
}

impl PositionEstimate {
    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Everything a reader may look at, published as one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateSnapshot {
    /// Pipeline iteration that published this snapshot
    pub iteration: u64,
    /// Most recent successful solve; may predate `iteration`
    pub position: Option<PositionEstimate>,
    /// Latest per-anchor distances, present once every anchor has reported
    pub distances: Option<[DistanceEstimate; ANCHOR_COUNT]>,
    pub updated_at: DateTime<Utc>,
}

/// Create the single-slot state with its one writer and a reader handle
pub fn estimate_channel() -> (EstimatePublisher, EstimateReader) {
    let slot = Arc::new(ArcSwapOption::empty());
    (
        EstimatePublisher {
            slot: Arc::clone(&slot),
        },
        EstimateReader { slot },
    )
}

/// Sole writer of the shared estimate. Deliberately not `Clone`.
pub struct EstimatePublisher {
    slot: Arc<ArcSwapOption<EstimateSnapshot>>,
}

impl EstimatePublisher {
    /// Replace the current snapshot in one atomic swap
    pub fn publish(&self, snapshot: EstimateSnapshot) {
        self.slot.store(Some(Arc::new(snapshot)));
    }

    pub fn current(&self) -> Option<Arc<EstimateSnapshot>> {
        self.slot.load_full()
    }

    pub fn reader(&self) -> EstimateReader {
        EstimateReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Read-only view of the shared estimate
#[derive(Clone)]
pub struct EstimateReader {
    slot: Arc<ArcSwapOption<EstimateSnapshot>>,
}

impl EstimateReader {
    /// Current snapshot, or `None` before the first publish
    pub fn latest(&self) -> Option<Arc<EstimateSnapshot>> {
        self.slot.load_full()
    }

    /// Most recent position, or `None` while unavailable
    pub fn position(&self) -> Option<PositionEstimate> {
        self.latest().and_then(|s| s.position.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(iteration: u64, x: f64) -> EstimateSnapshot {
        EstimateSnapshot {
            iteration,
            position: Some(PositionEstimate {
                x,
                y: -x,
                source_distances: [x; ANCHOR_COUNT],
                residual: 0.0,
                iteration,
                timestamp: Utc::now(),
            }),
            distances: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unavailable_before_first_publish() {
        let (publisher, reader) = estimate_channel();
        assert!(reader.latest().is_none());
        assert!(reader.position().is_none());
        assert!(publisher.current().is_none());
    }

    #[test]
    fn test_readers_see_latest_publish() {
        let (publisher, reader) = estimate_channel();
        let second = publisher.reader();
        publisher.publish(snapshot(1, 1.0));
        publisher.publish(snapshot(2, 2.0));
        assert_eq!(reader.latest().unwrap().iteration, 2);
        assert_eq!(second.position().unwrap().x, 2.0);
    }

    #[test]
    fn test_loaded_snapshot_is_stable() {
        let (publisher, reader) = estimate_channel();
        publisher.publish(snapshot(1, 1.0));
        let held = reader.latest().unwrap();
        publisher.publish(snapshot(2, 2.0));
        assert_eq!(held.iteration, 1);
        assert_eq!(held.position.as_ref().unwrap().x, 1.0);
    }
}

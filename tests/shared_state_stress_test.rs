use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::Utc;
use rssitrack::state::{DistanceEstimate, EstimateSnapshot, PositionEstimate, estimate_channel};
use rssitrack::telemetry::AnchorId;

const PUBLISHES: u64 = 20_000;
const READERS: usize = 4;

/// Every field of a snapshot encodes the same iteration, so a reader that
/// ever saw fields from two different publishes would notice
fn snapshot(iteration: u64) -> EstimateSnapshot {
    let v = iteration as f64;
    EstimateSnapshot {
        iteration,
        position: Some(PositionEstimate {
            x: v,
            y: v,
            source_distances: [v; 3],
            residual: v,
            iteration,
            timestamp: Utc::now(),
        }),
        distances: Some(AnchorId::ALL.map(|anchor| DistanceEstimate {
            anchor,
            distance: v,
        })),
        updated_at: Utc::now(),
    }
}

fn assert_consistent(s: &EstimateSnapshot) {
    let v = s.iteration as f64;
    let p = s.position.as_ref().expect("every snapshot carries a position");
    assert_eq!(p.iteration, s.iteration);
    assert_eq!(p.x, v);
    assert_eq!(p.y, v);
    assert_eq!(p.residual, v);
    assert!(p.source_distances.iter().all(|&d| d == v));
    let distances = s.distances.expect("every snapshot carries distances");
    for (anchor, d) in AnchorId::ALL.into_iter().zip(distances) {
        assert_eq!(d.anchor, anchor);
        assert_eq!(d.distance, v);
    }
}

#[test]
fn test_readers_never_observe_torn_snapshots() {
    let (publisher, reader) = estimate_channel();
    let done = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let reader = reader.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_seen = 0u64;
                let mut observed = 0u64;
                while !done.load(Ordering::Acquire) {
                    if let Some(s) = reader.latest() {
                        assert_consistent(&s);
                        assert!(
                            s.iteration >= last_seen,
                            "went backwards: {} after {}",
                            s.iteration,
                            last_seen
                        );
                        last_seen = s.iteration;
                        observed += 1;
                    }
                }
                observed
            })
        })
        .collect();

    for i in 1..=PUBLISHES {
        publisher.publish(snapshot(i));
    }
    done.store(true, Ordering::Release);

    for handle in handles {
        handle.join().expect("reader panicked");
    }

    let last = reader.latest().unwrap();
    assert_eq!(last.iteration, PUBLISHES);
    assert_consistent(&last);
}

#[test]
fn test_reader_before_first_publish_sees_nothing() {
    let (publisher, reader) = estimate_channel();
    assert!(reader.latest().is_none());
    assert!(reader.position().is_none());

    let late = publisher.reader();
    publisher.publish(snapshot(1));
    assert_eq!(late.latest().unwrap().iteration, 1);
    assert_eq!(reader.position().unwrap().iteration, 1);
}

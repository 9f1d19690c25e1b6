use chrono::Utc;
use serde::Serialize;

use crate::config::{HandshakeConfig, LocatorConfig};
use crate::constants::ANCHOR_COUNT;
use crate::error::{LocatorError, Result};
use crate::handshake;
use crate::ranging::PathLossModel;
use crate::shutdown::Shutdown;
use crate::smoothing::SmoothingFilter;
use crate::state::{
    DistanceEstimate, EstimatePublisher, EstimateReader, EstimateSnapshot, PositionEstimate,
};
use crate::telemetry::{AnchorId, AnchorLink, AnchorReaders, parse_rssi};
use crate::trilateration::{self, AnchorGeometry, Singular};

/// Producer lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Synchronizing,
    Running,
    Stopped,
}

/// What one iteration did with its three lines
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// A new position was solved and published
    Published(PositionEstimate),
    /// Distances were published; positions are withheld until every window
    /// holds `capacity` readings
    Converging { filled: usize, capacity: usize },
    /// The solve was degenerate; distances were published, the previous
    /// position was kept
    Singular(Singular),
    /// These anchors have not produced a single good reading yet; nothing
    /// was published
    AwaitingSamples(Vec<AnchorId>),
}

/// Running counters, returned when the producer stops
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub iterations: u64,
    pub published: u64,
    pub parse_failures: u64,
    pub singular: u64,
    pub handshake_rounds: u32,
}

/// The estimation producer: parse, smooth, range, solve, publish
pub struct EstimationPipeline {
    filter: SmoothingFilter,
    model: PathLossModel,
    geometry: AnchorGeometry,
    handshake: HandshakeConfig,
    require_full_window: bool,
    publisher: EstimatePublisher,
    last_position: Option<PositionEstimate>,
    state: PipelineState,
    stats: PipelineStats,
}

impl EstimationPipeline {
    pub fn new(config: &LocatorConfig, publisher: EstimatePublisher) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: SmoothingFilter::new(config.smoothing.window_size),
            model: PathLossModel::new(&config.path_loss),
            geometry: config.anchors.clone(),
            handshake: config.handshake.clone(),
            require_full_window: config.smoothing.require_full_window,
            publisher,
            last_position: None,
            state: PipelineState::Synchronizing,
            stats: PipelineStats::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn filter(&self) -> &SmoothingFilter {
        &self.filter
    }

    pub fn reader(&self) -> EstimateReader {
        self.publisher.reader()
    }

    /// Run one iteration over one raw line per anchor
    ///
    /// A line that fails to parse leaves that anchor's window untouched, so
    /// its previous readings keep standing in for it.
    pub fn process_lines<B: AsRef<[u8]>>(&mut self, lines: &[B; ANCHOR_COUNT]) -> IterationOutcome {
        self.stats.iterations += 1;
        let iteration = self.stats.iterations;

        for anchor in AnchorId::ALL {
            let raw = lines[anchor.index()].as_ref();
            match parse_rssi(raw) {
                Ok(value) => {
                    self.filter.push(anchor, value);
                }
                Err(failure) => {
                    self.stats.parse_failures += 1;
                    log::warn!(
                        "{}: {} in {:?}, holding last value",
                        anchor,
                        failure,
                        String::from_utf8_lossy(raw).trim_end()
                    );
                }
            }
        }

        let Some(means) = self.filter.means() else {
            let missing: Vec<AnchorId> = AnchorId::ALL
                .into_iter()
                .filter(|a| self.filter.window(*a).is_empty())
                .collect();
            log::debug!("Iteration {}: no readings yet from {:?}", iteration, missing);
            return IterationOutcome::AwaitingSamples(missing);
        };

        let distances = means.map(|m| self.model.distance(m));
        let estimates: [DistanceEstimate; ANCHOR_COUNT] =
            std::array::from_fn(|i| DistanceEstimate {
                anchor: AnchorId::ALL[i],
                distance: distances[i],
            });
        log::debug!(
            "Iteration {}: mean {:.2} | {:.2} | {:.2}, distance {:.3} | {:.3} | {:.3}",
            iteration,
            means[0],
            means[1],
            means[2],
            distances[0],
            distances[1],
            distances[2]
        );

        if self.require_full_window && !self.filter.is_converged() {
            let filled = AnchorId::ALL
                .into_iter()
                .map(|a| self.filter.window(a).len())
                .min()
                .unwrap_or(0);
            let capacity = self.filter.window(AnchorId::ALL[0]).capacity();
            self.publish(iteration, estimates);
            return IterationOutcome::Converging { filled, capacity };
        }

        match self.geometry.solve(distances) {
            Ok(point) => {
                let position = PositionEstimate {
                    x: point.x,
                    y: point.y,
                    source_distances: distances,
                    residual: trilateration::residual(&point, distances, &self.geometry.positions),
                    iteration,
                    timestamp: Utc::now(),
                };
                log::debug!(
                    "Iteration {}: position {} (residual {:.3})",
                    iteration,
                    point,
                    position.residual
                );
                self.last_position = Some(position.clone());
                self.stats.published += 1;
                self.publish(iteration, estimates);
                IterationOutcome::Published(position)
            }
            Err(singular) => {
                self.stats.singular += 1;
                log::warn!(
                    "Iteration {}: {}, keeping previous estimate",
                    iteration,
                    singular
                );
                self.publish(iteration, estimates);
                IterationOutcome::Singular(singular)
            }
        }
    }

    fn publish(&self, iteration: u64, distances: [DistanceEstimate; ANCHOR_COUNT]) {
        self.publisher.publish(EstimateSnapshot {
            iteration,
            position: self.last_position.clone(),
            distances: Some(distances),
            updated_at: Utc::now(),
        });
    }

    /// Synchronize the anchors, then estimate until shutdown or a transport
    /// fault
    ///
    /// Shutdown is a clean stop and returns the accumulated stats. Transport
    /// errors and closed streams end the run with an error.
    pub fn run<L: AnchorLink + 'static>(
        &mut self,
        links: [L; ANCHOR_COUNT],
        shutdown: &Shutdown,
    ) -> Result<PipelineStats> {
        let mut links = links;
        self.state = PipelineState::Synchronizing;
        log::info!("Synchronizing anchors ({:?} mode)", self.handshake.mode);

        match handshake::synchronize(&mut links, &self.handshake, shutdown) {
            Ok(report) => self.stats.handshake_rounds = report.attempts,
            Err(LocatorError::Shutdown) => return Ok(self.stop()),
            Err(e) => {
                self.state = PipelineState::Stopped;
                return Err(e);
            }
        }

        self.state = PipelineState::Running;
        log::info!("Running");
        let readers = AnchorReaders::spawn(links, shutdown)?;

        while !shutdown.is_triggered() {
            match readers.next_lines(shutdown) {
                Ok(Some(lines)) => {
                    self.process_lines(&lines);
                }
                Ok(None) => break,
                Err(e) => {
                    self.state = PipelineState::Stopped;
                    log::error!("Stopping after transport fault: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(self.stop())
    }

    fn stop(&mut self) -> PipelineStats {
        self.state = PipelineState::Stopped;
        log::info!(
            "Stopped after {} iterations ({} published, {} parse failures, {} singular)",
            self.stats.iterations,
            self.stats.published,
            self.stats.parse_failures,
            self.stats.singular
        );
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RangingMode;
    use crate::state::estimate_channel;
    use approx::assert_relative_eq;

    fn pipeline(window: usize, gate: bool) -> (EstimationPipeline, EstimateReader) {
        let mut config = LocatorConfig::default();
        config.smoothing.window_size = window;
        config.smoothing.require_full_window = gate;
        let (publisher, reader) = estimate_channel();
        (EstimationPipeline::new(&config, publisher).unwrap(), reader)
    }

    #[test]
    fn test_reference_power_gives_unit_distances() {
        let (mut p, reader) = pipeline(3, false);
        let outcome = p.process_lines(&["1|-76.0\r\n", "2|-76.0\r\n", "3|-76.0\r\n"]);
        let IterationOutcome::Published(pos) = outcome else {
            panic!("expected a position, got {:?}", outcome);
        };
        for d in pos.source_distances {
            assert_relative_eq!(d, 1.0);
        }
        assert_relative_eq!(pos.x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(pos.y, 1.5, epsilon = 1e-12);
        assert_eq!(reader.position().unwrap(), pos);
    }

    #[test]
    fn test_gate_until_windows_full() {
        let (mut p, reader) = pipeline(3, true);
        let lines = ["1|-76", "2|-76", "3|-76"];
        assert_eq!(
            p.process_lines(&lines),
            IterationOutcome::Converging {
                filled: 1,
                capacity: 3
            }
        );
        let snap = reader.latest().unwrap();
        assert!(snap.position.is_none());
        assert!(snap.distances.is_some());

        p.process_lines(&lines);
        assert!(matches!(
            p.process_lines(&lines),
            IterationOutcome::Published(_)
        ));
    }

    #[test]
    fn test_parse_failure_holds_window() {
        let (mut p, _) = pipeline(4, false);
        p.process_lines(&["1|-70", "2|-70", "3|-70"]);
        p.process_lines(&["garbage", "2|-72", "3|-72"]);
        let a1 = AnchorId::ALL[0];
        assert_eq!(p.filter().window(a1).len(), 1);
        assert_relative_eq!(p.filter().mean(a1).unwrap(), -70.0);
        assert_eq!(p.stats().parse_failures, 1);
    }

    #[test]
    fn test_awaiting_first_sample() {
        let (mut p, reader) = pipeline(4, false);
        let outcome = p.process_lines(&["1|-70", "ack", "3|-70"]);
        assert_eq!(
            outcome,
            IterationOutcome::AwaitingSamples(vec![AnchorId::ALL[1]])
        );
        assert!(reader.latest().is_none());
    }

    #[test]
    fn test_singular_keeps_previous_position() {
        let mut config = LocatorConfig::default();
        config.smoothing.window_size = 1;
        config.smoothing.require_full_window = false;
        config.path_loss.mode = RangingMode::Direct;
        let (publisher, reader) = estimate_channel();
        let mut p = EstimationPipeline::new(&config, publisher).unwrap();

        let first = p.process_lines(&["a|1.0", "b|1.0", "c|1.0"]);
        assert!(matches!(first, IterationOutcome::Published(_)));
        let before = reader.position().unwrap();

        // Squared distances overflow, so the solve cannot produce a finite point
        let outcome = p.process_lines(&["a|1e200", "b|1.0", "c|1.0"]);
        assert!(matches!(outcome, IterationOutcome::Singular(_)));
        let snap = reader.latest().unwrap();
        assert_eq!(snap.iteration, 2);
        assert_eq!(snap.position.as_ref().unwrap(), &before);
        assert_eq!(p.stats().singular, 1);
    }
}

use std::io;
use std::thread;
use std::time::Duration;

use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

use super::{TargetPath, ideal_rssi};
use crate::config::LocatorConfig;
use crate::constants::ANCHOR_COUNT;
use crate::error::{LocatorError, Result};
use crate::telemetry::{AnchorId, AnchorLink};
use crate::trilateration::Point2;

/// Behaviour of the synthetic anchor firmware
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub target: TargetPath,
    /// Gaussian RSSI noise, in dB
    pub noise_std_db: f64,
    /// Probability that a line is garbled
    pub malformed_rate: f64,
    /// Delay before each line, emulating the anchor report rate
    pub line_interval_ms: u64,
    /// End the stream after this many lines
    pub max_lines: Option<u64>,
    /// Stay silent until a start command arrives, then reply "ack"
    pub requires_start: bool,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target: TargetPath::default(),
            noise_std_db: 2.0,
            malformed_rate: 0.0,
            line_interval_ms: 0,
            max_lines: None,
            requires_start: true,
            seed: None,
        }
    }
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// An anchor that reports RSSI for a transmitter following a [`TargetPath`]
pub struct SimulatedAnchor {
    anchor: AnchorId,
    position: Point2,
    p0: f64,
    exponent: f64,
    config: SimulationConfig,
    noise: Normal<f64>,
    rng: ChaCha8Rng,
    started: bool,
    replies: Vec<u8>,
    lines_sent: u64,
}

impl SimulatedAnchor {
    pub fn new(
        anchor: AnchorId,
        position: Point2,
        locator: &LocatorConfig,
        config: &SimulationConfig,
    ) -> Result<Self> {
        let noise = Normal::new(0.0, config.noise_std_db)
            .map_err(|e| LocatorError::Config(format!("noise_std_db: {}", e)))?;
        // Distinct but reproducible stream per anchor
        let seed = config.seed.map(|s| s.wrapping_add(anchor.index() as u64));
        Ok(Self {
            anchor,
            position,
            p0: locator.path_loss.reference_power_dbm,
            exponent: locator.path_loss.exponent,
            config: config.clone(),
            noise,
            rng: create_rng(seed),
            started: !config.requires_start,
            replies: Vec::new(),
            lines_sent: 0,
        })
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    fn next_line(&mut self) -> Vec<u8> {
        let target = self.config.target.position(self.lines_sent);
        self.lines_sent += 1;

        if self.config.malformed_rate > 0.0 && self.rng.random::<f64>() < self.config.malformed_rate
        {
            return format!("{}|E:rx timeout\r\n", self.anchor).into_bytes();
        }

        let distance = self.position.distance_to(&target);
        let rssi =
            ideal_rssi(distance, self.p0, self.exponent) + self.noise.sample(&mut self.rng);
        format!("{}|{:.2}\r\n", self.anchor, rssi).into_bytes()
    }
}

impl AnchorLink for SimulatedAnchor {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self
            .config
            .max_lines
            .is_some_and(|max| self.lines_sent >= max)
        {
            return Ok(None);
        }
        if !self.started {
            // Silent like a real anchor waiting for "start"
            thread::sleep(Duration::from_millis(self.config.line_interval_ms.max(10)));
            return Err(io::ErrorKind::TimedOut.into());
        }
        if self.config.line_interval_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.line_interval_ms));
        }
        Ok(Some(self.next_line()))
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.windows(5).any(|w| w == b"start") {
            self.started = true;
            self.replies.extend_from_slice(b"ack\r\n");
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        let mut pending = std::mem::take(&mut self.replies);
        if self.started {
            pending.extend(self.next_line());
        }
        Ok(pending)
    }
}

/// One simulated anchor per configured anchor position
pub fn simulated_anchors(
    locator: &LocatorConfig,
    config: &SimulationConfig,
) -> Result<[SimulatedAnchor; ANCHOR_COUNT]> {
    let [a1, a2, a3] = AnchorId::ALL;
    let [p1, p2, p3] = locator.anchors.positions;
    Ok([
        SimulatedAnchor::new(a1, p1, locator, config)?,
        SimulatedAnchor::new(a2, p2, locator, config)?,
        SimulatedAnchor::new(a3, p3, locator, config)?,
    ])
}

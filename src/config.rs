//! Configuration for the rssitrack estimator.
//!
//! Every section has a `Default` holding the deployment constants the anchors
//! were calibrated with, so a TOML file only needs to name what differs:
//!
//! ```toml
//! [path_loss]
//! reference_power_dbm = -72.5
//!
//! [anchors]
//! positions = [{ x = 0.0, y = 0.0 }, { x = 0.0, y = 3.0 }, { x = 3.0, y = 0.0 }]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LocatorError, Result};
use crate::trilateration::{AnchorGeometry, Point2};

/// System-wide estimator configuration
///
/// # Example
/// ```
/// use rssitrack::config::LocatorConfig;
///
/// let mut config = LocatorConfig::default();
/// config.smoothing.window_size = 5;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// RSSI to distance conversion
    pub path_loss: PathLossConfig,
    /// Per-anchor sliding window
    pub smoothing: SmoothingConfig,
    /// Fixed anchor coordinates
    pub anchors: AnchorGeometry,
    /// Anchor start synchronization
    pub handshake: HandshakeConfig,
    /// Periodic consumer settings
    pub display: DisplayConfig,
    /// Serial port settings (live binary only)
    pub serial: SerialConfig,
}

/// How a telemetry value becomes a distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RangingMode {
    /// Value is RSSI in dBm, converted with the log-distance model
    PathLoss,
    /// Value is already a distance reported by the anchor firmware
    Direct,
}

/// Log-distance path-loss parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLossConfig {
    pub mode: RangingMode,
    /// Received power at one unit of reference distance (dBm)
    pub reference_power_dbm: f64,
    /// Environment path-loss exponent (2.0 in free space)
    pub exponent: f64,
}

/// Sliding window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Samples held per anchor
    pub window_size: usize,
    /// Withhold position estimates until every anchor window is full.
    /// Distances are published either way.
    pub require_full_window: bool,
}

/// Anchor synchronization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HandshakeMode {
    /// Send the start command until every anchor replies with the ack token
    Command,
    /// Send nothing; wait until every anchor is already emitting telemetry
    Passive,
    /// Trust the streams immediately
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub mode: HandshakeMode,
    pub start_command: String,
    pub ack_token: String,
    /// Wait between sending the start command and checking replies
    pub interval_ms: u64,
    /// Give up after this many rounds; 0 retries forever
    pub max_attempts: u32,
}

/// Display viewport used only for presentation clamping
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub min: Point2,
    pub max: Point2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Renderer wake-up period
    pub tick_interval_ms: u64,
    /// Clamp displayed positions into `viewport`; raw estimates are untouched
    pub clamp: bool,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// One device path per anchor, in anchor order
    pub ports: Vec<String>,
    pub baud_rate: u32,
    /// Per-read timeout; reads retry on timeout until a full line arrives
    pub timeout_ms: u64,
}

impl LocatorConfig {
    /// Parse a (possibly partial) TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| LocatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LocatorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| LocatorError::Config(e.to_string()))
    }

    /// Check every section for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let pl = &self.path_loss;
        if !pl.reference_power_dbm.is_finite() {
            return Err(LocatorError::Config(
                "reference_power_dbm must be finite".to_string(),
            ));
        }
        if !(pl.exponent.is_finite() && pl.exponent > 0.0) {
            return Err(LocatorError::Config(format!(
                "path-loss exponent must be positive, got {}",
                pl.exponent
            )));
        }
        if self.smoothing.window_size == 0 {
            return Err(LocatorError::Config(
                "smoothing window must hold at least one sample".to_string(),
            ));
        }
        if self.handshake.mode == HandshakeMode::Command {
            if self.handshake.ack_token.is_empty() {
                return Err(LocatorError::Config("ack token is empty".to_string()));
            }
            if self.handshake.start_command.is_empty() {
                return Err(LocatorError::Config("start command is empty".to_string()));
            }
        }
        if self.display.tick_interval_ms == 0 {
            return Err(LocatorError::Config(
                "display tick interval must be non-zero".to_string(),
            ));
        }
        let vp = self.display.viewport;
        if vp.min.x >= vp.max.x || vp.min.y >= vp.max.y {
            return Err(LocatorError::Config(format!(
                "viewport min {} must be below max {}",
                vp.min, vp.max
            )));
        }
        self.anchors.validate()
    }
}

impl HandshakeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl DisplayConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Viewport to clamp displayed positions into, if clamping is on
    pub fn clamp_viewport(&self) -> Option<Viewport> {
        self.clamp.then_some(self.viewport)
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Viewport {
    pub fn clamp(&self, p: Point2) -> Point2 {
        Point2::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
        )
    }
}

impl Default for PathLossConfig {
    fn default() -> Self {
        Self {
            mode: RangingMode::PathLoss,
            reference_power_dbm: -76.0,
            exponent: 2.0,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            require_full_window: true,
        }
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            mode: HandshakeMode::Command,
            start_command: "start\n".to_string(),
            ack_token: "ack".to_string(),
            interval_ms: 5000,
            max_attempts: 12,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            clamp: true,
            // Plot area of the deployed 3 m x 3 m test room
            viewport: Viewport {
                min: Point2::new(0.0, 0.0),
                max: Point2::new(3.0, 3.0),
            },
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            baud_rate: 115_200,
            timeout_ms: 100,
        }
    }
}

pub mod link;
pub mod parser;
pub mod reader;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::constants::ANCHOR_COUNT;

pub use link::{AnchorLink, SerialLink, StreamLink};
pub use parser::{ParseFailure, parse_rssi, parse_sample};
pub use reader::AnchorReaders;

/// Index of one of the three anchors (0-based), shown as `A1`..`A3`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(u8);

impl AnchorId {
    pub const ALL: [AnchorId; ANCHOR_COUNT] = [AnchorId(0), AnchorId(1), AnchorId(2)];

    pub fn new(index: usize) -> Option<Self> {
        (index < ANCHOR_COUNT).then_some(AnchorId(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0 + 1)
    }
}

impl fmt::Debug for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for AnchorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One decoded telemetry reading
#[derive(Debug, Clone, Copy)]
pub struct AnchorSample {
    pub anchor: AnchorId,
    pub rssi: f64,
    pub timestamp: DateTime<Utc>,
}

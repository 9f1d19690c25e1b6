use std::io;

use thiserror::Error;

use crate::telemetry::AnchorId;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Transport error on anchor {anchor}: {source}")]
    Transport {
        anchor: AnchorId,
        #[source]
        source: io::Error,
    },

    #[error("Anchor {anchor} closed its stream")]
    LinkClosed { anchor: AnchorId },

    #[error("Handshake did not converge after {attempts} attempts (waiting on {pending:?})")]
    HandshakeTimeout {
        attempts: u32,
        pending: Vec<AnchorId>,
    },

    #[error("Anchors are collinear (determinant {determinant:.3e})")]
    CollinearAnchors { determinant: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, LocatorError>;

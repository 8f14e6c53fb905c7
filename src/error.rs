//! Error types
//!
//! Everything here is recoverable by the caller; the simulation itself never
//! returns errors once a [`crate::sim::GameState`] has been built.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Loading or validating tuning/settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid tuning: {0}")]
    Invalid(String),
}

/// A wire line that does not decode to a known message
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown message tag in {0:?}")]
    Unknown(String),
    #[error("malformed message {0:?}")]
    Malformed(String),
}

/// Socket-level failures in the relay or peer link
#[derive(Debug, Error)]
pub enum NetError {
    #[error("network i/o: {0}")]
    Io(#[from] io::Error),
    #[error("relay event channel closed")]
    ChannelClosed,
}

/// High score storage failures
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write high score to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Top-level error for the binary
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

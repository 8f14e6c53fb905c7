//! Host settings
//!
//! Where to listen or connect, how many peers a session needs and where the
//! high score lives. Stored as JSON; a missing or broken file means defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::RelayConfig;

/// Host settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Relay listen address (`relay`) and connect address (`play --connect`)
    pub relay_addr: String,
    /// Peers required before the relay sends START
    pub max_peers: usize,
    /// Seconds of silence before the relay drops a peer; 0 disables
    pub idle_timeout_secs: u64,
    /// High score file
    pub highscore_path: PathBuf,
    /// Fixed seed for local runs; random when absent
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:5000".to_string(),
            max_peers: 2,
            idle_timeout_secs: 300,
            highscore_path: PathBuf::from("skyhop_highscore.txt"),
            seed: None,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults on any problem
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                log::info!("Using default settings ({}: {e})", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring malformed settings {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Relay configuration derived from these settings
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_peers: self.max_peers.max(1),
            idle_timeout: self.idle_timeout(),
            ..RelayConfig::default()
        }
    }
}

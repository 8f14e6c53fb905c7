//! High score persistence
//!
//! A single best score. The session only ever calls `load` once and `save`
//! when a run ends above the previous best.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PersistError;

/// Storage for the best score
pub trait HighScoreStore {
    /// Stored best score; 0 when absent or unreadable
    fn load(&self) -> u64;
    fn save(&mut self, score: u64) -> Result<(), PersistError>;
}

/// Text file holding one integer
#[derive(Debug, Clone)]
pub struct FileHighScore {
    path: PathBuf,
}

impl FileHighScore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HighScoreStore for FileHighScore {
    fn load(&self) -> u64 {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No high score at {}, starting fresh", self.path.display());
                return 0;
            }
            Err(e) => {
                log::warn!("Failed to read high score {}: {e}", self.path.display());
                return 0;
            }
        };
        match text.trim().parse() {
            Ok(score) => {
                log::info!("Loaded high score {score}");
                score
            }
            Err(e) => {
                log::warn!("Corrupt high score file {}: {e}", self.path.display());
                0
            }
        }
    }

    /// Write to a sibling tmp file, then rename over the old one
    fn save(&mut self, score: u64) -> Result<(), PersistError> {
        let write_err = |source| PersistError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, format!("{score}\n")).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        log::info!("High score {score} saved");
        Ok(())
    }
}

/// In-memory store; clones share the same value
#[derive(Debug, Clone, Default)]
pub struct MemoryHighScore {
    score: Arc<AtomicU64>,
}

impl MemoryHighScore {
    pub fn new(score: u64) -> Self {
        Self {
            score: Arc::new(AtomicU64::new(score)),
        }
    }

    pub fn get(&self) -> u64 {
        self.score.load(Ordering::Relaxed)
    }
}

impl HighScoreStore for MemoryHighScore {
    fn load(&self) -> u64 {
        self.get()
    }

    fn save(&mut self, score: u64) -> Result<(), PersistError> {
        self.score.store(score, Ordering::Relaxed);
        Ok(())
    }
}

//! Skyhop - an endless vertical platformer engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (world generation, physics, collisions, run phases)
//! - `net`: Line protocol, two-peer relay and client link
//! - `session`: Owns a run plus high score and optional network link
//! - `snapshot`: Read-only view handed to an external renderer
//! - `highscores`: Single-integer high score persistence
//! - `tuning`: Data-driven game balance
//! - `settings`: Runtime settings (addresses, paths, seed)

pub mod error;
pub mod highscores;
pub mod net;
pub mod session;
pub mod settings;
pub mod sim;
pub mod snapshot;
pub mod tuning;

pub use error::{ConfigError, Error, NetError, PersistError, ProtocolError};
pub use highscores::{FileHighScore, HighScoreStore, MemoryHighScore};
pub use session::{RemotePlayer, Session};
pub use settings::Settings;
pub use snapshot::RenderSnapshot;
pub use tuning::{KindWeights, Tuning};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation rate; one tick per rendered frame
    pub const TICK_RATE: u32 = 60;

    /// Default field dimensions
    pub const VIEW_WIDTH: f32 = 250.0;
    pub const VIEW_HEIGHT: f32 = 450.0;
    pub const CELL_SIZE: f32 = 10.0;

    /// Default physics, in pixels per tick
    pub const GRAVITY: f32 = 0.2;
    pub const JUMP_STRENGTH: f32 = 9.0;

    /// Inbound network events applied per tick at most
    pub const MAX_INBOUND_PER_TICK: usize = 32;
}

//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed tick, no wall clock
//! - Seeded RNG only
//! - Stable iteration order (platform creation order)
//! - No rendering, socket or file dependencies

pub mod generator;
pub mod geometry;
pub mod platform;
pub mod state;
pub mod tick;

pub use generator::WorldGenerator;
pub use geometry::{Rect, overlaps};
pub use platform::{Effects, Grant, Motion, Platform, PlatformKind};
pub use state::{ActiveEffect, EndCause, GameEvent, GameState, Player, RunPhase, World};
pub use tick::{TickInput, tick};

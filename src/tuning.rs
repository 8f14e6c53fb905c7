//! Data-driven game balance
//!
//! Every gameplay constant lives in [`Tuning`] so variants can be expressed as
//! JSON files instead of code forks. Missing fields take the defaults below.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::sim::PlatformKind;

/// Weighted categorical distribution over non-moving platform kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindWeights {
    pub normal: f64,
    pub breakable: f64,
    pub flight: f64,
    pub booster: f64,
    pub hazard: f64,
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            normal: 0.70,
            breakable: 0.12,
            flight: 0.06,
            booster: 0.07,
            hazard: 0.05,
        }
    }
}

impl KindWeights {
    /// Weights in [`PlatformKind::WEIGHTED`] order
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.normal,
            self.breakable,
            self.flight,
            self.booster,
            self.hazard,
        ]
    }
}

/// Gameplay tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Field ===
    pub view_width: f32,
    pub view_height: f32,
    /// Base grid unit for lanes and rows
    pub cell_size: f32,
    /// Lane spacing in cells
    pub lane_multiplier: u32,
    /// Row spacing in cells
    pub row_spacing_cells: u32,
    pub platform_width: f32,
    pub platform_height: f32,
    pub player_size: f32,

    // === Physics (per tick) ===
    pub gravity: f32,
    pub jump_strength: f32,
    /// Bounce multiplier while a boost is armed
    pub boost_multiplier: f32,
    pub horizontal_speed: f32,
    pub flight_speed: f32,
    pub flight_duration_ticks: u64,
    pub moving_platform_speed: f32,

    // === Generation ===
    pub moving_chance: f64,
    pub place_chance: f64,
    /// Max horizontal offset from the lane anchor
    pub lane_jitter: f32,
    pub initial_platform_count: usize,
    /// Player-to-topmost-platform distance that triggers a new row
    pub top_up_gap: f32,
    pub weights: KindWeights,

    // === Camera ===
    /// Fraction of view height the player is pinned to while climbing
    pub scroll_threshold: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            view_width: VIEW_WIDTH,
            view_height: VIEW_HEIGHT,
            cell_size: CELL_SIZE,
            lane_multiplier: 15,
            row_spacing_cells: 8,
            platform_width: 50.0,
            platform_height: 12.0,
            player_size: 15.0,

            gravity: GRAVITY,
            jump_strength: JUMP_STRENGTH,
            boost_multiplier: 2.0,
            horizontal_speed: 3.0,
            flight_speed: 5.0,
            flight_duration_ticks: 5 * TICK_RATE as u64,
            moving_platform_speed: 2.0,

            moving_chance: 0.2,
            place_chance: 0.5,
            lane_jitter: CELL_SIZE * 2.0,
            initial_platform_count: 20,
            top_up_gap: 50.0,
            weights: KindWeights::default(),

            scroll_threshold: 0.25,
        }
    }
}

impl Tuning {
    #[inline]
    pub fn lane_spacing(&self) -> f32 {
        self.cell_size * self.lane_multiplier as f32
    }

    #[inline]
    pub fn row_spacing(&self) -> f32 {
        self.cell_size * self.row_spacing_cells as f32
    }

    /// Apex height of an unboosted bounce: v² / 2g
    #[inline]
    pub fn max_jump_height(&self) -> f32 {
        self.jump_strength * self.jump_strength / (2.0 * self.gravity)
    }

    /// Screen y the climbing player is pinned to
    #[inline]
    pub fn scroll_line(&self) -> f32 {
        self.view_height * self.scroll_threshold
    }

    /// Reject tunings that would make generation degenerate or unwinnable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.view_width < self.platform_width || self.view_height <= 0.0 {
            return invalid(format!(
                "view {}x{} cannot hold a {} wide platform",
                self.view_width, self.view_height, self.platform_width
            ));
        }
        if self.cell_size <= 0.0 || self.lane_multiplier == 0 || self.row_spacing_cells == 0 {
            return invalid("cell size, lane multiplier and row spacing must be positive".into());
        }
        if self.gravity <= 0.0 || self.jump_strength <= 0.0 {
            return invalid("gravity and jump strength must be positive".into());
        }
        if self.row_spacing() >= self.max_jump_height() {
            return invalid(format!(
                "row spacing {} is out of jump reach {}",
                self.row_spacing(),
                self.max_jump_height()
            ));
        }
        for (name, p) in [("moving_chance", self.moving_chance), ("place_chance", self.place_chance)] {
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("{name} {p} is not a probability"));
            }
        }
        if !(0.0..1.0).contains(&self.scroll_threshold) {
            return invalid(format!("scroll threshold {} out of range", self.scroll_threshold));
        }

        let weights = self.weights.as_array();
        if let Some(i) = weights.iter().position(|w| !(*w > 0.0)) {
            return invalid(format!(
                "{} weight must be positive so every kind is reachable",
                PlatformKind::WEIGHTED[i].as_str()
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return invalid(format!("kind weights sum to {sum}, expected 1"));
        }
        Ok(())
    }

    /// Load and validate a JSON tuning file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let tuning: Tuning = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tuning.validate()?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }
}

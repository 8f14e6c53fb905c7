//! Game state and core simulation types
//!
//! Everything a run needs lives in [`GameState`]; restarting rebuilds it in
//! place so nothing from the previous run leaks into the next.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::generator::WorldGenerator;
use super::geometry::{Rect, overlaps};
use super::platform::{Platform, PlatformKind};
use crate::error::ConfigError;
use crate::tuning::Tuning;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Waiting for the first start input (or the network START)
    Start,
    /// Active gameplay
    Playing,
    /// Run ended, waiting for restart
    GameOver,
}

/// Temporary player effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveEffect {
    #[default]
    None,
    /// Next landing bounces with the boost multiplier
    Boosted,
    /// Gravity is overridden until the given tick
    Flying { until_tick: u64 },
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndCause {
    Fell,
    Hazard,
}

/// Things that happened during a tick, for audio/HUD/session hooks
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    RunStarted,
    Landed { platform: u32, kind: PlatformKind },
    Scored { platform: u32, points: u64 },
    PlatformBroken { platform: u32 },
    BoostCharged { charges: u32 },
    BoostArmed,
    FlightStarted { until_tick: u64 },
    FlightEnded,
    Backfilled { platform: u32 },
    RunEnded { cause: EndCause, score: u64 },
}

/// The local player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub rect: Rect,
    /// x: horizontal intent for this tick, y: vertical velocity (positive = falling)
    pub vel: Vec2,
    pub effect: ActiveEffect,
    /// Stored double-jump charges from booster platforms
    pub boost_charges: u32,
    pub score: u64,
}

impl Player {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            vel: Vec2::ZERO,
            effect: ActiveEffect::None,
            boost_charges: 0,
            score: 0,
        }
    }

    /// Random x, vertically centered
    fn spawn(rng: &mut impl Rng, tuning: &Tuning) -> Self {
        let size = tuning.player_size;
        let x = rng.random_range(0.0..=(tuning.view_width - size).max(0.0));
        Self::new(Rect::new(x, tuning.view_height * 0.5, size, size))
    }

    #[inline]
    pub fn is_flying(&self) -> bool {
        matches!(self.effect, ActiveEffect::Flying { .. })
    }
}

/// The scrolling platform field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Platforms in creation order
    pub platforms: Vec<Platform>,
    /// World-space y of the viewport top (decreases as the camera climbs)
    pub viewport_top_y: f32,
    /// Total distance scrolled this run
    pub scroll_accumulated: f32,
}

impl World {
    pub fn new(platforms: Vec<Platform>) -> Self {
        Self {
            platforms,
            viewport_top_y: 0.0,
            scroll_accumulated: 0.0,
        }
    }

    /// Smallest platform y on screen
    pub fn topmost_y(&self) -> Option<f32> {
        self.platforms.iter().map(|p| p.rect.top()).reduce(f32::min)
    }

    /// Is some landable platform within `reach` pixels of `y` (either direction)
    pub fn has_landable_within(&self, y: f32, reach: f32) -> bool {
        self.platforms
            .iter()
            .any(|p| p.kind.is_landable() && (p.rect.top() - y).abs() <= reach)
    }

    /// Move every platform down by `amount` (camera moves up)
    pub fn scroll_by(&mut self, amount: f32) {
        let delta = Vec2::new(0.0, amount);
        for platform in &mut self.platforms {
            platform.rect.translate(delta);
        }
        self.viewport_top_y -= amount;
        self.scroll_accumulated += amount;
    }

    pub fn platform(&self, id: u32) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }
}

/// Complete simulation state for one run (deterministic given seed + inputs)
#[derive(Debug, Clone)]
pub struct GameState {
    /// Seed the RNG was created from
    pub seed: u64,
    pub tuning: Tuning,
    /// Ticks since the current run started
    pub time_ticks: u64,
    pub phase: RunPhase,
    pub player: Player,
    pub world: World,
    pub(crate) generator: WorldGenerator,
    pub(crate) rng: Pcg32,
}

impl GameState {
    /// Create a state in the Start phase with a freshly generated field
    pub fn new(seed: u64, tuning: Tuning) -> Result<Self, ConfigError> {
        tuning.validate()?;
        let generator = WorldGenerator::new(&tuning)?;
        let player = Player::new(Rect::default());

        let mut state = Self {
            seed,
            tuning,
            time_ticks: 0,
            phase: RunPhase::Start,
            player,
            world: World::default(),
            generator,
            rng: Pcg32::seed_from_u64(seed),
        };
        state.build_run();
        Ok(state)
    }

    /// Hard reset: fresh field, fresh player, zero score, Playing
    pub fn restart(&mut self) {
        self.build_run();
        self.phase = RunPhase::Playing;
        log::info!("Run started (seed {}, {} platforms)", self.seed, self.world.platforms.len());
    }

    /// Fresh field and player, back on the start screen
    pub fn reset(&mut self) {
        self.build_run();
        self.phase = RunPhase::Start;
    }

    fn build_run(&mut self) {
        let tuning = &self.tuning;
        self.time_ticks = 0;
        self.player = Player::spawn(&mut self.rng, tuning);

        let mut platforms = self.generator.populate_initial_field(
            &mut self.rng,
            tuning,
            tuning.view_width,
            tuning.view_height,
            tuning.initial_platform_count,
        );

        // Launch pad one row under the player, with a clear fall column above it
        let player = self.player.rect;
        let pad_x = (player.center().x - tuning.platform_width * 0.5)
            .clamp(0.0, (tuning.view_width - tuning.platform_width).max(0.0));
        let pad_y = player.bottom() + tuning.row_spacing();
        let pad = Rect::new(pad_x, pad_y, tuning.platform_width, tuning.platform_height);
        let fall_column = Rect::new(player.x, player.y, player.w, pad.bottom() - player.y);
        platforms.retain(|p| !overlaps(&p.rect, &fall_column) && !overlaps(&p.rect, &pad));
        platforms.push(Platform::new(
            self.generator.next_platform_id(),
            pad,
            PlatformKind::Normal,
        ));

        self.world = World::new(platforms);
    }
}

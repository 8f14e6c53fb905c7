//! Platform catalog
//!
//! Every platform is one record tagged with a [`PlatformKind`]; behavior is
//! looked up in the kind's effect table instead of being spread across types.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Platform types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformKind {
    #[default]
    Normal,
    Moving,
    Breakable,
    Hazard,
    Booster,
    Flight,
}

/// Player effect granted by a platform on landing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grant {
    /// One stored charge that doubles a later bounce once armed
    DoubleJumpCharge,
    /// Upward flight for the configured number of ticks
    TimedFlight,
}

/// Per-kind outcome table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effects {
    /// Multiplier on the base jump strength (0 for kinds that never bounce)
    pub bounce_multiplier: f32,
    pub removed_on_contact: bool,
    pub ends_run: bool,
    pub grants: Option<Grant>,
    /// Points for the first landing on this platform
    pub score: u64,
}

impl PlatformKind {
    /// Kinds the generator draws from the weighted table (movers are placed separately)
    pub const WEIGHTED: [PlatformKind; 5] = [
        PlatformKind::Normal,
        PlatformKind::Breakable,
        PlatformKind::Flight,
        PlatformKind::Booster,
        PlatformKind::Hazard,
    ];

    pub const fn effects(self) -> Effects {
        match self {
            PlatformKind::Normal => Effects {
                bounce_multiplier: 1.0,
                removed_on_contact: false,
                ends_run: false,
                grants: None,
                score: 1,
            },
            PlatformKind::Moving => Effects {
                bounce_multiplier: 1.0,
                removed_on_contact: false,
                ends_run: false,
                grants: None,
                score: 2,
            },
            PlatformKind::Breakable => Effects {
                bounce_multiplier: 1.0,
                removed_on_contact: true,
                ends_run: false,
                grants: None,
                score: 1,
            },
            PlatformKind::Hazard => Effects {
                bounce_multiplier: 0.0,
                removed_on_contact: false,
                ends_run: true,
                grants: None,
                score: 0,
            },
            PlatformKind::Booster => Effects {
                bounce_multiplier: 1.0,
                removed_on_contact: false,
                ends_run: false,
                grants: Some(Grant::DoubleJumpCharge),
                score: 5,
            },
            PlatformKind::Flight => Effects {
                bounce_multiplier: 1.0,
                removed_on_contact: false,
                ends_run: false,
                grants: Some(Grant::TimedFlight),
                score: 10,
            },
        }
    }

    /// Whether the player can bounce off this kind
    #[inline]
    pub const fn is_landable(self) -> bool {
        !self.effects().ends_run
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Normal => "normal",
            PlatformKind::Moving => "moving",
            PlatformKind::Breakable => "breakable",
            PlatformKind::Hazard => "hazard",
            PlatformKind::Booster => "booster",
            PlatformKind::Flight => "flight",
        }
    }
}

/// Horizontal patrol state for moving platforms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// +1 moves right, -1 moves left
    pub direction: f32,
    pub speed: f32,
}

/// A platform entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: u32,
    pub rect: Rect,
    pub kind: PlatformKind,
    pub motion: Option<Motion>,
    /// Broken (breakable) or effect already granted (booster/flight)
    pub consumed: bool,
    /// Already contributed to the score
    pub scored: bool,
}

impl Platform {
    pub fn new(id: u32, rect: Rect, kind: PlatformKind) -> Self {
        Self {
            id,
            rect,
            kind,
            motion: None,
            consumed: false,
            scored: false,
        }
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = Some(motion);
        self
    }

    /// Advance a moving platform one tick, reflecting off the world edges
    pub fn advance(&mut self, world_width: f32) {
        let Some(motion) = self.motion.as_mut() else {
            return;
        };
        self.rect.x += motion.direction * motion.speed;
        if self.rect.left() <= 0.0 {
            self.rect.x = 0.0;
            motion.direction = 1.0;
        } else if self.rect.right() >= world_width {
            self.rect.x = world_width - self.rect.w;
            motion.direction = -1.0;
        }
    }

    /// Should this platform leave the field at the end of the collision pass
    #[inline]
    pub fn is_spent(&self) -> bool {
        self.consumed && self.kind.effects().removed_on_contact
    }
}

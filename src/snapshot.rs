//! Read-only view handed to whatever draws the game

use serde::Serialize;

use crate::sim::{PlatformKind, Rect, RunPhase};

/// One platform as the renderer sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformView {
    pub rect: Rect,
    pub kind: PlatformKind,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub player: Rect,
    /// The other peer's sprite, if one is connected
    pub remote: Option<Rect>,
    pub platforms: Vec<PlatformView>,
    pub score: u64,
    pub high_score: u64,
    pub phase: RunPhase,
    pub boost_charges: u32,
    pub flying: bool,
}

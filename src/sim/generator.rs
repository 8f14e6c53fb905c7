//! Procedural platform placement
//!
//! The field is built from rows of shuffled lane anchors. The initial field is
//! filled top to bottom; afterwards one row at a time is added above the
//! topmost platform as the player climbs, which bounds the work per tick.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::SliceRandom;

use super::geometry::Rect;
use super::platform::{Motion, Platform, PlatformKind};
use crate::error::ConfigError;
use crate::tuning::Tuning;

/// Row-based stochastic platform generator
#[derive(Debug, Clone)]
pub struct WorldGenerator {
    kind_table: WeightedIndex<f64>,
    /// Consecutive rows generated without a landable platform
    rows_since_landable: u32,
    /// Screen y of the highest row generated so far, empty rows included
    frontier_y: Option<f32>,
    next_id: u32,
}

impl WorldGenerator {
    pub fn new(tuning: &Tuning) -> Result<Self, ConfigError> {
        let kind_table = WeightedIndex::new(tuning.weights.as_array())
            .map_err(|e| ConfigError::Invalid(format!("kind weights: {e}")))?;
        Ok(Self {
            kind_table,
            rows_since_landable: 0,
            frontier_y: None,
            next_id: 1,
        })
    }

    /// Allocate a new platform ID
    pub fn next_platform_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Evenly spaced lane x positions across `width`
    pub fn lane_anchors(tuning: &Tuning, width: f32) -> Vec<f32> {
        let step = tuning.lane_spacing();
        let mut anchors = Vec::new();
        let mut x = 0.0;
        while x < width {
            anchors.push(x);
            x += step;
        }
        anchors
    }

    /// Fill rows downward from y = 0 until `target` platforms exist or `height` is reached
    pub fn populate_initial_field(
        &mut self,
        rng: &mut impl Rng,
        tuning: &Tuning,
        width: f32,
        height: f32,
        target: usize,
    ) -> Vec<Platform> {
        let spacing = tuning.row_spacing();
        let mut platforms = Vec::with_capacity(target);
        let mut first_landable_row = None;
        let mut rows = 0u32;

        self.rows_since_landable = 0;
        let mut y = 0.0;
        while y < height && platforms.len() < target {
            let row = self.generate_row(rng, tuning, width, y, target - platforms.len());
            if first_landable_row.is_none() && row.iter().any(|p| p.kind.is_landable()) {
                first_landable_row = Some(rows);
            }
            platforms.extend(row);
            rows += 1;
            y += spacing;
        }

        // Top-up continues above row 0, so the gap it has to bridge is the
        // run of empty rows at the top of the field.
        self.rows_since_landable = first_landable_row.unwrap_or(rows);
        self.frontier_y = (rows > 0).then_some(0.0);

        log::debug!(
            "Initial field: {} platforms in {} rows ({}x{})",
            platforms.len(),
            rows,
            width,
            height
        );
        platforms
    }

    /// Generate one row directly above `current_top_y`
    pub fn top_up_above(
        &mut self,
        rng: &mut impl Rng,
        tuning: &Tuning,
        current_top_y: f32,
        width: f32,
    ) -> Vec<Platform> {
        let y = current_top_y - tuning.row_spacing();
        self.frontier_y = Some(y);
        self.generate_row(rng, tuning, width, y, usize::MAX)
    }

    /// Where the next top-up row is measured from. Unlike the topmost
    /// platform, this advances past rows that came out empty.
    pub fn frontier_y(&self) -> Option<f32> {
        self.frontier_y
    }

    /// Keep the frontier in step with the scrolled field
    pub fn scroll_by(&mut self, amount: f32) {
        if let Some(y) = &mut self.frontier_y {
            *y += amount;
        }
    }

    /// Drop platforms whose top has reached the viewport bottom; returns how many were removed
    pub fn prune_below(platforms: &mut Vec<Platform>, viewport_bottom_y: f32) -> usize {
        let before = platforms.len();
        platforms.retain(|p| p.rect.top() < viewport_bottom_y);
        before - platforms.len()
    }

    /// Emergency platform under the player when the field has run dry
    pub fn backfill_under(&mut self, tuning: &Tuning, player: &Rect) -> Platform {
        let width = tuning.view_width;
        let x = (player.center().x - tuning.platform_width * 0.5)
            .clamp(0.0, (width - tuning.platform_width).max(0.0));
        let y = (player.bottom() + tuning.row_spacing() * 0.5)
            .min(tuning.view_height - tuning.platform_height);
        self.rows_since_landable = 0;
        Platform::new(
            self.next_platform_id(),
            Rect::new(x, y, tuning.platform_width, tuning.platform_height),
            PlatformKind::Normal,
        )
    }

    fn generate_row(
        &mut self,
        rng: &mut impl Rng,
        tuning: &Tuning,
        width: f32,
        y: f32,
        budget: usize,
    ) -> Vec<Platform> {
        let mut row = Vec::new();
        if budget == 0 {
            return row;
        }

        let mut lanes = Self::lane_anchors(tuning, width);
        lanes.shuffle(rng);
        let fallback_lane = lanes.first().copied().unwrap_or(0.0);

        if rng.random_bool(tuning.moving_chance) {
            // A mover owns its whole row
            if let Some(x) = lanes.pop() {
                row.push(self.spawn(rng, tuning, PlatformKind::Moving, x, y, width));
            }
        } else {
            for x in lanes {
                if row.len() >= budget {
                    break;
                }
                if rng.random_bool(tuning.place_chance) {
                    let kind = PlatformKind::WEIGHTED[self.kind_table.sample(rng)];
                    row.push(self.spawn(rng, tuning, kind, x, y, width));
                }
            }
        }

        let landable = row.iter().any(|p| p.kind.is_landable());
        if !landable {
            // Leaving this row unlandable must not push the next landable row out of reach
            let gap_after = (self.rows_since_landable + 2) as f32 * tuning.row_spacing();
            if gap_after > tuning.max_jump_height() {
                match row.first_mut() {
                    Some(p) => p.kind = PlatformKind::Normal,
                    None => {
                        let p = self.spawn(rng, tuning, PlatformKind::Normal, fallback_lane, y, width);
                        row.push(p);
                    }
                }
            }
        }

        if row.iter().any(|p| p.kind.is_landable()) {
            self.rows_since_landable = 0;
        } else {
            self.rows_since_landable += 1;
        }
        row
    }

    fn spawn(
        &mut self,
        rng: &mut impl Rng,
        tuning: &Tuning,
        kind: PlatformKind,
        lane_x: f32,
        y: f32,
        width: f32,
    ) -> Platform {
        let jitter = if tuning.lane_jitter > 0.0 {
            rng.random_range(-tuning.lane_jitter..=tuning.lane_jitter)
        } else {
            0.0
        };
        let x = (lane_x + jitter).clamp(0.0, (width - tuning.platform_width).max(0.0));
        let rect = Rect::new(x, y, tuning.platform_width, tuning.platform_height);
        let platform = Platform::new(self.next_platform_id(), rect, kind);

        if kind == PlatformKind::Moving {
            let direction = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            platform.with_motion(Motion {
                direction,
                speed: tuning.moving_platform_speed,
            })
        } else {
            platform
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::collections::BTreeMap;

    fn rows_by_y(platforms: &[Platform]) -> BTreeMap<i64, Vec<&Platform>> {
        let mut rows: BTreeMap<i64, Vec<&Platform>> = BTreeMap::new();
        for p in platforms {
            rows.entry(p.rect.y.round() as i64).or_default().push(p);
        }
        rows
    }

    #[test]
    fn test_lane_anchors() {
        let tuning = Tuning::default();
        assert_eq!(WorldGenerator::lane_anchors(&tuning, 250.0), vec![0.0, 150.0]);
        assert_eq!(WorldGenerator::lane_anchors(&tuning, 300.0), vec![0.0, 150.0]);
        assert_eq!(WorldGenerator::lane_anchors(&tuning, 301.0), vec![0.0, 150.0, 300.0]);
    }

    #[test]
    fn test_initial_field_scenario() {
        let tuning = Tuning::default();
        for seed in 0..50u64 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut generator = WorldGenerator::new(&tuning).unwrap();
            let platforms = generator.populate_initial_field(&mut rng, &tuning, 250.0, 450.0, 30);

            assert!(!platforms.is_empty(), "seed {seed} produced an empty field");
            assert!(platforms.len() <= 30);

            let rows = rows_by_y(&platforms);
            let ys: Vec<i64> = rows.keys().copied().collect();
            for pair in ys.windows(2) {
                assert!(
                    (pair[1] - pair[0]) as f32 >= tuning.row_spacing(),
                    "seed {seed}: rows {pair:?} closer than row spacing"
                );
            }
            for (y, row) in &rows {
                if row.iter().any(|p| p.kind == PlatformKind::Moving) {
                    assert_eq!(row.len(), 1, "seed {seed}: mover row {y} is shared");
                }
            }
        }
    }

    #[test]
    fn test_platforms_stay_in_bounds() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let mut generator = WorldGenerator::new(&tuning).unwrap();
        let mut platforms = generator.populate_initial_field(&mut rng, &tuning, 250.0, 450.0, 30);
        for _ in 0..200 {
            let top = platforms
                .iter()
                .map(|p| p.rect.y)
                .fold(f32::INFINITY, f32::min);
            platforms.extend(generator.top_up_above(&mut rng, &tuning, top, 250.0));
        }
        for p in &platforms {
            assert!(p.rect.left() >= 0.0 && p.rect.right() <= 250.0, "{:?}", p.rect);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(3);
        let mut generator = WorldGenerator::new(&tuning).unwrap();
        let mut platforms = generator.populate_initial_field(&mut rng, &tuning, 250.0, 450.0, 30);
        platforms.extend(generator.top_up_above(&mut rng, &tuning, 0.0, 250.0));
        let mut ids: Vec<u32> = platforms.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), platforms.len());
    }

    #[test]
    fn test_landable_rows_stay_within_reach() {
        // Hazard-heavy weights make unlandable rows common
        let mut tuning = Tuning::default();
        tuning.weights.normal = 0.05;
        tuning.weights.hazard = 0.70;
        let reach = tuning.max_jump_height();

        let mut rng = Pcg32::seed_from_u64(11);
        let mut generator = WorldGenerator::new(&tuning).unwrap();
        let mut top = 0.0;
        let mut last_landable = 0.0;
        for _ in 0..500 {
            let row = generator.top_up_above(&mut rng, &tuning, top, 250.0);
            top -= tuning.row_spacing();
            if row.iter().any(|p| p.kind.is_landable()) {
                assert!(last_landable - top <= reach);
                last_landable = top;
            }
        }
    }

    #[test]
    fn test_frontier_advances_past_empty_rows() {
        // Only the reachability guard ever places a platform
        let mut tuning = Tuning::default();
        tuning.place_chance = 0.0;
        tuning.moving_chance = 0.0;
        let reach = tuning.max_jump_height();

        let mut rng = Pcg32::seed_from_u64(21);
        let mut generator = WorldGenerator::new(&tuning).unwrap();
        let mut platforms = generator.populate_initial_field(&mut rng, &tuning, 250.0, 450.0, 30);
        assert_eq!(generator.frontier_y(), Some(0.0));

        for p in &mut platforms {
            p.rect.y += 30.0;
        }
        generator.scroll_by(30.0);
        assert_eq!(generator.frontier_y(), Some(30.0));

        let mut empty_rows = 0;
        for _ in 0..20 {
            let frontier = generator.frontier_y().unwrap();
            let row = generator.top_up_above(&mut rng, &tuning, frontier, 250.0);
            assert_eq!(generator.frontier_y(), Some(frontier - tuning.row_spacing()));
            if row.is_empty() {
                empty_rows += 1;
            }
            platforms.extend(row);
        }
        assert!(empty_rows > 0);

        let mut tops: Vec<f32> = platforms
            .iter()
            .filter(|p| p.kind.is_landable())
            .map(|p| p.rect.top())
            .collect();
        tops.sort_by(f32::total_cmp);
        for pair in tops.windows(2) {
            assert!(pair[1] - pair[0] <= reach, "landable gap {pair:?}");
        }
    }

    #[test]
    fn test_target_count_is_respected() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(5);
        let mut generator = WorldGenerator::new(&tuning).unwrap();
        let platforms = generator.populate_initial_field(&mut rng, &tuning, 1000.0, 2000.0, 4);
        assert!(platforms.len() <= 4);
        assert!(!platforms.is_empty());
    }

    #[test]
    fn test_prune_below() {
        let mut platforms = vec![
            Platform::new(1, Rect::new(0.0, 100.0, 50.0, 12.0), PlatformKind::Normal),
            Platform::new(2, Rect::new(0.0, 449.0, 50.0, 12.0), PlatformKind::Normal),
            Platform::new(3, Rect::new(0.0, 450.0, 50.0, 12.0), PlatformKind::Normal),
        ];
        let removed = WorldGenerator::prune_below(&mut platforms, 450.0);
        assert_eq!(removed, 1);
        assert_eq!(platforms.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_backfill_lands_under_player() {
        let tuning = Tuning::default();
        let mut generator = WorldGenerator::new(&tuning).unwrap();
        let player = Rect::new(100.0, 200.0, 15.0, 15.0);
        let pad = generator.backfill_under(&tuning, &player);
        assert_eq!(pad.kind, PlatformKind::Normal);
        assert!(pad.rect.top() > player.bottom());
        assert!(pad.rect.left() <= player.left() && pad.rect.right() >= player.right());
        assert!(pad.rect.top() - player.bottom() <= tuning.max_jump_height());
    }
}

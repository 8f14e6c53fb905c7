//! Fixed timestep simulation tick
//!
//! One call advances the run by exactly one frame. Order inside a Playing
//! tick: boost arming, horizontal intent, vertical integration, collision
//! scan, scroll, top-up/prune, termination.

use super::generator::WorldGenerator;
use super::geometry::overlaps;
use super::platform::{Grant, Platform};
use super::state::{ActiveEffect, EndCause, GameEvent, GameState, Player, RunPhase};
use crate::tuning::Tuning;

/// Input intent for a single tick (deterministic)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickInput {
    pub move_left: bool,
    pub move_right: bool,
    /// Arm a stored booster charge for the next landing
    pub jump_boost_requested: bool,
    /// Start from the title screen or restart after game over
    pub restart_requested: bool,
    /// Idle/demo mode - the tick steers the player itself
    pub idle_mode: bool,
}

/// Advance the game state by one tick
pub fn tick(state: &mut GameState, input: &TickInput) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let mut input = input.clone();
    if input.idle_mode {
        autopilot(state, &mut input);
    }
    let input = &input;

    match state.phase {
        RunPhase::Start | RunPhase::GameOver => {
            if input.restart_requested {
                state.restart();
                events.push(GameEvent::RunStarted);
            }
            return events;
        }
        RunPhase::Playing => {}
    }

    state.time_ticks += 1;

    arm_boost(&mut state.player, input, &mut events);
    apply_horizontal_intent(&mut state.player, &state.tuning, input);
    let falling = integrate_vertical(state, &mut events);
    let hazard_hit = resolve_collisions(state, falling, &mut events);
    apply_scroll(state);
    replenish(state, &mut events);

    let cause = if hazard_hit {
        Some(EndCause::Hazard)
    } else if state.player.rect.top() > state.tuning.view_height {
        Some(EndCause::Fell)
    } else {
        None
    };
    if let Some(cause) = cause {
        state.phase = RunPhase::GameOver;
        log::info!(
            "Run ended ({:?}) after {} ticks, score {}",
            cause,
            state.time_ticks,
            state.player.score
        );
        events.push(GameEvent::RunEnded {
            cause,
            score: state.player.score,
        });
    }

    events
}

fn arm_boost(player: &mut Player, input: &TickInput, events: &mut Vec<GameEvent>) {
    if input.jump_boost_requested && player.boost_charges > 0 && player.effect == ActiveEffect::None
    {
        player.boost_charges -= 1;
        player.effect = ActiveEffect::Boosted;
        events.push(GameEvent::BoostArmed);
    }
}

/// Instantaneous horizontal movement with wrap-around on the rect center
fn apply_horizontal_intent(player: &mut Player, tuning: &Tuning, input: &TickInput) {
    let direction = input.move_right as i32 - input.move_left as i32;
    player.vel.x = direction as f32 * tuning.horizontal_speed;
    player.rect.x += player.vel.x;

    let center = player.rect.center().x;
    if center < 0.0 {
        player.rect.x += tuning.view_width;
    } else if center >= tuning.view_width {
        player.rect.x -= tuning.view_width;
    }
}

/// Flight or semi-implicit Euler. Returns whether the player counts as falling
/// for landing purposes this tick.
fn integrate_vertical(state: &mut GameState, events: &mut Vec<GameEvent>) -> bool {
    let tuning = &state.tuning;
    let player = &mut state.player;
    let entering = player.vel.y;

    if let ActiveEffect::Flying { until_tick } = player.effect {
        if state.time_ticks < until_tick {
            player.rect.y -= tuning.flight_speed;
            return false;
        }
        player.effect = ActiveEffect::None;
        player.vel.y = tuning.gravity;
        events.push(GameEvent::FlightEnded);
    }

    player.vel.y += tuning.gravity;
    player.rect.y += player.vel.y;

    // Only a descent that was already under way may land; a player at the
    // apex this tick lands on the next one.
    entering > 0.0 && player.vel.y > 0.0
}

/// Advance movers and resolve every overlap in platform order.
/// Returns true if a hazard was touched.
fn resolve_collisions(state: &mut GameState, falling: bool, events: &mut Vec<GameEvent>) -> bool {
    let now = state.time_ticks;
    let tuning = &state.tuning;
    let player = &mut state.player;
    // Every platform is tested against the post-integration body; the snap
    // from a landing is applied only once the scan is done.
    let body = player.rect;
    let boosted = player.effect == ActiveEffect::Boosted;
    let mut hazard_hit = false;
    let mut landing: Option<(f32, f32)> = None;

    for platform in state.world.platforms.iter_mut() {
        platform.advance(tuning.view_width);

        if !overlaps(&body, &platform.rect) {
            continue;
        }

        let effects = platform.kind.effects();
        if effects.ends_run {
            hazard_hit = true;
            continue;
        }
        if !falling {
            continue;
        }

        let mut strength = tuning.jump_strength * effects.bounce_multiplier;
        if boosted {
            strength *= tuning.boost_multiplier;
        }
        // Last landing wins
        landing = Some((platform.rect.top(), -strength));
        events.push(GameEvent::Landed {
            platform: platform.id,
            kind: platform.kind,
        });

        if !platform.scored {
            platform.scored = true;
            player.score += effects.score;
            events.push(GameEvent::Scored {
                platform: platform.id,
                points: effects.score,
            });
        }

        if effects.removed_on_contact {
            platform.consumed = true;
            events.push(GameEvent::PlatformBroken {
                platform: platform.id,
            });
        }

        if let Some(grant) = effects.grants {
            if !platform.consumed {
                platform.consumed = true;
                match grant {
                    Grant::DoubleJumpCharge => {
                        player.boost_charges += 1;
                        events.push(GameEvent::BoostCharged {
                            charges: player.boost_charges,
                        });
                    }
                    Grant::TimedFlight => {
                        let until_tick = now + tuning.flight_duration_ticks;
                        player.effect = ActiveEffect::Flying { until_tick };
                        events.push(GameEvent::FlightStarted { until_tick });
                    }
                }
            }
        }
    }

    if let Some((top, vel_y)) = landing {
        player.rect.set_bottom(top);
        player.vel.y = vel_y;
        if boosted && player.effect == ActiveEffect::Boosted {
            player.effect = ActiveEffect::None;
        }
    }

    state.world.platforms.retain(|p| !p.is_spent());
    hazard_hit
}

/// Pin a climbing player to the scroll line and move the world instead
fn apply_scroll(state: &mut GameState) {
    let line = state.tuning.scroll_line();
    if state.player.rect.y < line {
        let amount = line - state.player.rect.y;
        state.player.rect.y = line;
        state.world.scroll_by(amount);
        state.generator.scroll_by(amount);
    }
}

/// Top up one row if the player is close to the generation frontier, prune
/// what scrolled off, and backfill if nothing landable is left within reach.
fn replenish(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let tuning = &state.tuning;

    let frontier = state.generator.frontier_y().or_else(|| state.world.topmost_y());
    if let Some(top) = frontier {
        if state.player.rect.y < top + tuning.top_up_gap {
            let row = state
                .generator
                .top_up_above(&mut state.rng, tuning, top, tuning.view_width);
            state.world.platforms.extend(row);
        }
    }

    WorldGenerator::prune_below(&mut state.world.platforms, tuning.view_height);

    if !state
        .world
        .has_landable_within(state.player.rect.y, tuning.max_jump_height())
    {
        let pad = state.generator.backfill_under(tuning, &state.player.rect);
        log::warn!(
            "No landable platform within reach at tick {}; backfilled platform {} at y={}",
            state.time_ticks,
            pad.id,
            pad.rect.y
        );
        events.push(GameEvent::Backfilled { platform: pad.id });
        state.world.platforms.push(pad);
    }
}

/// Demo AI: start/restart automatically and steer toward the highest landable
/// platform the player can still reach.
fn autopilot(state: &GameState, input: &mut TickInput) {
    if state.phase != RunPhase::Playing {
        input.restart_requested = true;
        return;
    }

    let player = &state.player;
    let tuning = &state.tuning;
    if player.boost_charges > 0 && player.effect == ActiveEffect::None {
        input.jump_boost_requested = true;
    }

    let feet = player.rect.bottom();
    let rise = if player.vel.y < 0.0 {
        player.vel.y * player.vel.y / (2.0 * tuning.gravity)
    } else {
        0.0
    };
    let apex = feet - rise;
    let center = player.rect.center().x;

    let target = state
        .world
        .platforms
        .iter()
        .filter(|p| p.kind.is_landable())
        .filter(|p| p.rect.top() >= apex + 2.0 && p.rect.top() < tuning.view_height)
        .min_by(|a, b| {
            let score = |p: &Platform| p.rect.top() + 0.3 * (p.rect.center().x - center).abs();
            score(a).total_cmp(&score(b))
        });

    input.move_left = false;
    input.move_right = false;
    if let Some(platform) = target {
        let dx = platform.rect.center().x - center;
        if dx > 2.0 {
            input.move_right = true;
        } else if dx < -2.0 {
            input.move_left = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geometry::Rect;
    use crate::sim::platform::PlatformKind;
    use crate::sim::state::World;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn playing_state(platforms: Vec<Platform>, player: Rect, vy: f32) -> GameState {
        let mut state = GameState::new(1, Tuning::default()).unwrap();
        state.restart();
        state.world = World::new(platforms);
        state.player = Player::new(player);
        state.player.vel.y = vy;
        state
    }

    fn scenario_player() -> Rect {
        Rect::new(100.0, 200.0, 15.0, 15.0)
    }

    fn platform(id: u32, kind: PlatformKind, rect: Rect) -> Platform {
        Platform::new(id, rect, kind)
    }

    #[test]
    fn test_start_to_playing() {
        let mut state = GameState::new(12345, Tuning::default()).unwrap();
        assert_eq!(state.phase, RunPhase::Start);

        let events = tick(&mut state, &TickInput::default());
        assert!(events.is_empty());
        assert_eq!(state.phase, RunPhase::Start);

        let start = TickInput {
            restart_requested: true,
            ..Default::default()
        };
        let events = tick(&mut state, &start);
        assert_eq!(events, vec![GameEvent::RunStarted]);
        assert_eq!(state.phase, RunPhase::Playing);
    }

    #[test]
    fn test_landing_scenario() {
        let normal = platform(500, PlatformKind::Normal, Rect::new(90.0, 210.0, 35.0, 5.0));
        let mut state = playing_state(vec![normal], scenario_player(), 5.0);

        let events = tick(&mut state, &TickInput::default());

        assert_eq!(state.player.rect.bottom(), 210.0);
        assert_eq!(state.player.vel.y, -state.tuning.jump_strength);
        assert_eq!(state.player.score, 1);
        assert!(events.contains(&GameEvent::Landed {
            platform: 500,
            kind: PlatformKind::Normal
        }));
        assert_eq!(state.phase, RunPhase::Playing);
    }

    #[test]
    fn test_hazard_wins_over_simultaneous_bounce() {
        let normal = platform(1, PlatformKind::Normal, Rect::new(90.0, 212.0, 35.0, 5.0));
        let hazard = platform(2, PlatformKind::Hazard, Rect::new(90.0, 210.0, 35.0, 5.0));

        for platforms in [vec![normal.clone(), hazard.clone()], vec![hazard, normal]] {
            let mut state = playing_state(platforms, scenario_player(), 5.0);
            let events = tick(&mut state, &TickInput::default());
            assert_eq!(state.phase, RunPhase::GameOver);
            assert!(events.iter().any(|e| matches!(
                e,
                GameEvent::RunEnded {
                    cause: EndCause::Hazard,
                    ..
                }
            )));
        }
    }

    #[test]
    fn test_hazard_below_landing_platform_still_ends_run() {
        let normal = platform(1, PlatformKind::Normal, Rect::new(90.0, 210.0, 35.0, 5.0));
        let hazard = platform(2, PlatformKind::Hazard, Rect::new(90.0, 216.0, 35.0, 5.0));

        for platforms in [vec![normal.clone(), hazard.clone()], vec![hazard, normal]] {
            let mut state = playing_state(platforms, scenario_player(), 5.0);
            let events = tick(&mut state, &TickInput::default());
            assert_eq!(state.phase, RunPhase::GameOver);
            assert!(events.contains(&GameEvent::RunEnded {
                cause: EndCause::Hazard,
                score: state.player.score
            }));
        }
    }

    #[test]
    fn test_breakable_below_landing_platform_still_breaks() {
        let normal = platform(1, PlatformKind::Normal, Rect::new(90.0, 210.0, 35.0, 5.0));
        let breakable = platform(2, PlatformKind::Breakable, Rect::new(90.0, 216.0, 35.0, 5.0));

        for platforms in [vec![normal.clone(), breakable.clone()], vec![breakable, normal]] {
            let last_top = platforms[1].rect.top();
            let mut state = playing_state(platforms, scenario_player(), 5.0);
            let events = tick(&mut state, &TickInput::default());

            assert!(events.contains(&GameEvent::PlatformBroken { platform: 2 }));
            assert!(state.world.platform(2).is_none());
            assert!(state.world.platform(1).is_some());
            assert_eq!(state.player.score, 2);
            // Last landing in platform order decides the snap
            assert_eq!(state.player.rect.bottom(), last_top);
            assert_eq!(state.player.vel.y, -state.tuning.jump_strength);
        }
    }

    #[test]
    fn test_hazard_ends_run_while_rising() {
        let hazard = platform(2, PlatformKind::Hazard, Rect::new(90.0, 195.0, 35.0, 5.0));
        let mut state = playing_state(vec![hazard], scenario_player(), -5.0);
        tick(&mut state, &TickInput::default());
        assert_eq!(state.phase, RunPhase::GameOver);
    }

    #[test]
    fn test_breakable_is_gone_next_tick() {
        let breakable = platform(7, PlatformKind::Breakable, Rect::new(90.0, 210.0, 35.0, 5.0));
        let mut state = playing_state(vec![breakable], scenario_player(), 5.0);

        let events = tick(&mut state, &TickInput::default());
        assert!(events.contains(&GameEvent::PlatformBroken { platform: 7 }));
        assert_eq!(state.player.vel.y, -state.tuning.jump_strength);
        assert!(state.world.platform(7).is_none());

        tick(&mut state, &TickInput::default());
        assert!(state.world.platform(7).is_none());
    }

    #[test]
    fn test_booster_charge_doubles_next_landing() {
        let booster = platform(3, PlatformKind::Booster, Rect::new(90.0, 210.0, 35.0, 5.0));
        let mut state = playing_state(vec![booster], scenario_player(), 5.0);

        tick(&mut state, &TickInput::default());
        let jump = state.tuning.jump_strength;
        // The granting landing itself is a normal bounce
        assert_eq!(state.player.vel.y, -jump);
        assert_eq!(state.player.boost_charges, 1);
        assert_eq!(state.player.score, 5);

        // Falling onto a plain platform with the charge armed
        let normal = platform(4, PlatformKind::Normal, Rect::new(90.0, 210.0, 35.0, 5.0));
        state.world = World::new(vec![normal]);
        state.player.rect = scenario_player();
        state.player.vel.y = 5.0;
        let boost = TickInput {
            jump_boost_requested: true,
            ..Default::default()
        };
        let events = tick(&mut state, &boost);
        assert!(events.contains(&GameEvent::BoostArmed));
        assert_eq!(state.player.vel.y, -jump * state.tuning.boost_multiplier);
        assert_eq!(state.player.boost_charges, 0);
        assert_eq!(state.player.effect, ActiveEffect::None);
    }

    #[test]
    fn test_booster_grants_once() {
        let booster = platform(3, PlatformKind::Booster, Rect::new(90.0, 210.0, 35.0, 5.0));
        let mut state = playing_state(vec![booster], scenario_player(), 5.0);
        tick(&mut state, &TickInput::default());

        state.player.rect = scenario_player();
        state.player.vel.y = 5.0;
        tick(&mut state, &TickInput::default());
        assert_eq!(state.player.boost_charges, 1);
        assert_eq!(state.player.score, 5);
    }

    #[test]
    fn test_flight_overrides_gravity_until_expiry() {
        let flight = platform(9, PlatformKind::Flight, Rect::new(90.0, 210.0, 35.0, 5.0));
        let mut state = playing_state(vec![flight], scenario_player(), 5.0);

        let events = tick(&mut state, &TickInput::default());
        let until = state.time_ticks + state.tuning.flight_duration_ticks;
        assert!(events.contains(&GameEvent::FlightStarted { until_tick: until }));
        assert_eq!(state.player.effect, ActiveEffect::Flying { until_tick: until });
        assert_eq!(state.player.score, 10);

        let y = state.player.rect.y;
        tick(&mut state, &TickInput::default());
        assert_eq!(state.player.rect.y, y - state.tuning.flight_speed);

        state.time_ticks = until;
        let events = tick(&mut state, &TickInput::default());
        assert!(events.contains(&GameEvent::FlightEnded));
        assert_eq!(state.player.effect, ActiveEffect::None);
        assert_eq!(state.player.vel.y, 2.0 * state.tuning.gravity);
    }

    #[test]
    fn test_horizontal_wraparound() {
        let mut state = playing_state(Vec::new(), Rect::new(-6.0, 300.0, 15.0, 15.0), 0.0);
        let left = TickInput {
            move_left: true,
            ..Default::default()
        };
        tick(&mut state, &left);
        assert_eq!(state.player.rect.x, 241.0);

        let right = TickInput {
            move_right: true,
            ..Default::default()
        };
        state.player.rect.x = 240.0;
        tick(&mut state, &right);
        assert_eq!(state.player.rect.x, -7.0);
    }

    #[test]
    fn test_falling_off_screen_ends_run() {
        let mut state = playing_state(Vec::new(), Rect::new(100.0, 449.0, 15.0, 15.0), 5.0);
        let events = tick(&mut state, &TickInput::default());
        assert_eq!(state.phase, RunPhase::GameOver);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::RunEnded {
                cause: EndCause::Fell,
                ..
            }
        )));
    }

    #[test]
    fn test_empty_field_is_backfilled() {
        let mut state = playing_state(Vec::new(), scenario_player(), 0.0);
        let events = tick(&mut state, &TickInput::default());
        assert!(events.iter().any(|e| matches!(e, GameEvent::Backfilled { .. })));
        let reach = state.tuning.max_jump_height();
        assert!(state.world.has_landable_within(state.player.rect.y, reach));
    }

    #[test]
    fn test_out_of_reach_field_is_backfilled() {
        // Landable, but far above anything the player can reach
        let distant = platform(1, PlatformKind::Normal, Rect::new(90.0, -150.0, 35.0, 5.0));
        let hazard = platform(2, PlatformKind::Hazard, Rect::new(0.0, 260.0, 35.0, 5.0));
        let mut state = playing_state(vec![distant, hazard], Rect::new(150.0, 300.0, 15.0, 15.0), 0.0);

        let events = tick(&mut state, &TickInput::default());
        assert!(events.iter().any(|e| matches!(e, GameEvent::Backfilled { .. })));
        let reach = state.tuning.max_jump_height();
        assert!(state.world.has_landable_within(state.player.rect.y, reach));
    }

    #[test]
    fn test_moving_platform_advances_each_tick() {
        use crate::sim::platform::Motion;
        let mover = platform(5, PlatformKind::Moving, Rect::new(100.0, 400.0, 50.0, 12.0))
            .with_motion(Motion {
                direction: 1.0,
                speed: 2.0,
            });
        let mut state = playing_state(vec![mover], scenario_player(), 0.0);
        tick(&mut state, &TickInput::default());
        assert_eq!(state.world.platform(5).map(|p| p.rect.x), Some(102.0));
    }

    #[test]
    fn test_restart_after_game_over() {
        let hazard = platform(2, PlatformKind::Hazard, Rect::new(90.0, 210.0, 35.0, 5.0));
        let mut state = playing_state(vec![hazard], scenario_player(), 5.0);
        state.player.score = 30;
        tick(&mut state, &TickInput::default());
        assert_eq!(state.phase, RunPhase::GameOver);

        // Stays over without input
        tick(&mut state, &TickInput::default());
        assert_eq!(state.phase, RunPhase::GameOver);

        let restart = TickInput {
            restart_requested: true,
            ..Default::default()
        };
        tick(&mut state, &restart);
        assert_eq!(state.phase, RunPhase::Playing);
        assert_eq!(state.player.score, 0);
        assert!(state.world.platform(2).is_none());
    }

    #[test]
    fn test_determinism() {
        let mut state1 = GameState::new(99999, Tuning::default()).unwrap();
        let mut state2 = GameState::new(99999, Tuning::default()).unwrap();
        let input = TickInput {
            idle_mode: true,
            ..Default::default()
        };

        for _ in 0..500 {
            tick(&mut state1, &input);
            tick(&mut state2, &input);
        }

        assert_eq!(state1.time_ticks, state2.time_ticks);
        assert_eq!(state1.player, state2.player);
        assert_eq!(state1.world, state2.world);
    }

    fn input_strategy() -> impl Strategy<Value = TickInput> {
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(l, r, b)| TickInput {
            move_left: l,
            move_right: r,
            jump_boost_requested: b,
            ..Default::default()
        })
    }

    proptest! {
        #[test]
        fn no_landing_while_rising(vy in -20.0f32..=0.0, dy in 0.0f32..10.0) {
            let normal = platform(1, PlatformKind::Normal, Rect::new(90.0, 200.0 + dy, 35.0, 5.0));
            let mut state = playing_state(vec![normal], scenario_player(), vy);
            let events = tick(&mut state, &TickInput::default());
            let landed = events.iter().any(|e| matches!(e, GameEvent::Landed { .. }));
            prop_assert!(!landed);
            prop_assert_eq!(state.player.score, 0);
        }

        #[test]
        fn player_never_above_scroll_line(
            seed in any::<u64>(),
            inputs in prop::collection::vec(input_strategy(), 1..300),
        ) {
            let mut state = GameState::new(seed, Tuning::default()).unwrap();
            state.restart();
            let line = state.tuning.scroll_line();
            for input in &inputs {
                tick(&mut state, input);
                if state.phase != RunPhase::Playing {
                    break;
                }
                prop_assert!(state.player.rect.y >= line);
            }
        }

        #[test]
        fn score_is_monotonic_and_scored_once(seed in any::<u64>()) {
            let mut state = GameState::new(seed, Tuning::default()).unwrap();
            state.restart();
            let input = TickInput { idle_mode: true, ..Default::default() };
            let mut scored = HashSet::new();
            let mut last_score = 0;
            let mut total = 0;

            for _ in 0..600 {
                let events = tick(&mut state, &input);
                for event in &events {
                    if let GameEvent::Scored { platform, points } = event {
                        prop_assert!(scored.insert(*platform), "platform {} scored twice", platform);
                        total += points;
                    }
                }
                if events.iter().any(|e| matches!(e, GameEvent::RunEnded { .. })) {
                    prop_assert_eq!(state.player.score, total);
                    break;
                }
                prop_assert!(state.player.score >= last_score);
                prop_assert_eq!(state.player.score, total);
                last_score = state.player.score;
            }
        }

        #[test]
        fn field_never_starves(seed in any::<u64>()) {
            let mut state = GameState::new(seed, Tuning::default()).unwrap();
            state.restart();
            let input = TickInput { idle_mode: true, ..Default::default() };
            let reach = state.tuning.max_jump_height();

            for _ in 0..600 {
                tick(&mut state, &input);
                if state.phase != RunPhase::Playing {
                    break;
                }
                let y = state.player.rect.y;
                prop_assert!(
                    state.world.has_landable_within(y, reach),
                    "no landable platform within reach of y={}", y
                );
            }
        }
    }
}

//! Game session
//!
//! Owns the run, the best score and the optional relay link. Each `step`
//! applies whatever the relay sent since the last frame, advances the
//! simulation one tick, persists a new best score and reports the local
//! position back to the relay.

use crate::consts::MAX_INBOUND_PER_TICK;
use crate::error::ConfigError;
use crate::highscores::HighScoreStore;
use crate::net::{LinkEvent, Message, PeerId, PeerLink};
use crate::sim::{GameEvent, GameState, Rect, RunPhase, TickInput, tick};
use crate::snapshot::{PlatformView, RenderSnapshot};
use crate::tuning::Tuning;

/// The other peer's sprite. Drawn, never simulated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemotePlayer {
    pub peer: PeerId,
    pub rect: Rect,
}

pub struct Session {
    pub state: GameState,
    high_score: u64,
    store: Box<dyn HighScoreStore>,
    remote: Option<RemotePlayer>,
    link: Option<PeerLink>,
    local_peer: Option<PeerId>,
    /// Last position reported to the relay, in whole pixels
    last_sent: Option<(i32, i32)>,
}

impl Session {
    pub fn new(seed: u64, tuning: Tuning, store: Box<dyn HighScoreStore>) -> Result<Self, ConfigError> {
        let state = GameState::new(seed, tuning)?;
        let high_score = store.load();
        Ok(Self {
            state,
            high_score,
            store,
            remote: None,
            link: None,
            local_peer: None,
            last_sent: None,
        })
    }

    /// Attach a relay link. The run then waits for START instead of local input.
    pub fn with_link(mut self, link: PeerLink) -> Self {
        self.link = Some(link);
        self
    }

    pub fn high_score(&self) -> u64 {
        self.high_score
    }

    pub fn remote(&self) -> Option<&RemotePlayer> {
        self.remote.as_ref()
    }

    pub fn local_peer(&self) -> Option<PeerId> {
        self.local_peer
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Back to the start screen with a fresh field. Keeps the best score and link.
    pub fn reset(&mut self) {
        self.state.reset();
        self.last_sent = None;
    }

    /// Advance one frame
    pub fn step(&mut self, input: &TickInput) -> Vec<GameEvent> {
        self.apply_inbound();

        let mut input = input.clone();
        if self.link.is_some() && self.state.phase == RunPhase::Start {
            // Networked runs start together on START
            input.restart_requested = false;
            input.idle_mode = false;
        }

        let events = tick(&mut self.state, &input);
        for event in &events {
            if let GameEvent::RunEnded { score, .. } = *event {
                self.record_score(score);
            }
        }

        self.report_position();
        events
    }

    fn apply_inbound(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        let mut closed = false;
        for event in link.poll(MAX_INBOUND_PER_TICK) {
            match event {
                LinkEvent::Message(message) => self.apply_message(message),
                LinkEvent::Closed => closed = true,
            }
        }
        if closed {
            log::info!("Relay connection closed, continuing offline");
            self.link = None;
            self.remote = None;
        }
    }

    fn apply_message(&mut self, message: Message) {
        match message {
            Message::Init { peer, .. } => {
                log::info!("Joined relay as peer {peer}");
                self.local_peer = Some(peer);
            }
            Message::Connected(who) => log::debug!("Peer {who} connected"),
            Message::Start => {
                if self.state.phase == RunPhase::Start {
                    self.state.restart();
                }
            }
            Message::Update { peer, x, y } => {
                if Some(peer) == self.local_peer {
                    return;
                }
                let size = self.state.tuning.player_size;
                self.remote = Some(RemotePlayer {
                    peer,
                    rect: Rect::new(x, y, size, size),
                });
            }
            Message::Left { peer } => {
                if self.remote.is_some_and(|r| r.peer == peer) {
                    log::info!("Peer {peer} left");
                    self.remote = None;
                }
            }
            Message::Move { .. } => log::debug!("Ignoring MOVE from relay"),
        }
    }

    fn record_score(&mut self, score: u64) {
        if score <= self.high_score {
            return;
        }
        log::info!("New high score {score} (was {})", self.high_score);
        self.high_score = score;
        if let Err(e) = self.store.save(score) {
            log::warn!("High score not saved: {e}");
        }
    }

    fn report_position(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        let rect = self.state.player.rect;
        let pixel = (rect.x.round() as i32, rect.y.round() as i32);
        if self.last_sent == Some(pixel) {
            return;
        }
        if link.send(Message::moved_to(rect.x, rect.y)) {
            self.last_sent = Some(pixel);
        }
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        let player = &self.state.player;
        RenderSnapshot {
            player: player.rect,
            remote: self.remote.map(|r| r.rect),
            platforms: self
                .state
                .world
                .platforms
                .iter()
                .map(|p| PlatformView {
                    rect: p.rect,
                    kind: p.kind,
                })
                .collect(),
            score: player.score,
            high_score: self.high_score.max(player.score),
            phase: self.state.phase,
            boost_charges: player.boost_charges,
            flying: player.is_flying(),
        }
    }
}

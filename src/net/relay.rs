//! Non-authoritative position relay
//!
//! Architecture:
//!   accept thread ─┐
//!   reader thread ─┼─> RelayEvent channel ─> relay loop (owns Roster)
//!   reader thread ─┘                              │ try_send
//!                                                 └─> per-peer queue ─> writer thread
//!
//! Only the relay loop touches the roster, so no locks are needed. It never
//! writes to a socket itself: a peer that stops reading fills its own queue
//! and loses lines, nobody else waits on it.
//!
//! The relay runs no physics: it assigns slots, announces roster changes and
//! forwards each peer's `MOVE` to everyone else as `UPDATE`.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use glam::Vec2;
use log::{debug, info, warn};

use super::protocol::{LineReader, Message, PeerId};
use crate::error::NetError;

/// Events queued from the accept/reader threads to the relay loop
const RELAY_QUEUE: usize = 1024;
/// Lines queued per peer before further ones are dropped
const PEER_QUEUE: usize = 64;
/// A peer that cannot take a line within this long is dropped
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Peers required for START; further connections are refused
    pub max_peers: usize,
    /// Disconnect peers that send nothing for this long
    pub idle_timeout: Option<Duration>,
    /// Spawn position per slot, sent in INIT
    pub spawn_points: Vec<Vec2>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_peers: 2,
            idle_timeout: Some(Duration::from_secs(300)),
            spawn_points: vec![Vec2::new(100.0, 300.0), Vec2::new(150.0, 300.0)],
        }
    }
}

/// A message addressed to one peer
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: PeerId,
    pub message: Message,
}

/// Connected peers and their last known positions
///
/// Pure bookkeeping: every operation returns the messages to send instead of
/// sending them, so the fan-out rules are testable without sockets.
#[derive(Debug, Clone)]
pub struct Roster {
    max_peers: usize,
    spawn_points: Vec<Vec2>,
    peers: BTreeMap<PeerId, Vec2>,
}

impl Roster {
    pub fn new(max_peers: usize, spawn_points: Vec<Vec2>) -> Self {
        Self {
            max_peers,
            spawn_points,
            peers: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.peers.len() >= self.max_peers
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    /// Last position reported by (or assigned to) a peer
    pub fn position(&self, peer: PeerId) -> Option<Vec2> {
        self.peers.get(&peer).copied()
    }

    fn spawn_point(&self, peer: PeerId) -> Vec2 {
        self.spawn_points
            .get(peer as usize)
            .or(self.spawn_points.last())
            .copied()
            .unwrap_or(Vec2::ZERO)
    }

    fn to_all(&self, message: &Message) -> impl Iterator<Item = Outbound> + '_ {
        let message = message.clone();
        self.peers.keys().map(move |&to| Outbound {
            to,
            message: message.clone(),
        })
    }

    /// Admit a new peer into the lowest free slot. `None` when full.
    pub fn join(&mut self) -> Option<(PeerId, Vec<Outbound>)> {
        if self.is_full() {
            return None;
        }
        let peer = (0..).find(|id| !self.peers.contains_key(id))?;
        let spawn = self.spawn_point(peer);
        self.peers.insert(peer, spawn);

        let mut out: Vec<Outbound> = self.to_all(&Message::Connected(peer.to_string())).collect();
        out.push(Outbound {
            to: peer,
            message: Message::Init {
                peer,
                x: spawn.x,
                y: spawn.y,
            },
        });
        if self.is_full() {
            out.extend(self.to_all(&Message::Start));
        }
        Some((peer, out))
    }

    /// Handle a message from a peer. Only `MOVE` is meaningful from peers.
    pub fn receive(&mut self, from: PeerId, message: Message) -> Vec<Outbound> {
        match message {
            Message::Move { x, y } if self.contains(from) => {
                self.peers.insert(from, Vec2::new(x, y));
                let update = Message::Update { peer: from, x, y };
                self.peers
                    .keys()
                    .filter(|&&to| to != from)
                    .map(|&to| Outbound {
                        to,
                        message: update.clone(),
                    })
                    .collect()
            }
            other => {
                debug!("Ignoring {other} from peer {from}");
                Vec::new()
            }
        }
    }

    /// Remove a peer and tell the others
    pub fn leave(&mut self, peer: PeerId) -> Vec<Outbound> {
        if self.peers.remove(&peer).is_none() {
            return Vec::new();
        }
        self.to_all(&Message::Left { peer }).collect()
    }
}

enum RelayEvent {
    Joined {
        conn: u64,
        stream: TcpStream,
        addr: SocketAddr,
    },
    Line {
        conn: u64,
        line: String,
    },
    Closed {
        conn: u64,
    },
}

/// TCP relay server
pub struct Relay {
    listener: TcpListener,
    config: RelayConfig,
}

impl Relay {
    pub fn bind(addr: impl ToSocketAddrs, config: RelayConfig) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the listener fails. Blocks the calling thread.
    pub fn run(self) -> Result<(), NetError> {
        let (events, inbox) = bounded(RELAY_QUEUE);
        info!(
            "Relay listening on {} for {} peers",
            self.listener.local_addr()?,
            self.config.max_peers
        );

        let accept_events = events.clone();
        let listener = self.listener;
        thread::Builder::new()
            .name("relay-accept".into())
            .spawn(move || accept_loop(listener, accept_events))?;

        let mut hub = Hub::new(self.config, events);
        for event in inbox.iter() {
            hub.handle(event);
        }
        Err(NetError::ChannelClosed)
    }
}

/// Write side of one peer: a bounded queue drained by its own thread
struct PeerWriter {
    queue: Sender<String>,
    /// Kept to shut the socket down on removal
    stream: TcpStream,
}

/// Relay loop state: single owner of the roster and the peer queues
struct Hub {
    roster: Roster,
    idle_timeout: Option<Duration>,
    writers: HashMap<PeerId, PeerWriter>,
    /// Connection serial → slot, so a stale reader cannot evict a reused slot
    conns: HashMap<u64, PeerId>,
    events: Sender<RelayEvent>,
}

impl Hub {
    fn new(config: RelayConfig, events: Sender<RelayEvent>) -> Self {
        Self {
            roster: Roster::new(config.max_peers, config.spawn_points),
            idle_timeout: config.idle_timeout,
            writers: HashMap::new(),
            conns: HashMap::new(),
            events,
        }
    }

    fn handle(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Joined { conn, stream, addr } => self.admit(conn, stream, addr),
            RelayEvent::Line { conn, line } => {
                let Some(&peer) = self.conns.get(&conn) else {
                    return;
                };
                match line.parse::<Message>() {
                    Ok(message) => {
                        let out = self.roster.receive(peer, message);
                        self.deliver(out);
                    }
                    Err(e) => debug!("Dropping line from peer {peer}: {e}"),
                }
            }
            RelayEvent::Closed { conn } => {
                if let Some(peer) = self.conns.remove(&conn) {
                    self.disconnect(peer);
                }
            }
        }
    }

    fn admit(&mut self, conn: u64, stream: TcpStream, addr: SocketAddr) {
        let Some((peer, out)) = self.roster.join() else {
            warn!("Relay full, refusing {addr}");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        };

        match self.start_io(peer, conn, &stream) {
            Ok(queue) => {
                info!("Peer {peer} connected from {addr} ({}/{})", self.roster.len(), self.roster.max_peers);
                self.writers.insert(peer, PeerWriter { queue, stream });
                self.conns.insert(conn, peer);
                if self.roster.is_full() {
                    info!("Roster full, starting session");
                }
                self.deliver(out);
            }
            Err(e) => {
                warn!("Failed to set up peer {peer} ({addr}): {e}");
                let _ = stream.shutdown(Shutdown::Both);
                let out = self.roster.leave(peer);
                self.deliver(out);
            }
        }
    }

    /// Configure the socket and spawn its reader and writer threads
    fn start_io(&self, peer: PeerId, conn: u64, stream: &TcpStream) -> std::io::Result<Sender<String>> {
        stream.set_read_timeout(self.idle_timeout)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;

        let (queue, lines) = bounded(PEER_QUEUE);
        thread::Builder::new()
            .name(format!("relay-write-{peer}"))
            .spawn(move || write_loop(peer, writer, lines))?;
        let events = self.events.clone();
        thread::Builder::new()
            .name(format!("relay-read-{peer}"))
            .spawn(move || read_loop(conn, reader, events))?;
        Ok(queue)
    }

    fn disconnect(&mut self, peer: PeerId) {
        self.conns.retain(|_, p| *p != peer);
        // Dropping the queue ends the writer thread
        if let Some(writer) = self.writers.remove(&peer) {
            let _ = writer.stream.shutdown(Shutdown::Both);
        }
        let out = self.roster.leave(peer);
        if !out.is_empty() || !self.roster.is_empty() {
            info!("Peer {peer} left, {} remaining", self.roster.len());
        }
        self.deliver(out);
    }

    /// Queue each message for its peer without waiting on any socket
    fn deliver(&self, out: Vec<Outbound>) {
        for Outbound { to, message } in out {
            let Some(writer) = self.writers.get(&to) else {
                continue;
            };
            match writer.queue.try_send(format!("{message}\n")) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("Peer {to} is behind, dropping {message}"),
                Err(TrySendError::Disconnected(_)) => debug!("Writer for peer {to} has stopped"),
            }
        }
    }
}

fn accept_loop(listener: TcpListener, events: Sender<RelayEvent>) {
    let mut next_conn = 0u64;
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let addr = match stream.peer_addr() {
                    Ok(addr) => addr,
                    Err(e) => {
                        debug!("Dropping connection without peer address: {e}");
                        continue;
                    }
                };
                next_conn += 1;
                let joined = RelayEvent::Joined {
                    conn: next_conn,
                    stream,
                    addr,
                };
                if events.send(joined).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Accept failed: {e}"),
        }
    }
}

fn read_loop(conn: u64, stream: TcpStream, events: Sender<RelayEvent>) {
    let mut lines = LineReader::new(stream);
    loop {
        match lines.next_line() {
            Ok(Some(line)) => {
                if events.send(RelayEvent::Line { conn, line }).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Connection {conn} read ended: {e}");
                break;
            }
        }
    }
    let _ = events.send(RelayEvent::Closed { conn });
}

fn write_loop(peer: PeerId, mut stream: TcpStream, lines: Receiver<String>) {
    for line in lines.iter() {
        if let Err(e) = stream.write_all(line.as_bytes()) {
            warn!("Write to peer {peer} failed: {e}");
            // The reader sees the shutdown and reports the peer as gone
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    }
}

//! Client side of the relay connection
//!
//! Socket I/O runs on two background threads. The simulation only ever
//! touches the channel ends: `poll` drains what has arrived without blocking
//! and `send` drops the message when the outbound queue is full.

use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use log::{debug, info, warn};

use super::protocol::{LineReader, Message};
use crate::error::NetError;

/// Inbound mailbox depth
const INBOUND_CAPACITY: usize = 256;
/// Outbound queue depth; positions are superseded quickly so this stays small
const OUTBOUND_CAPACITY: usize = 8;

/// Something that arrived from the relay
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Message(Message),
    /// The connection is gone
    Closed,
}

/// Non-blocking handle to a relay connection
pub struct PeerLink {
    inbound: Receiver<LinkEvent>,
    outbound: Sender<Message>,
}

impl PeerLink {
    /// Connect to a relay and start the I/O threads
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, NetError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        let reader = stream.try_clone()?;

        let (in_tx, in_rx) = bounded(INBOUND_CAPACITY);
        let (out_tx, out_rx) = bounded(OUTBOUND_CAPACITY);
        let closed_tx = in_tx.clone();

        thread::Builder::new()
            .name("peer-read".into())
            .spawn(move || read_loop(reader, in_tx))?;
        thread::Builder::new()
            .name("peer-write".into())
            .spawn(move || write_loop(stream, out_rx, closed_tx))?;

        info!("Connected to relay at {remote}");
        Ok(Self::from_channels(in_rx, out_tx))
    }

    /// Wrap existing channel ends (in-process transports, tests)
    pub fn from_channels(inbound: Receiver<LinkEvent>, outbound: Sender<Message>) -> Self {
        Self { inbound, outbound }
    }

    /// Drain up to `max` pending events without blocking
    pub fn poll(&self, max: usize) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while events.len() < max {
            match self.inbound.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.push(LinkEvent::Closed);
                    break;
                }
            }
        }
        events
    }

    /// Queue a message. Returns false when it was dropped.
    pub fn send(&self, message: Message) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                debug!("Outbound queue full, dropping {message}");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

fn read_loop(stream: TcpStream, events: Sender<LinkEvent>) {
    let mut lines = LineReader::new(stream);
    loop {
        let line = match lines.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!("Relay read ended: {e}");
                break;
            }
        };
        match line.parse::<Message>() {
            Ok(message) => {
                if events.send(LinkEvent::Message(message)).is_err() {
                    return;
                }
            }
            Err(e) => debug!("Dropping line from relay: {e}"),
        }
    }
    let _ = events.send(LinkEvent::Closed);
}

fn write_loop(mut stream: TcpStream, outbound: Receiver<Message>, events: Sender<LinkEvent>) {
    for message in outbound.iter() {
        let line = format!("{message}\n");
        if let Err(e) = stream.write_all(line.as_bytes()) {
            warn!("Write to relay failed: {e}");
            let _ = events.try_send(LinkEvent::Closed);
            break;
        }
    }
    // Link dropped or broken; unblock the reader
    let _ = stream.shutdown(Shutdown::Both);
}

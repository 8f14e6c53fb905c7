//! Line-oriented wire protocol
//!
//! One UTF-8 message per `\n`-terminated line, fields separated by `:`.
//! Positions travel as whole pixels but decode from any float.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::str::FromStr;

use crate::error::ProtocolError;

/// Relay-assigned peer slot
pub type PeerId = u32;

/// A protocol message, in either direction
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Roster change: a peer joined
    Connected(String),
    /// Sent once to a new peer: its slot and spawn position
    Init { peer: PeerId, x: f32, y: f32 },
    /// Both peers are present
    Start,
    /// A peer's own position
    Move { x: f32, y: f32 },
    /// Relay rebroadcast of another peer's `Move`
    Update { peer: PeerId, x: f32, y: f32 },
    /// A peer disconnected
    Left { peer: PeerId },
}

impl Message {
    /// Position message snapped to whole pixels
    pub fn moved_to(x: f32, y: f32) -> Self {
        Message::Move {
            x: x.round(),
            y: y.round(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Connected(who) => write!(f, "CONNECTED:{who}"),
            Message::Init { peer, x, y } => write!(f, "INIT:{peer}:{x}:{y}"),
            Message::Start => f.write_str("START"),
            Message::Move { x, y } => write!(f, "MOVE:{x}:{y}"),
            Message::Update { peer, x, y } => write!(f, "UPDATE:{peer}:{x}:{y}"),
            Message::Left { peer } => write!(f, "LEFT:{peer}"),
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let malformed = || ProtocolError::Malformed(line.to_string());
        let (tag, rest) = match line.split_once(':') {
            Some((tag, rest)) => (tag, Some(rest)),
            None => (line, None),
        };

        let fields = |expected: usize| split_fields(rest, expected).ok_or_else(malformed);
        let peer = |s: &str| s.parse::<PeerId>().map_err(|_| malformed());
        let coord = |s: &str| {
            s.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(malformed)
        };

        match tag {
            "CONNECTED" => match rest {
                Some(who) if !who.is_empty() => Ok(Message::Connected(who.to_string())),
                _ => Err(malformed()),
            },
            "START" if rest.is_none() => Ok(Message::Start),
            "START" => Err(malformed()),
            "INIT" => {
                let f = fields(3)?;
                Ok(Message::Init {
                    peer: peer(f[0])?,
                    x: coord(f[1])?,
                    y: coord(f[2])?,
                })
            }
            "MOVE" => {
                let f = fields(2)?;
                Ok(Message::Move {
                    x: coord(f[0])?,
                    y: coord(f[1])?,
                })
            }
            "UPDATE" => {
                let f = fields(3)?;
                Ok(Message::Update {
                    peer: peer(f[0])?,
                    x: coord(f[1])?,
                    y: coord(f[2])?,
                })
            }
            "LEFT" => {
                let f = fields(1)?;
                Ok(Message::Left { peer: peer(f[0])? })
            }
            _ => Err(ProtocolError::Unknown(line.to_string())),
        }
    }
}

/// Exactly `expected` colon-separated fields, or None
fn split_fields(rest: Option<&str>, expected: usize) -> Option<Vec<&str>> {
    let parts: Vec<&str> = rest?.split(':').collect();
    (parts.len() == expected).then_some(parts)
}

/// Splits a byte stream into lines, skipping any that are not UTF-8
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next decodable line without its terminator; `None` at end of stream
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            match std::str::from_utf8(&self.buf) {
                Ok(line) => return Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
                Err(e) => log::debug!("Dropping undecodable line: {e}"),
            }
        }
    }
}

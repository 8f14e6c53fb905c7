//! Two-peer replication: wire protocol, relay server and client link

pub mod peer;
pub mod protocol;
pub mod relay;

pub use peer::{LinkEvent, PeerLink};
pub use protocol::{Message, PeerId};
pub use relay::{Outbound, Relay, RelayConfig, Roster};

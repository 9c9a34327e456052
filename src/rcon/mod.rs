//! # Remote Console Protocol
//!
//! Client side of the length-prefixed remote console protocol: the frame
//! codec, the authenticated connection and their error taxonomy.

pub mod connection;
pub mod error;
pub mod packet;

pub use connection::{Console, RconConnection};
pub use error::{RconError, RconResult};
pub use packet::{encode, read_packet, write_packet, Packet, PacketType};

//! # ami-core
//!
//! Shared library for the AMI client containing the message model, the
//! line-oriented text codec, packet framing, correlation id generation and
//! stateless request builders.
//!
//! It has no dependencies on sockets or an async runtime; the connection
//! engine in `ami-client` feeds raw bytes into [`PacketFramer`] and writes the
//! output of [`encode_message`] to the wire.
//!
//! # Architecture overview
//!
//! The Asterisk Manager Interface is a text protocol spoken over one TCP
//! connection.  Every unit on the wire is a *packet*: a list of
//! `Name: Value` lines terminated by an empty line.
//!
//! - **`protocol`** – How bytes travel over the network.  [`Message`] is the
//!   header bag for one packet, [`encode_message`] turns it into bytes and
//!   [`PacketFramer`] reassembles packets from an arbitrarily chunked stream.
//!   [`ActionIdGenerator`] produces the `ActionID` values that correlate a
//!   request with its asynchronous response.
//!
//! - **`commands`** – Builders for common actions (`Login`, `Originate`,
//!   `Command`, ...).  They only produce [`Message`] values; sending them is
//!   the engine's job.

pub mod commands;
pub mod protocol;

pub use commands::{CommandError, Originate};
pub use protocol::action_id::ActionIdGenerator;
pub use protocol::codec::{decode_packet, encode_message, PacketFramer};
pub use protocol::message::Message;

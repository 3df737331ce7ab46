//! Protocol module containing the message type, the text codec and the
//! correlation id generator.

pub mod action_id;
pub mod codec;
pub mod message;

pub use action_id::ActionIdGenerator;
pub use codec::{decode_packet, encode_message, PacketFramer};
pub use message::Message;

/// Line terminator used by every protocol line.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Separator between a header name and its value.
pub const KEY_VALUE_SEPARATOR: char = ':';

/// Byte sequence that ends a packet (an empty line after the last header).
pub const PACKET_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Marker line closing the free-text output of an `Action: Command`.
pub const END_COMMAND_MARKER: &str = "--END COMMAND--";

/// Default TCP port of the manager interface.
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Well-known header names.
pub mod headers {
    /// Correlation id linking a response to its request.
    pub const ACTION_ID: &str = "ActionID";
    /// Name of the requested action.
    pub const ACTION: &str = "Action";
    /// Name of an unsolicited event.
    pub const EVENT: &str = "Event";
    /// Status of a response (`Success`, `Error`, `Follows`, `Goodbye`).
    pub const RESPONSE: &str = "Response";
    /// Human-readable text accompanying a response.
    pub const MESSAGE: &str = "Message";
    /// Pseudo-header collecting lines that are not `Name: Value` pairs.
    pub const CMD_DATA: &str = "CmdData";
}

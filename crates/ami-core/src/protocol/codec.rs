//! Text codec and packet framing for the manager protocol.
//!
//! Wire format:
//! ```text
//! Name: Value\r\n
//! Name: Value\r\n
//! \r\n
//! ```
//! A packet is any run of lines ending in an empty line.  There is no length
//! prefix, so the receiver must search the byte stream for `\r\n\r\n`.
//!
//! Lines without a `:` separator are free text (the output of
//! `Action: Command`, for instance).  They are appended, trimmed and without
//! any separator, to the `CmdData` pseudo-header.  The literal
//! `--END COMMAND--` line is dropped.

use crate::protocol::message::Message;
use crate::protocol::{END_COMMAND_MARKER, KEY_VALUE_SEPARATOR, LINE_TERMINATOR, PACKET_TERMINATOR};

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into wire bytes, terminating blank line included.
///
/// Headers are written in key order.  Nothing is escaped: header names must
/// not contain `:` and neither names nor values may contain `\r\n`.
///
/// # Examples
///
/// ```rust
/// use ami_core::{encode_message, Message};
///
/// let msg = Message::from([("Action", "Ping")]);
/// assert_eq!(encode_message(&msg), b"Action:Ping\r\n\r\n");
/// ```
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let size: usize = msg
        .iter()
        .map(|(k, v)| k.len() + v.len() + 1 + LINE_TERMINATOR.len())
        .sum();
    let mut buf = Vec::with_capacity(size + LINE_TERMINATOR.len());

    for (key, value) in msg.iter() {
        buf.extend_from_slice(key.as_bytes());
        buf.push(KEY_VALUE_SEPARATOR as u8);
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(LINE_TERMINATOR.as_bytes());
    }
    buf.extend_from_slice(LINE_TERMINATOR.as_bytes());
    buf
}

/// Parses one complete packet into a [`Message`].
///
/// `packet` may or may not include the trailing terminator; empty lines are
/// ignored either way.  Parsing never fails: invalid UTF-8 is replaced with
/// U+FFFD and malformed lines end up in `CmdData`.
pub fn decode_packet(packet: &[u8]) -> Message {
    let text = String::from_utf8_lossy(packet);
    let mut msg = Message::new();

    for line in text.split(LINE_TERMINATOR) {
        let line = line.trim();
        if line.is_empty() || line == END_COMMAND_MARKER {
            continue;
        }
        match line.split_once(KEY_VALUE_SEPARATOR) {
            Some((key, value)) => {
                msg.set(key.trim(), value.trim());
            }
            None => msg.append_cmd_data(line),
        }
    }
    msg
}

/// Reassembles packets from an arbitrarily chunked byte stream.
///
/// Bytes are appended with [`extend`](Self::extend) (or [`feed`](Self::feed))
/// and complete packets are taken from the front of the buffer, earliest
/// first.  A trailing partial packet stays buffered until the rest of it
/// arrives.
///
/// # Examples
///
/// ```rust
/// use ami_core::PacketFramer;
///
/// let mut framer = PacketFramer::new();
/// assert!(framer.feed(b"Event: Hangup\r\n").is_empty());
///
/// let messages = framer.feed(b"Cause: 16\r\n\r\nEvent: Ne");
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].event(), Some("Hangup"));
/// assert_eq!(framer.buffered_len(), 9);
/// ```
#[derive(Debug, Default)]
pub struct PacketFramer {
    buffer: Vec<u8>,
}

impl PacketFramer {
    /// Creates a framer with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a framer whose buffer can hold `capacity` bytes without
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends freshly read bytes to the accumulation buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Removes and parses the earliest complete packet, if there is one.
    pub fn next_message(&mut self) -> Option<Message> {
        let end = find_terminator(&self.buffer)? + PACKET_TERMINATOR.len();
        let msg = decode_packet(&self.buffer[..end]);
        self.buffer.drain(..end);
        Some(msg)
    }

    /// Appends `bytes` and returns every packet completed by them, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Message> {
        self.extend(bytes);
        std::iter::from_fn(|| self.next_message()).collect()
    }

    /// Number of bytes waiting for the rest of their packet.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any buffered partial packet.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(PACKET_TERMINATOR.len())
        .position(|window| window == PACKET_TERMINATOR)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Builders for common manager actions.
//!
//! Every builder returns a plain [`Message`] without an `ActionID`; the
//! connection engine assigns one when the action is sent with a response
//! handler.

mod originate;

pub use originate::{Originate, ORIGINATE_TIMEOUT_MS};

use thiserror::Error;

use crate::protocol::Message;

/// Errors raised while building an action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A required field was left empty.
    #[error("{action}: missing required field {field}")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    /// An Originate has neither a dialplan target nor an application.
    #[error("Originate: either Context/Exten/Priority or Application must be set")]
    MissingOriginateTarget,
}

/// `Action: Login` with the given credentials.
pub fn login(username: &str, secret: &str) -> Message {
    Message::action("Login")
        .with("Username", username)
        .with("Secret", secret)
}

/// `Action: Logoff`; the server answers `Response: Goodbye` and closes.
pub fn logoff() -> Message {
    Message::action("Logoff")
}

/// `Action: Ping`, a keep-alive answered with `Response: Success`.
pub fn ping() -> Message {
    Message::action("Ping")
}

/// `Action: Events` selecting which event classes the server sends
/// (`on`, `off`, or a comma-separated list such as `call,system`).
pub fn events(mask: &str) -> Message {
    Message::action("Events").with("EventMask", mask)
}

/// `Action: Command` running a CLI command.
///
/// The textual output comes back in the response's `CmdData` pseudo-header.
pub fn command(cli: &str) -> Message {
    Message::action("Command").with("Command", cli)
}

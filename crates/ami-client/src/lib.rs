//! ami-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does ami-client do?
//!
//! It keeps one TCP connection to an Asterisk Manager Interface and turns it
//! into callbacks:
//!
//! 1. [`AmiConnection::connect`] opens the socket.
//! 2. Handlers are registered against an `ActionID` (responses to a request
//!    the caller is about to send) or an event name (`Hangup`,
//!    `Newchannel`, ...).  A default handler may see every message.
//! 3. [`AmiConnection::start`] spawns the dispatch loop, the only reader of
//!    the socket.  It frames packets out of the byte stream and hands each
//!    parsed message to the matching handlers, each on its own task.
//! 4. [`AmiConnection::send`] may be called from any task; writes are
//!    serialized so packets never interleave.
//!
//! [`AmiConnection::connect`]: infrastructure::network::AmiConnection::connect
//! [`AmiConnection::start`]: infrastructure::network::AmiConnection::start
//! [`AmiConnection::send`]: infrastructure::network::AmiConnection::send

/// Application layer: callback registries and message routing.
pub mod application;

/// Infrastructure layer: socket engine, dispatch loop and configuration.
pub mod infrastructure;

pub use application::dispatch::Router;
pub use application::registry::{CallbackEntry, CallbackRegistry, Handler};
pub use infrastructure::network::{
    AmiConnection, AmiNetworkError, ConnectionConfig, NetworkErrorHandler,
};

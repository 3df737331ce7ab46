//! Infrastructure layer of the client engine.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `ami_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – [`AmiConnection`](network::AmiConnection): owns the TCP
//!   stream, serializes writes, runs the dispatch loop that frames and routes
//!   inbound packets, and layers the login handshake and request/response
//!   helpers on top.
//!
//! - **`storage`** – TOML configuration file loading and saving.

pub mod network;
pub mod storage;

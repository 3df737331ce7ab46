//! Application layer of the client engine.
//!
//! - **`registry`** – [`CallbackRegistry`](registry::CallbackRegistry), the
//!   thread-safe map from an `ActionID` or event name to a handler and its
//!   retention flag.  The engine owns two independent instances.
//!
//! - **`dispatch`** – [`Router`](dispatch::Router), which applies the routing
//!   rules to every parsed message and spawns the selected handlers.
//!
//! Nothing here touches a socket; the dispatch loop in `infrastructure`
//! feeds the router.

pub mod dispatch;
pub mod registry;

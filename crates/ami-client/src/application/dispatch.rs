//! Router: decides which handlers see a parsed message.
//!
//! Routing rules, applied independently to every message:
//!
//! 1. `ActionID` header with an entry in the action registry → that handler.
//!    A non-retaining entry is removed before its handler runs.
//! 2. `Event` header with an entry in the event registry → that handler.
//!    Event entries are never removed by routing, even when registered
//!    with `retain = false`.
//! 3. A default handler, if installed → always.
//!
//! Each selected handler runs on its own Tokio task with its own copy of the
//! message.  [`Router::route`] never waits for a handler, so a slow handler
//! cannot stall the socket reader.  No ordering is guaranteed between
//! handler invocations.

use std::sync::{PoisonError, RwLock};

use ami_core::Message;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::application::registry::{CallbackRegistry, Handler};

/// The two callback registries plus the optional catch-all handler.
#[derive(Debug, Default)]
pub struct Router {
    action_handlers: CallbackRegistry,
    event_handlers: CallbackRegistry,
    default_handler: RwLock<Option<HandlerSlot>>,
}

/// Wrapper so `Router` can derive `Debug`.
#[derive(Clone)]
struct HandlerSlot(Handler);

impl std::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers keyed by `ActionID`.
    pub fn action_handlers(&self) -> &CallbackRegistry {
        &self.action_handlers
    }

    /// Handlers keyed by event name.
    pub fn event_handlers(&self) -> &CallbackRegistry {
        &self.event_handlers
    }

    /// Installs (or with `None`, clears) the catch-all handler.
    pub fn set_default_handler(&self, handler: Option<Handler>) {
        *self
            .default_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler.map(HandlerSlot);
    }

    /// The catch-all handler, if one is installed.
    pub fn default_handler(&self) -> Option<Handler> {
        self.default_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|slot| slot.0.clone())
    }

    /// Spawns every handler selected for `msg` and returns their task handles.
    ///
    /// The dispatch loop drops the handles; tests await them.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn route(&self, msg: Message) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        if let Some(action_id) = msg.action_id() {
            if let Some(handler) = self.action_handlers.claim(action_id) {
                trace!("routing response for ActionID {action_id}");
                tasks.push(spawn_handler(handler, msg.clone()));
            }
        }

        if let Some(event) = msg.event() {
            // Event entries stay registered whatever their retain flag says.
            if let Some(entry) = self.event_handlers.get(event) {
                trace!("routing event {event}");
                tasks.push(spawn_handler(entry.handler, msg.clone()));
            }
        }

        if let Some(handler) = self.default_handler() {
            tasks.push(spawn_handler(handler, msg));
        }

        tasks
    }
}

fn spawn_handler(handler: Handler, msg: Message) -> JoinHandle<()> {
    tokio::spawn(async move { handler(msg) })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

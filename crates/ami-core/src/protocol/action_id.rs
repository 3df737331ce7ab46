//! Thread-safe generator for `ActionID` correlation values.
//!
//! Every action sent to the server may carry an `ActionID` header.  The server
//! copies it into each response packet for that action, which is how a
//! response is matched with the handler that was registered before sending.
//!
//! Generated ids look like `<hostname>-<n>`, where `n` starts at 1 and grows
//! by one per call.  The hostname prefix keeps ids from different client
//! machines sharing one manager account apart in server logs.
//!
//! # Thread safety
//!
//! The counter is an `AtomicU64`; `fetch_add` hands every caller a distinct
//! value, so concurrent calls never produce duplicates and never skip a
//! number.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// Host prefix used when the local hostname cannot be determined.
pub const DEFAULT_HOST: &str = "gami";

/// Produces unique, monotonically increasing `ActionID` values.
///
/// # Examples
///
/// ```rust
/// use ami_core::ActionIdGenerator;
///
/// let ids = ActionIdGenerator::with_host("pbx");
/// assert_eq!(ids.generate(), "pbx-1");
/// assert_eq!(ids.generate(), "pbx-2");
/// ```
#[derive(Debug)]
pub struct ActionIdGenerator {
    host: String,
    /// Number of ids issued so far.
    issued: AtomicU64,
}

impl ActionIdGenerator {
    /// Creates a generator prefixed with the local hostname, or
    /// [`DEFAULT_HOST`] if the lookup fails.
    pub fn new() -> Self {
        Self::with_host(local_host())
    }

    /// Creates a generator with an explicit host prefix.
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            issued: AtomicU64::new(0),
        }
    }

    /// Returns the next id, `<host>-<n>`.
    ///
    /// `Relaxed` ordering is enough: the counter does not publish any other
    /// memory.
    pub fn generate(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.host)
    }

    /// The host prefix of generated ids.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl Default for ActionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn local_host() -> String {
    match hostname::get() {
        Ok(name) => match name.into_string() {
            Ok(name) if !name.is_empty() => name,
            _ => {
                warn!("hostname is empty or not valid UTF-8; using {DEFAULT_HOST:?}");
                DEFAULT_HOST.to_string()
            }
        },
        Err(e) => {
            warn!("hostname lookup failed ({e}); using {DEFAULT_HOST:?}");
            DEFAULT_HOST.to_string()
        }
    }
}

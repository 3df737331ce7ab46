//! `Action: Originate` builder.
//!
//! An originate dials `channel` and, once answered, either sends the call to
//! a dialplan location (`context`/`exten`/`priority`) or runs an application
//! with `data`.  When both are filled in, the dialplan location wins.

use crate::commands::CommandError;
use crate::protocol::Message;

/// Default time, in milliseconds, to wait for the originated channel to answer.
pub const ORIGINATE_TIMEOUT_MS: u64 = 30_000;

/// Parameters of an `Originate` action.
///
/// # Examples
///
/// ```rust
/// use ami_core::Originate;
///
/// let msg = Originate::to_context("SIP/100", "default", "200", "1")
///     .caller_id("Reception <100>")
///     .to_message()
///     .unwrap();
/// assert_eq!(msg.get("Exten"), Some("200"));
/// assert_eq!(msg.get("Timeout"), Some("30000"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originate {
    /// Channel to dial, e.g. `SIP/100`.
    pub channel: String,
    /// Dialplan context to continue in after answer.
    pub context: String,
    /// Extension within `context`.
    pub exten: String,
    /// Priority within `exten`.
    pub priority: String,
    /// Milliseconds to wait for answer.
    pub timeout_ms: u64,
    /// Caller id presented on the dialled channel.
    pub caller_id: String,
    /// Account code written to the CDR.
    pub account: String,
    /// Application to run after answer (used when `context` is empty).
    pub application: String,
    /// Arguments for `application`.
    pub data: String,
    /// Return the response immediately instead of after the call is answered.
    pub is_async: bool,
}

impl Originate {
    /// Originate into a dialplan location.
    pub fn to_context(channel: &str, context: &str, exten: &str, priority: &str) -> Self {
        Self {
            channel: channel.to_string(),
            context: context.to_string(),
            exten: exten.to_string(),
            priority: priority.to_string(),
            ..Self::empty()
        }
    }

    /// Originate into an application.
    pub fn to_application(channel: &str, application: &str, data: &str) -> Self {
        Self {
            channel: channel.to_string(),
            application: application.to_string(),
            data: data.to_string(),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            channel: String::new(),
            context: String::new(),
            exten: String::new(),
            priority: String::new(),
            timeout_ms: ORIGINATE_TIMEOUT_MS,
            caller_id: String::new(),
            account: String::new(),
            application: String::new(),
            data: String::new(),
            is_async: false,
        }
    }

    /// Sets the answer timeout.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the caller id.
    pub fn caller_id(mut self, caller_id: &str) -> Self {
        self.caller_id = caller_id.to_string();
        self
    }

    /// Sets the CDR account code.
    pub fn account(mut self, account: &str) -> Self {
        self.account = account.to_string();
        self
    }

    /// Requests an asynchronous originate.
    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Builds the action message.
    ///
    /// # Errors
    ///
    /// [`CommandError::MissingField`] if `channel` is empty, and
    /// [`CommandError::MissingOriginateTarget`] if neither `context` nor
    /// `application` is set.
    pub fn to_message(&self) -> Result<Message, CommandError> {
        if self.channel.is_empty() {
            return Err(CommandError::MissingField {
                action: "Originate",
                field: "Channel",
            });
        }

        let mut msg = Message::action("Originate")
            .with("Channel", self.channel.as_str())
            .with("Timeout", self.timeout_ms.to_string())
            .with("Async", if self.is_async { "true" } else { "false" });

        if !self.context.is_empty() {
            msg.set("Context", self.context.as_str());
            msg.set("Exten", self.exten.as_str());
            msg.set("Priority", self.priority.as_str());
        } else if !self.application.is_empty() {
            msg.set("Application", self.application.as_str());
            msg.set("Data", self.data.as_str());
        } else {
            return Err(CommandError::MissingOriginateTarget);
        }

        if !self.caller_id.is_empty() {
            msg.set("CallerID", self.caller_id.as_str());
        }
        if !self.account.is_empty() {
            msg.set("Account", self.account.as_str());
        }
        Ok(msg)
    }
}

//! The [`Message`] type: one protocol packet as a bag of headers.
//!
//! Header names are case-sensitive and unique.  Storage is a `BTreeMap`, so
//! iteration, the wire encoding and the [`Display`](fmt::Display) rendering
//! all visit headers in lexicographic key order.  The protocol itself does not
//! require any particular order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::headers;

/// Width of the key column in the human-readable rendering.
const KEY_COLUMN_WIDTH: usize = 20;

/// A single manager-protocol packet.
///
/// # Examples
///
/// ```rust
/// use ami_core::Message;
///
/// let mut msg = Message::new();
/// msg.set("Action", "Ping");
/// msg.set("ActionID", "pbx-1");
/// assert_eq!(msg.get("Action"), Some("Ping"));
/// assert_eq!(msg.action_id(), Some("pbx-1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    headers: BTreeMap<String, String>,
}

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message whose only header is `Action: <name>`.
    pub fn action(name: impl Into<String>) -> Self {
        let mut msg = Self::new();
        msg.set(headers::ACTION, name);
        msg
    }

    /// Returns the value of header `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Sets header `key` to `value`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.headers.insert(key.into(), value.into())
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Removes header `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.headers.remove(key)
    }

    /// Returns `true` if header `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.headers.contains_key(key)
    }

    /// Iterates over `(name, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers, `CmdData` included.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns `true` when the message has no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// The `ActionID` correlation header.
    pub fn action_id(&self) -> Option<&str> {
        self.get(headers::ACTION_ID)
    }

    /// The `Event` header of an unsolicited event.
    pub fn event(&self) -> Option<&str> {
        self.get(headers::EVENT)
    }

    /// The `Response` status header.
    pub fn response(&self) -> Option<&str> {
        self.get(headers::RESPONSE)
    }

    /// Free-text lines collected while parsing, concatenated without separators.
    pub fn cmd_data(&self) -> Option<&str> {
        self.get(headers::CMD_DATA)
    }

    /// Appends `text` to the `CmdData` pseudo-header.
    pub(crate) fn append_cmd_data(&mut self, text: &str) {
        self.headers
            .entry(headers::CMD_DATA.to_string())
            .or_default()
            .push_str(text);
    }
}

impl fmt::Display for Message {
    /// Renders a blank line, then one header per line, sorted by key, values
    /// aligned in a column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\n")?;
        for (key, value) in &self.headers {
            let pad = KEY_COLUMN_WIDTH.saturating_sub(key.len());
            write!(f, "\n\t{key}:{:pad$}{value}", "")?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Message
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            headers: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Message
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_existing_value() {
        // Arrange
        let mut msg = Message::new();
        msg.set("Channel", "SIP/100");

        // Act
        let previous = msg.set("Channel", "SIP/200");

        // Assert
        assert_eq!(previous.as_deref(), Some("SIP/100"));
        assert_eq!(msg.get("Channel"), Some("SIP/200"));
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn test_header_names_are_case_sensitive() {
        let msg = Message::from([("ActionID", "a-1")]);
        assert_eq!(msg.get("actionid"), None);
        assert_eq!(msg.action_id(), Some("a-1"));
    }

    #[test]
    fn test_well_known_accessors() {
        let msg = Message::from([
            ("Event", "Hangup"),
            ("Response", "Success"),
            ("ActionID", "pbx-7"),
        ]);
        assert_eq!(msg.event(), Some("Hangup"));
        assert_eq!(msg.response(), Some("Success"));
        assert_eq!(msg.action_id(), Some("pbx-7"));
        assert_eq!(msg.cmd_data(), None);
    }

    #[test]
    fn test_action_constructor_sets_action_header() {
        let msg = Message::action("Ping");
        assert_eq!(msg.get("Action"), Some("Ping"));
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn test_append_cmd_data_concatenates_without_separator() {
        let mut msg = Message::new();
        msg.append_cmd_data("first");
        msg.append_cmd_data("second");
        assert_eq!(msg.cmd_data(), Some("firstsecond"));
    }

    #[test]
    fn test_iter_is_sorted_by_key() {
        let msg = Message::from([("b", "2"), ("a", "1"), ("C", "3")]);
        let keys: Vec<&str> = msg.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["C", "a", "b"]);
    }

    #[test]
    fn test_display_sorts_keys_and_pads_column() {
        // Arrange
        let msg = Message::from([("Response", "Success"), ("ActionID", "h-1")]);

        // Act
        let rendered = msg.to_string();

        // Assert
        let expected = format!(
            "\n\n\tActionID:{}h-1\n\tResponse:{}Success",
            " ".repeat(12),
            " ".repeat(12)
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_display_long_key_has_no_padding() {
        let key = "K".repeat(25);
        let msg = Message::from([(key.as_str(), "v")]);
        assert_eq!(msg.to_string(), format!("\n\n\t{key}:v"));
    }

    #[test]
    fn test_display_starts_with_blank_line() {
        let msg = Message::from([("A", "1")]);
        assert_eq!(msg.to_string(), format!("\n\n\tA:{}1", " ".repeat(19)));
        assert_eq!(Message::new().to_string(), "\n");
    }

    #[test]
    fn test_remove_and_contains() {
        let mut msg = Message::from([("Event", "Newchannel")]);
        assert!(msg.contains("Event"));
        assert_eq!(msg.remove("Event").as_deref(), Some("Newchannel"));
        assert!(!msg.contains("Event"));
        assert!(msg.is_empty());
    }

    #[test]
    fn test_serializes_as_flat_json_object() {
        let msg = Message::from([("Event", "Hangup"), ("Cause", "16")]);
        let json = serde_json::to_string(&msg).expect("serialize");
        assert_eq!(json, r#"{"Cause":"16","Event":"Hangup"}"#);
    }
}

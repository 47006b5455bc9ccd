//! Remote/button event shape exchanged over HTTP.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A remote-control or button event as it travels from the protocol engine
/// to the router and on to a playback source.
///
/// Unknown fields are preserved in `extra` so the raw event can be forwarded
/// to a source verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterEvent {
    /// The decoded action name (e.g. "go", "volup", "3")
    pub action: String,
    /// Digit carried by numeric keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digit: Option<u8>,
    /// Repeat count accumulated while the key was held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Set on periodic copies emitted during a long key-repeat
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub priority: bool,
    /// Any additional fields (link/device identifiers, payload extras)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouterEvent {
    /// Create an event carrying only an action name.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        let action = action.into();
        let digit = parse_digit(&action);
        Self { action, digit, count: None, priority: false, extra: Map::new() }
    }

    /// The digit this event carries, either explicitly or as a one-character
    /// numeric action.
    #[must_use]
    pub fn digit(&self) -> Option<u8> {
        self.digit.or_else(|| parse_digit(&self.action))
    }
}

fn parse_digit(action: &str) -> Option<u8> {
    let mut chars = action.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).map(|d| u8::try_from(d).unwrap_or(0)),
        _ => None,
    }
}

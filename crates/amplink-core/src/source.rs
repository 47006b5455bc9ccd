//! Playback-source model and lifecycle types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a playback source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Not registered (or unregistered again)
    #[default]
    Gone,
    /// Registered but idle
    Available,
    /// Actively playing
    Playing,
    /// Paused but still the active source
    Paused,
}

impl SourceState {
    /// Whether this state makes the source the active one.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// A playback-capable service known to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier (e.g. "cd", "radio")
    pub id: String,
    /// Name shown in menus
    pub display_name: String,
    /// Endpoint accepting forwarded raw events
    pub command_url: Option<String>,
    /// Actions this source handles while active ("digits" enables rule 2)
    pub handled_actions: HashSet<String>,
    /// Menu entry id this source's item is inserted after
    pub insert_after: Option<String>,
    /// Current lifecycle state
    pub state: SourceState,
}

impl Source {
    /// Create an unregistered source shell for the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            command_url: None,
            handled_actions: HashSet::new(),
            insert_after: None,
            state: SourceState::Gone,
        }
    }
}

/// Static source configuration (pre-registered at startup, state Gone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub command_url: Option<String>,
    #[serde(default)]
    pub handles: Vec<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl From<SourceConfig> for Source {
    fn from(config: SourceConfig) -> Self {
        Self {
            id: config.id,
            display_name: config.name,
            command_url: config.command_url,
            handled_actions: config.handles.into_iter().collect(),
            insert_after: config.after,
            state: SourceState::Gone,
        }
    }
}

/// A source lifecycle update (`POST /router/source` body).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceUpdate {
    pub id: String,
    pub state: SourceState,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub command_url: Option<String>,
    #[serde(default)]
    pub handles: Option<Vec<String>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub navigate: bool,
}

/// UI broadcast emitted by registry transitions.
///
/// Serializes to the `{type, data}` shape the relay webhook expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum Broadcast {
    /// A source appeared; add its menu item
    MenuAdded { id: String, title: String },
    /// A source went away; remove its menu item
    MenuRemoved { id: String },
    /// The active source changed (None = no source active)
    SourceChanged { source: Option<String> },
    /// Navigate the UI to a source's page
    Navigate { view: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(SourceState::Playing.is_active());
        assert!(SourceState::Paused.is_active());
        assert!(!SourceState::Available.is_active());
        assert!(!SourceState::Gone.is_active());
    }

    #[test]
    fn test_source_update_minimal_body() {
        let update: SourceUpdate =
            serde_json::from_str(r#"{"id":"cd","state":"playing"}"#).unwrap();
        assert_eq!(update.id, "cd");
        assert_eq!(update.state, SourceState::Playing);
        assert!(update.name.is_none());
        assert!(!update.navigate);
    }

    #[test]
    fn test_broadcast_wire_shape() {
        let b = Broadcast::SourceChanged { source: Some("cd".into()) };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["type"], "source_changed");
        assert_eq!(v["data"]["source"], "cd");
    }
}

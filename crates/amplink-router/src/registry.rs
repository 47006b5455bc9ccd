//! Playback-source registry and lifecycle transitions.
//!
//! Transitions are pure: `apply` mutates the registry and returns the
//! broadcasts and side effects the caller must carry out. Invariant: at most
//! one source is Playing or Paused, and it is always the active one.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::info;

use amplink_core::source::{Broadcast, Source, SourceConfig, SourceState, SourceUpdate};

/// Effects the router must carry out after a lifecycle update.
#[derive(Debug, Default)]
pub struct UpdateEffects {
    pub broadcasts: Vec<Broadcast>,
    /// The configured output should be powered on (a source started playing
    /// while the output was off)
    pub power_on: bool,
}

/// Maps source ids to their state, plus the single active source.
pub struct SourceRegistry {
    sources: HashMap<String, Source>,
    /// Registration order, for deterministic menu placement
    order: Vec<String>,
    active_id: Option<String>,
}

impl SourceRegistry {
    /// Create a registry with the statically configured sources
    /// pre-registered in state Gone.
    #[must_use]
    pub fn new(preregistered: Vec<SourceConfig>) -> Self {
        let mut registry =
            Self { sources: HashMap::new(), order: Vec::new(), active_id: None };
        for config in preregistered {
            registry.order.push(config.id.clone());
            registry.sources.insert(config.id.clone(), config.into());
        }
        registry
    }

    /// The active source, if any is Playing or Paused.
    #[must_use]
    pub fn active(&self) -> Option<&Source> {
        self.active_id.as_ref().and_then(|id| self.sources.get(id))
    }

    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.get(id)
    }

    /// All non-Gone sources in registration order.
    pub fn iter_present(&self) -> impl Iterator<Item = &Source> {
        self.order
            .iter()
            .filter_map(|id| self.sources.get(id))
            .filter(|s| s.state != SourceState::Gone)
    }

    /// Apply a lifecycle update and report what must happen next.
    ///
    /// `output_on` is the current power state of the configured output; a
    /// source entering Playing/Paused while it is off requests a power-on.
    pub fn apply(&mut self, update: SourceUpdate, output_on: bool) -> UpdateEffects {
        let mut effects = UpdateEffects::default();

        let source = match self.sources.entry(update.id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(update.id.clone());
                entry.insert(Source::new(update.id.clone()))
            }
        };

        if let Some(name) = update.name {
            source.display_name = name;
        }
        if let Some(url) = update.command_url {
            source.command_url = Some(url);
        }
        if let Some(handles) = update.handles {
            source.handled_actions = handles.into_iter().collect();
        }
        if let Some(after) = update.after {
            source.insert_after = Some(after);
        }

        let previous = source.state;
        source.state = update.state;
        let title = source.display_name.clone();
        info!(id = %update.id, from = ?previous, to = ?update.state, "source transition");

        if previous == SourceState::Gone && update.state != SourceState::Gone {
            effects.broadcasts.push(Broadcast::MenuAdded { id: update.id.clone(), title });
        }

        let was_active = self.active_id.as_deref() == Some(update.id.as_str());
        match update.state {
            SourceState::Playing | SourceState::Paused => {
                if !was_active {
                    // demote the superseded source so only one stays active
                    if let Some(previous_active) =
                        self.active_id.take().and_then(|id| self.sources.get_mut(&id))
                    {
                        previous_active.state = SourceState::Available;
                    }
                    self.active_id = Some(update.id.clone());
                    effects
                        .broadcasts
                        .push(Broadcast::SourceChanged { source: Some(update.id.clone()) });
                }
                if !output_on {
                    effects.power_on = true;
                }
            }
            SourceState::Available => {
                if was_active {
                    self.active_id = None;
                    effects.broadcasts.push(Broadcast::SourceChanged { source: None });
                }
            }
            SourceState::Gone => {
                if was_active {
                    self.active_id = None;
                }
                if previous != SourceState::Gone {
                    effects.broadcasts.push(Broadcast::MenuRemoved { id: update.id.clone() });
                }
            }
        }

        if update.navigate {
            effects.broadcasts.push(Broadcast::Navigate { view: update.id });
        }

        effects
    }
}

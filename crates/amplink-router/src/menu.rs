//! Dynamic menu construction.
//!
//! The menu starts from a static ordered list; every present source gets an
//! item inserted right after its configured anchor, or just before the fixed
//! tail entry when the anchor is missing.

use serde::{Deserialize, Serialize};

use crate::registry::SourceRegistry;

/// One displayable menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: String,
    pub title: String,
}

impl MenuEntry {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into() }
    }
}

/// Build the current menu from the static entries and the registry.
#[must_use]
pub fn build_menu(
    static_entries: &[MenuEntry],
    tail_id: &str,
    registry: &SourceRegistry,
) -> Vec<MenuEntry> {
    let mut items = static_entries.to_vec();

    for source in registry.iter_present() {
        let item = MenuEntry::new(&source.id, &source.display_name);
        let anchor = source
            .insert_after
            .as_deref()
            .and_then(|after| items.iter().position(|e| e.id == after));

        match anchor {
            Some(i) => items.insert(i + 1, item),
            None => {
                let tail = items.iter().position(|e| e.id == tail_id).unwrap_or(items.len());
                items.insert(tail, item);
            }
        }
    }

    items
}

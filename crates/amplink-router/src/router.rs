//! Event routing: one ingress, a strict priority order, no ambiguity.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use amplink_core::event::RouterEvent;
use amplink_core::source::{Broadcast, SourceState, SourceUpdate};

use crate::menu::{self, MenuEntry};
use crate::registry::SourceRegistry;
use crate::relay::{AutomationHook, UiRelay};
use crate::volume::VolumeAdapter;

pub const ACTION_VOLUME_UP: &str = "volup";
pub const ACTION_VOLUME_DOWN: &str = "voldown";
/// Capability a source declares to receive bare digit events.
pub const DIGITS_CAPABILITY: &str = "digits";

/// What to do with an incoming remote event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Forward the raw event to the source's command endpoint
    ForwardToSource { id: String, url: String },
    /// Adjust volume by the configured step
    Volume(VolumeDirection),
    /// Hand the event to the external automation hook
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDirection {
    Up,
    Down,
}

/// Decide where an event goes. Total and deterministic given the registry
/// contents and the action.
#[must_use]
pub fn decide(event: &RouterEvent, registry: &SourceRegistry) -> RouteDecision {
    if let Some(active) = registry.active() {
        // 1. the active source declared this action
        if active.handled_actions.contains(&event.action)
            && let Some(url) = &active.command_url
        {
            return RouteDecision::ForwardToSource { id: active.id.clone(), url: url.clone() };
        }
        // 2. bare digits go to an active source that wants them
        if event.digit().is_some()
            && active.handled_actions.contains(DIGITS_CAPABILITY)
            && let Some(url) = &active.command_url
        {
            return RouteDecision::ForwardToSource { id: active.id.clone(), url: url.clone() };
        }
    }

    // 3. a dedicated button naming a known source activates it directly
    if let Some(source) = registry.get(&event.action)
        && source.state != SourceState::Gone
        && let Some(url) = &source.command_url
    {
        return RouteDecision::ForwardToSource { id: source.id.clone(), url: url.clone() };
    }

    // 4. local volume handling
    match event.action.as_str() {
        ACTION_VOLUME_UP => RouteDecision::Volume(VolumeDirection::Up),
        ACTION_VOLUME_DOWN => RouteDecision::Volume(VolumeDirection::Down),
        // 5. everything else goes to the automation hook
        _ => RouteDecision::Fallback,
    }
}

/// Router status snapshot (`GET /router/status`).
#[derive(Debug, Serialize)]
pub struct RouterStatus {
    pub active_source: Option<String>,
    pub volume: u8,
    pub sources: Vec<SourceStatus>,
}

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub id: String,
    pub state: SourceState,
}

/// The single ingress for remote/button events.
pub struct EventRouter {
    registry: Mutex<SourceRegistry>,
    adapter: Arc<dyn VolumeAdapter>,
    /// Router-side tracked volume, percent
    volume: Mutex<u8>,
    volume_step: u8,
    relay: UiRelay,
    fallback: AutomationHook,
    client: reqwest::Client,
    menu_entries: Vec<MenuEntry>,
    menu_tail: String,
}

impl EventRouter {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: SourceRegistry,
        adapter: Arc<dyn VolumeAdapter>,
        relay: UiRelay,
        fallback: AutomationHook,
        client: reqwest::Client,
        menu_entries: Vec<MenuEntry>,
        menu_tail: String,
        volume_step: u8,
        initial_volume: u8,
    ) -> Self {
        Self {
            registry: Mutex::new(registry),
            adapter,
            volume: Mutex::new(initial_volume.min(100)),
            volume_step,
            relay,
            fallback,
            client,
            menu_entries,
            menu_tail,
        }
    }

    /// Route one incoming event.
    pub async fn handle_event(&self, event: RouterEvent) {
        let decision = decide(&event, &self.registry.lock());
        match decision {
            RouteDecision::ForwardToSource { id, url } => {
                debug!(action = %event.action, source = %id, "forwarding event");
                if let Err(e) = self.client.post(&url).json(&event).send().await {
                    warn!(error = %e, source = %id, "source unreachable, event dropped");
                }
            }
            RouteDecision::Volume(direction) => self.adjust_volume(direction).await,
            RouteDecision::Fallback => {
                debug!(action = %event.action, "no handler, falling back to automation");
                self.fallback.forward(&event).await;
            }
        }
    }

    /// Apply a source lifecycle update, then run its effects.
    pub async fn apply_source_update(&self, update: SourceUpdate) -> Option<String> {
        let output_on = self.adapter.is_on().await;
        let effects = self.registry.lock().apply(update, output_on);

        if effects.power_on {
            info!("output is off, powering on for playback");
            self.adapter.power_on().await;
        }
        self.relay.broadcast_all(&effects.broadcasts).await;
        self.active_source()
    }

    /// Step the tracked volume and push it through the adapter. The hardware
    /// call is skipped entirely while the output is off.
    async fn adjust_volume(&self, direction: VolumeDirection) {
        let target = {
            let mut volume = self.volume.lock();
            *volume = match direction {
                VolumeDirection::Up => volume.saturating_add(self.volume_step).min(100),
                VolumeDirection::Down => volume.saturating_sub(self.volume_step),
            };
            *volume
        };

        if self.adapter.is_on().await {
            debug!(volume = target, "adjusting volume");
            self.adapter.set_volume(target).await;
        } else {
            debug!(volume = target, "output off, volume tracked but not sent");
        }
    }

    /// Absolute volume request (`POST /router/volume`).
    pub async fn set_volume(&self, percent: u8) -> u8 {
        let target = percent.min(100);
        *self.volume.lock() = target;
        self.adapter.set_volume(target).await;
        target
    }

    /// Device-originated volume report; updates tracking only, so a manual
    /// knob turn is never echoed back to the hardware.
    pub fn report_volume(&self, percent: u8) -> u8 {
        let target = percent.min(100);
        *self.volume.lock() = target;
        target
    }

    /// Broadcast a UI navigation hint.
    pub async fn navigate(&self, view: String) {
        self.relay.broadcast(&Broadcast::Navigate { view }).await;
    }

    #[must_use]
    pub fn menu(&self) -> Vec<MenuEntry> {
        menu::build_menu(&self.menu_entries, &self.menu_tail, &self.registry.lock())
    }

    #[must_use]
    pub fn active_source(&self) -> Option<String> {
        self.registry.lock().active_id().map(String::from)
    }

    #[must_use]
    pub fn volume(&self) -> u8 {
        *self.volume.lock()
    }

    #[must_use]
    pub fn status(&self) -> RouterStatus {
        let registry = self.registry.lock();
        RouterStatus {
            active_source: registry.active_id().map(String::from),
            volume: *self.volume.lock(),
            sources: registry
                .iter_present()
                .map(|s| SourceStatus { id: s.id.clone(), state: s.state })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn playing_cd_registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new(vec![]);
        registry.apply(
            SourceUpdate {
                id: "cd".into(),
                state: SourceState::Playing,
                name: Some("CD".into()),
                command_url: Some("http://localhost:9100/cd/command".into()),
                handles: Some(vec!["go".into(), "next".into(), "prev".into(), "digits".into()]),
                after: Some("music".into()),
                navigate: false,
            },
            true,
        );
        registry
    }

    #[test]
    fn test_rule1_active_source_handles_action() {
        let registry = playing_cd_registry();
        assert_eq!(
            decide(&RouterEvent::new("go"), &registry),
            RouteDecision::ForwardToSource {
                id: "cd".into(),
                url: "http://localhost:9100/cd/command".into()
            }
        );
    }

    #[test]
    fn test_rule2_digits_capability() {
        let registry = playing_cd_registry();
        let decision = decide(&RouterEvent::new("3"), &registry);
        assert!(matches!(decision, RouteDecision::ForwardToSource { id, .. } if id == "cd"));
    }

    #[test]
    fn test_digits_not_forwarded_without_capability() {
        let mut registry = SourceRegistry::new(vec![]);
        registry.apply(
            SourceUpdate {
                id: "radio".into(),
                state: SourceState::Playing,
                name: None,
                command_url: Some("http://localhost:9200/radio".into()),
                handles: Some(vec!["go".into()]),
                after: None,
                navigate: false,
            },
            true,
        );
        assert_eq!(decide(&RouterEvent::new("3"), &registry), RouteDecision::Fallback);
    }

    #[test]
    fn test_rule3_action_names_known_source() {
        let mut registry = playing_cd_registry();
        registry.apply(
            SourceUpdate {
                id: "radio".into(),
                state: SourceState::Available,
                name: None,
                command_url: Some("http://localhost:9200/radio".into()),
                handles: None,
                after: None,
                navigate: false,
            },
            true,
        );

        let decision = decide(&RouterEvent::new("radio"), &registry);
        assert!(matches!(decision, RouteDecision::ForwardToSource { id, .. } if id == "radio"));
    }

    #[test]
    fn test_rule3_skips_gone_sources() {
        let mut registry = SourceRegistry::new(vec![]);
        registry.apply(
            SourceUpdate {
                id: "radio".into(),
                state: SourceState::Gone,
                name: None,
                command_url: Some("http://localhost:9200/radio".into()),
                handles: None,
                after: None,
                navigate: false,
            },
            true,
        );
        assert_eq!(decide(&RouterEvent::new("radio"), &registry), RouteDecision::Fallback);
    }

    #[test]
    fn test_rule4_volume_not_forwarded_to_active_source() {
        let registry = playing_cd_registry();
        assert_eq!(
            decide(&RouterEvent::new("volup"), &registry),
            RouteDecision::Volume(VolumeDirection::Up)
        );
        assert_eq!(
            decide(&RouterEvent::new("voldown"), &registry),
            RouteDecision::Volume(VolumeDirection::Down)
        );
    }

    #[test]
    fn test_rule1_beats_rule4_when_source_claims_volume() {
        let mut registry = SourceRegistry::new(vec![]);
        registry.apply(
            SourceUpdate {
                id: "files".into(),
                state: SourceState::Playing,
                name: None,
                command_url: Some("http://localhost:9300/files".into()),
                handles: Some(vec!["volup".into(), "voldown".into()]),
                after: None,
                navigate: false,
            },
            true,
        );

        let decision = decide(&RouterEvent::new("volup"), &registry);
        assert!(matches!(decision, RouteDecision::ForwardToSource { id, .. } if id == "files"));
    }

    #[test]
    fn test_rule5_unmatched_goes_to_fallback() {
        let registry = playing_cd_registry();
        assert_eq!(decide(&RouterEvent::new("red"), &registry), RouteDecision::Fallback);
        assert_eq!(decide(&RouterEvent::new("menu"), &registry), RouteDecision::Fallback);
    }

    #[test]
    fn test_no_active_source_skips_rules_1_and_2() {
        let registry = SourceRegistry::new(vec![]);
        assert_eq!(decide(&RouterEvent::new("go"), &registry), RouteDecision::Fallback);
    }

    // --- EventRouter volume path ---

    #[derive(Default)]
    struct FakeAdapter {
        on: Mutex<bool>,
        set_calls: Mutex<Vec<u8>>,
        power_on_calls: Mutex<u32>,
    }

    #[async_trait]
    impl VolumeAdapter for Arc<FakeAdapter> {
        async fn set_volume(&self, percent: u8) {
            self.set_calls.lock().push(percent);
        }

        async fn get_volume(&self) -> Option<u8> {
            self.set_calls.lock().last().copied()
        }

        async fn power_on(&self) {
            *self.power_on_calls.lock() += 1;
            *self.on.lock() = true;
        }

        async fn power_off(&self) {
            *self.on.lock() = false;
        }

        async fn is_on(&self) -> bool {
            *self.on.lock()
        }
    }

    fn test_router(adapter: Arc<FakeAdapter>, initial_volume: u8) -> EventRouter {
        let client = reqwest::Client::new();
        EventRouter::new(
            SourceRegistry::new(vec![]),
            Arc::new(adapter),
            UiRelay::new(client.clone(), None),
            AutomationHook::new(client.clone(), None),
            client,
            vec![MenuEntry::new("music", "Music"), MenuEntry::new("settings", "Settings")],
            "settings".to_string(),
            4,
            initial_volume,
        )
    }

    #[tokio::test]
    async fn test_volume_steps_through_adapter() {
        let adapter = Arc::new(FakeAdapter::default());
        *adapter.on.lock() = true;
        let router = test_router(Arc::clone(&adapter), 50);

        router.handle_event(RouterEvent::new("volup")).await;
        assert_eq!(router.volume(), 54);
        assert_eq!(*adapter.set_calls.lock(), vec![54]);

        router.handle_event(RouterEvent::new("voldown")).await;
        assert_eq!(router.volume(), 50);
    }

    #[tokio::test]
    async fn test_volume_clamped_to_bounds() {
        let adapter = Arc::new(FakeAdapter::default());
        *adapter.on.lock() = true;
        let router = test_router(Arc::clone(&adapter), 98);

        router.handle_event(RouterEvent::new("volup")).await;
        assert_eq!(router.volume(), 100);

        let router = test_router(Arc::clone(&adapter), 2);
        router.handle_event(RouterEvent::new("voldown")).await;
        assert_eq!(router.volume(), 0);
    }

    #[tokio::test]
    async fn test_volume_skips_hardware_when_output_off() {
        let adapter = Arc::new(FakeAdapter::default());
        let router = test_router(Arc::clone(&adapter), 50);

        router.handle_event(RouterEvent::new("volup")).await;
        assert_eq!(router.volume(), 54);
        assert!(adapter.set_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_playing_source_powers_on_output() {
        let adapter = Arc::new(FakeAdapter::default());
        let router = test_router(Arc::clone(&adapter), 50);

        let active = router
            .apply_source_update(SourceUpdate {
                id: "cd".into(),
                state: SourceState::Playing,
                name: None,
                command_url: None,
                handles: None,
                after: None,
                navigate: false,
            })
            .await;

        assert_eq!(active.as_deref(), Some("cd"));
        assert_eq!(*adapter.power_on_calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_report_volume_does_not_touch_adapter() {
        let adapter = Arc::new(FakeAdapter::default());
        *adapter.on.lock() = true;
        let router = test_router(Arc::clone(&adapter), 50);

        router.report_volume(70);
        assert_eq!(router.volume(), 70);
        assert!(adapter.set_calls.lock().is_empty());
    }
}

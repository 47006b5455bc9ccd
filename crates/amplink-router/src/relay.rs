//! Outbound notification clients: UI relay webhook and automation fallback.
//!
//! Both are strictly fire-and-forget. A peer that does not answer within its
//! short timeout gets a warning in the log and nothing else - the control
//! loop never waits on a broadcast.

use serde_json::json;
use tracing::{debug, warn};

use amplink_core::event::RouterEvent;
use amplink_core::source::Broadcast;

/// Webhook client for the UI relay.
#[derive(Clone)]
pub struct UiRelay {
    client: reqwest::Client,
    url: Option<String>,
}

impl UiRelay {
    #[must_use]
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }

    /// Send one broadcast to the relay, if one is configured.
    pub async fn broadcast(&self, broadcast: &Broadcast) {
        let Some(url) = &self.url else {
            return;
        };
        debug!(?broadcast, "broadcasting to UI relay");
        let body = json!({ "command": "broadcast", "params": broadcast });
        if let Err(e) = self.client.post(url).json(&body).send().await {
            warn!(error = %e, "UI relay unreachable, broadcast dropped");
        }
    }

    /// Send a batch in order.
    pub async fn broadcast_all(&self, broadcasts: &[Broadcast]) {
        for broadcast in broadcasts {
            self.broadcast(broadcast).await;
        }
    }
}

/// Client for the external automation hook that receives unmatched events.
#[derive(Clone)]
pub struct AutomationHook {
    client: reqwest::Client,
    url: Option<String>,
}

impl AutomationHook {
    #[must_use]
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }

    /// Forward an event nothing else claimed.
    pub async fn forward(&self, event: &RouterEvent) {
        let Some(url) = &self.url else {
            debug!(action = %event.action, "no automation hook configured, event dropped");
            return;
        };
        if let Err(e) = self.client.post(url).json(event).send().await {
            warn!(error = %e, action = %event.action, "automation hook unreachable, event dropped");
        }
    }
}

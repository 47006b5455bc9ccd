//! Volume backend for network speakers exposing a vendor REST API.
//!
//! These speakers take absolute percentages directly and are always on, so
//! the power operations are no-ops.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::VolumeBackend;

pub struct NetSpeakerVolume {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SpeakerVolume {
    level: u8,
}

impl NetSpeakerVolume {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl VolumeBackend for NetSpeakerVolume {
    async fn apply_volume(&self, percent: u8) {
        let url = format!("{}/api/volume", self.base_url);
        let body = json!({ "level": percent.min(100) });
        if let Err(e) = self.client.put(&url).json(&body).send().await {
            warn!(error = %e, "speaker API unreachable, volume change dropped");
        }
    }

    async fn read_volume(&self) -> Option<u8> {
        let url = format!("{}/api/volume", self.base_url);
        let response = self.client.get(&url).send().await.ok()?;
        response.json::<SpeakerVolume>().await.ok().map(|v| v.level.min(100))
    }

    async fn power_on(&self) {}

    async fn power_off(&self) {}

    async fn is_on(&self) -> bool {
        true
    }

    fn debounce_window(&self) -> Duration {
        // absolute writes are cheap, keep the knob feeling immediate
        Duration::from_millis(50)
    }
}

//! Volume backend driving the amplifier through the local mixer API.
//!
//! This is the bridge between router-side debouncing and device-side volume
//! stepping: the percentage is scaled onto the device range and handed to
//! the protocol engine, which turns it into relative step commands.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::VolumeBackend;

pub struct PowerLinkVolume {
    client: reqwest::Client,
    base_url: String,
    max_volume: u8,
    default_volume: u8,
}

#[derive(Debug, Deserialize)]
struct MixerStatus {
    powered: bool,
    volume: u8,
}

impl PowerLinkVolume {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String, max_volume: u8, default_volume: u8) -> Self {
        Self { client, base_url, max_volume, default_volume }
    }

    async fn status(&self) -> Option<MixerStatus> {
        let response = self
            .client
            .get(format!("{}/mixer/status", self.base_url))
            .send()
            .await
            .ok()?;
        response.json().await.ok()
    }
}

/// Scale a percentage onto the device's volume range, rounding to nearest.
fn to_device(percent: u8, max_volume: u8) -> u8 {
    let scaled = (u16::from(percent.min(100)) * u16::from(max_volume) + 50) / 100;
    u8::try_from(scaled).unwrap_or(max_volume)
}

/// Scale a device volume back to a percentage.
fn to_percent(device: u8, max_volume: u8) -> u8 {
    if max_volume == 0 {
        return 0;
    }
    let scaled = (u16::from(device) * 100 + u16::from(max_volume) / 2) / u16::from(max_volume);
    u8::try_from(scaled.min(100)).unwrap_or(100)
}

#[async_trait]
impl VolumeBackend for PowerLinkVolume {
    async fn apply_volume(&self, percent: u8) {
        let volume = to_device(percent, self.max_volume);
        let url = format!("{}/mixer/volume", self.base_url);
        if let Err(e) = self.client.post(&url).json(&json!({ "volume": volume })).send().await {
            warn!(error = %e, "mixer API unreachable, volume change dropped");
        }
    }

    async fn read_volume(&self) -> Option<u8> {
        self.status().await.map(|s| to_percent(s.volume, self.max_volume))
    }

    async fn power_on(&self) {
        let url = format!("{}/mixer/power", self.base_url);
        let body = json!({ "on": true, "volume": self.default_volume });
        if let Err(e) = self.client.post(&url).json(&body).send().await {
            warn!(error = %e, "mixer API unreachable, power-on dropped");
        }
    }

    async fn power_off(&self) {
        let url = format!("{}/mixer/power", self.base_url);
        if let Err(e) = self.client.post(&url).json(&json!({ "on": false })).send().await {
            warn!(error = %e, "mixer API unreachable, power-off dropped");
        }
    }

    async fn is_on(&self) -> bool {
        self.status().await.is_some_and(|s| s.powered)
    }

    fn debounce_window(&self) -> Duration {
        // stepping is slow on the device side, coalesce generously
        Duration::from_millis(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_to_device_scaling() {
        assert_eq!(to_device(0, 70), 0);
        assert_eq!(to_device(50, 70), 35);
        assert_eq!(to_device(100, 70), 70);
        assert_eq!(to_device(200, 70), 70); // clamped
    }

    #[test]
    fn test_device_to_percent_scaling() {
        assert_eq!(to_percent(0, 70), 0);
        assert_eq!(to_percent(35, 70), 50);
        assert_eq!(to_percent(70, 70), 100);
        assert_eq!(to_percent(10, 0), 0);
    }

    #[test]
    fn test_scaling_roundtrip_is_stable() {
        for percent in [0u8, 10, 25, 50, 75, 100] {
            let device = to_device(percent, 70);
            let back = to_percent(device, 70);
            assert!(back.abs_diff(percent) <= 1, "{percent}% -> {device} -> {back}%");
        }
    }
}

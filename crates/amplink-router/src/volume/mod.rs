//! Volume output adapters.
//!
//! One adapter instance is active per router process. Backends only know how
//! to apply an absolute percentage; debouncing of rapid requests is shared
//! logic layered on top.

mod debounce;
mod netspeaker;
mod powerlink;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use debounce::Debounced;
pub use netspeaker::NetSpeakerVolume;
pub use powerlink::PowerLinkVolume;

use crate::error::RouterResult;

/// The volume output surface the router drives.
#[async_trait]
pub trait VolumeAdapter: Send + Sync {
    /// Request a volume change in percent (0-100). Rapid calls coalesce;
    /// only the most recent value reaches the hardware.
    async fn set_volume(&self, percent: u8);

    /// Current volume in percent, if the backend can report it.
    async fn get_volume(&self) -> Option<u8>;

    async fn power_on(&self);

    async fn power_off(&self);

    async fn is_on(&self) -> bool;

    /// Balance control is optional; the default is centered and unsupported.
    async fn set_balance(&self, _balance: i8) {}

    async fn get_balance(&self) -> i8 {
        0
    }
}

/// What a concrete backend must provide. Everything above `apply_volume` is
/// handled by [`Debounced`].
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Push an absolute percentage to the output.
    async fn apply_volume(&self, percent: u8);

    /// Read the output's current percentage, if supported.
    async fn read_volume(&self) -> Option<u8>;

    async fn power_on(&self);

    async fn power_off(&self);

    async fn is_on(&self) -> bool;

    /// How long to coalesce rapid `set_volume` calls.
    fn debounce_window(&self) -> Duration {
        Duration::from_millis(100)
    }
}

/// Which backend a router process drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdapterBackend {
    /// The amplifier, through the local mixer API
    #[default]
    Powerlink,
    /// A network speaker's vendor REST API
    Netspeaker,
}

/// Volume adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub backend: AdapterBackend,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Device volume corresponding to 100% (powerlink only)
    #[serde(default = "default_max_volume")]
    pub max_volume: u8,
    /// Device volume applied on power-on (powerlink only)
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            backend: AdapterBackend::default(),
            host: default_host(),
            port: default_port(),
            max_volume: default_max_volume(),
            default_volume: default_volume(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8037
}

fn default_max_volume() -> u8 {
    70
}

fn default_volume() -> u8 {
    28
}

/// Build the configured adapter.
///
/// # Errors
/// Returns an error if the HTTP client cannot be constructed.
pub fn build_adapter(config: &AdapterConfig) -> RouterResult<Arc<dyn VolumeAdapter>> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(3)).build()?;
    let base_url = format!("http://{}:{}", config.host, config.port);

    Ok(match config.backend {
        AdapterBackend::Powerlink => Arc::new(Debounced::new(PowerLinkVolume::new(
            client,
            base_url,
            config.max_volume,
            config.default_volume,
        ))),
        AdapterBackend::Netspeaker => {
            Arc::new(Debounced::new(NetSpeakerVolume::new(client, base_url)))
        }
    })
}

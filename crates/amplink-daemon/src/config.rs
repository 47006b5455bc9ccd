//! Daemon configuration.
//!
//! One TOML file covers both processes; each binary reads the sections it
//! needs. Missing file or missing sections fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use amplink_core::source::SourceConfig;
use amplink_proto::engine::UsbConfig;
use amplink_proto::queue::QueueConfig;
use amplink_router::menu::MenuEntry;
use amplink_router::volume::AdapterConfig;

/// Full daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Amplifier USB device settings
    #[serde(default)]
    pub device: DeviceConfig,
    /// Mixer daemon settings
    #[serde(default)]
    pub mixer: MixerConfig,
    /// Router daemon settings
    #[serde(default)]
    pub router: RouterConfig,
    /// UI relay webhook
    #[serde(default)]
    pub relay: RelayConfig,
    /// Intake queue tuning
    #[serde(default)]
    pub queue: QueueTuning,
}

/// Amplifier device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name shown in logs and UI broadcasts
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// USB vendor ID (hex)
    #[serde(default = "default_vid")]
    pub vendor_id: String,
    /// USB product ID (hex)
    #[serde(default = "default_pid")]
    pub product_id: String,
    #[serde(default)]
    pub interface: u8,
    #[serde(default = "default_endpoint_in")]
    pub endpoint_in: u8,
    #[serde(default = "default_endpoint_out")]
    pub endpoint_out: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            vendor_id: default_vid(),
            product_id: default_pid(),
            interface: 0,
            endpoint_in: default_endpoint_in(),
            endpoint_out: default_endpoint_out(),
        }
    }
}

impl DeviceConfig {
    /// Resolve the hex id strings into a [`UsbConfig`].
    ///
    /// # Errors
    /// Returns an error if an id is not valid hex.
    pub fn usb_config(&self) -> Result<UsbConfig> {
        let vendor_id = u16::from_str_radix(&self.vendor_id, 16)
            .with_context(|| format!("Invalid vendor id: {}", self.vendor_id))?;
        let product_id = u16::from_str_radix(&self.product_id, 16)
            .with_context(|| format!("Invalid product id: {}", self.product_id))?;
        Ok(UsbConfig {
            vendor_id,
            product_id,
            interface: self.interface,
            endpoint_in: self.endpoint_in,
            endpoint_out: self.endpoint_out,
        })
    }
}

fn default_display_name() -> String {
    "AmpLink".to_string()
}

fn default_vid() -> String {
    "0cd4".to_string()
}

fn default_pid() -> String {
    "0101".to_string()
}

fn default_endpoint_in() -> u8 {
    0x81
}

fn default_endpoint_out() -> u8 {
    0x01
}

/// Mixer daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Mixer API port (local only)
    #[serde(default = "default_mixer_port")]
    pub port: u16,
    /// Highest device volume ever sent
    #[serde(default = "default_max_volume")]
    pub max_volume: u8,
    /// Device volume applied on power-on
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    /// Base URL of the router process
    #[serde(default = "default_router_url")]
    pub router_url: String,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            port: default_mixer_port(),
            max_volume: default_max_volume(),
            default_volume: default_volume(),
            router_url: default_router_url(),
        }
    }
}

fn default_mixer_port() -> u16 {
    8037
}

fn default_max_volume() -> u8 {
    70
}

fn default_volume() -> u8 {
    28
}

fn default_router_url() -> String {
    "http://127.0.0.1:8038".to_string()
}

/// Router daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_router_port")]
    pub port: u16,
    /// Percent change per volume key press
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
    /// Tracked volume at startup, percent
    #[serde(default = "default_initial_volume")]
    pub initial_volume: u8,
    /// Static menu entries, in display order
    #[serde(default = "default_menu")]
    pub menu: Vec<MenuEntry>,
    /// Menu entry dynamic items fall back in front of
    #[serde(default = "default_menu_tail")]
    pub menu_tail: String,
    /// Sources pre-registered at startup
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Endpoint receiving unmatched events
    #[serde(default)]
    pub automation_url: Option<String>,
    /// Volume output backend
    #[serde(default)]
    pub adapter: AdapterConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            port: default_router_port(),
            volume_step: default_volume_step(),
            initial_volume: default_initial_volume(),
            menu: default_menu(),
            menu_tail: default_menu_tail(),
            sources: Vec::new(),
            automation_url: None,
            adapter: AdapterConfig::default(),
        }
    }
}

fn default_router_port() -> u16 {
    8038
}

fn default_volume_step() -> u8 {
    4
}

fn default_initial_volume() -> u8 {
    40
}

fn default_menu() -> Vec<MenuEntry> {
    vec![
        MenuEntry::new("music", "Music"),
        MenuEntry::new("radio", "Radio"),
        MenuEntry::new("aux", "Aux In"),
        MenuEntry::new("settings", "Settings"),
    ]
}

fn default_menu_tail() -> String {
    "settings".to_string()
}

/// UI relay webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Webhook URL; broadcasts are skipped when unset
    pub url: Option<String>,
}

/// Intake queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTuning {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_expiry_ms")]
    pub expiry_ms: u64,
    #[serde(default = "default_priority_interval_ms")]
    pub priority_interval_ms: u64,
}

impl Default for QueueTuning {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            expiry_ms: default_expiry_ms(),
            priority_interval_ms: default_priority_interval_ms(),
        }
    }
}

impl QueueTuning {
    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.capacity,
            expiry: Duration::from_millis(self.expiry_ms),
            priority_interval: Duration::from_millis(self.priority_interval_ms),
        }
    }
}

fn default_queue_capacity() -> usize {
    10
}

fn default_expiry_ms() -> u64 {
    2000
}

fn default_priority_interval_ms() -> u64 {
    200
}

/// Load configuration from the default location or defaults.
///
/// # Errors
/// Returns an error if an existing config file cannot be read or parsed.
pub fn load() -> Result<Config> {
    let config_path = config_path()?;
    if config_path.exists() {
        load_from(&config_path)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {path:?}"))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {path:?}"))?;
    Ok(config)
}

fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "amplink", "AmpLink")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

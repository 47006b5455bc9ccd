//! Amplifier mixer state and audio routing modes.

use serde::{Deserialize, Serialize};

/// Audio routing mode of the amplifier.
///
/// The hardware only accepts four combinations of its three routing flags;
/// everything else is undefined behavior on the control bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// All audio paths off
    #[default]
    Off,
    /// Local source playing on the attached speakers only
    Local,
    /// Audio taken from the link bus
    Bus,
    /// Local source playing and distributed onto the link bus
    Distribute,
}

/// The raw routing flags a mode expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RoutingFlags {
    /// A local source is feeding the amplifier
    pub local: bool,
    /// Audio is taken from the link bus
    pub from_bus: bool,
    /// Local audio is distributed onto the link bus
    pub distribute: bool,
}

impl RoutingMode {
    /// Expand the mode into its routing flags.
    #[must_use]
    pub fn flags(self) -> RoutingFlags {
        match self {
            Self::Off => RoutingFlags::default(),
            Self::Local => RoutingFlags { local: true, ..RoutingFlags::default() },
            Self::Bus => RoutingFlags { from_bus: true, ..RoutingFlags::default() },
            Self::Distribute => {
                RoutingFlags { local: true, distribute: true, ..RoutingFlags::default() }
            }
        }
    }
}

/// Tracked state of the amplifier's mixer.
///
/// `volume` is the locally tracked target; `volume_confirmed` is the last
/// value echoed by the hardware. Feedback frames overwrite both - once the
/// device speaks, it is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct MixerState {
    /// Whether the amplifier is powered on
    pub powered: bool,
    /// Whether the amplifier is muted
    pub muted: bool,
    /// Current audio routing mode
    pub routing: RoutingMode,
    /// Locally tracked volume target
    pub volume: u8,
    /// Last volume value reported by the hardware
    pub volume_confirmed: u8,
    /// Bass setting
    pub bass: i8,
    /// Treble setting
    pub treble: i8,
    /// Balance setting (negative = left)
    pub balance: i8,
    /// Loudness compensation
    pub loudness: bool,
    /// Whether the USB control bus is currently connected
    pub connected: bool,
}

//! AmpLink Core - Shared domain types for the amplifier control hub.
//!
//! This crate contains the mixer state, remote event, and playback-source
//! models that are shared between the protocol engine and the event router.

pub mod event;
pub mod mixer;
pub mod source;

pub use event::RouterEvent;
pub use mixer::{MixerState, RoutingFlags, RoutingMode};
pub use source::{Broadcast, Source, SourceConfig, SourceState, SourceUpdate};

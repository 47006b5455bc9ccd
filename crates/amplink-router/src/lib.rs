//! AmpLink Router - Single ingress for remote/button events.
//!
//! The router tracks every playback source's lifecycle, decides which source
//! or local action handles each incoming event, builds the dynamic menu, and
//! drives volume through a pluggable output adapter.

pub mod error;
pub mod http;
pub mod menu;
pub mod registry;
pub mod relay;
pub mod router;
pub mod volume;

pub use error::{RouterError, RouterResult};
pub use registry::{SourceRegistry, UpdateEffects};
pub use router::{EventRouter, RouteDecision, VolumeDirection};
pub use volume::{VolumeAdapter, VolumeBackend};

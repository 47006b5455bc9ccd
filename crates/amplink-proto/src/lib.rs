//! AmpLink Proto - Protocol engine for the amplifier's USB control bus.
//!
//! This crate owns the reverse-engineered framed byte protocol: the codec,
//! the mixer command sequencing (the hardware crashes on out-of-order
//! commands, so ordering is enforced procedurally here), the lossy intake
//! queue between the blocking read thread and the sender loop, and the local
//! mixer HTTP API.

pub mod engine;
pub mod error;
pub mod frame;
pub mod http;
pub mod keymap;
pub mod mixer;
pub mod queue;

pub use engine::{Backoff, EventSender, ProtocolEngine, UsbConfig, UsbSink};
pub use error::{ProtoError, ProtoResult};
pub use frame::{MixerFeedback, ParsedMessage, RemoteKey};
pub use mixer::{FrameSink, MixerController};
pub use queue::{IntakeQueue, QueueConfig, QueueEntry};

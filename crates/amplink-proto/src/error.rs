//! Protocol engine error types.

use thiserror::Error;

/// Error type for control-bus operations.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Amplifier not found on the USB bus")]
    DeviceNotFound,

    #[error("Amplifier not connected")]
    NotConnected,

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Frame write failed: {0}")]
    WriteFailed(String),
}

/// Result type for control-bus operations.
pub type ProtoResult<T> = Result<T, ProtoError>;

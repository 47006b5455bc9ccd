//! Framed byte protocol for the amplifier controller.
//!
//! Frames are `[START, LEN, payload.., END]` with no checksum - integrity
//! relies on the USB transport. Frames are never pipelined: one write, then
//! the device may answer with feedback frames at its leisure.

use crate::keymap;

pub const FRAME_START: u8 = 0x60;
pub const FRAME_END: u8 = 0x61;

// Outbound opcodes
pub const OP_POWER_MUTE: u8 = 0xEA;
pub const OP_ROUTING_PRIMARY: u8 = 0xE7;
pub const OP_ROUTING_SECONDARY: u8 = 0xE5;
pub const OP_SET_PARAMS: u8 = 0xE3;
pub const OP_VOLUME_STEP: u8 = 0xEB;
pub const OP_SOURCE_ACTIVATE: u8 = 0xE4;

// Inbound type bytes
pub const TYPE_REMOTE_KEY: u8 = 0x02;
pub const TYPE_FEEDBACK: u8 = 0x03;
pub const TYPE_FEEDBACK_STANDBY: u8 = 0x1D;

/// Wrap an opcode payload in the frame envelope.
#[must_use]
pub fn encode(opcode: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(opcode.len() + 3);
    frame.push(FRAME_START);
    frame.push(u8::try_from(opcode.len()).unwrap_or(u8::MAX));
    frame.extend_from_slice(opcode);
    frame.push(FRAME_END);
    frame
}

/// Mixer parameters reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerFeedback {
    pub volume: u8,
    pub loudness: bool,
    pub bass: i8,
    pub treble: i8,
    pub balance: i8,
}

/// A decoded remote-control keypress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKey {
    /// Link bus the press came from
    pub link: String,
    /// Device type that produced it
    pub device: String,
    /// Decoded key name
    pub key: String,
}

/// Message decoded from an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    Feedback(MixerFeedback),
    RemoteKey(RemoteKey),
    /// Recognized envelope, unhandled type byte
    Other { kind: u8 },
}

/// Decode an inbound frame.
///
/// Returns `None` when the buffer is too short to contain a type byte.
/// Short payloads are padded with zeros rather than rejected.
#[must_use]
pub fn decode(raw: &[u8]) -> Option<ParsedMessage> {
    if raw.len() < 3 || raw[0] != FRAME_START {
        return None;
    }
    let len = raw[1] as usize;
    let payload = raw.get(2..2 + len)?;
    let (&kind, body) = payload.split_first()?;
    let byte = |i: usize| body.get(i).copied().unwrap_or(0);

    match kind {
        TYPE_FEEDBACK | TYPE_FEEDBACK_STANDBY => Some(ParsedMessage::Feedback(MixerFeedback {
            volume: byte(0) & 0x7F,
            loudness: byte(0) & 0x80 != 0,
            bass: byte(1) as i8,
            treble: byte(2) as i8,
            balance: byte(3) as i8,
        })),
        TYPE_REMOTE_KEY => Some(ParsedMessage::RemoteKey(RemoteKey {
            link: keymap::link_name(byte(0)),
            device: keymap::device_name(byte(1)),
            key: keymap::key_name(byte(2)),
        })),
        kind => Some(ParsedMessage::Other { kind }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_envelope() {
        assert_eq!(encode(&[OP_VOLUME_STEP, 0x01]), vec![0x60, 0x02, 0xEB, 0x01, 0x61]);
        assert_eq!(encode(&[]), vec![0x60, 0x00, 0x61]);
    }

    #[test]
    fn test_decode_too_short_is_none() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[0x60]).is_none());
        assert!(decode(&[0x60, 0x00, 0x61]).is_none()); // no type byte
    }

    #[test]
    fn test_decode_rejects_bad_start_byte() {
        assert!(decode(&[0x55, 0x02, 0x03, 0x20, 0x61]).is_none());
    }

    #[test]
    fn test_decode_feedback_masks_volume_and_loudness() {
        // volume 0x23 with loudness bit set, bass +2, treble -1, balance -3
        let raw = encode(&[TYPE_FEEDBACK, 0xA3, 0x02, 0xFF, 0xFD]);
        let Some(ParsedMessage::Feedback(fb)) = decode(&raw) else {
            panic!("expected feedback");
        };
        assert_eq!(fb.volume, 0x23);
        assert!(fb.loudness);
        assert_eq!(fb.bass, 2);
        assert_eq!(fb.treble, -1);
        assert_eq!(fb.balance, -3);
    }

    #[test]
    fn test_decode_standby_feedback_type() {
        let raw = encode(&[TYPE_FEEDBACK_STANDBY, 0x10, 0x00, 0x00, 0x00]);
        let Some(ParsedMessage::Feedback(fb)) = decode(&raw) else {
            panic!("expected feedback");
        };
        assert_eq!(fb.volume, 0x10);
        assert!(!fb.loudness);
    }

    #[test]
    fn test_decode_remote_key() {
        let raw = encode(&[TYPE_REMOTE_KEY, 0x01, 0x01, 0x60]);
        let Some(ParsedMessage::RemoteKey(key)) = decode(&raw) else {
            panic!("expected remote key");
        };
        assert_eq!(key.link, "audio");
        assert_eq!(key.device, "remote");
        assert_eq!(key.key, "volup");
    }

    #[test]
    fn test_decode_unknown_type_is_other() {
        let raw = encode(&[0x42, 0x00]);
        assert_eq!(decode(&raw), Some(ParsedMessage::Other { kind: 0x42 }));
    }
}

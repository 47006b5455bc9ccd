//! Lookup tables for decoded remote-control frames.
//!
//! The codes were reverse-engineered from bus captures; anything not in a
//! table decodes to an `unknown_0xNN` placeholder instead of failing.

/// Resolve a link-bus identifier.
#[must_use]
pub fn link_name(code: u8) -> String {
    match code {
        0x00 => "main".to_string(),
        0x01 => "audio".to_string(),
        0x05 => "broadcast".to_string(),
        other => unknown(other),
    }
}

/// Resolve a sending-device type.
#[must_use]
pub fn device_name(code: u8) -> String {
    match code {
        0x00 => "panel".to_string(),
        0x01 => "remote".to_string(),
        0x03 => "hub".to_string(),
        other => unknown(other),
    }
}

/// Resolve a keycode to its action name.
#[must_use]
pub fn key_name(code: u8) -> String {
    let name = match code {
        0x00..=0x09 => return code.to_string(),
        0x0C => "standby",
        0x0D => "mute",
        0x1E => "up",
        0x1F => "down",
        0x32 => "left",
        0x34 => "right",
        0x35 => "go",
        0x36 => "stop",
        0x5C => "menu",
        0x60 => "volup",
        0x64 => "voldown",
        0x7F => "exit",
        0x81 => "radio",
        0x91 => "music",
        0x92 => "cd",
        0x93 => "aux",
        0xD4 => "blue",
        0xD5 => "green",
        0xD8 => "yellow",
        0xD9 => "red",
        other => return unknown(other),
    };
    name.to_string()
}

/// Keys that auto-repeat while held; these get a dedup command key in the
/// intake queue.
#[must_use]
pub fn is_repeatable(action: &str) -> bool {
    matches!(action, "volup" | "voldown" | "left" | "right")
}

fn unknown(code: u8) -> String {
    format!("unknown_0x{code:02X}")
}

use std::io::{self, Write};

use serde::Serialize;

/// Keyboard modifier bits as reported by the X server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const SHIFT: u16 = 1 << 0;
    #[cfg(test)]
    pub const LOCK: u16 = 1 << 1;
    pub const CONTROL: u16 = 1 << 2;
    pub const MOD1: u16 = 1 << 3;
    pub const MOD2: u16 = 1 << 4;
    pub const MOD3: u16 = 1 << 5;
    pub const MOD4: u16 = 1 << 6;
    pub const MOD5: u16 = 1 << 7;

    /// Names sent to the child. The order is fixed regardless of how the
    /// server maps Mod1..Mod5; Lock is never reported.
    const NAMES: [(u16, &'static str); 7] = [
        (Self::SHIFT, "Shift"),
        (Self::CONTROL, "Control"),
        (Self::MOD1, "Mod1"),
        (Self::MOD2, "Mod2"),
        (Self::MOD3, "Mod3"),
        (Self::MOD4, "Mod4"),
        (Self::MOD5, "Mod5"),
    ];

    pub fn from_name(name: &str) -> Option<u16> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(bit, _)| *bit)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

/// A pointer click on one block.
#[derive(Debug, Clone, Default)]
pub struct ClickEvent<'a> {
    pub button: i32,
    pub name: Option<&'a str>,
    pub instance: Option<&'a str>,
    /// Position relative to the whole screen.
    pub x: i32,
    pub y: i32,
    /// Position relative to the block.
    pub relative_x: i32,
    pub relative_y: i32,
    /// Position relative to the output the bar is on.
    pub output_x: i32,
    pub output_y: i32,
    pub width: i32,
    pub height: i32,
    pub modifiers: Modifiers,
}

#[derive(Serialize)]
struct ClickPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<&'a str>,
    button: i32,
    modifiers: Vec<&'static str>,
    x: i32,
    y: i32,
    relative_x: i32,
    relative_y: i32,
    output_x: i32,
    output_y: i32,
    width: i32,
    height: i32,
}

/// Opens the click stream. It is never closed.
pub const STREAM_OPEN: &[u8] = b"[";

/// Serialize one click as a JSON object.
pub fn encode(event: &ClickEvent<'_>) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&ClickPayload {
        name: event.name,
        instance: event.instance,
        button: event.button,
        modifiers: event.modifiers.names(),
        x: event.x,
        y: event.y,
        relative_x: event.relative_x,
        relative_y: event.relative_y,
        output_x: event.output_x,
        output_y: event.output_y,
        width: event.width,
        height: event.height,
    })
}

/// Write `payload` and then a newline as two writes, and flush.
pub fn write_frame<W: Write>(out: &mut W, payload: &[u8]) -> io::Result<()> {
    out.write_all(payload)?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_encodes_fields_in_protocol_order() {
        let event = ClickEvent {
            button: 1,
            name: Some("vol"),
            instance: Some("0"),
            x: 10,
            y: 20,
            relative_x: 1,
            relative_y: 2,
            output_x: 3,
            output_y: 4,
            width: 30,
            height: 18,
            modifiers: Modifiers(Modifiers::SHIFT | Modifiers::CONTROL),
        };
        let json = String::from_utf8(encode(&event).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"name":"vol","instance":"0","button":1,"modifiers":["Shift","Control"],"x":10,"y":20,"relative_x":1,"relative_y":2,"output_x":3,"output_y":4,"width":30,"height":18}"#
        );
    }

    #[test]
    fn unset_identity_is_omitted() {
        let event = ClickEvent {
            button: 3,
            ..Default::default()
        };
        let value: serde_json::Value = serde_json::from_slice(&encode(&event).unwrap()).unwrap();
        assert!(value.get("name").is_none());
        assert!(value.get("instance").is_none());
        assert_eq!(value["button"], 3);
        assert_eq!(value["modifiers"], serde_json::json!([]));
    }

    #[test]
    fn modifier_names_keep_fixed_order_and_skip_lock() {
        let all = Modifiers(0xff);
        assert_eq!(
            all.names(),
            ["Shift", "Control", "Mod1", "Mod2", "Mod3", "Mod4", "Mod5"]
        );
        assert!(Modifiers(Modifiers::LOCK).names().is_empty());
        assert_eq!(Modifiers(Modifiers::MOD4 | Modifiers::SHIFT).names(), ["Shift", "Mod4"]);
    }

    #[test]
    fn modifier_lookup_by_name() {
        assert_eq!(Modifiers::from_name("mod4"), Some(Modifiers::MOD4));
        assert_eq!(Modifiers::from_name("Shift"), Some(Modifiers::SHIFT));
        assert_eq!(Modifiers::from_name("Hyper"), None);
    }

    #[test]
    fn frame_is_terminated_by_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, STREAM_OPEN).unwrap();
        write_frame(&mut out, b"{}").unwrap();
        assert_eq!(out, b"[\n{}\n");
    }
}

// Keyflow Key Type
// Represents a single HID keyboard usage code

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

include!(concat!(env!("OUT_DIR"), "/key_codes.rs"));

/// Short and alternative names accepted in keymap files.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("1", "KEY_1"),
    ("2", "KEY_2"),
    ("3", "KEY_3"),
    ("4", "KEY_4"),
    ("5", "KEY_5"),
    ("6", "KEY_6"),
    ("7", "KEY_7"),
    ("8", "KEY_8"),
    ("9", "KEY_9"),
    ("0", "KEY_0"),
    ("ENT", "ENTER"),
    ("RETURN", "ENTER"),
    ("ESCAPE", "ESC"),
    ("BSPC", "BACKSPACE"),
    ("SPC", "SPACE"),
    ("MINS", "MINUS"),
    ("EQL", "EQUAL"),
    ("LBRC", "LEFT_BRACE"),
    ("RBRC", "RIGHT_BRACE"),
    ("BSLS", "BACKSLASH"),
    ("SCLN", "SEMICOLON"),
    ("QUOT", "APOSTROPHE"),
    ("QUOTE", "APOSTROPHE"),
    ("GRV", "GRAVE"),
    ("COMM", "COMMA"),
    ("PERIOD", "DOT"),
    ("SLSH", "SLASH"),
    ("CAPS", "CAPSLOCK"),
    ("PSCR", "PRINT"),
    ("INS", "INSERT"),
    ("PGUP", "PAGE_UP"),
    ("DEL", "DELETE"),
    ("PGDN", "PAGE_DOWN"),
    ("RGHT", "RIGHT"),
    ("APP", "APPLICATION"),
    ("MENU", "APPLICATION"),
    ("VOLU", "VOLUMEUP"),
    ("VOLD", "VOLUMEDOWN"),
    ("LCTL", "LEFT_CTRL"),
    ("LSFT", "LEFT_SHIFT"),
    ("LALT", "LEFT_ALT"),
    ("LGUI", "LEFT_META"),
    ("RCTL", "RIGHT_CTRL"),
    ("RSFT", "RIGHT_SHIFT"),
    ("RALT", "RIGHT_ALT"),
    ("RGUI", "RIGHT_META"),
    ("LCTRL", "LEFT_CTRL"),
    ("LSHIFT", "LEFT_SHIFT"),
    ("LMETA", "LEFT_META"),
    ("RCTRL", "RIGHT_CTRL"),
    ("RSHIFT", "RIGHT_SHIFT"),
    ("RMETA", "RIGHT_META"),
];

/// Display name for a key code
pub fn key_name(code: u16) -> &'static str {
    static KEY_NAMES: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    KEY_NAMES
        .get_or_init(|| KEY_TABLE.iter().map(|&(name, code)| (code, name)).collect())
        .get(&code)
        .copied()
        .unwrap_or("UNKNOWN")
}

/// Parse a key from its name (case-insensitive, with QMK-style short aliases)
pub fn key_from_name(name: &str) -> Option<Key> {
    static NAME_TO_CODE: OnceLock<HashMap<String, u16>> = OnceLock::new();
    let table = NAME_TO_CODE.get_or_init(|| {
        let mut map: HashMap<String, u16> = KEY_TABLE
            .iter()
            .map(|&(name, code)| (name.to_string(), code))
            .collect();
        for &(alias, canonical) in KEY_ALIASES {
            if let Some(&code) = map.get(canonical) {
                map.insert(alias.to_string(), code);
            }
        }
        map
    });

    let upper = name.trim().to_ascii_uppercase();
    let upper = upper.strip_prefix("KC_").unwrap_or(&upper);
    table.get(upper).map(|&code| Key(code))
}

impl Key {
    /// True for the eight HID modifier usages (0xE0..=0xE7)
    pub const fn is_modifier(self) -> bool {
        self.0 >= 0xE0 && self.0 <= 0xE7
    }

    /// True for letters A..=Z
    pub const fn is_alpha(self) -> bool {
        self.0 >= 0x04 && self.0 <= 0x1D
    }

    /// True for the number row 1..=0
    pub const fn is_digit(self) -> bool {
        self.0 >= 0x1E && self.0 <= 0x27
    }

    /// True for the reserved "no key" usage
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

// Keyflow Modifier System
// Represents the 8-bit HID modifier mask (Ctrl, Shift, Alt, Gui per side)

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;
use std::sync::OnceLock;

use thiserror::Error;

use crate::Key;

/// HID modifier byte, bit order as in the boot keyboard report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Mods(u8);

impl Mods {
    pub const NONE: Mods = Mods(0);
    pub const LCTRL: Mods = Mods(0x01);
    pub const LSHIFT: Mods = Mods(0x02);
    pub const LALT: Mods = Mods(0x04);
    pub const LGUI: Mods = Mods(0x08);
    pub const RCTRL: Mods = Mods(0x10);
    pub const RSHIFT: Mods = Mods(0x20);
    pub const RALT: Mods = Mods(0x40);
    pub const RGUI: Mods = Mods(0x80);

    pub const CTRL: Mods = Mods(0x11);
    pub const SHIFT: Mods = Mods(0x22);
    pub const ALT: Mods = Mods(0x44);
    pub const GUI: Mods = Mods(0x88);

    /// Raw modifier byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Mods(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: Mods) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`
    pub const fn intersects(self, other: Mods) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Mods) -> Mods {
        Mods(self.0 | other.0)
    }

    pub const fn difference(self, other: Mods) -> Mods {
        Mods(self.0 & !other.0)
    }

    /// Modifier bit for a modifier keycode (0xE0..=0xE7)
    pub fn from_key(key: Key) -> Option<Mods> {
        if key.is_modifier() {
            Some(Mods(1 << (key.code() - 0xE0)))
        } else {
            None
        }
    }

    /// Modifier keycodes for each set bit, in usage order
    pub fn keys(self) -> impl Iterator<Item = Key> {
        (0..8u16)
            .filter(move |bit| self.0 & (1 << bit) != 0)
            .map(|bit| Key(0xE0 + bit))
    }

    /// Replace GUI bits by the CTRL bit on the same side
    pub const fn gui_to_ctrl(self) -> Mods {
        let gui = self.0 & Mods::GUI.0;
        Mods((self.0 & !Mods::GUI.0) | (gui >> 3))
    }

    /// Canonical single-bit names for display
    fn bit_names(self) -> Vec<&'static str> {
        const NAMES: [&str; 8] = [
            "LCtrl", "LShift", "LAlt", "LGui", "RCtrl", "RShift", "RAlt", "RGui",
        ];
        (0..8)
            .filter(|bit| self.0 & (1 << bit) != 0)
            .map(|bit| NAMES[bit])
            .collect()
    }

    /// Look up a single modifier name or alias
    pub fn from_alias(alias: &str) -> Option<Mods> {
        static ALIASES: OnceLock<HashMap<String, Mods>> = OnceLock::new();
        ALIASES
            .get_or_init(|| {
                let mut map = HashMap::new();
                let mut add = |names: &[&str], mods: Mods| {
                    for name in names {
                        map.insert(name.to_ascii_uppercase(), mods);
                    }
                };
                add(&["LCtrl", "LCtl", "LControl", "LC"], Mods::LCTRL);
                add(&["RCtrl", "RCtl", "RControl", "RC"], Mods::RCTRL);
                add(&["Ctrl", "Ctl", "Control"], Mods::LCTRL);
                add(&["LShift", "LSft", "LS"], Mods::LSHIFT);
                add(&["RShift", "RSft", "RS"], Mods::RSHIFT);
                add(&["Shift", "Sft"], Mods::LSHIFT);
                add(&["LAlt", "LOpt", "LOption", "LA"], Mods::LALT);
                add(&["RAlt", "ROpt", "ROption", "RA", "AltGr"], Mods::RALT);
                add(&["Alt", "Opt", "Option"], Mods::LALT);
                add(
                    &["LGui", "LMeta", "LSuper", "LWin", "LCmd", "LCommand", "LG"],
                    Mods::LGUI,
                );
                add(
                    &["RGui", "RMeta", "RSuper", "RWin", "RCmd", "RCommand", "RG"],
                    Mods::RGUI,
                );
                add(&["Gui", "Meta", "Super", "Win", "Cmd", "Command"], Mods::LGUI);
                add(&["Meh"], Mods::LCTRL | Mods::LSHIFT | Mods::LALT);
                add(
                    &["Hyper"],
                    Mods::LCTRL | Mods::LSHIFT | Mods::LALT | Mods::LGUI,
                );
                map
            })
            .get(&alias.trim().to_ascii_uppercase())
            .copied()
    }
}

impl BitOr for Mods {
    type Output = Mods;

    fn bitor(self, rhs: Mods) -> Mods {
        Mods(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mods {
    fn bitor_assign(&mut self, rhs: Mods) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Mods {
    type Output = Mods;

    fn bitand(self, rhs: Mods) -> Mods {
        Mods(self.0 & rhs.0)
    }
}

impl Not for Mods {
    type Output = Mods;

    fn not(self) -> Mods {
        Mods(!self.0)
    }
}

impl fmt::Display for Mods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.bit_names().join("-"))
    }
}

/// Errors that can occur when parsing modifier expressions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModsParseError {
    #[error("empty modifier expression")]
    Empty,

    #[error("unknown modifier '{0}'")]
    Unknown(String),
}

impl FromStr for Mods {
    type Err = ModsParseError;

    /// Parse `LCtrl-LAlt-LGui` (or `+` separated) into a mask
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ModsParseError::Empty);
        }
        s.split(['-', '+', '|'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Mods::NONE, |acc, part| {
                Mods::from_alias(part)
                    .map(|m| acc | m)
                    .ok_or_else(|| ModsParseError::Unknown(part.to_string()))
            })
    }
}

/// Check if a key code is a modifier usage
#[inline]
pub const fn is_key_modifier_code(code: u16) -> bool {
    code >= 0xE0 && code <= 0xE7
}

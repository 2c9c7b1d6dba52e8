// Keyflow Output Events
// What the engine hands to the output emitter

use std::fmt;

use crate::context::HostOs;
use crate::mapping::{LayerId, LightingCommand};
use crate::output::Hsv;
use crate::{Key, Mods};

/// Fire-and-forget notifications for LEDs and display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indicator {
    OsChanged { os: HostOs, color: Hsv },
    LayerChanged { layer: LayerId, name: String },
    CapsWord(bool),
    /// Currently armed or locked one-shot bits
    OneShot(Mods),
    Lighting(LightingCommand),
    /// Typing speed for the display
    Wpm(u16),
}

/// One resolved output operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Key goes down; `mods` is the exact modifier byte for this stroke
    KeyDown { key: Key, mods: Mods },
    KeyUp(Key),
    /// Held modifiers changed
    ModsChanged(Mods),
    /// Typed text (macros)
    Text(String),
    Indicator(Indicator),
}

impl OutputEvent {
    pub fn is_indicator(&self) -> bool {
        matches!(self, OutputEvent::Indicator(_))
    }
}

impl fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputEvent::KeyDown { key, mods } if mods.is_empty() => write!(f, "down {}", key),
            OutputEvent::KeyDown { key, mods } => write!(f, "down {}+{}", mods, key),
            OutputEvent::KeyUp(key) => write!(f, "up {}", key),
            OutputEvent::ModsChanged(mods) => write!(f, "mods {}", mods),
            OutputEvent::Text(text) => write!(f, "text {:?}", text),
            OutputEvent::Indicator(ind) => write!(f, "indicator {:?}", ind),
        }
    }
}

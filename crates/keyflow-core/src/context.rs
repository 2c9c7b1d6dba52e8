// Keyflow Host Context
// Which OS family the keyboard believes it talks to, and the remaps that follow

use strum_macros::{Display, EnumIter, EnumString};

use crate::mapping::{HostSettings, OsShortcut};
use crate::output::Hsv;
use crate::{Key, Mods};

/// OS family used for modifier semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HostOs {
    #[default]
    Unknown,
    #[strum(to_string = "mac", serialize = "macos")]
    Mac,
    Windows,
    Linux,
}

impl HostOs {
    /// Next OS for the cycle key: Mac -> Windows -> Linux -> Mac
    pub fn next(self) -> HostOs {
        match self {
            HostOs::Mac => HostOs::Windows,
            HostOs::Windows => HostOs::Linux,
            HostOs::Linux | HostOs::Unknown => HostOs::Mac,
        }
    }

    /// Indicator colour for this OS
    pub fn color(self) -> Hsv {
        match self {
            HostOs::Mac => Hsv::BLUE,
            HostOs::Windows => Hsv::GREEN,
            HostOs::Linux => Hsv::GOLD,
            HostOs::Unknown => Hsv::RED,
        }
    }
}

/// Value reported by host auto-detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DetectedOs {
    Unknown,
    #[strum(to_string = "macos", serialize = "mac")]
    MacOs,
    Ios,
    Windows,
    Linux,
}

/// Session-wide host selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    selected: HostOs,
    /// Last detection came back unsure; the fallback is in effect
    unsure: bool,
    settings: HostSettings,
}

impl HostContext {
    pub fn new(settings: HostSettings) -> Self {
        Self {
            selected: HostOs::Unknown,
            unsure: false,
            settings,
        }
    }

    /// Selected OS, `Unknown` until detection or a cycle
    pub fn selected(&self) -> HostOs {
        self.selected
    }

    /// OS whose semantics apply (fallback while unknown)
    pub fn effective(&self) -> HostOs {
        match self.selected {
            HostOs::Unknown => self.settings.fallback,
            os => os,
        }
    }

    pub fn is_mac(&self) -> bool {
        self.effective() == HostOs::Mac
    }

    /// Snap to the detected OS, overriding any user selection
    pub fn detect(&mut self, detected: DetectedOs) -> HostOs {
        self.selected = match detected {
            DetectedOs::MacOs | DetectedOs::Ios => HostOs::Mac,
            DetectedOs::Windows => HostOs::Windows,
            DetectedOs::Linux => HostOs::Linux,
            DetectedOs::Unknown => self.settings.fallback,
        };
        self.unsure = detected == DetectedOs::Unknown;
        log::debug!("host detected as {} -> {}", detected, self.selected);
        self.selected
    }

    /// Explicit user toggle
    pub fn cycle(&mut self) -> HostOs {
        self.selected = self.selected.next();
        self.unsure = false;
        log::debug!("host cycled to {}", self.selected);
        self.selected
    }

    fn swaps(&self) -> bool {
        self.settings.swap_gui_ctrl && !self.is_mac()
    }

    /// GUI keycodes become CTRL on non-Mac hosts
    pub fn remap_key(&self, key: Key) -> Key {
        if !self.swaps() {
            return key;
        }
        match key {
            Key::LEFT_META => Key::LEFT_CTRL,
            Key::RIGHT_META => Key::RIGHT_CTRL,
            other => other,
        }
    }

    /// GUI bits become CTRL bits on non-Mac hosts
    pub fn remap_mods(&self, mods: Mods) -> Mods {
        if self.swaps() {
            mods.gui_to_ctrl()
        } else {
            mods
        }
    }

    /// Mask applied by a one-shot key; `non_mac` is used verbatim off Mac
    pub fn oneshot_mods(&self, mods: Mods, non_mac: Option<Mods>) -> Mods {
        match non_mac {
            Some(alt) if !self.is_mac() => alt,
            _ => self.remap_mods(mods),
        }
    }

    /// Modifier for editing shortcuts: GUI on Mac, CTRL elsewhere
    pub fn command_mods(&self) -> Mods {
        if self.is_mac() {
            Mods::LGUI
        } else {
            Mods::LCTRL
        }
    }

    /// Physical keystroke for a logical shortcut
    pub fn shortcut(&self, shortcut: OsShortcut) -> (Key, Mods) {
        (shortcut.key(), self.command_mods())
    }

    /// Colour announced to the lighting subsystem; red while detection is unsure
    pub fn indicator_color(&self) -> Hsv {
        if self.unsure {
            HostOs::Unknown.color()
        } else {
            self.selected.color()
        }
    }
}

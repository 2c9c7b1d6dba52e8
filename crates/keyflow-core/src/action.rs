use std::fmt;

use crate::mapping::KeyId;
use crate::timing::Tick;

/// Represents the transition of a physical key.
///
/// Matrix scanning only ever reports edges, so unlike evdev there is no
/// repeat state:
///   0 == 'released'
///   1 == 'pressed'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Release = 0,
    Press = 1,
}

impl Action {
    /// Returns true if this is a PRESS transition
    pub fn is_pressed(self) -> bool {
        matches!(self, Action::Press)
    }

    /// Returns true if this is a RELEASE transition
    pub fn is_released(self) -> bool {
        matches!(self, Action::Release)
    }

    /// Action from the matrix boolean (`true` = switch closed)
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            Action::Press
        } else {
            Action::Release
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Release => write!(f, "release"),
            Action::Press => write!(f, "press"),
        }
    }
}

/// One key transition as produced by the matrix scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyId,
    pub action: Action,
    pub time: Tick,
}

impl KeyEvent {
    pub fn press(key: KeyId, time: Tick) -> Self {
        Self {
            key,
            action: Action::Press,
            time,
        }
    }

    pub fn release(key: KeyId, time: Tick) -> Self {
        Self {
            key,
            action: Action::Release,
            time,
        }
    }

    pub fn is_press(&self) -> bool {
        self.action.is_pressed()
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @{}", self.action, self.key, self.time)
    }
}

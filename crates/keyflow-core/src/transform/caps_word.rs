// Keyflow Caps Word
// Shift letters until a key outside the word allow-list is typed

use crate::mapping::CapsWordConfig;
use crate::timing::{deadline_reached, Duration, Tick};
use crate::{Key, Mods};

/// What caps word does to one keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapsWordEffect {
    /// Caps word is off
    Inactive,
    /// Send the key with shift
    AddShift,
    /// Send the key as-is, stay on
    Keep,
    /// Send the key as-is, caps word just turned off
    Deactivated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsWord {
    active: bool,
    last_activity: Tick,
}

impl CapsWord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self, now: Tick) {
        if !self.active {
            log::debug!("caps word on");
        }
        self.active = true;
        self.last_activity = now;
    }

    pub fn deactivate(&mut self) {
        if self.active {
            log::debug!("caps word off");
        }
        self.active = false;
    }

    /// Returns the new state
    pub fn toggle(&mut self, now: Tick) -> bool {
        if self.active {
            self.deactivate();
        } else {
            self.activate(now);
        }
        self.active
    }

    /// Classify a non-modifier keystroke.
    ///
    /// `shifted` marks keys that already carry shift (underscore is shifted
    /// minus); `mods` are the other modifiers the stroke would carry.
    pub fn on_keystroke(
        &mut self,
        key: Key,
        shifted: bool,
        mods: Mods,
        config: &CapsWordConfig,
        now: Tick,
    ) -> CapsWordEffect {
        if !self.active {
            return CapsWordEffect::Inactive;
        }
        if key.is_modifier() {
            return CapsWordEffect::Keep;
        }

        let effect = if !mods.difference(Mods::SHIFT).is_empty() {
            CapsWordEffect::Deactivated
        } else if !shifted && (key.is_alpha() || config.extra_shifted.contains(&key)) {
            CapsWordEffect::AddShift
        } else if Self::continues_word(key, shifted) || config.extra_continue.contains(&key) {
            CapsWordEffect::Keep
        } else {
            CapsWordEffect::Deactivated
        };

        match effect {
            CapsWordEffect::Deactivated => self.deactivate(),
            _ => self.last_activity = now,
        }
        effect
    }

    fn continues_word(key: Key, shifted: bool) -> bool {
        match key {
            Key::MINUS => true,
            Key::BACKSPACE | Key::DELETE => !shifted,
            k if k.is_digit() => !shifted,
            k => shifted && k.is_alpha(),
        }
    }

    /// Turn off after `timeout` without keystrokes. Returns true if it did.
    pub fn expire(&mut self, now: Tick, timeout: Duration) -> bool {
        if !self.active || timeout == 0 {
            return false;
        }
        if deadline_reached(now, self.last_activity.wrapping_add(timeout)) {
            self.deactivate();
            return true;
        }
        false
    }
}

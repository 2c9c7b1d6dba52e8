// Keyflow One-Shot Modifiers
// Modifiers applied to exactly the next keystroke, with tap-again-to-lock

use crate::timing::{deadline_reached, Duration, Tick};
use crate::Mods;

/// Lifecycle of one-shot modifier bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneShotState {
    Idle,
    Armed,
    Locked,
}

/// Session-wide one-shot modifier state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneShotTracker {
    armed: Mods,
    locked: Mods,
    armed_at: Tick,
}

impl OneShotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a tap of a one-shot key carrying `mods`.
    ///
    /// Idle bits become armed, armed bits become locked, locked bits are
    /// released. Returns the resulting state of those bits.
    pub fn arm(&mut self, mods: Mods, now: Tick) -> OneShotState {
        if self.locked.contains(mods) {
            self.locked = self.locked.difference(mods);
            log::debug!("one-shot {} unlocked", mods);
            OneShotState::Idle
        } else if self.armed.contains(mods) {
            self.armed = self.armed.difference(mods);
            self.locked |= mods;
            log::debug!("one-shot {} locked", mods);
            OneShotState::Locked
        } else {
            self.armed |= mods;
            self.armed_at = now;
            log::debug!("one-shot {} armed", mods);
            OneShotState::Armed
        }
    }

    /// Bits to apply to the keystroke being emitted; armed bits are cleared
    pub fn consume_on_next_keystroke(&mut self) -> Mods {
        let applied = self.armed | self.locked;
        if !self.armed.is_empty() {
            log::trace!("one-shot {} consumed", self.armed);
        }
        self.armed = Mods::NONE;
        applied
    }

    /// Bits that the next keystroke would receive
    pub fn query_active_modifiers(&self) -> Mods {
        self.armed | self.locked
    }

    pub fn state_of(&self, mods: Mods) -> OneShotState {
        if self.locked.contains(mods) && !mods.is_empty() {
            OneShotState::Locked
        } else if self.armed.contains(mods) && !mods.is_empty() {
            OneShotState::Armed
        } else {
            OneShotState::Idle
        }
    }

    /// Drop armed (not locked) bits older than `timeout`. Returns true if
    /// anything expired. A zero timeout never expires.
    pub fn expire(&mut self, now: Tick, timeout: Duration) -> bool {
        if timeout == 0 || self.armed.is_empty() {
            return false;
        }
        if deadline_reached(now, self.armed_at.wrapping_add(timeout)) {
            log::debug!("one-shot {} expired", self.armed);
            self.armed = Mods::NONE;
            return true;
        }
        false
    }
}

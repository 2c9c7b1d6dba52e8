// Keyflow Words Per Minute
// Rolling keystroke count over a sampling window, scaled to words per minute

use std::collections::VecDeque;

use crate::timing::{deadline_reached, Duration, Tick};
use crate::{Key, Mods};

/// Keystrokes per word
const STROKES_PER_WORD: u64 = 5;

/// Largest value the three-digit display can show
pub const WPM_MAX: u16 = 999;

/// Letters, digits, Enter/Esc/Backspace/Tab/Space and punctuation count;
/// shortcuts (CTRL/ALT/GUI held) do not
pub fn is_typing_stroke(key: Key, mods: Mods) -> bool {
    (0x04..=0x38).contains(&key.code()) && !mods.intersects(Mods::CTRL | Mods::ALT | Mods::GUI)
}

#[derive(Debug, Clone, Default)]
pub struct WpmTracker {
    window: Duration,
    strokes: VecDeque<Tick>,
    announced: u16,
}

impl WpmTracker {
    /// A zero `window` disables the counter
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.window > 0
    }

    /// Note one emitted key-down at `now`
    pub fn record(&mut self, key: Key, mods: Mods, now: Tick) {
        if self.is_enabled() && is_typing_stroke(key, mods) {
            self.strokes.push_back(now);
        }
    }

    fn prune(&mut self, now: Tick) {
        while let Some(&at) = self.strokes.front() {
            if !deadline_reached(now, at.wrapping_add(self.window)) {
                break;
            }
            self.strokes.pop_front();
        }
    }

    /// Words per minute over the window ending at the last prune
    pub fn current(&self) -> u16 {
        if !self.is_enabled() {
            return 0;
        }
        let per_minute =
            self.strokes.len() as u64 * 60_000 / (STROKES_PER_WORD * u64::from(self.window));
        per_minute.min(u64::from(WPM_MAX)) as u16
    }

    /// Drop strokes older than the window; the new value if it changed
    /// since the last call
    pub fn poll(&mut self, now: Tick) -> Option<u16> {
        if !self.is_enabled() {
            return None;
        }
        self.prune(now);
        let wpm = self.current();
        if wpm == self.announced {
            return None;
        }
        log::trace!("wpm {} -> {}", self.announced, wpm);
        self.announced = wpm;
        Some(wpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_strokes() {
        assert!(is_typing_stroke(Key::A, Mods::NONE));
        assert!(is_typing_stroke(Key::A, Mods::LSHIFT));
        assert!(is_typing_stroke(Key::SPACE, Mods::NONE));
        assert!(is_typing_stroke(Key::SLASH, Mods::NONE));
        assert!(!is_typing_stroke(Key::C, Mods::LCTRL));
        assert!(!is_typing_stroke(Key::LEFT, Mods::NONE));
        assert!(!is_typing_stroke(Key::LEFT_SHIFT, Mods::NONE));
    }

    #[test]
    fn test_rate_and_decay() {
        let mut wpm = WpmTracker::new(5000);
        // ten strokes in 5 s: two words in 1/12 minute
        for i in 0..10 {
            wpm.record(Key::E, Mods::NONE, i * 100);
        }
        assert_eq!(wpm.poll(1000), Some(24));
        assert_eq!(wpm.poll(1500), None);

        // the first five fall out of the window
        assert_eq!(wpm.poll(5400), Some(12));
        assert_eq!(wpm.poll(5900), Some(0));
        assert_eq!(wpm.poll(9000), None);
    }

    #[test]
    fn test_shortcuts_not_counted() {
        let mut wpm = WpmTracker::new(5000);
        wpm.record(Key::C, Mods::LGUI, 0);
        wpm.record(Key::V, Mods::RCTRL, 10);
        assert_eq!(wpm.poll(20), None);
        assert_eq!(wpm.current(), 0);
    }

    #[test]
    fn test_saturates_for_display() {
        let mut wpm = WpmTracker::new(1000);
        for i in 0..200 {
            wpm.record(Key::A, Mods::NONE, i);
        }
        assert_eq!(wpm.poll(200), Some(WPM_MAX));
    }

    #[test]
    fn test_window_across_tick_wrap() {
        let mut wpm = WpmTracker::new(5000);
        let start = u32::MAX - 100;
        for i in 0..5 {
            wpm.record(Key::H, Mods::NONE, start.wrapping_add(i * 50));
        }
        assert_eq!(wpm.poll(start.wrapping_add(300)), Some(12));
        assert_eq!(wpm.poll(start.wrapping_add(5000)), Some(9));
        assert_eq!(wpm.poll(start.wrapping_add(5200)), Some(0));
    }

    #[test]
    fn test_disabled() {
        let mut wpm = WpmTracker::new(0);
        wpm.record(Key::A, Mods::NONE, 0);
        assert!(!wpm.is_enabled());
        assert_eq!(wpm.poll(10), None);
    }
}

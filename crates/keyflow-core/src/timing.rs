// Keyflow Timing
// Wrapping millisecond ticks and the per-key timing policy table

use std::collections::HashMap;

use crate::mapping::{InterruptPolicy, KeyId};

/// Monotonic millisecond counter; wraps after ~49 days of uptime
pub type Tick = u32;

/// Length of a window in milliseconds
pub type Duration = u32;

/// Wraparound-safe "has `deadline` passed" check.
///
/// Valid as long as the two ticks are less than 2^31 ms apart.
#[inline]
pub fn deadline_reached(now: Tick, deadline: Tick) -> bool {
    now.wrapping_sub(deadline) as i32 >= 0
}

/// Milliseconds from `since` to `now`, modulo the tick width
#[inline]
pub fn elapsed(now: Tick, since: Tick) -> Duration {
    now.wrapping_sub(since)
}

/// Default values used when a keymap does not set them
pub mod defaults {
    use super::Duration;

    pub const TAPPING_TERM: Duration = 200;
    pub const COMBO_TERM: Duration = 50;
    pub const ONESHOT_TIMEOUT: Duration = 5000;
    pub const CAPS_WORD_IDLE_TIMEOUT: Duration = 5000;
    pub const SHORTCUT_MULTIPLIER: u32 = 2;
    pub const WPM_WINDOW: Duration = 0;
}

/// Resolution windows for dual-role keys, combos, one-shots and caps word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingPolicy {
    pub tapping_term: Duration,
    pub per_key: HashMap<KeyId, Duration>,
    pub shortcut_multiplier: u32,
    /// 0 disables quick-tap
    pub quick_tap_term: Duration,
    pub combo_term: Duration,
    /// 0 = never expire
    pub oneshot_timeout: Duration,
    /// 0 = never expire
    pub caps_word_idle_timeout: Duration,
    /// Words-per-minute sampling window, 0 = counter off
    pub wpm_window: Duration,
    pub default_interrupt: InterruptPolicy,
    pub interrupt: HashMap<KeyId, InterruptPolicy>,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            tapping_term: defaults::TAPPING_TERM,
            per_key: HashMap::new(),
            shortcut_multiplier: defaults::SHORTCUT_MULTIPLIER,
            quick_tap_term: defaults::TAPPING_TERM,
            combo_term: defaults::COMBO_TERM,
            oneshot_timeout: defaults::ONESHOT_TIMEOUT,
            caps_word_idle_timeout: defaults::CAPS_WORD_IDLE_TIMEOUT,
            wpm_window: defaults::WPM_WINDOW,
            default_interrupt: InterruptPolicy::HoldOnOtherPress,
            interrupt: HashMap::new(),
        }
    }
}

impl TimingPolicy {
    /// Policy with the given base tapping term and matching quick-tap term
    pub fn with_tapping_term(term: Duration) -> Self {
        Self {
            tapping_term: term,
            quick_tap_term: term,
            ..Self::default()
        }
    }

    /// Resolution window for a dual-role key.
    ///
    /// A per-key override wins; shortcut keys otherwise get the multiplied term.
    pub fn window_for(&self, key: KeyId, is_shortcut: bool) -> Duration {
        if let Some(&window) = self.per_key.get(&key) {
            return window;
        }
        if is_shortcut {
            self.tapping_term.saturating_mul(self.shortcut_multiplier)
        } else {
            self.tapping_term
        }
    }

    /// Interrupt policy for a dual-role key
    pub fn interrupt_for(&self, key: KeyId) -> InterruptPolicy {
        self.interrupt
            .get(&key)
            .copied()
            .unwrap_or(self.default_interrupt)
    }

    /// Combo window, honouring a per-combo override
    pub fn combo_window(&self, per_combo: Option<Duration>) -> Duration {
        per_combo.unwrap_or(self.combo_term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_reached() {
        assert!(deadline_reached(100, 100));
        assert!(deadline_reached(101, 100));
        assert!(!deadline_reached(99, 100));
    }

    #[test]
    fn test_deadline_reached_across_wrap() {
        let deadline = 10u32; // set at u32::MAX - 20 with a 31ms window
        assert!(!deadline_reached(u32::MAX - 5, deadline));
        assert!(!deadline_reached(9, deadline));
        assert!(deadline_reached(10, deadline));
        assert!(deadline_reached(40, deadline));
        assert_eq!(elapsed(5, u32::MAX - 4), 10);
    }

    #[test]
    fn test_window_for() {
        let mut policy = TimingPolicy::with_tapping_term(190);
        assert_eq!(policy.window_for(KeyId(0), false), 190);
        assert_eq!(policy.window_for(KeyId(0), true), 380);

        policy.per_key.insert(KeyId(0), 120);
        assert_eq!(policy.window_for(KeyId(0), true), 120);
        assert_eq!(policy.quick_tap_term, 190);
    }

    #[test]
    fn test_interrupt_for() {
        let mut policy = TimingPolicy::default();
        assert_eq!(policy.interrupt_for(KeyId(4)), InterruptPolicy::HoldOnOtherPress);
        policy.interrupt.insert(KeyId(4), InterruptPolicy::PermissiveHold);
        assert_eq!(policy.interrupt_for(KeyId(4)), InterruptPolicy::PermissiveHold);
        assert_eq!(policy.interrupt_for(KeyId(5)), InterruptPolicy::HoldOnOtherPress);
    }

    #[test]
    fn test_combo_window() {
        let policy = TimingPolicy::default();
        assert_eq!(policy.combo_window(None), 50);
        assert_eq!(policy.combo_window(Some(15)), 15);
    }
}

// Keyflow Tap-Hold Resolver
// Per dual-role key: decide tap or hold from timing and interleaving

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::action::Action;
use crate::mapping::{DualRole, InterruptPolicy, KeyId, TapAction};
use crate::state::Source;
use crate::timing::{deadline_reached, elapsed, Duration, Tick};

/// An event after the combo stage: a key position or a fired combo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEvent {
    pub source: Source,
    pub action: Action,
    pub time: Tick,
}

impl SourceEvent {
    pub fn is_press(&self) -> bool {
        self.action.is_pressed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Tap,
    Hold,
}

/// Record for a dual-role key that is currently down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingResolution {
    pub key: KeyId,
    pub press_time: Tick,
    /// Quick taps of this key immediately before this press
    pub tap_count: u8,
    pub role: DualRole,
    pub resolved: Option<Resolution>,
}

impl PendingResolution {
    pub fn deadline(&self) -> Tick {
        self.press_time.wrapping_add(self.role.window)
    }

    pub fn is_unresolved(&self) -> bool {
        self.resolved.is_none()
    }
}

/// What to do right after a dual-role press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// Wait for release, interrupt or timeout
    Pending,
    /// Rapid re-tap: register the tap side now, hold it until release
    TapNow { tap_count: u8 },
    /// Immediate shortcut key on first press: fire the hold side now
    HoldNow,
}

/// What a release of a dual-role key means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Released inside its window without interrupt
    Tap(PendingResolution),
    /// Already decided earlier; only the held output needs releasing
    Resolved(Resolution),
    NotTracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastTap {
    key: KeyId,
    released_at: Tick,
    count: u8,
}

#[derive(Debug, Default)]
pub struct TapHoldResolver {
    pending: IndexMap<KeyId, PendingResolution>,
    deferred: VecDeque<SourceEvent>,
    last_tap: Option<LastTap>,
}

impl TapHoldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: KeyId) -> Option<&PendingResolution> {
        self.pending.get(&key)
    }

    /// Number of keys waiting for a decision
    pub fn unresolved_count(&self) -> usize {
        self.pending.values().filter(|p| p.is_unresolved()).count()
    }

    /// Forget the last tap unless it belongs to `key`
    pub fn note_press(&mut self, key: Option<KeyId>) {
        if self.last_tap.map(|t| Some(t.key)) != Some(key) {
            self.last_tap = None;
        }
    }

    fn recent_tap(&self, key: KeyId, now: Tick, within: Duration) -> Option<u8> {
        self.last_tap
            .filter(|t| t.key == key && within > 0 && elapsed(now, t.released_at) < within)
            .map(|t| t.count)
    }

    /// Start tracking a dual-role press
    pub fn on_press(
        &mut self,
        key: KeyId,
        role: DualRole,
        now: Tick,
        quick_tap_term: Duration,
    ) -> PressOutcome {
        let (outcome, tap_count) = if role.immediate {
            match self.recent_tap(key, now, role.window) {
                Some(count) => (PressOutcome::TapNow { tap_count: count }, count),
                None => (PressOutcome::HoldNow, 0),
            }
        } else {
            let quick = match role.tap {
                TapAction::Key(_) => self.recent_tap(key, now, quick_tap_term),
                TapAction::OneShot { .. } => None,
            };
            match quick {
                Some(count) => (PressOutcome::TapNow { tap_count: count }, count),
                None => (
                    PressOutcome::Pending,
                    self.recent_tap(key, now, role.window).unwrap_or(0),
                ),
            }
        };
        self.last_tap = None;

        let resolved = match outcome {
            PressOutcome::Pending => None,
            PressOutcome::TapNow { .. } => Some(Resolution::Tap),
            PressOutcome::HoldNow => Some(Resolution::Hold),
        };
        log::trace!("{} dual-role press: {:?} (taps {})", key, outcome, tap_count);
        self.pending.insert(
            key,
            PendingResolution {
                key,
                press_time: now,
                tap_count,
                role,
                resolved,
            },
        );
        outcome
    }

    /// Resolve every unresolved hold-on-other-press key as Hold
    pub fn interrupt(&mut self, by: Option<KeyId>) -> Vec<PendingResolution> {
        self.resolve_where(Resolution::Hold, |p| {
            Some(p.key) != by && p.role.policy == InterruptPolicy::HoldOnOtherPress
        })
    }

    /// Resolve every unresolved permissive key as Hold
    pub fn resolve_permissive_holds(&mut self) -> Vec<PendingResolution> {
        self.resolve_where(Resolution::Hold, |p| {
            p.role.policy == InterruptPolicy::PermissiveHold
        })
    }

    /// Resolve keys whose window has elapsed as Hold, in press order
    pub fn expire(&mut self, now: Tick) -> Vec<PendingResolution> {
        self.resolve_where(Resolution::Hold, |p| deadline_reached(now, p.deadline()))
    }

    /// Force the oldest unresolved key to Hold
    pub fn force_oldest(&mut self) -> Option<PendingResolution> {
        let key = self
            .pending
            .values()
            .find(|p| p.is_unresolved())
            .map(|p| p.key)?;
        self.resolve_where(Resolution::Hold, |p| p.key == key).pop()
    }

    fn resolve_where(
        &mut self,
        resolution: Resolution,
        pred: impl Fn(&PendingResolution) -> bool,
    ) -> Vec<PendingResolution> {
        let mut resolved = Vec::new();
        for pending in self.pending.values_mut() {
            if pending.is_unresolved() && pred(pending) {
                pending.resolved = Some(resolution);
                log::debug!("{} resolved {:?}", pending.key, resolution);
                resolved.push(*pending);
            }
        }
        resolved
    }

    /// Key released: decide Tap if still pending
    pub fn on_release(&mut self, key: KeyId, now: Tick) -> ReleaseOutcome {
        let Some(mut pending) = self.pending.shift_remove(&key) else {
            return ReleaseOutcome::NotTracked;
        };
        let counts_as_tap = match pending.resolved {
            None | Some(Resolution::Tap) => true,
            Some(Resolution::Hold) => pending.role.immediate && pending.tap_count == 0,
        };
        self.last_tap = counts_as_tap.then(|| LastTap {
            key,
            released_at: now,
            count: pending.tap_count.saturating_add(1),
        });

        match pending.resolved {
            None => {
                pending.resolved = Some(Resolution::Tap);
                log::debug!("{} resolved Tap", key);
                ReleaseOutcome::Tap(pending)
            }
            Some(resolution) => ReleaseOutcome::Resolved(resolution),
        }
    }

    /// Earliest deadline among unresolved keys
    pub fn next_deadline(&self) -> Option<Tick> {
        self.pending
            .values()
            .filter(|p| p.is_unresolved())
            .map(|p| p.deadline())
            .reduce(|a, b| if deadline_reached(a, b) { b } else { a })
    }

    /// True while an unresolved permissive key holds back later events
    pub fn is_deferring(&self) -> bool {
        self.pending
            .values()
            .any(|p| p.is_unresolved() && p.role.policy == InterruptPolicy::PermissiveHold)
    }

    /// Is `key` an unresolved permissive key
    pub fn is_permissive_pending(&self, key: KeyId) -> bool {
        self.pending.get(&key).is_some_and(|p| {
            p.is_unresolved() && p.role.policy == InterruptPolicy::PermissiveHold
        })
    }

    pub fn defer(&mut self, event: SourceEvent) {
        log::trace!("deferring {:?}", event);
        self.deferred.push_back(event);
    }

    /// Was the press of `source` deferred (and not yet replayed)
    pub fn deferred_press_of(&self, source: Source) -> bool {
        self.deferred
            .iter()
            .any(|e| e.source == source && e.is_press())
    }

    pub fn take_deferred(&mut self) -> VecDeque<SourceEvent> {
        std::mem::take(&mut self.deferred)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}

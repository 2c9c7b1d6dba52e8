// Keyflow Combo Matching
// Buffers chord member presses until a combo fires, times out or is disqualified

use smallvec::SmallVec;

use crate::action::KeyEvent;
use crate::combo::{ComboDefinition, ComboId, MAX_COMBO_KEYS};
use crate::mapping::{KeyId, LayerId};
use crate::timing::{deadline_reached, Tick, TimingPolicy};

/// Output of the combo stage for one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboStep {
    /// Pass the (possibly replayed) event on to single-key resolution
    Forward(KeyEvent),
    /// Combo fired: press its output
    Press { combo: ComboId, time: Tick },
    /// Last member released: release its output
    Release { combo: ComboId, time: Tick },
}

pub type ComboSteps = SmallVec<[ComboStep; 4]>;

/// One combo still able to complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboMatchState {
    pub combo: ComboId,
    pub deadline: Tick,
}

/// Member presses held back while candidates are open
#[derive(Debug, Clone, Default)]
struct OpenChord {
    buffered: SmallVec<[KeyEvent; MAX_COMBO_KEYS]>,
    candidates: SmallVec<[ComboMatchState; 8]>,
}

impl OpenChord {
    fn pressed(&self) -> SmallVec<[KeyId; MAX_COMBO_KEYS]> {
        self.buffered.iter().map(|e| e.key).collect()
    }

    fn holds(&self, key: KeyId) -> bool {
        self.buffered.iter().any(|e| e.key == key)
    }
}

/// A combo whose output is down until its last member is released
#[derive(Debug, Clone)]
struct FiredCombo {
    combo: ComboId,
    members_down: SmallVec<[KeyId; MAX_COMBO_KEYS]>,
}

#[derive(Debug, Default)]
pub struct ComboMatcher {
    open: Option<OpenChord>,
    fired: Vec<FiredCombo>,
}

impl ComboMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates currently open
    pub fn open_states(&self) -> &[ComboMatchState] {
        self.open.as_ref().map_or(&[], |o| &o.candidates)
    }

    pub fn is_buffering(&self) -> bool {
        self.open.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.open.as_ref().map_or(0, |o| o.buffered.len())
    }

    /// Feed one key event; `layer` is the highest active layer
    pub fn on_event(
        &mut self,
        event: KeyEvent,
        layer: LayerId,
        combos: &[ComboDefinition],
        timing: &TimingPolicy,
    ) -> ComboSteps {
        let mut steps = ComboSteps::new();
        if event.is_press() {
            self.on_press(event, layer, combos, timing, &mut steps);
        } else {
            self.on_release(event, &mut steps);
        }
        steps
    }

    fn on_press(
        &mut self,
        event: KeyEvent,
        layer: LayerId,
        combos: &[ComboDefinition],
        timing: &TimingPolicy,
        steps: &mut ComboSteps,
    ) {
        if let Some(mut open) = self.open.take() {
            open.candidates
                .retain(|c| combos[c.combo.0 as usize].contains(event.key));
            if open.candidates.is_empty() {
                log::debug!("combo disqualified by {}", event.key);
                steps.extend(open.buffered.iter().copied().map(ComboStep::Forward));
            } else {
                open.buffered.push(event);
                let pressed = open.pressed();
                let complete = open
                    .candidates
                    .iter()
                    .find(|c| combos[c.combo.0 as usize].matched_by(&pressed))
                    .map(|c| c.combo);
                match complete {
                    Some(combo) => self.fire(combo, pressed, event.time, steps),
                    None => self.open = Some(open),
                }
                return;
            }
        }

        let candidates: SmallVec<[ComboMatchState; 8]> = combos
            .iter()
            .enumerate()
            .filter(|(_, c)| c.contains(event.key) && c.allowed_on(layer))
            .map(|(i, c)| ComboMatchState {
                combo: ComboId(i as u16),
                deadline: event.time.wrapping_add(timing.combo_window(c.term())),
            })
            .collect();

        if candidates.is_empty() {
            steps.push(ComboStep::Forward(event));
        } else {
            log::trace!("{} opens {} combo candidate(s)", event.key, candidates.len());
            let mut buffered = SmallVec::new();
            buffered.push(event);
            self.open = Some(OpenChord {
                buffered,
                candidates,
            });
        }
    }

    fn fire(
        &mut self,
        combo: ComboId,
        members: SmallVec<[KeyId; MAX_COMBO_KEYS]>,
        time: Tick,
        steps: &mut ComboSteps,
    ) {
        log::debug!("{} fired", combo);
        self.fired.push(FiredCombo {
            combo,
            members_down: members,
        });
        steps.push(ComboStep::Press { combo, time });
    }

    fn on_release(&mut self, event: KeyEvent, steps: &mut ComboSteps) {
        if self.open.as_ref().is_some_and(|o| o.holds(event.key)) {
            log::debug!("combo abandoned: {} released early", event.key);
            self.flush(steps);
            steps.push(ComboStep::Forward(event));
            return;
        }

        let held_by_fired = self
            .fired
            .iter()
            .any(|f| f.members_down.contains(&event.key));
        if self.open.is_some() && !held_by_fired {
            // release of an outside key must not overtake the held-back presses
            log::debug!("combo disqualified by release of {}", event.key);
            self.flush(steps);
            steps.push(ComboStep::Forward(event));
            return;
        }

        if let Some(idx) = self
            .fired
            .iter()
            .position(|f| f.members_down.contains(&event.key))
        {
            let fired = &mut self.fired[idx];
            fired.members_down.retain(|k| *k != event.key);
            if fired.members_down.is_empty() {
                let combo = fired.combo;
                self.fired.remove(idx);
                steps.push(ComboStep::Release {
                    combo,
                    time: event.time,
                });
            }
            return;
        }

        steps.push(ComboStep::Forward(event));
    }

    /// Expire candidates whose term has passed; replay members if none remain
    pub fn tick(&mut self, now: Tick) -> ComboSteps {
        let mut steps = ComboSteps::new();
        if let Some(open) = self.open.as_mut() {
            open.candidates.retain(|c| !deadline_reached(now, c.deadline));
            if open.candidates.is_empty() {
                log::debug!("combo term expired, replaying {} key(s)", open.buffered.len());
                self.flush(&mut steps);
            }
        }
        steps
    }

    /// Layer changed: drop candidates not live on `layer`
    pub fn on_layer_change(&mut self, layer: LayerId, combos: &[ComboDefinition]) -> ComboSteps {
        let mut steps = ComboSteps::new();
        if let Some(open) = self.open.as_mut() {
            open.candidates
                .retain(|c| combos[c.combo.0 as usize].allowed_on(layer));
            if open.candidates.is_empty() {
                log::debug!("combo disqualified by layer change");
                self.flush(&mut steps);
            }
        }
        steps
    }

    /// Drop the open chord, replaying its members as individual keys
    pub fn relieve(&mut self) -> ComboSteps {
        let mut steps = ComboSteps::new();
        self.flush(&mut steps);
        steps
    }

    fn flush(&mut self, steps: &mut ComboSteps) {
        if let Some(open) = self.open.take() {
            steps.extend(open.buffered.into_iter().map(ComboStep::Forward));
        }
    }

    /// Earliest open candidate deadline
    pub fn next_deadline(&self) -> Option<Tick> {
        self.open_states()
            .iter()
            .map(|c| c.deadline)
            .reduce(|a, b| if deadline_reached(a, b) { b } else { a })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::KeyAction;
    use crate::Key;

    fn combos() -> Vec<ComboDefinition> {
        vec![
            ComboDefinition::new([KeyId(0), KeyId(1)], KeyAction::Key(Key::ESC)),
            ComboDefinition::new([KeyId(1), KeyId(2)], KeyAction::Key(Key::TAB)).with_term(20),
            ComboDefinition::new([KeyId(0), KeyId(1), KeyId(2)], KeyAction::Key(Key::ENTER)),
            ComboDefinition::new([KeyId(5), KeyId(6)], KeyAction::Key(Key::Q))
                .on_layers([LayerId(1)]),
        ]
    }

    fn feed(m: &mut ComboMatcher, ev: KeyEvent) -> ComboSteps {
        m.on_event(ev, LayerId(0), &combos(), &TimingPolicy::default())
    }

    #[test]
    fn test_non_member_passes_through() {
        let mut m = ComboMatcher::new();
        let ev = KeyEvent::press(KeyId(9), 0);
        assert_eq!(feed(&mut m, ev).as_slice(), &[ComboStep::Forward(ev)]);
        assert!(!m.is_buffering());
    }

    #[test]
    fn test_full_match_fires_and_holds_until_last_release() {
        let mut m = ComboMatcher::new();
        assert!(feed(&mut m, KeyEvent::press(KeyId(0), 0)).is_empty());
        assert_eq!(m.open_states().len(), 2);
        let steps = feed(&mut m, KeyEvent::press(KeyId(1), 10));
        assert_eq!(
            steps.as_slice(),
            &[ComboStep::Press {
                combo: ComboId(0),
                time: 10
            }]
        );
        assert!(feed(&mut m, KeyEvent::release(KeyId(0), 40)).is_empty());
        assert_eq!(
            feed(&mut m, KeyEvent::release(KeyId(1), 60)).as_slice(),
            &[ComboStep::Release {
                combo: ComboId(0),
                time: 60
            }]
        );
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        // starting from key 1 both {0,1} and {1,2} are open; 0 completes the first
        let mut m = ComboMatcher::new();
        feed(&mut m, KeyEvent::press(KeyId(1), 0));
        assert_eq!(m.open_states().len(), 3);
        let steps = feed(&mut m, KeyEvent::press(KeyId(0), 5));
        assert!(matches!(
            steps[0],
            ComboStep::Press {
                combo: ComboId(0),
                ..
            }
        ));
    }

    #[test]
    fn test_disqualifying_press_flushes_in_order() {
        let mut m = ComboMatcher::new();
        let a = KeyEvent::press(KeyId(0), 0);
        let z = KeyEvent::press(KeyId(9), 5);
        feed(&mut m, a);
        assert_eq!(
            feed(&mut m, z).as_slice(),
            &[ComboStep::Forward(a), ComboStep::Forward(z)]
        );
        assert!(!m.is_buffering());
    }

    #[test]
    fn test_early_release_flushes() {
        let mut m = ComboMatcher::new();
        let a = KeyEvent::press(KeyId(0), 0);
        let up = KeyEvent::release(KeyId(0), 8);
        feed(&mut m, a);
        assert_eq!(
            feed(&mut m, up).as_slice(),
            &[ComboStep::Forward(a), ComboStep::Forward(up)]
        );
    }

    #[test]
    fn test_timeout_replays_members() {
        let mut m = ComboMatcher::new();
        let b = KeyEvent::press(KeyId(1), 100);
        feed(&mut m, b);
        // {1,2} has a 20ms term, the others 50ms
        assert!(m.tick(119).is_empty());
        assert!(m.tick(120).is_empty());
        assert_eq!(m.open_states().len(), 2);
        assert_eq!(m.tick(150).as_slice(), &[ComboStep::Forward(b)]);
        assert!(!m.is_buffering());
    }

    #[test]
    fn test_shorter_term_candidate_dropped() {
        let mut m = ComboMatcher::new();
        feed(&mut m, KeyEvent::press(KeyId(1), 0));
        m.tick(25);
        // {1,2} expired, so 2 now completes nothing and extends {0,1,2}
        let steps = feed(&mut m, KeyEvent::press(KeyId(2), 26));
        assert!(steps.is_empty());
        let steps = feed(&mut m, KeyEvent::press(KeyId(0), 30));
        assert!(matches!(
            steps[0],
            ComboStep::Press {
                combo: ComboId(2),
                ..
            }
        ));
    }

    #[test]
    fn test_layer_gating() {
        let mut m = ComboMatcher::new();
        let five = KeyEvent::press(KeyId(5), 0);
        assert_eq!(feed(&mut m, five).as_slice(), &[ComboStep::Forward(five)]);

        let steps = m.on_event(five, LayerId(1), &combos(), &TimingPolicy::default());
        assert!(steps.is_empty());
        assert!(m.is_buffering());
        assert_eq!(
            m.on_layer_change(LayerId(0), &combos()).as_slice(),
            &[ComboStep::Forward(five)]
        );
    }

    #[test]
    fn test_relieve_drops_open_chord() {
        let mut m = ComboMatcher::new();
        let a = KeyEvent::press(KeyId(0), 0);
        feed(&mut m, a);
        assert_eq!(m.relieve().as_slice(), &[ComboStep::Forward(a)]);
        assert!(m.relieve().is_empty());
    }

    #[test]
    fn test_unrelated_release_flushes_before_forwarding() {
        let mut m = ComboMatcher::new();
        let a = KeyEvent::press(KeyId(0), 0);
        feed(&mut m, a);
        let up = KeyEvent::release(KeyId(9), 3);
        assert_eq!(
            feed(&mut m, up).as_slice(),
            &[ComboStep::Forward(a), ComboStep::Forward(up)]
        );
        assert!(!m.is_buffering());
    }

    #[test]
    fn test_fired_member_release_keeps_chord_open() {
        let mut m = ComboMatcher::new();
        feed(&mut m, KeyEvent::press(KeyId(0), 0));
        feed(&mut m, KeyEvent::press(KeyId(1), 5));
        // a new chord starts while the first combo is still held
        let c = KeyEvent::press(KeyId(1), 50);
        feed(&mut m, KeyEvent::release(KeyId(1), 40));
        assert!(feed(&mut m, c).is_empty());
        assert!(m.is_buffering());
        assert_eq!(
            feed(&mut m, KeyEvent::release(KeyId(0), 55)).as_slice(),
            &[ComboStep::Release {
                combo: ComboId(0),
                time: 55
            }]
        );
        assert!(m.is_buffering());
    }
}

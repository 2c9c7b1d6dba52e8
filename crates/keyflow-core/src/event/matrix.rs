// Keyflow Matrix State
// Turns raw switch snapshots into press/release transitions

use crate::action::{Action, KeyEvent};
use crate::mapping::KeyId;
use crate::timing::Tick;

/// Last known state of every switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixState {
    down: Vec<bool>,
}

impl MatrixState {
    pub fn new(key_count: usize) -> Self {
        Self {
            down: vec![false; key_count],
        }
    }

    pub fn key_count(&self) -> usize {
        self.down.len()
    }

    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.down.get(key.0 as usize).copied().unwrap_or(false)
    }

    /// Compare a snapshot with the previous one. Transitions come out in
    /// position order, all stamped `now`. Positions missing from a short
    /// snapshot read as released; extra positions are ignored.
    pub fn scan(&mut self, snapshot: &[bool], now: Tick) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        for (i, down) in self.down.iter_mut().enumerate() {
            let pressed = snapshot.get(i).copied().unwrap_or(false);
            if pressed != *down {
                *down = pressed;
                events.push(KeyEvent {
                    key: KeyId(i as u16),
                    action: Action::from_pressed(pressed),
                    time: now,
                });
            }
        }
        events
    }
}

// Keyflow HID Report State
// Folds output events into 6-key-rollover boot keyboard reports

use std::fmt;

use smallvec::SmallVec;

use crate::output::OutputEvent;
use crate::{Key, Mods};

/// Key slots in a boot keyboard report
pub const REPORT_KEYS: usize = 6;

/// One boot-protocol keyboard report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HidReport {
    pub modifiers: Mods,
    pub keys: SmallVec<[Key; REPORT_KEYS]>,
}

impl HidReport {
    /// 8-byte wire form: modifiers, reserved, six key slots
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.modifiers.bits();
        for (slot, key) in bytes[2..].iter_mut().zip(self.keys.iter()) {
            *slot = key.code() as u8;
        }
        bytes
    }
}

impl fmt::Display for HidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.keys.iter().map(|k| k.name()).collect();
        write!(f, "[{}] {}", self.modifiers, keys.join(" "))
    }
}

/// A reported key and how many sources currently hold it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    key: Key,
    holders: u8,
}

/// Keys currently in the report plus the held modifier byte
#[derive(Debug, Clone, Default)]
pub struct HidState {
    held_mods: Mods,
    slots: SmallVec<[Slot; REPORT_KEYS]>,
    rollover: bool,
}

impl HidState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set when a key had to be dropped because all slots were taken
    pub fn rollover(&self) -> bool {
        self.rollover
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.slot(key).is_some()
    }

    fn slot(&self, key: Key) -> Option<usize> {
        self.slots.iter().position(|s| s.key == key)
    }

    fn report(&self, modifiers: Mods) -> HidReport {
        HidReport {
            modifiers,
            keys: self.slots.iter().map(|s| s.key).collect(),
        }
    }

    fn press(&mut self, key: Key) -> bool {
        if let Some(idx) = self.slot(key) {
            let slot = &mut self.slots[idx];
            slot.holders = slot.holders.saturating_add(1);
            return true;
        }
        if self.slots.len() == REPORT_KEYS {
            log::warn!("rollover: dropping {}", key);
            self.rollover = true;
            return false;
        }
        self.slots.push(Slot { key, holders: 1 });
        true
    }

    /// Drop one holder; the key leaves the report with its last holder
    fn release(&mut self, key: Key) -> bool {
        let Some(idx) = self.slot(key) else {
            return false;
        };
        let slot = &mut self.slots[idx];
        slot.holders -= 1;
        if slot.holders > 0 {
            log::trace!("{} still held by {} source(s)", key, slot.holders);
            return false;
        }
        self.lift(key)
    }

    /// Take the key out of the report whoever holds it
    fn lift(&mut self, key: Key) -> bool {
        let Some(idx) = self.slot(key) else {
            return false;
        };
        self.slots.remove(idx);
        self.rollover = false;
        true
    }

    /// Reports produced by one event (none for indicators)
    pub fn apply(&mut self, event: &OutputEvent) -> Vec<HidReport> {
        match event {
            OutputEvent::KeyDown { key, mods } => {
                if self.press(*key) {
                    vec![self.report(*mods)]
                } else {
                    Vec::new()
                }
            }
            OutputEvent::KeyUp(key) => {
                if self.release(*key) {
                    vec![self.report(self.held_mods)]
                } else {
                    Vec::new()
                }
            }
            OutputEvent::ModsChanged(mods) => {
                self.held_mods = *mods;
                vec![self.report(*mods)]
            }
            OutputEvent::Text(text) => self.type_text(text),
            OutputEvent::Indicator(_) => Vec::new(),
        }
    }

    fn type_text(&mut self, text: &str) -> Vec<HidReport> {
        let mut reports = Vec::new();
        for c in text.chars() {
            let Some((key, shift)) = char_to_key(c) else {
                log::warn!("cannot type {:?}", c);
                continue;
            };
            let mods = if shift {
                self.held_mods | Mods::LSHIFT
            } else {
                self.held_mods
            };
            // a held copy of the key has to be lifted first
            if self.lift(key) {
                reports.push(self.report(self.held_mods));
            }
            if self.press(key) {
                reports.push(self.report(mods));
                self.lift(key);
                reports.push(self.report(self.held_mods));
            }
        }
        reports
    }
}

/// US-layout key and shift state for a printable ASCII character
pub fn char_to_key(c: char) -> Option<(Key, bool)> {
    const SYMBOLS: &[(char, Key, bool)] = &[
        (' ', Key::SPACE, false),
        ('\n', Key::ENTER, false),
        ('\t', Key::TAB, false),
        ('-', Key::MINUS, false),
        ('_', Key::MINUS, true),
        ('=', Key::EQUAL, false),
        ('+', Key::EQUAL, true),
        ('[', Key::LEFT_BRACE, false),
        ('{', Key::LEFT_BRACE, true),
        (']', Key::RIGHT_BRACE, false),
        ('}', Key::RIGHT_BRACE, true),
        ('\\', Key::BACKSLASH, false),
        ('|', Key::BACKSLASH, true),
        (';', Key::SEMICOLON, false),
        (':', Key::SEMICOLON, true),
        ('\'', Key::APOSTROPHE, false),
        ('"', Key::APOSTROPHE, true),
        ('`', Key::GRAVE, false),
        ('~', Key::GRAVE, true),
        (',', Key::COMMA, false),
        ('<', Key::COMMA, true),
        ('.', Key::DOT, false),
        ('>', Key::DOT, true),
        ('/', Key::SLASH, false),
        ('?', Key::SLASH, true),
        ('!', Key::KEY_1, true),
        ('@', Key::KEY_2, true),
        ('#', Key::KEY_3, true),
        ('$', Key::KEY_4, true),
        ('%', Key::KEY_5, true),
        ('^', Key::KEY_6, true),
        ('&', Key::KEY_7, true),
        ('*', Key::KEY_8, true),
        ('(', Key::KEY_9, true),
        (')', Key::KEY_0, true),
    ];

    match c {
        'a'..='z' => Some((Key(Key::A.code() + (c as u16 - 'a' as u16)), false)),
        'A'..='Z' => Some((Key(Key::A.code() + (c as u16 - 'A' as u16)), true)),
        '1'..='9' => Some((Key(Key::KEY_1.code() + (c as u16 - '1' as u16)), false)),
        '0' => Some((Key::KEY_0, false)),
        _ => SYMBOLS
            .iter()
            .find(|(sym, _, _)| *sym == c)
            .map(|&(_, key, shift)| (key, shift)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(key: Key, mods: Mods) -> OutputEvent {
        OutputEvent::KeyDown { key, mods }
    }

    #[test]
    fn test_stroke_mods_do_not_leak() {
        let mut hid = HidState::new();
        let r = hid.apply(&down(Key::KEY_9, Mods::LSHIFT));
        assert_eq!(r[0].modifiers, Mods::LSHIFT);
        assert_eq!(r[0].keys.as_slice(), &[Key::KEY_9]);

        let r = hid.apply(&OutputEvent::KeyUp(Key::KEY_9));
        assert_eq!(r[0].modifiers, Mods::NONE);
        assert!(r[0].keys.is_empty());
    }

    #[test]
    fn test_held_mods_persist() {
        let mut hid = HidState::new();
        hid.apply(&OutputEvent::ModsChanged(Mods::LCTRL));
        let r = hid.apply(&down(Key::C, Mods::LCTRL));
        assert_eq!(r[0].to_bytes(), [0x01, 0, 0x06, 0, 0, 0, 0, 0]);
        let r = hid.apply(&OutputEvent::KeyUp(Key::C));
        assert_eq!(r[0].modifiers, Mods::LCTRL);
    }

    #[test]
    fn test_rollover() {
        let mut hid = HidState::new();
        for key in [Key::A, Key::B, Key::C, Key::D, Key::E, Key::F] {
            assert_eq!(hid.apply(&down(key, Mods::NONE)).len(), 1);
        }
        assert!(hid.apply(&down(Key::G, Mods::NONE)).is_empty());
        assert!(hid.rollover());
        assert!(!hid.is_pressed(Key::G));
        // release of the dropped key changes nothing
        assert!(hid.apply(&OutputEvent::KeyUp(Key::G)).is_empty());
        hid.apply(&OutputEvent::KeyUp(Key::A));
        assert!(!hid.rollover());
    }

    #[test]
    fn test_shared_key_stays_down_until_last_holder() {
        let mut hid = HidState::new();
        hid.apply(&down(Key::X, Mods::NONE));
        // a combo emitting the same keycode while the key is down
        let r = hid.apply(&down(Key::X, Mods::LSHIFT));
        assert_eq!(r[0].keys.as_slice(), &[Key::X]);

        assert!(hid.apply(&OutputEvent::KeyUp(Key::X)).is_empty());
        assert!(hid.is_pressed(Key::X));
        let r = hid.apply(&OutputEvent::KeyUp(Key::X));
        assert!(r[0].keys.is_empty());
        assert!(!hid.is_pressed(Key::X));
    }

    #[test]
    fn test_type_text() {
        let mut hid = HidState::new();
        let reports = hid.apply(&OutputEvent::Text("\"a".to_string()));
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].modifiers, Mods::LSHIFT);
        assert_eq!(reports[0].keys.as_slice(), &[Key::APOSTROPHE]);
        assert!(reports[1].keys.is_empty());
        assert_eq!(reports[2].modifiers, Mods::NONE);
        assert_eq!(reports[2].keys.as_slice(), &[Key::A]);
    }

    #[test]
    fn test_char_to_key() {
        assert_eq!(char_to_key('q'), Some((Key::Q, false)));
        assert_eq!(char_to_key('Q'), Some((Key::Q, true)));
        assert_eq!(char_to_key('7'), Some((Key::KEY_7, false)));
        assert_eq!(char_to_key('0'), Some((Key::KEY_0, false)));
        assert_eq!(char_to_key('('), Some((Key::KEY_9, true)));
        assert_eq!(char_to_key('é'), None);
    }

    #[test]
    fn test_indicator_produces_no_report() {
        let mut hid = HidState::new();
        let ind = OutputEvent::Indicator(crate::output::Indicator::CapsWord(true));
        assert!(hid.apply(&ind).is_empty());
    }
}

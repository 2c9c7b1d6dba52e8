// Keyflow Keystore
// What each physically held source currently contributes to the output

use indexmap::IndexMap;

use crate::combo::ComboId;
use crate::mapping::{KeyId, LayerId};
use crate::{Key, Mods};

/// Something that can be held down: a key position or a fired combo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Key(KeyId),
    Combo(ComboId),
}

impl Source {
    pub fn key_id(self) -> Option<KeyId> {
        match self {
            Source::Key(k) => Some(k),
            Source::Combo(_) => None,
        }
    }
}

/// Output held on behalf of a source until it is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Held {
    /// A registered keycode (KeyUp on release)
    Key(Key),
    /// Registered modifier bits, already host-remapped
    Mods(Mods),
    /// A momentarily active layer
    Layer(LayerId),
    /// Press was consumed; the release is swallowed
    Nothing,
}

/// Held outputs by source, in press order
#[derive(Debug, Default)]
pub struct Keystore {
    held: IndexMap<Source, Held>,
}

impl Keystore {
    /// Create a new empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of held sources
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn get(&self, source: Source) -> Option<Held> {
        self.held.get(&source).copied()
    }

    pub fn contains(&self, source: Source) -> bool {
        self.held.contains_key(&source)
    }

    /// Record what `source` holds; a previous entry is replaced
    pub fn hold(&mut self, source: Source, held: Held) {
        self.held.insert(source, held);
    }

    /// Forget `source`, returning what it held
    pub fn release(&mut self, source: Source) -> Option<Held> {
        self.held.shift_remove(&source)
    }

    /// Union of all held modifier bits
    pub fn held_mods(&self) -> Mods {
        self.held.values().fold(Mods::NONE, |acc, held| match held {
            Held::Mods(m) => acc | *m,
            _ => acc,
        })
    }

    /// Registered keycodes, in press order
    pub fn held_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.held.values().filter_map(|held| match held {
            Held::Key(k) => Some(*k),
            _ => None,
        })
    }
}

// Keyflow Combo Definition
// A chord of 2-4 key positions that produces one substitute action

use std::fmt;

use smallvec::SmallVec;

use crate::mapping::{KeyAction, KeyId, LayerId};
use crate::timing::Duration;

/// Index of a combo in registration order (lower wins ties)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComboId(pub u16);

impl fmt::Display for ComboId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "combo{}", self.0)
    }
}

pub const MIN_COMBO_KEYS: usize = 2;
pub const MAX_COMBO_KEYS: usize = 4;

/// Member positions of a combo
pub type ComboMembers = SmallVec<[KeyId; MAX_COMBO_KEYS]>;

/// A configured chord
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboDefinition {
    members: ComboMembers,
    output: KeyAction,
    /// Overrides the global combo term
    term: Option<Duration>,
    /// Bitmask of layers the combo is live on; `None` = any layer
    layers: Option<u32>,
}

impl ComboDefinition {
    /// Create a combo active on every layer with the default term
    pub fn new(members: impl IntoIterator<Item = KeyId>, output: KeyAction) -> Self {
        Self {
            members: members.into_iter().collect(),
            output,
            term: None,
            layers: None,
        }
    }

    /// Set a per-combo term
    pub fn with_term(mut self, term: Duration) -> Self {
        self.term = Some(term);
        self
    }

    /// Restrict the combo to the given layers
    pub fn on_layers(mut self, layers: impl IntoIterator<Item = LayerId>) -> Self {
        self.layers = Some(layers.into_iter().fold(0, |mask, l| mask | l.bit()));
        self
    }

    pub fn members(&self) -> &[KeyId] {
        &self.members
    }

    pub fn output(&self) -> &KeyAction {
        &self.output
    }

    pub fn term(&self) -> Option<Duration> {
        self.term
    }

    pub fn layer_mask(&self) -> Option<u32> {
        self.layers
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.members.contains(&key)
    }

    /// Is the combo live while `layer` is the highest active layer
    pub fn allowed_on(&self, layer: LayerId) -> bool {
        self.layers.map_or(true, |mask| mask & layer.bit() != 0)
    }

    /// All members present in `pressed`
    pub fn matched_by(&self, pressed: &[KeyId]) -> bool {
        self.members.iter().all(|m| pressed.contains(m))
    }
}

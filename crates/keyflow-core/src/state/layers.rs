// Keyflow Layer Stack
// Default layer plus momentarily active layers; highest active layer wins

use crate::mapping::{KeyAction, KeyId, Keymap, LayerId, MAX_LAYERS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStack {
    default: LayerId,
    /// Hold count per layer, so two keys holding one layer overlap cleanly
    holds: [u8; MAX_LAYERS],
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new(LayerId(0))
    }
}

impl LayerStack {
    pub fn new(default: LayerId) -> Self {
        Self {
            default,
            holds: [0; MAX_LAYERS],
        }
    }

    pub fn default_layer(&self) -> LayerId {
        self.default
    }

    pub fn set_default(&mut self, layer: LayerId) {
        self.default = layer;
    }

    /// Mask of layers consulted for lookups (default included)
    pub fn active_mask(&self) -> u32 {
        self.holds
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .fold(self.default.bit(), |mask, (i, _)| mask | (1 << i))
    }

    pub fn is_active(&self, layer: LayerId) -> bool {
        self.active_mask() & layer.bit() != 0
    }

    /// Highest-priority active layer
    pub fn top(&self) -> LayerId {
        let mask = self.active_mask();
        LayerId((31 - mask.leading_zeros()) as u8)
    }

    pub fn activate(&mut self, layer: LayerId) {
        if let Some(count) = self.holds.get_mut(layer.0 as usize) {
            *count = count.saturating_add(1);
        }
    }

    pub fn deactivate(&mut self, layer: LayerId) {
        if let Some(count) = self.holds.get_mut(layer.0 as usize) {
            *count = count.saturating_sub(1);
        }
    }

    /// Action for `key`, searching active layers from the top down and
    /// skipping transparent entries. Falls back to `KeyAction::No`.
    pub fn action_at(&self, keymap: &Keymap, key: KeyId) -> KeyAction {
        let mask = self.active_mask();
        (0..MAX_LAYERS as u8)
            .rev()
            .filter(|&i| mask & (1 << i) != 0)
            .filter_map(|i| keymap.action(LayerId(i), key))
            .find(|action| !action.is_transparent())
            .cloned()
            .unwrap_or(KeyAction::No)
    }
}

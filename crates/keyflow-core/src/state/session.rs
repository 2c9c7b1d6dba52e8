// Keyflow Session State
// Process-wide state passed explicitly into each pipeline stage

use crate::context::HostContext;
use crate::mapping::{HostSettings, LayerId};
use crate::state::{Keystore, LayerStack};
use crate::transform::caps_word::CapsWord;
use crate::transform::oneshot::OneShotTracker;
use crate::Mods;

/// Everything that survives from one event to the next, apart from the
/// pending tap-hold and combo records owned by their stages
#[derive(Debug)]
pub struct SessionState {
    pub layers: LayerStack,
    pub host: HostContext,
    pub oneshot: OneShotTracker,
    pub caps_word: CapsWord,
    pub keystore: Keystore,
}

impl SessionState {
    pub fn new(host: HostSettings) -> Self {
        Self {
            layers: LayerStack::new(LayerId(0)),
            host: HostContext::new(host),
            oneshot: OneShotTracker::new(),
            caps_word: CapsWord::new(),
            keystore: Keystore::new(),
        }
    }

    /// Modifiers physically held right now (host remapping already applied)
    pub fn held_mods(&self) -> Mods {
        self.keystore.held_mods()
    }
}

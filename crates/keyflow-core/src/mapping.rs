// Keyflow Mapping Structures
// KeyAction, DualRole, Layer, Keymap, EngineConfig

use std::fmt;

use strum_macros::{Display, EnumIter, EnumString};

use crate::combo::ComboDefinition;
use crate::context::HostOs;
use crate::timing::{Duration, TimingPolicy};
use crate::{Key, Mods};

/// Upper bound on layers; the active set is a `u32` mask
pub const MAX_LAYERS: usize = 32;

/// Physical key position (matrix index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u16);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index into `Keymap::layers`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LayerId(pub u8);

impl LayerId {
    pub fn bit(self) -> u32 {
        1u32 << self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Index into `EngineConfig::macros`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacroId(pub u16);

/// Host-dependent editing shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OsShortcut {
    Cut,
    Copy,
    Paste,
    Undo,
    Redo,
    SelectAll,
}

impl OsShortcut {
    /// Letter combined with the host command modifier
    pub fn key(self) -> Key {
        match self {
            OsShortcut::Cut => Key::X,
            OsShortcut::Copy => Key::C,
            OsShortcut::Paste => Key::V,
            OsShortcut::Undo => Key::Z,
            OsShortcut::Redo => Key::Y,
            OsShortcut::SelectAll => Key::A,
        }
    }
}

/// Commands forwarded to the lighting driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LightingCommand {
    Toggle,
    ModeNext,
    ModePrev,
    HueUp,
    HueDown,
    SatUp,
    SatDown,
    ValUp,
    ValDown,
}

/// Tap-hold interrupt handling for a dual-role key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InterruptPolicy {
    /// Any other press while pending resolves Hold immediately
    #[default]
    HoldOnOtherPress,
    /// Later events are deferred; Hold only once a deferred key is released
    PermissiveHold,
}

/// Binding of one key position on one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Unassigned; swallows the press
    No,
    /// Fall through to the next lower active layer
    Transparent,
    Key(Key),
    /// Key sent with shift applied to that stroke only
    Shifted(Key),
    ModTap { hold: Mods, tap: Key },
    LayerTap { layer: LayerId, tap: Key },
    /// Tap sends `tap`, hold sends the host shortcut once.
    /// `immediate` keys send the shortcut on first press and `tap` on a rapid re-tap.
    Shortcut { tap: Key, shortcut: OsShortcut, immediate: bool },
    /// One-shot modifier; `non_mac` replaces `mods` verbatim on non-Mac hosts
    OneShot { mods: Mods, non_mac: Option<Mods> },
    Momentary(LayerId),
    DefaultLayer(LayerId),
    Os(OsShortcut),
    CycleOs,
    CapsWord,
    Macro(MacroId),
    Lighting(LightingCommand),
}

impl KeyAction {
    pub fn is_transparent(&self) -> bool {
        matches!(self, KeyAction::Transparent)
    }

    pub fn is_dual_role(&self) -> bool {
        matches!(
            self,
            KeyAction::ModTap { .. }
                | KeyAction::LayerTap { .. }
                | KeyAction::Shortcut { .. }
                | KeyAction::OneShot { .. }
        )
    }

    /// Dual-role description of this action with the window already chosen
    pub fn dual_role(&self, window: Duration, policy: InterruptPolicy) -> Option<DualRole> {
        let (tap, hold, immediate) = match *self {
            KeyAction::ModTap { hold, tap } => (TapAction::Key(tap), HoldAction::Mods(hold), false),
            KeyAction::LayerTap { layer, tap } => {
                (TapAction::Key(tap), HoldAction::Layer(layer), false)
            }
            KeyAction::Shortcut {
                tap,
                shortcut,
                immediate,
            } => (TapAction::Key(tap), HoldAction::Shortcut(shortcut), immediate),
            KeyAction::OneShot { mods, non_mac } => (
                TapAction::OneShot { mods, non_mac },
                HoldAction::OneShotMods { mods, non_mac },
                false,
            ),
            _ => return None,
        };
        Some(DualRole {
            tap,
            hold,
            window,
            policy,
            immediate,
        })
    }

    /// What a dual-role action does when fired as a plain press (combo outputs)
    pub fn tap_equivalent(&self) -> KeyAction {
        match *self {
            KeyAction::ModTap { tap, .. }
            | KeyAction::LayerTap { tap, .. }
            | KeyAction::Shortcut { tap, .. } => KeyAction::Key(tap),
            ref other => other.clone(),
        }
    }
}

/// Tap side of a dual-role key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    Key(Key),
    OneShot { mods: Mods, non_mac: Option<Mods> },
}

/// Hold side of a dual-role key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldAction {
    Mods(Mods),
    Layer(LayerId),
    Shortcut(OsShortcut),
    /// A held one-shot key acts as a normal modifier
    OneShotMods { mods: Mods, non_mac: Option<Mods> },
}

/// A key identity's tap/hold configuration at the moment it was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualRole {
    pub tap: TapAction,
    pub hold: HoldAction,
    pub window: Duration,
    pub policy: InterruptPolicy,
    pub immediate: bool,
}

/// One named layer: an action per key position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    name: String,
    keys: Vec<KeyAction>,
}

impl Layer {
    pub fn new(name: impl Into<String>, keys: Vec<KeyAction>) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &[KeyAction] {
        &self.keys
    }

    pub fn get(&self, key: KeyId) -> Option<&KeyAction> {
        self.keys.get(key.0 as usize)
    }
}

/// Layer tables for one keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    name: String,
    key_count: usize,
    layers: Vec<Layer>,
}

impl Keymap {
    /// Create a new Keymap
    pub fn new(name: impl Into<String>, key_count: usize, layers: Vec<Layer>) -> Self {
        Self {
            name: name.into(),
            key_count,
            layers,
        }
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0 as usize)
    }

    pub fn layer_id(&self, name: &str) -> Option<LayerId> {
        self.layers
            .iter()
            .position(|l| l.name.eq_ignore_ascii_case(name))
            .map(|i| LayerId(i as u8))
    }

    pub fn layer_name(&self, id: LayerId) -> &str {
        self.layer(id).map(Layer::name).unwrap_or("?")
    }

    /// Raw binding, transparency not resolved
    pub fn action(&self, layer: LayerId, key: KeyId) -> Option<&KeyAction> {
        self.layer(layer).and_then(|l| l.get(key))
    }

    /// Is `key` a valid position for this keymap
    pub fn contains(&self, key: KeyId) -> bool {
        (key.0 as usize) < self.key_count
    }
}

/// A fixed text string sent by a `Macro` action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub text: String,
}

/// Host OS handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Used while the host is unknown
    pub fallback: HostOs,
    /// Turn GUI into CTRL on non-Mac hosts
    pub swap_gui_ctrl: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            fallback: HostOs::Mac,
            swap_gui_ctrl: true,
        }
    }
}

/// Caps word behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsWordConfig {
    /// Holding both shifts turns caps word on
    pub both_shifts: bool,
    /// Extra keys that get shift while caps word is on
    pub extra_shifted: Vec<Key>,
    /// Extra keys that keep caps word on without shift
    pub extra_continue: Vec<Key>,
}

impl Default for CapsWordConfig {
    fn default() -> Self {
        Self {
            both_shifts: true,
            extra_shifted: Vec::new(),
            extra_continue: Vec::new(),
        }
    }
}

/// Everything the engine is parameterised by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub keymap: Keymap,
    pub combos: Vec<ComboDefinition>,
    pub timing: TimingPolicy,
    pub host: HostSettings,
    pub caps_word: CapsWordConfig,
    pub macros: Vec<Macro>,
}

impl EngineConfig {
    /// Config with default timing and no combos or macros
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            combos: Vec::new(),
            timing: TimingPolicy::default(),
            host: HostSettings::default(),
            caps_word: CapsWordConfig::default(),
            macros: Vec::new(),
        }
    }

    pub fn macro_text(&self, id: MacroId) -> Option<&str> {
        self.macros.get(id.0 as usize).map(|m| m.text.as_str())
    }
}

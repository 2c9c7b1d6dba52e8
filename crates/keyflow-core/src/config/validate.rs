// Keyflow Config API - Validation
// Load-time checks that keep out-of-range ids away from the engine

use crate::combo::{MAX_COMBO_KEYS, MIN_COMBO_KEYS};
use crate::mapping::{EngineConfig, KeyAction, KeyId, LayerId, MAX_LAYERS};

use super::action_parser::ActionParseError;

/// Configuration errors, reported before an engine is built
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid key: {0}")]
    UnknownKey(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("Layer '{layer}' key {index}: {source}")]
    InvalidAction {
        layer: String,
        index: usize,
        #[source]
        source: ActionParseError,
    },

    #[error("Combo {index}: {source}")]
    InvalidComboOutput {
        index: usize,
        #[source]
        source: ActionParseError,
    },

    #[error("Layer '{layer}' has {found} keys, expected {expected}")]
    LayerSize {
        layer: String,
        expected: usize,
        found: usize,
    },

    #[error("Keymap has no layers")]
    NoLayers,

    #[error("Keymap has {0} layers, at most 32 are supported")]
    TooManyLayers(usize),

    #[error("Duplicate layer name: {0}")]
    DuplicateLayer(String),

    #[error("Combo {index} has {found} keys, expected 2 to 4")]
    ComboSize { index: usize, found: usize },

    #[error("Combo {index} uses key {key} outside the keymap")]
    ComboKeyOutOfRange { index: usize, key: KeyId },

    #[error("Combo {index} lists key {key} twice")]
    ComboDuplicateKey { index: usize, key: KeyId },

    #[error("Window must be greater than zero: {0}")]
    ZeroWindow(String),

    #[error("Key {key} outside the keymap ({key_count} keys)")]
    KeyOutOfRange { key: KeyId, key_count: usize },

    #[error("Layer {0} referenced but not defined")]
    LayerOutOfRange(LayerId),

    #[error("Macro #{0} referenced but not defined")]
    MacroOutOfRange(u16),
}

/// Check a fully built config.
///
/// The TOML loader runs this too, but configs assembled in code only meet it
/// here, so `Engine::new` calls it again.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    let keymap = &config.keymap;
    let layers = keymap.layers();

    if layers.is_empty() {
        return Err(ConfigError::NoLayers);
    }
    if layers.len() > MAX_LAYERS {
        return Err(ConfigError::TooManyLayers(layers.len()));
    }
    for (i, layer) in layers.iter().enumerate() {
        if layer.keys().len() != keymap.key_count() {
            return Err(ConfigError::LayerSize {
                layer: layer.name().to_string(),
                expected: keymap.key_count(),
                found: layer.keys().len(),
            });
        }
        if layers[..i]
            .iter()
            .any(|l| l.name().eq_ignore_ascii_case(layer.name()))
        {
            return Err(ConfigError::DuplicateLayer(layer.name().to_string()));
        }
        for action in layer.keys() {
            check_action(config, action)?;
        }
    }

    for (index, combo) in config.combos.iter().enumerate() {
        let members = combo.members();
        if !(MIN_COMBO_KEYS..=MAX_COMBO_KEYS).contains(&members.len()) {
            return Err(ConfigError::ComboSize {
                index,
                found: members.len(),
            });
        }
        for (i, &key) in members.iter().enumerate() {
            if !keymap.contains(key) {
                return Err(ConfigError::ComboKeyOutOfRange { index, key });
            }
            if members[..i].contains(&key) {
                return Err(ConfigError::ComboDuplicateKey { index, key });
            }
        }
        if combo.term() == Some(0) {
            return Err(ConfigError::ZeroWindow(format!("combo {index} term")));
        }
        if let Some(mask) = combo.layer_mask() {
            if let Some(bit) = (layers.len()..MAX_LAYERS).find(|&b| mask & (1 << b) != 0) {
                return Err(ConfigError::LayerOutOfRange(LayerId(bit as u8)));
            }
        }
        check_action(config, combo.output())?;
    }

    let timing = &config.timing;
    if timing.tapping_term == 0 {
        return Err(ConfigError::ZeroWindow("tapping_term".into()));
    }
    if timing.combo_term == 0 {
        return Err(ConfigError::ZeroWindow("combo_term".into()));
    }
    if timing.shortcut_multiplier == 0 {
        return Err(ConfigError::ZeroWindow("shortcut_multiplier".into()));
    }
    for (&key, &window) in &timing.per_key {
        if !keymap.contains(key) {
            return Err(ConfigError::KeyOutOfRange {
                key,
                key_count: keymap.key_count(),
            });
        }
        if window == 0 {
            return Err(ConfigError::ZeroWindow(format!("per-key window for {key}")));
        }
    }
    if let Some(&key) = timing.interrupt.keys().find(|k| !keymap.contains(**k)) {
        return Err(ConfigError::KeyOutOfRange {
            key,
            key_count: keymap.key_count(),
        });
    }

    log::debug!(
        "Keymap '{}' validated: {} layers, {} keys, {} combos",
        keymap.name(),
        layers.len(),
        keymap.key_count(),
        config.combos.len()
    );
    Ok(())
}

fn check_action(config: &EngineConfig, action: &KeyAction) -> Result<(), ConfigError> {
    let layer_count = config.keymap.layers().len();
    match *action {
        KeyAction::LayerTap { layer, .. }
        | KeyAction::Momentary(layer)
        | KeyAction::DefaultLayer(layer)
            if layer.0 as usize >= layer_count =>
        {
            Err(ConfigError::LayerOutOfRange(layer))
        }
        KeyAction::Macro(id) if id.0 as usize >= config.macros.len() => {
            Err(ConfigError::MacroOutOfRange(id.0))
        }
        _ => Ok(()),
    }
}

// Keyflow Config Parser - TOML with Serde
// Parses keymap files into an EngineConfig

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::action_parser::{parse_action, NameTable};
use super::validate::{validate, ConfigError};
use crate::combo::ComboDefinition;
use crate::context::HostOs;
use crate::mapping::{
    CapsWordConfig, EngineConfig, HostSettings, InterruptPolicy, KeyAction, KeyId, Keymap, Layer,
    LayerId, Macro,
};
use crate::timing::TimingPolicy;
use crate::Key;

/// Root TOML table of a keymap file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeymapToml {
    #[serde(default)]
    pub keymap: KeymapSection,

    #[serde(default)]
    pub timing: TimingToml,

    #[serde(default)]
    pub host: HostToml,

    #[serde(default)]
    pub caps_word: CapsWordToml,

    #[serde(default)]
    pub layer: Vec<LayerToml>,

    #[serde(default)]
    pub combo: Vec<ComboToml>,

    #[serde(default, rename = "macro")]
    pub macros: Vec<MacroToml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeymapSection {
    pub name: Option<String>,
    /// Defaults to the size of the first layer
    pub key_count: Option<usize>,
    /// Layer used to resolve key names in `[[combo]]` and `[timing]`
    pub combo_source_layer: Option<String>,
}

/// Timing values in milliseconds
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingToml {
    pub tapping_term: Option<u32>,
    pub quick_tap_term: Option<u32>,
    pub combo_term: Option<u32>,
    pub oneshot_timeout: Option<u32>,
    pub caps_word_idle_timeout: Option<u32>,
    pub wpm_window: Option<u32>,
    pub shortcut_multiplier: Option<u32>,
    /// `hold_on_other_press` or `permissive_hold`
    pub interrupt: Option<String>,
    /// Keys resolved with the permissive-hold policy
    #[serde(default)]
    pub permissive_hold: Vec<KeyRef>,
    /// Per-key window overrides, keyed by position or key name
    #[serde(default)]
    pub per_key: HashMap<String, u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostToml {
    pub fallback: Option<String>,
    pub swap_gui_ctrl: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapsWordToml {
    pub both_shifts: Option<bool>,
    #[serde(default)]
    pub extra_shifted: Vec<String>,
    #[serde(default)]
    pub extra_continue: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerToml {
    pub name: String,
    /// Action expressions, one per key position
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComboToml {
    pub keys: Vec<KeyRef>,
    pub output: String,
    pub term_ms: Option<u32>,
    /// Layer names the combo is live on; empty = every layer
    #[serde(default)]
    pub layers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroToml {
    pub name: String,
    pub text: String,
}

/// A key given either by matrix position or by the key it sends
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeyRef {
    Position(u16),
    Name(String),
}

impl EngineConfig {
    /// Parse a keymap file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a keymap from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let toml_config: KeymapToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        let config = toml_config.to_config()?;
        validate(&config)?;
        Ok(config)
    }
}

/// `~/.config/keyflow/keymap.toml` (platform equivalent)
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("keyflow").join("keymap.toml"))
}

impl KeymapToml {
    fn to_config(&self) -> Result<EngineConfig, ConfigError> {
        let names = NameTable::new(
            self.layer.iter().map(|l| l.name.clone()).collect(),
            self.macros.iter().map(|m| m.name.clone()).collect(),
        );

        let mut layers = Vec::with_capacity(self.layer.len());
        for layer in &self.layer {
            let keys = layer
                .keys
                .iter()
                .enumerate()
                .map(|(index, exp)| {
                    parse_action(exp, &names).map_err(|source| ConfigError::InvalidAction {
                        layer: layer.name.clone(),
                        index,
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            log::debug!("Layer '{}' parsed with {} keys", layer.name, keys.len());
            layers.push(Layer::new(&layer.name, keys));
        }

        let key_count = self
            .keymap
            .key_count
            .or_else(|| layers.first().map(|l| l.keys().len()))
            .unwrap_or(0);
        let keymap = Keymap::new(
            self.keymap.name.clone().unwrap_or_else(|| "keymap".to_string()),
            key_count,
            layers,
        );

        let source_layer = match &self.keymap.combo_source_layer {
            Some(name) => keymap
                .layer_id(name)
                .ok_or_else(|| ConfigError::UnknownLayer(name.clone()))?,
            None => LayerId(0),
        };
        let lookup = KeyLookup {
            keymap: &keymap,
            layer: source_layer,
        };

        let mut combos = Vec::with_capacity(self.combo.len());
        for (index, combo) in self.combo.iter().enumerate() {
            let members = combo
                .keys
                .iter()
                .map(|r| lookup.resolve(r))
                .collect::<Result<Vec<_>, _>>()?;
            let output = parse_action(&combo.output, &names)
                .map_err(|source| ConfigError::InvalidComboOutput { index, source })?;

            let mut def = ComboDefinition::new(members, output);
            if let Some(term) = combo.term_ms {
                def = def.with_term(term);
            }
            if !combo.layers.is_empty() {
                let ids = combo
                    .layers
                    .iter()
                    .map(|name| {
                        keymap
                            .layer_id(name)
                            .ok_or_else(|| ConfigError::UnknownLayer(name.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                def = def.on_layers(ids);
            }
            combos.push(def);
        }

        let timing = self.timing.to_policy(&lookup)?;
        let host = self.host.to_settings()?;
        let caps_word = self.caps_word.to_config()?;
        let macros = self
            .macros
            .iter()
            .map(|m| Macro {
                name: m.name.clone(),
                text: m.text.clone(),
            })
            .collect();

        Ok(EngineConfig {
            keymap,
            combos,
            timing,
            host,
            caps_word,
            macros,
        })
    }
}

impl TimingToml {
    fn to_policy(&self, lookup: &KeyLookup<'_>) -> Result<TimingPolicy, ConfigError> {
        let mut policy = match self.tapping_term {
            Some(term) => TimingPolicy::with_tapping_term(term),
            None => TimingPolicy::default(),
        };
        if let Some(v) = self.quick_tap_term {
            policy.quick_tap_term = v;
        }
        if let Some(v) = self.combo_term {
            policy.combo_term = v;
        }
        if let Some(v) = self.oneshot_timeout {
            policy.oneshot_timeout = v;
        }
        if let Some(v) = self.caps_word_idle_timeout {
            policy.caps_word_idle_timeout = v;
        }
        if let Some(v) = self.wpm_window {
            policy.wpm_window = v;
        }
        if let Some(v) = self.shortcut_multiplier {
            policy.shortcut_multiplier = v;
        }
        if let Some(name) = &self.interrupt {
            policy.default_interrupt =
                name.parse::<InterruptPolicy>()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "timing.interrupt",
                        value: name.clone(),
                    })?;
        }
        for key in &self.permissive_hold {
            policy
                .interrupt
                .insert(lookup.resolve(key)?, InterruptPolicy::PermissiveHold);
        }
        for (key, &window) in &self.per_key {
            let id = match key.parse::<u16>() {
                Ok(pos) => KeyId(pos),
                Err(_) => lookup.resolve(&KeyRef::Name(key.clone()))?,
            };
            policy.per_key.insert(id, window);
        }
        Ok(policy)
    }
}

impl HostToml {
    fn to_settings(&self) -> Result<HostSettings, ConfigError> {
        let mut settings = HostSettings::default();
        if let Some(name) = &self.fallback {
            settings.fallback = name
                .parse::<HostOs>()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "host.fallback",
                    value: name.clone(),
                })?;
        }
        if let Some(swap) = self.swap_gui_ctrl {
            settings.swap_gui_ctrl = swap;
        }
        Ok(settings)
    }
}

impl CapsWordToml {
    fn to_config(&self) -> Result<CapsWordConfig, ConfigError> {
        let keys = |names: &[String]| {
            names
                .iter()
                .map(|n| parse_key(n))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(CapsWordConfig {
            both_shifts: self.both_shifts.unwrap_or(true),
            extra_shifted: keys(&self.extra_shifted)?,
            extra_continue: keys(&self.extra_continue)?,
        })
    }
}

/// Parse a key name
pub fn parse_key(name: &str) -> Result<Key, ConfigError> {
    crate::key::key_from_name(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
}

/// Resolves `KeyRef`s against one layer of a keymap
struct KeyLookup<'a> {
    keymap: &'a Keymap,
    layer: LayerId,
}

impl KeyLookup<'_> {
    fn resolve(&self, key: &KeyRef) -> Result<KeyId, ConfigError> {
        match key {
            KeyRef::Position(pos) => Ok(KeyId(*pos)),
            KeyRef::Name(name) => {
                let wanted = parse_key(name)?;
                self.keymap
                    .layer(self.layer)
                    .and_then(|layer| {
                        layer
                            .keys()
                            .iter()
                            .position(|action| sends(action) == Some(wanted))
                    })
                    .map(|i| KeyId(i as u16))
                    .ok_or_else(|| {
                        ConfigError::UnknownKey(format!(
                            "{name} (not on layer '{}')",
                            self.keymap.layer_name(self.layer)
                        ))
                    })
            }
        }
    }
}

/// The key a binding types when tapped, if any
fn sends(action: &KeyAction) -> Option<Key> {
    match action.tap_equivalent() {
        KeyAction::Key(k) | KeyAction::Shifted(k) => Some(k),
        _ => None,
    }
}

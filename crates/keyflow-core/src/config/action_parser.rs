// Keyflow Config API - Action Expression Parser
// Parses binding strings like "MT(LShift, A)" or "LT(nav, TAB)" into KeyAction

use thiserror::Error;

use crate::mapping::{KeyAction, LayerId, LightingCommand, MacroId, OsShortcut};
use crate::modifier::ModsParseError;
use crate::{Key, Mods};

/// Errors that can occur while parsing an action expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseError {
    #[error("action expression cannot be empty")]
    Empty,

    #[error("unknown key name: '{0}'")]
    UnknownKey(String),

    #[error("invalid modifiers: {0}")]
    Mods(#[from] ModsParseError),

    #[error("unknown layer: '{0}'")]
    UnknownLayer(String),

    #[error("unknown macro: '{0}'")]
    UnknownMacro(String),

    #[error("unknown shortcut: '{0}'")]
    UnknownShortcut(String),

    #[error("unknown lighting command: '{0}'")]
    UnknownLighting(String),

    #[error("unknown action: '{0}'")]
    UnknownFunction(String),

    #[error("{func} takes {expected} argument(s), got {found}")]
    Arity {
        func: String,
        expected: &'static str,
        found: usize,
    },

    #[error("malformed expression: '{0}'")]
    Malformed(String),
}

/// Layer and macro names an expression may refer to
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    pub layers: Vec<String>,
    pub macros: Vec<String>,
}

impl NameTable {
    pub fn new(layers: Vec<String>, macros: Vec<String>) -> Self {
        Self { layers, macros }
    }

    /// Layer by name (case-insensitive) or by index
    fn layer(&self, name: &str) -> Result<LayerId, ActionParseError> {
        if let Some(i) = self
            .layers
            .iter()
            .position(|l| l.eq_ignore_ascii_case(name))
        {
            return Ok(LayerId(i as u8));
        }
        match name.parse::<u8>() {
            Ok(i) if (i as usize) < self.layers.len() => Ok(LayerId(i)),
            _ => Err(ActionParseError::UnknownLayer(name.to_string())),
        }
    }

    fn macro_id(&self, name: &str) -> Result<MacroId, ActionParseError> {
        self.macros
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
            .map(|i| MacroId(i as u16))
            .ok_or_else(|| ActionParseError::UnknownMacro(name.to_string()))
    }
}

fn key(name: &str) -> Result<Key, ActionParseError> {
    crate::key::key_from_name(name).ok_or_else(|| ActionParseError::UnknownKey(name.to_string()))
}

fn shortcut(name: &str) -> Result<OsShortcut, ActionParseError> {
    name.parse()
        .map_err(|_| ActionParseError::UnknownShortcut(name.to_string()))
}

fn arity(func: &str, args: &[&str], expected: &'static str, ok: bool) -> Result<(), ActionParseError> {
    if ok {
        Ok(())
    } else {
        Err(ActionParseError::Arity {
            func: func.to_string(),
            expected,
            found: args.len(),
        })
    }
}

/// Parse one binding expression
///
/// # Examples
/// ```
/// use keyflow_core::config::{parse_action, NameTable};
/// use keyflow_core::{Key, KeyAction, Mods};
/// let names = NameTable::default();
/// let action = parse_action("MT(LShift, A)", &names).unwrap();
/// assert_eq!(action, KeyAction::ModTap { hold: Mods::LSHIFT, tap: Key::A });
/// ```
pub fn parse_action(exp: &str, names: &NameTable) -> Result<KeyAction, ActionParseError> {
    let exp = exp.trim();
    if exp.is_empty() {
        return Err(ActionParseError::Empty);
    }

    let Some(open) = exp.find('(') else {
        return parse_bare(exp);
    };
    if !exp.ends_with(')') {
        return Err(ActionParseError::Malformed(exp.to_string()));
    }

    let func = exp[..open].trim().to_ascii_uppercase();
    let inner = &exp[open + 1..exp.len() - 1];
    let args: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();

    match func.as_str() {
        "S" => {
            arity(&func, &args, "1", args.len() == 1)?;
            Ok(KeyAction::Shifted(key(args[0])?))
        }
        "MT" => {
            arity(&func, &args, "2", args.len() == 2)?;
            Ok(KeyAction::ModTap {
                hold: args[0].parse::<Mods>()?,
                tap: key(args[1])?,
            })
        }
        "LT" => {
            arity(&func, &args, "2", args.len() == 2)?;
            Ok(KeyAction::LayerTap {
                layer: names.layer(args[0])?,
                tap: key(args[1])?,
            })
        }
        "SHORTCUT" | "SHORTCUT_NOW" => {
            arity(&func, &args, "2", args.len() == 2)?;
            Ok(KeyAction::Shortcut {
                tap: key(args[0])?,
                shortcut: shortcut(args[1])?,
                immediate: func == "SHORTCUT_NOW",
            })
        }
        "OSM" => {
            arity(&func, &args, "1 or 2", matches!(args.len(), 1 | 2))?;
            let non_mac = match args.get(1) {
                Some(m) => Some(m.parse::<Mods>()?),
                None => None,
            };
            Ok(KeyAction::OneShot {
                mods: args[0].parse::<Mods>()?,
                non_mac,
            })
        }
        "MO" => {
            arity(&func, &args, "1", args.len() == 1)?;
            Ok(KeyAction::Momentary(names.layer(args[0])?))
        }
        "DF" => {
            arity(&func, &args, "1", args.len() == 1)?;
            Ok(KeyAction::DefaultLayer(names.layer(args[0])?))
        }
        "OS" => {
            arity(&func, &args, "1", args.len() == 1)?;
            Ok(KeyAction::Os(shortcut(args[0])?))
        }
        "MACRO" => {
            arity(&func, &args, "1", args.len() == 1)?;
            Ok(KeyAction::Macro(names.macro_id(args[0])?))
        }
        "RGB" => {
            arity(&func, &args, "1", args.len() == 1)?;
            args[0]
                .parse::<LightingCommand>()
                .map(KeyAction::Lighting)
                .map_err(|_| ActionParseError::UnknownLighting(args[0].to_string()))
        }
        _ => Err(ActionParseError::UnknownFunction(func)),
    }
}

fn parse_bare(exp: &str) -> Result<KeyAction, ActionParseError> {
    let upper = exp.to_ascii_uppercase();
    if !upper.is_empty() && upper.chars().all(|c| c == '_') {
        return Ok(KeyAction::Transparent);
    }
    if !upper.is_empty() && upper.chars().all(|c| c == 'X') && upper.len() >= 3 {
        return Ok(KeyAction::No);
    }
    match upper.as_str() {
        "TRNS" | "KC_TRNS" => Ok(KeyAction::Transparent),
        "NO" | "KC_NO" => Ok(KeyAction::No),
        "CYCLE_OS" => Ok(KeyAction::CycleOs),
        "CAPS_WORD" | "CW_TOGG" => Ok(KeyAction::CapsWord),
        _ => key(exp).map(KeyAction::Key),
    }
}

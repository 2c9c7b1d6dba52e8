// Keyflow Config API
// Action expressions, keymap files and load-time validation

pub mod action_parser;
pub mod validate;

#[cfg(feature = "config-file")]
pub mod parser;

pub use action_parser::{parse_action, ActionParseError, NameTable};
pub use validate::{validate, ConfigError};

#[cfg(feature = "config-file")]
pub use parser::{default_path, parse_key, KeymapToml};

// Keyflow Core Library
// Tap-hold, combo and one-shot resolution engine for keyboard firmware keymaps

pub mod action;
pub mod combo;
pub mod config;
pub mod context;
pub mod event;
pub mod key;
pub mod mapping;
pub mod modifier;
pub mod output;
pub mod state;
pub mod timing;
pub mod transform;

pub use action::{Action, KeyEvent};
pub use combo::{ComboDefinition, ComboId};
pub use config::{parse_action, validate, ActionParseError, ConfigError, NameTable};
pub use context::{DetectedOs, HostContext, HostOs};
pub use event::{Clock, EventQueue, ManualClock, MatrixState, ScanLoop, SystemClock};
pub use key::{key_from_name, Key};
pub use mapping::{
    CapsWordConfig, DualRole, EngineConfig, HoldAction, HostSettings, InterruptPolicy, KeyAction,
    KeyId, Keymap, Layer, LayerId, LightingCommand, Macro, MacroId, OsShortcut, TapAction,
};
pub use modifier::{Mods, ModsParseError};
pub use output::{
    led_hints, Emitter, HidReport, HidState, Hsv, Indicator, IndicatorSink, LedHint, OutputEvent,
    RecordingSink, ReportSink, WpmTracker,
};
pub use state::{Held, Keystore, LayerStack, SessionState, Source};
pub use timing::{deadline_reached, elapsed, Duration, Tick, TimingPolicy};
pub use transform::{Engine, OneShotState};

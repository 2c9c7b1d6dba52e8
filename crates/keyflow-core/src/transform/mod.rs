// Keyflow Transform Module
// Resolution stages and the engine that chains them

pub mod caps_word;
pub mod combo;
pub mod engine;
pub mod oneshot;
pub mod tap_hold;

pub use caps_word::{CapsWord, CapsWordEffect};
pub use combo::{ComboMatchState, ComboMatcher, ComboStep, ComboSteps};
pub use engine::Engine;
pub use oneshot::{OneShotState, OneShotTracker};
pub use tap_hold::{
    PendingResolution, PressOutcome, ReleaseOutcome, Resolution, SourceEvent, TapHoldResolver,
};

// Keyflow Indicators
// Colours and per-key LED hints derived from the active layer

use crate::mapping::{KeyAction, Layer};

/// Hue/saturation/value triple as the lighting driver takes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    pub const WHITE: Hsv = Hsv::new(0, 0, 255);
    pub const RED: Hsv = Hsv::new(0, 255, 255);
    pub const GOLD: Hsv = Hsv::new(36, 255, 255);
    pub const GREEN: Hsv = Hsv::new(85, 255, 255);
    pub const BLUE: Hsv = Hsv::new(170, 255, 255);
    pub const OFF: Hsv = Hsv::new(0, 0, 0);
}

/// How one key position should be lit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedHint {
    /// Unassigned on this layer
    Off,
    /// Home-row style dual-role modifier
    Highlight,
    Normal,
}

impl LedHint {
    /// Colour for this hint given the current theme colour
    pub fn color(self, theme: Hsv) -> Hsv {
        match self {
            LedHint::Off => Hsv::OFF,
            LedHint::Highlight => Hsv::WHITE,
            LedHint::Normal => theme,
        }
    }
}

/// Classify every key position of `layer`
pub fn led_hints(layer: &Layer) -> Vec<LedHint> {
    layer
        .keys()
        .iter()
        .map(|action| match action {
            KeyAction::No => LedHint::Off,
            KeyAction::ModTap { .. } => LedHint::Highlight,
            _ => LedHint::Normal,
        })
        .collect()
}

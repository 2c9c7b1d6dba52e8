// Keyflow Output Layer
// Output events, HID report folding, sinks and indicator hints

mod emitter;
mod event;
mod indicator;
mod report;
mod wpm;

pub use emitter::{Emitter, IndicatorSink, RecordingSink, ReportSink};
pub use event::{Indicator, OutputEvent};
pub use indicator::{led_hints, Hsv, LedHint};
pub use report::{char_to_key, HidReport, HidState, REPORT_KEYS};
pub use wpm::{is_typing_stroke, WpmTracker, WPM_MAX};

// Keyflow Output Emitter
// Routes engine output to the HID transport and the indicator drivers

use crate::output::{HidReport, HidState, Indicator, OutputEvent};

/// HID transport boundary
pub trait ReportSink {
    fn send_report(&mut self, report: &HidReport);
}

/// LED / display boundary; notifications are fire-and-forget
pub trait IndicatorSink {
    fn notify(&mut self, indicator: &Indicator);
}

/// Sink that keeps everything it receives, for tests and replays
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub reports: Vec<HidReport>,
    pub indicators: Vec<Indicator>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
        self.indicators.clear();
    }
}

impl ReportSink for RecordingSink {
    fn send_report(&mut self, report: &HidReport) {
        self.reports.push(report.clone());
    }
}

impl IndicatorSink for RecordingSink {
    fn notify(&mut self, indicator: &Indicator) {
        self.indicators.push(indicator.clone());
    }
}

/// Thin adapter from `OutputEvent`s to sinks
pub struct Emitter<S> {
    hid: HidState,
    sink: S,
}

impl<S: ReportSink + IndicatorSink> Emitter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            hid: HidState::new(),
            sink,
        }
    }

    pub fn emit(&mut self, events: &[OutputEvent]) {
        for event in events {
            match event {
                OutputEvent::Indicator(indicator) => self.sink.notify(indicator),
                other => {
                    for report in self.hid.apply(other) {
                        log::trace!("report {}", report);
                        self.sink.send_report(&report);
                    }
                }
            }
        }
    }

    pub fn hid(&self) -> &HidState {
        &self.hid
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Key, Mods};

    #[test]
    fn test_emitter_routes_events() {
        let mut emitter = Emitter::new(RecordingSink::new());
        emitter.emit(&[
            OutputEvent::KeyDown {
                key: Key::A,
                mods: Mods::NONE,
            },
            OutputEvent::Indicator(Indicator::CapsWord(true)),
            OutputEvent::KeyUp(Key::A),
        ]);
        let sink = emitter.into_sink();
        assert_eq!(sink.reports.len(), 2);
        assert_eq!(sink.indicators, vec![Indicator::CapsWord(true)]);
    }

    #[test]
    fn test_recording_sink_clear() {
        let mut emitter = Emitter::new(RecordingSink::new());
        emitter.emit(&[OutputEvent::ModsChanged(Mods::LSHIFT)]);
        assert_eq!(emitter.sink().reports.len(), 1);
        emitter.sink_mut().clear();
        assert!(emitter.sink().reports.is_empty());
        assert!(!emitter.hid().rollover());
    }
}

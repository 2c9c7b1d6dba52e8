// Keyflow Scan Loop
// Single-threaded scan loop: queue events, process each to completion, poll timers

use std::time::Instant;

use crate::action::KeyEvent;
use crate::context::DetectedOs;
use crate::event::{EventQueue, MatrixState};
use crate::output::{Emitter, Indicator, IndicatorSink, OutputEvent, ReportSink, WpmTracker};
use crate::timing::Tick;
use crate::transform::Engine;

/// Source of the current tick
pub trait Clock {
    fn now(&self) -> Tick;
}

/// Clock moved by hand, for deterministic tests and replays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    now: Tick,
}

impl ManualClock {
    pub fn new(start: Tick) -> Self {
        Self { now: start }
    }

    pub fn set(&mut self, now: Tick) {
        self.now = now;
    }

    /// Move forward by `ms`, wrapping like the hardware counter
    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.now
    }
}

/// Milliseconds since the clock was created, truncated to the tick width
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Tick {
        self.start.elapsed().as_millis() as Tick
    }
}

/// Owns the engine and drives it one scan at a time
pub struct ScanLoop<C: Clock, S: ReportSink + IndicatorSink> {
    engine: Engine,
    queue: EventQueue<KeyEvent>,
    matrix: MatrixState,
    clock: C,
    emitter: Emitter<S>,
    wpm: WpmTracker,
    overruns: u32,
}

impl<C: Clock, S: ReportSink + IndicatorSink> ScanLoop<C, S> {
    pub fn new(engine: Engine, clock: C, sink: S) -> Self {
        let key_count = engine.config().keymap.key_count();
        let wpm = WpmTracker::new(engine.config().timing.wpm_window);
        Self {
            engine,
            queue: EventQueue::new(),
            matrix: MatrixState::new(key_count),
            clock,
            emitter: Emitter::new(sink),
            wpm,
            overruns: 0,
        }
    }

    /// Replace the default queue (e.g. a smaller one in tests)
    pub fn with_queue(mut self, queue: EventQueue<KeyEvent>) -> Self {
        self.queue = queue;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn emitter(&self) -> &Emitter<S> {
        &self.emitter
    }

    pub fn sink(&self) -> &S {
        self.emitter.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.emitter.sink_mut()
    }

    /// Number of queue overruns seen so far
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn wpm(&self) -> &WpmTracker {
        &self.wpm
    }

    /// One scan period: queue the events, process them, then poll timers
    pub fn scan(&mut self, events: impl IntoIterator<Item = KeyEvent>) {
        for event in events {
            self.enqueue(event);
        }
        self.drain();
        let now = self.clock.now();
        let out = self.engine.tick(now);
        self.dispatch(&out);

        if let Some(wpm) = self.wpm.poll(now) {
            self.emitter.emit(&[OutputEvent::Indicator(Indicator::Wpm(wpm))]);
        }
    }

    /// One scan period from a raw switch snapshot
    pub fn scan_matrix(&mut self, snapshot: &[bool]) {
        let events = self.matrix.scan(snapshot, self.clock.now());
        self.scan(events);
    }

    /// Forward a host OS detection result
    pub fn host_detected(&mut self, detected: DetectedOs) {
        let out = self.engine.host_detected(detected);
        self.dispatch(&out);
    }

    fn enqueue(&mut self, event: KeyEvent) {
        if let Err(event) = self.queue.push(event) {
            self.overruns += 1;
            log::warn!(
                "Event queue overrun ({} queued), relieving engine",
                self.queue.len()
            );
            let out = self.engine.relieve_pressure();
            self.dispatch(&out);
            self.drain();
            if self.queue.push(event).is_err() {
                log::error!("Event queue still full after drain, dropping {}", event);
            }
        }
    }

    fn drain(&mut self) {
        while let Some(event) = self.queue.pop() {
            let out = self.engine.process_event(event);
            self.dispatch(&out);
        }
    }

    fn dispatch(&mut self, out: &[OutputEvent]) {
        if out.is_empty() {
            return;
        }
        let now = self.clock.now();
        for event in out {
            if let OutputEvent::KeyDown { key, mods } = event {
                self.wpm.record(*key, *mods, now);
            }
        }
        self.emitter.emit(out);
    }
}

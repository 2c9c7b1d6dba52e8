// Keyflow Engine
// Combo matching, tap-hold resolution, one-shots and host remapping in one pipeline
//
// Every event flows combo matcher -> tap-hold resolver -> action handlers.
// Handlers read the session state (layers, host, one-shots, caps word),
// apply host remapping to the resolved action and append OutputEvents.

use crate::action::{Action, KeyEvent};
use crate::config::{validate, ConfigError};
use crate::context::DetectedOs;
use crate::mapping::{
    EngineConfig, HoldAction, KeyAction, KeyId, LayerId, MacroId, TapAction,
};
use crate::output::{Indicator, OutputEvent};
use crate::state::{Held, SessionState, Source};
use crate::timing::Tick;
use crate::transform::caps_word::CapsWordEffect;
use crate::transform::combo::{ComboMatcher, ComboStep, ComboSteps};
use crate::transform::tap_hold::{
    PendingResolution, PressOutcome, ReleaseOutcome, SourceEvent, TapHoldResolver,
};
use crate::{Key, Mods};

/// The resolution engine for one keymap
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    session: SessionState,
    combos: ComboMatcher,
    tap_hold: TapHoldResolver,
    /// Latest tick seen from events or timer polls
    now: Tick,
    out: Vec<OutputEvent>,
}

impl Engine {
    /// Create an engine; the config is validated first
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        validate(&config)?;
        log::info!(
            "Engine ready: keymap '{}', {} layers, {} combos",
            config.keymap.name(),
            config.keymap.layers().len(),
            config.combos.len()
        );
        Ok(Self {
            session: SessionState::new(config.host.clone()),
            config,
            combos: ComboMatcher::new(),
            tap_hold: TapHoldResolver::new(),
            now: 0,
            out: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn tap_hold(&self) -> &TapHoldResolver {
        &self.tap_hold
    }

    pub fn combo_matcher(&self) -> &ComboMatcher {
        &self.combos
    }

    /// Earliest pending combo or tap-hold deadline
    pub fn next_deadline(&self) -> Option<Tick> {
        match (self.combos.next_deadline(), self.tap_hold.next_deadline()) {
            (Some(a), Some(b)) => Some(if crate::timing::deadline_reached(a, b) { b } else { a }),
            (a, b) => a.or(b),
        }
    }

    /// Process one key transition to completion
    pub fn process_event(&mut self, event: KeyEvent) -> Vec<OutputEvent> {
        log::trace!("event {}", event);
        self.run_timers(event.time);

        if !self.config.keymap.contains(event.key) {
            log::warn!("Ignoring event for {} outside the keymap", event.key);
            return self.take_output();
        }

        let layer = self.session.layers.top();
        let steps = self
            .combos
            .on_event(event, layer, &self.config.combos, &self.config.timing);
        self.apply_combo_steps(steps);
        self.take_output()
    }

    /// Poll timers without an event
    pub fn tick(&mut self, now: Tick) -> Vec<OutputEvent> {
        self.run_timers(now);
        self.take_output()
    }

    /// Host OS auto-detection result; overrides any manual selection
    pub fn host_detected(&mut self, detected: DetectedOs) -> Vec<OutputEvent> {
        let os = self.session.host.detect(detected);
        let color = self.session.host.indicator_color();
        self.indicate(Indicator::OsChanged { os, color });
        self.take_output()
    }

    /// Event queue overrun: drop the open chord (members replay as single
    /// keys) or, failing that, force the oldest pending tap-hold to Hold
    pub fn relieve_pressure(&mut self) -> Vec<OutputEvent> {
        if self.combos.is_buffering() {
            log::warn!("Relieving pressure: dropping open combo");
            let steps = self.combos.relieve();
            self.apply_combo_steps(steps);
        } else if let Some(pending) = self.tap_hold.force_oldest() {
            log::warn!("Relieving pressure: forcing {} to hold", pending.key);
            self.apply_hold(pending, self.now);
            self.replay_deferred_if_idle();
        }
        self.take_output()
    }

    fn take_output(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.out)
    }

    fn emit(&mut self, event: OutputEvent) {
        log::trace!("emit {}", event);
        self.out.push(event);
    }

    fn indicate(&mut self, indicator: Indicator) {
        self.emit(OutputEvent::Indicator(indicator));
    }

    fn run_timers(&mut self, now: Tick) {
        self.now = now;

        let steps = self.combos.tick(now);
        self.apply_combo_steps(steps);

        for pending in self.tap_hold.expire(now) {
            self.apply_hold(pending, now);
        }
        self.replay_deferred_if_idle();

        let oneshot_timeout = self.config.timing.oneshot_timeout;
        let caps_word_timeout = self.config.timing.caps_word_idle_timeout;
        if self.session.oneshot.expire(now, oneshot_timeout) {
            let active = self.session.oneshot.query_active_modifiers();
            self.indicate(Indicator::OneShot(active));
        }
        if self.session.caps_word.expire(now, caps_word_timeout) {
            self.indicate(Indicator::CapsWord(false));
        }
    }

    fn apply_combo_steps(&mut self, steps: ComboSteps) {
        for step in steps {
            let event = match step {
                ComboStep::Forward(e) => SourceEvent {
                    source: Source::Key(e.key),
                    action: e.action,
                    time: e.time,
                },
                ComboStep::Press { combo, time } => SourceEvent {
                    source: Source::Combo(combo),
                    action: Action::Press,
                    time,
                },
                ComboStep::Release { combo, time } => SourceEvent {
                    source: Source::Combo(combo),
                    action: Action::Release,
                    time,
                },
            };
            self.handle(event);
        }
    }

    /// Tap-hold stage: defer behind permissive keys, otherwise dispatch
    fn handle(&mut self, event: SourceEvent) {
        if self.tap_hold.is_deferring() {
            if !event.is_press() {
                if let Some(key) = event.source.key_id() {
                    if self.tap_hold.is_permissive_pending(key) {
                        // released first: tap, then everything it held back
                        self.release_source(event);
                        self.replay_deferred_if_idle();
                        return;
                    }
                }
                if self.tap_hold.deferred_press_of(event.source) {
                    // a key pressed and released inside the window: hold
                    for pending in self.tap_hold.resolve_permissive_holds() {
                        self.apply_hold(pending, event.time);
                    }
                    self.tap_hold.defer(event);
                    self.replay_deferred_if_idle();
                    return;
                }
            }
            self.tap_hold.defer(event);
            return;
        }

        if event.is_press() {
            self.press_source(event);
        } else {
            self.release_source(event);
        }
    }

    fn replay_deferred_if_idle(&mut self) {
        while !self.tap_hold.is_deferring() && self.tap_hold.deferred_len() > 0 {
            for event in self.tap_hold.take_deferred() {
                self.handle(event);
            }
        }
    }

    fn press_source(&mut self, event: SourceEvent) {
        let by = event.source.key_id();
        for pending in self.tap_hold.interrupt(by) {
            self.apply_hold(pending, event.time);
        }
        self.tap_hold.note_press(by);

        let action = match event.source {
            Source::Key(key) => self.session.layers.action_at(&self.config.keymap, key),
            Source::Combo(combo) => self.config.combos[combo.0 as usize]
                .output()
                .tap_equivalent(),
        };

        if let Source::Key(key) = event.source {
            if action.is_dual_role() {
                self.press_dual_role(key, &action, event.time);
                return;
            }
        }
        self.press_action(event.source, &action, event.time);
    }

    fn press_dual_role(&mut self, key: KeyId, action: &KeyAction, now: Tick) {
        let timing = &self.config.timing;
        let window = timing.window_for(key, matches!(action, KeyAction::Shortcut { .. }));
        let Some(role) = action.dual_role(window, timing.interrupt_for(key)) else {
            return;
        };
        let source = Source::Key(key);
        match self
            .tap_hold
            .on_press(key, role, now, self.config.timing.quick_tap_term)
        {
            PressOutcome::Pending => {}
            PressOutcome::TapNow { .. } => match role.tap {
                TapAction::Key(tap) => self.register_key(source, tap, Mods::NONE, now),
                TapAction::OneShot { mods, non_mac } => {
                    self.oneshot_tap(mods, non_mac, now);
                    self.session.keystore.hold(source, Held::Nothing);
                }
            },
            PressOutcome::HoldNow => self.apply_hold_action(source, role.hold, now),
        }
    }

    fn press_action(&mut self, source: Source, action: &KeyAction, now: Tick) {
        match *action {
            KeyAction::No | KeyAction::Transparent => {
                self.session.keystore.hold(source, Held::Nothing);
            }
            KeyAction::Key(key) if key.is_modifier() => {
                let key = self.session.host.remap_key(key);
                let mods = Mods::from_key(key).unwrap_or(Mods::NONE);
                self.hold_mods(source, mods, now);
            }
            KeyAction::Key(key) => self.register_key(source, key, Mods::NONE, now),
            KeyAction::Shifted(key) => self.register_key(source, key, Mods::LSHIFT, now),
            KeyAction::ModTap { .. } | KeyAction::LayerTap { .. } | KeyAction::Shortcut { .. } => {
                let tap = action.tap_equivalent();
                self.press_action(source, &tap, now);
            }
            KeyAction::OneShot { mods, non_mac } => {
                self.oneshot_tap(mods, non_mac, now);
                self.session.keystore.hold(source, Held::Nothing);
            }
            KeyAction::Momentary(layer) => self.hold_layer(source, layer),
            KeyAction::DefaultLayer(layer) => {
                let before = self.session.layers.top();
                self.session.layers.set_default(layer);
                self.session.keystore.hold(source, Held::Nothing);
                self.layer_changed(before);
            }
            KeyAction::Os(shortcut) => {
                let (key, cmd) = self.session.host.shortcut(shortcut);
                self.tap_stroke(key, self.session.held_mods() | cmd);
                self.session.keystore.hold(source, Held::Nothing);
            }
            KeyAction::CycleOs => {
                let os = self.session.host.cycle();
                let color = self.session.host.indicator_color();
                self.indicate(Indicator::OsChanged { os, color });
                self.session.keystore.hold(source, Held::Nothing);
            }
            KeyAction::CapsWord => {
                let on = self.session.caps_word.toggle(now);
                self.indicate(Indicator::CapsWord(on));
                self.session.keystore.hold(source, Held::Nothing);
            }
            KeyAction::Macro(id) => {
                self.type_macro(id);
                self.session.keystore.hold(source, Held::Nothing);
            }
            KeyAction::Lighting(cmd) => {
                self.indicate(Indicator::Lighting(cmd));
                self.session.keystore.hold(source, Held::Nothing);
            }
        }
    }

    fn type_macro(&mut self, id: MacroId) {
        match self.config.macro_text(id) {
            Some(text) => {
                let text = text.to_string();
                self.emit(OutputEvent::Text(text));
            }
            None => log::warn!("Macro #{} is not defined", id.0),
        }
        if self.session.caps_word.is_active() {
            self.session.caps_word.deactivate();
            self.indicate(Indicator::CapsWord(false));
        }
    }

    fn apply_hold(&mut self, pending: PendingResolution, now: Tick) {
        self.apply_hold_action(Source::Key(pending.key), pending.role.hold, now);
    }

    fn apply_hold_action(&mut self, source: Source, hold: HoldAction, now: Tick) {
        match hold {
            HoldAction::Mods(mods) => {
                let mods = self.session.host.remap_mods(mods);
                self.hold_mods(source, mods, now);
            }
            HoldAction::OneShotMods { mods, non_mac } => {
                let mods = self.session.host.oneshot_mods(mods, non_mac);
                self.hold_mods(source, mods, now);
            }
            HoldAction::Layer(layer) => self.hold_layer(source, layer),
            HoldAction::Shortcut(shortcut) => {
                let (key, cmd) = self.session.host.shortcut(shortcut);
                self.tap_stroke(key, self.session.held_mods() | cmd);
                self.session.keystore.hold(source, Held::Nothing);
            }
        }
    }

    fn apply_tap(&mut self, pending: PendingResolution, now: Tick) {
        match pending.role.tap {
            TapAction::Key(key) => {
                let key = self.session.host.remap_key(key);
                let mods = self.stroke_mods(key, Mods::NONE, now);
                self.tap_stroke(key, mods);
            }
            TapAction::OneShot { mods, non_mac } => self.oneshot_tap(mods, non_mac, now),
        }
    }

    fn tap_stroke(&mut self, key: Key, mods: Mods) {
        self.emit(OutputEvent::KeyDown { key, mods });
        self.emit(OutputEvent::KeyUp(key));
    }

    fn hold_mods(&mut self, source: Source, mods: Mods, now: Tick) {
        self.session.keystore.hold(source, Held::Mods(mods));
        let held = self.session.held_mods();
        self.emit(OutputEvent::ModsChanged(held));

        if self.config.caps_word.both_shifts
            && held.contains(Mods::SHIFT)
            && !self.session.caps_word.is_active()
        {
            self.session.caps_word.activate(now);
            self.indicate(Indicator::CapsWord(true));
        }
    }

    fn hold_layer(&mut self, source: Source, layer: LayerId) {
        let before = self.session.layers.top();
        self.session.layers.activate(layer);
        self.session.keystore.hold(source, Held::Layer(layer));
        self.layer_changed(before);
    }

    fn layer_changed(&mut self, before: LayerId) {
        let top = self.session.layers.top();
        if top == before {
            return;
        }
        log::debug!("layer {} -> {}", before, top);
        let name = self.config.keymap.layer_name(top).to_string();
        self.indicate(Indicator::LayerChanged { layer: top, name });
        let steps = self.combos.on_layer_change(top, &self.config.combos);
        self.apply_combo_steps(steps);
    }

    fn register_key(&mut self, source: Source, key: Key, extra: Mods, now: Tick) {
        let key = self.session.host.remap_key(key);
        let mods = self.stroke_mods(key, extra, now);
        self.emit(OutputEvent::KeyDown { key, mods });
        self.session.keystore.hold(source, Held::Key(key));
    }

    fn oneshot_tap(&mut self, mods: Mods, non_mac: Option<Mods>, now: Tick) {
        let mods = self.session.host.oneshot_mods(mods, non_mac);
        self.session.oneshot.arm(mods, now);
        let active = self.session.oneshot.query_active_modifiers();
        self.indicate(Indicator::OneShot(active));
    }

    /// Modifier byte for one keystroke: held mods, one-shots, the action's own
    /// shift and caps word. Consumes armed one-shots.
    fn stroke_mods(&mut self, key: Key, extra: Mods, now: Tick) -> Mods {
        let oneshot = self.session.oneshot.query_active_modifiers();
        let mut mods = self.session.held_mods() | oneshot | extra;

        match self.session.caps_word.on_keystroke(
            key,
            mods.intersects(Mods::SHIFT),
            mods,
            &self.config.caps_word,
            now,
        ) {
            CapsWordEffect::AddShift => mods |= Mods::LSHIFT,
            CapsWordEffect::Deactivated => self.indicate(Indicator::CapsWord(false)),
            CapsWordEffect::Inactive | CapsWordEffect::Keep => {}
        }

        if !oneshot.is_empty() {
            self.session.oneshot.consume_on_next_keystroke();
            let remaining = self.session.oneshot.query_active_modifiers();
            if remaining != oneshot {
                self.indicate(Indicator::OneShot(remaining));
            }
        }
        mods
    }

    fn release_source(&mut self, event: SourceEvent) {
        if let Source::Key(key) = event.source {
            if let ReleaseOutcome::Tap(pending) = self.tap_hold.on_release(key, event.time) {
                self.apply_tap(pending, event.time);
                return;
            }
        }

        match self.session.keystore.release(event.source) {
            Some(Held::Key(key)) => self.emit(OutputEvent::KeyUp(key)),
            Some(Held::Mods(_)) => {
                let held = self.session.held_mods();
                self.emit(OutputEvent::ModsChanged(held));
            }
            Some(Held::Layer(layer)) => {
                let before = self.session.layers.top();
                self.session.layers.deactivate(layer);
                self.layer_changed(before);
            }
            Some(Held::Nothing) => {}
            None => log::warn!("Ignoring release of {:?}: nothing held", event.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combo::ComboDefinition;
    use crate::context::HostOs;
    use crate::mapping::{Keymap, Layer};

    fn engine() -> Engine {
        let base = Layer::new(
            "base",
            vec![
                KeyAction::ModTap {
                    hold: Mods::LSHIFT,
                    tap: Key::A,
                },
                KeyAction::Key(Key::B),
                KeyAction::Momentary(LayerId(1)),
                KeyAction::Key(Key::LEFT_META),
            ],
        );
        let nav = Layer::new(
            "nav",
            vec![
                KeyAction::Os(crate::mapping::OsShortcut::Copy),
                KeyAction::Key(Key::LEFT),
                KeyAction::Transparent,
                KeyAction::CycleOs,
            ],
        );
        Engine::new(EngineConfig::new(Keymap::new("t", 4, vec![base, nav]))).unwrap()
    }

    fn ev(key: u16, pressed: bool, time: Tick) -> KeyEvent {
        KeyEvent {
            key: KeyId(key),
            action: Action::from_pressed(pressed),
            time,
        }
    }

    fn keys(out: &[OutputEvent]) -> Vec<OutputEvent> {
        out.iter().filter(|e| !e.is_indicator()).cloned().collect()
    }

    #[test]
    fn test_plain_key() {
        let mut e = engine();
        assert_eq!(
            e.process_event(ev(1, true, 0)),
            vec![OutputEvent::KeyDown {
                key: Key::B,
                mods: Mods::NONE
            }]
        );
        assert_eq!(e.process_event(ev(1, false, 10)), vec![OutputEvent::KeyUp(Key::B)]);
    }

    #[test]
    fn test_mod_tap_tap_and_hold() {
        let mut e = engine();
        assert!(e.process_event(ev(0, true, 0)).is_empty());
        assert_eq!(
            e.process_event(ev(0, false, 50)),
            vec![
                OutputEvent::KeyDown {
                    key: Key::A,
                    mods: Mods::NONE
                },
                OutputEvent::KeyUp(Key::A)
            ]
        );

        assert!(e.process_event(ev(0, true, 1000)).is_empty());
        assert_eq!(e.tick(1199), vec![]);
        assert_eq!(e.tick(1200), vec![OutputEvent::ModsChanged(Mods::LSHIFT)]);
        assert_eq!(
            e.process_event(ev(0, false, 1500)),
            vec![OutputEvent::ModsChanged(Mods::NONE)]
        );
    }

    #[test]
    fn test_layer_and_os_shortcut() {
        let mut e = engine();
        let out = e.process_event(ev(2, true, 0));
        assert_eq!(
            out,
            vec![OutputEvent::Indicator(Indicator::LayerChanged {
                layer: LayerId(1),
                name: "nav".into()
            })]
        );
        // unknown host falls back to Mac: GUI+C
        assert_eq!(
            keys(&e.process_event(ev(0, true, 10))),
            vec![
                OutputEvent::KeyDown {
                    key: Key::C,
                    mods: Mods::LGUI
                },
                OutputEvent::KeyUp(Key::C)
            ]
        );
        e.process_event(ev(0, false, 20));

        // cycle Mac -> Windows, then copy is CTRL+C
        e.host_detected(DetectedOs::MacOs);
        e.process_event(ev(3, true, 30));
        e.process_event(ev(3, false, 40));
        assert_eq!(e.session().host.selected(), HostOs::Windows);
        assert_eq!(
            keys(&e.process_event(ev(0, true, 50))),
            vec![
                OutputEvent::KeyDown {
                    key: Key::C,
                    mods: Mods::LCTRL
                },
                OutputEvent::KeyUp(Key::C)
            ]
        );
    }

    #[test]
    fn test_buffered_chord_replayed_before_outside_release() {
        let mut e = engine();
        e.config.combos.push(ComboDefinition::new(
            [KeyId(1), KeyId(3)],
            KeyAction::Key(Key::ESC),
        ));
        assert!(e.process_event(ev(0, true, 0)).is_empty());
        assert!(e.process_event(ev(1, true, 10)).is_empty());
        assert!(e.combo_matcher().is_buffering());

        assert_eq!(
            e.process_event(ev(0, false, 20)),
            vec![
                OutputEvent::ModsChanged(Mods::LSHIFT),
                OutputEvent::KeyDown {
                    key: Key::B,
                    mods: Mods::LSHIFT
                },
                OutputEvent::ModsChanged(Mods::NONE),
            ]
        );
        assert_eq!(e.process_event(ev(1, false, 40)), vec![OutputEvent::KeyUp(Key::B)]);
    }

    #[test]
    fn test_unsure_detection_announces_red() {
        let mut e = engine();
        assert_eq!(
            e.host_detected(DetectedOs::Unknown),
            vec![OutputEvent::Indicator(Indicator::OsChanged {
                os: HostOs::Mac,
                color: crate::output::Hsv::RED
            })]
        );
        // the fallback still decides the shortcut modifier
        e.process_event(ev(2, true, 0));
        assert_eq!(
            keys(&e.process_event(ev(0, true, 10))),
            vec![
                OutputEvent::KeyDown {
                    key: Key::C,
                    mods: Mods::LGUI
                },
                OutputEvent::KeyUp(Key::C)
            ]
        );
    }

    #[test]
    fn test_gui_key_swapped_off_mac() {
        let mut e = engine();
        e.host_detected(DetectedOs::Linux);
        assert_eq!(
            e.process_event(ev(3, true, 0)),
            vec![OutputEvent::ModsChanged(Mods::LCTRL)]
        );
    }

    #[test]
    fn test_out_of_range_key_dropped() {
        let mut e = engine();
        assert!(e.process_event(ev(9, true, 0)).is_empty());
        assert!(e.process_event(ev(9, false, 5)).is_empty());
    }

    #[test]
    fn test_relieve_pressure_forces_hold() {
        let mut e = engine();
        e.process_event(ev(0, true, 0));
        assert_eq!(e.next_deadline(), Some(200));
        assert_eq!(
            e.relieve_pressure(),
            vec![OutputEvent::ModsChanged(Mods::LSHIFT)]
        );
        assert_eq!(e.tap_hold().unresolved_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::new(Keymap::new("empty", 4, vec![]));
        assert!(matches!(Engine::new(config), Err(ConfigError::NoLayers)));
    }
}

// Keyflow End-to-End Test Scenarios
//
// These tests drive the full scan loop (queue -> engine -> emitter) with the
// shipped Lily58 keymap and check the HID reports a host would receive.
//
// Run with: cargo test --test e2e_scenarios

#[cfg(feature = "config-file")]
mod e2e_tests {
    use keyflow_core::event::EventQueue;
    use keyflow_core::{
        Engine, EngineConfig, HidReport, HostOs, Hsv, Indicator, Key, KeyEvent, KeyId, LayerId,
        ManualClock, Mods, RecordingSink, ScanLoop, Tick,
    };

    const LILY: &str = include_str!("../../../keymaps/lily.toml");
    const KEY_COUNT: usize = 58;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    /// A keyboard on a desk: scan loop with a hand-driven clock
    struct Board {
        scan: ScanLoop<ManualClock, RecordingSink>,
    }

    impl Board {
        fn new() -> Self {
            let engine = Engine::new(EngineConfig::from_toml(LILY).unwrap()).unwrap();
            Self {
                scan: ScanLoop::new(engine, ManualClock::new(0), RecordingSink::new()),
            }
        }

        fn with_queue_capacity(capacity: usize) -> Self {
            let board = Self::new();
            Self {
                scan: board.scan.with_queue(EventQueue::with_capacity(capacity)),
            }
        }

        fn press(&mut self, time: Tick, pos: u16) {
            self.events(time, vec![KeyEvent::press(KeyId(pos), time)]);
        }

        fn release(&mut self, time: Tick, pos: u16) {
            self.events(time, vec![KeyEvent::release(KeyId(pos), time)]);
        }

        fn tap(&mut self, time: Tick, pos: u16) {
            self.press(time, pos);
            self.release(time + 20, pos);
        }

        /// Several transitions delivered in the same scan
        fn events(&mut self, time: Tick, events: Vec<KeyEvent>) {
            self.scan.clock_mut().set(time);
            self.scan.scan(events);
        }

        /// A scan period with no switch changes
        fn idle(&mut self, time: Tick) {
            self.events(time, Vec::new());
        }

        /// Reports sent since the last call
        fn reports(&mut self) -> Vec<HidReport> {
            std::mem::take(&mut self.scan.sink_mut().reports)
        }

        fn indicators(&mut self) -> Vec<Indicator> {
            std::mem::take(&mut self.scan.sink_mut().indicators)
        }
    }

    fn report(modifiers: Mods, keys: &[Key]) -> HidReport {
        HidReport {
            modifiers,
            keys: keys.iter().copied().collect(),
        }
    }

    fn empty() -> HidReport {
        report(Mods::NONE, &[])
    }

    // Lily58 positions
    const ESC_OR_CYCLE: u16 = 0;
    const NUM_1: u16 = 1;
    const Q: u16 = 13;
    const W: u16 = 14;
    const E: u16 = 15;
    const R: u16 = 16;
    const T: u16 = 17;
    const Y: u16 = 18;
    const U: u16 = 19;
    const HRM_S: u16 = 26;
    const HRM_F: u16 = 28;
    const H: u16 = 30;
    const OSM_MEH: u16 = 36;
    const Z: u16 = 37;
    const COPY_C: u16 = 39;
    const DOCSTRING_ON_LOWER: u16 = 44;
    const M: u16 = 45;
    const COMM: u16 = 46;
    const LOWER: u16 = 52;
    const RAISE: u16 = 55;

    // =========================================================================
    // Scenario: Plain typing
    // =========================================================================

    #[test]
    fn test_typing_a_word() {
        let mut board = Board::new();
        board.tap(0, H);
        board.tap(100, E);
        board.tap(200, Y);
        assert_eq!(
            board.reports(),
            vec![
                report(Mods::NONE, &[Key::H]),
                empty(),
                report(Mods::NONE, &[Key::E]),
                empty(),
                report(Mods::NONE, &[Key::Y]),
                empty(),
            ]
        );
        assert!(board.indicators().is_empty());
    }

    #[test]
    fn test_home_row_tap_types_letter_on_release() {
        let mut board = Board::new();
        board.press(0, HRM_F);
        assert!(board.reports().is_empty());
        board.release(100, HRM_F);
        assert_eq!(board.reports(), vec![report(Mods::NONE, &[Key::F]), empty()]);
    }

    // =========================================================================
    // Scenario: Home-row modifiers
    // =========================================================================

    #[test]
    fn test_home_row_mod_shortcut() {
        let mut board = Board::new();
        board.press(0, HRM_F);
        board.press(40, E);
        assert_eq!(
            board.reports(),
            vec![
                report(Mods::LGUI, &[]),
                report(Mods::LGUI, &[Key::E]),
            ]
        );
        board.release(60, E);
        board.release(80, HRM_F);
        assert_eq!(board.reports(), vec![report(Mods::LGUI, &[]), empty()]);
    }

    #[test]
    fn test_hold_resolves_between_scans() {
        let mut board = Board::new();
        board.press(0, HRM_F);
        board.idle(189);
        assert!(board.reports().is_empty());
        board.idle(190);
        assert_eq!(board.reports(), vec![report(Mods::LGUI, &[])]);
        board.release(300, HRM_F);
        assert_eq!(board.reports(), vec![empty()]);
    }

    #[test]
    fn test_oneshot_meh_on_next_key_only() {
        let mut board = Board::new();
        board.tap(0, OSM_MEH);
        let meh = Mods::LCTRL | Mods::LALT | Mods::LGUI;
        assert_eq!(board.indicators(), vec![Indicator::OneShot(meh)]);

        board.tap(100, Z);
        board.tap(200, Z);
        assert_eq!(
            board.reports(),
            vec![
                report(meh, &[Key::Z]),
                empty(),
                report(Mods::NONE, &[Key::Z]),
                empty(),
            ]
        );
    }

    // =========================================================================
    // Scenario: Combos
    // =========================================================================

    #[test]
    fn test_combo_bracket_under_held_ctrl() {
        let mut board = Board::new();
        board.press(0, HRM_S);
        board.idle(190);
        assert_eq!(board.reports(), vec![report(Mods::LCTRL, &[])]);

        board.press(300, M);
        assert!(board.reports().is_empty());
        board.press(305, COMM);
        assert_eq!(
            board.reports(),
            vec![report(Mods::LCTRL | Mods::LSHIFT, &[Key::LEFT_BRACE])]
        );

        board.release(400, M);
        assert!(board.reports().is_empty());
        board.release(410, COMM);
        assert_eq!(board.reports(), vec![report(Mods::LCTRL, &[])]);

        board.release(500, HRM_S);
        assert_eq!(board.reports(), vec![empty()]);
    }

    #[test]
    fn test_lone_combo_member_types_after_term() {
        let mut board = Board::new();
        board.press(0, M);
        assert!(board.reports().is_empty());
        board.idle(15);
        assert_eq!(board.reports(), vec![report(Mods::NONE, &[Key::M])]);
        board.release(40, M);
        assert_eq!(board.reports(), vec![empty()]);
    }

    // =========================================================================
    // Scenario: Host OS
    // =========================================================================

    #[test]
    fn test_cycle_os_then_copy() {
        let mut board = Board::new();
        board.press(0, RAISE);
        board.tap(10, ESC_OR_CYCLE);
        board.tap(40, ESC_OR_CYCLE);
        board.release(80, RAISE);
        assert_eq!(
            board.indicators(),
            vec![
                Indicator::LayerChanged {
                    layer: LayerId(2),
                    name: "raise".into()
                },
                Indicator::OsChanged {
                    os: HostOs::Mac,
                    color: Hsv::BLUE
                },
                Indicator::OsChanged {
                    os: HostOs::Windows,
                    color: Hsv::GREEN
                },
                Indicator::LayerChanged {
                    layer: LayerId(0),
                    name: "base".into()
                },
            ]
        );
        assert!(board.reports().is_empty());

        // holding the copy key past its doubled window sends the shortcut
        board.press(100, COPY_C);
        board.idle(479);
        assert!(board.reports().is_empty());
        board.idle(480);
        assert_eq!(
            board.reports(),
            vec![report(Mods::LCTRL, &[Key::C]), empty()]
        );
        board.release(500, COPY_C);
        assert!(board.reports().is_empty());
    }

    // =========================================================================
    // Scenario: Macros
    // =========================================================================

    #[test]
    fn test_macro_typed_as_reports() {
        let mut board = Board::new();
        board.press(0, LOWER);
        board.tap(10, DOCSTRING_ON_LOWER);
        board.release(50, LOWER);

        let quote = report(Mods::LSHIFT, &[Key::APOSTROPHE]);
        assert_eq!(
            board.reports(),
            vec![
                quote.clone(),
                empty(),
                quote.clone(),
                empty(),
                quote,
                empty(),
            ]
        );
        assert_eq!(board.indicators().len(), 2, "lower on, lower off");
    }

    // =========================================================================
    // Scenario: Rollover and queue pressure
    // =========================================================================

    #[test]
    fn test_seventh_key_is_dropped() {
        let mut board = Board::new();
        let chord = [Q, W, E, R, T, Y, NUM_1];
        board.events(0, chord.iter().map(|&p| KeyEvent::press(KeyId(p), 0)).collect());

        let reports = board.reports();
        assert_eq!(reports.len(), 6);
        assert_eq!(
            reports[5],
            report(
                Mods::NONE,
                &[Key::Q, Key::W, Key::E, Key::R, Key::T, Key::Y]
            )
        );
        assert!(board.scan.emitter().hid().rollover());

        board.release(10, Q);
        assert_eq!(
            board.reports(),
            vec![report(
                Mods::NONE,
                &[Key::W, Key::E, Key::R, Key::T, Key::Y]
            )]
        );
        assert!(!board.scan.emitter().hid().rollover());

        // the dropped key never reached the host, so its release is silent
        board.release(20, NUM_1);
        assert!(board.reports().is_empty());
    }

    #[test]
    fn test_queue_overrun_drops_open_chord() {
        let mut board = Board::with_queue_capacity(2);
        board.press(0, U);
        assert!(board.reports().is_empty());
        assert!(board.scan.engine().combo_matcher().is_buffering());
        assert_eq!(board.scan.engine().combo_matcher().buffered_len(), 1);

        board.events(
            5,
            vec![
                KeyEvent::press(KeyId(Q), 5),
                KeyEvent::press(KeyId(W), 5),
                KeyEvent::press(KeyId(E), 5),
            ],
        );
        assert_eq!(board.scan.overruns(), 1);
        assert_eq!(
            board.reports(),
            vec![
                report(Mods::NONE, &[Key::U]),
                report(Mods::NONE, &[Key::U, Key::Q]),
                report(Mods::NONE, &[Key::U, Key::Q, Key::W]),
                report(Mods::NONE, &[Key::U, Key::Q, Key::W, Key::E]),
            ]
        );
    }

    // =========================================================================
    // Scenario: Raw matrix snapshots
    // =========================================================================

    #[test]
    fn test_matrix_snapshots() {
        let mut board = Board::new();
        let mut switches = vec![false; KEY_COUNT];

        switches[H as usize] = true;
        board.scan.scan_matrix(&switches);
        assert_eq!(board.reports(), vec![report(Mods::NONE, &[Key::H])]);

        switches[H as usize] = false;
        board.scan.clock_mut().set(20);
        board.scan.scan_matrix(&switches);
        assert_eq!(board.reports(), vec![empty()]);

        // both combo members closing in one scan fire the chord
        switches[M as usize] = true;
        switches[COMM as usize] = true;
        board.scan.clock_mut().set(40);
        board.scan.scan_matrix(&switches);
        assert_eq!(
            board.reports(),
            vec![report(Mods::LSHIFT, &[Key::LEFT_BRACE])]
        );

        switches[M as usize] = false;
        switches[COMM as usize] = false;
        board.scan.clock_mut().set(60);
        board.scan.scan_matrix(&switches);
        assert_eq!(board.reports(), vec![empty()]);
    }
}

mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bulb_fade_engine::backend::{Backend, BackendInfo, CHANNEL_COUNT};
    use bulb_fade_engine::error::Error;
    use bulb_fade_engine::lightbulb::{
        Capability, EffectConfig, EffectType, LightStatus, Lightbulb, LightbulbConfig,
        PowerLimit, WorkMode,
    };
    use embassy_time::Instant;

    #[derive(Default)]
    struct Log {
        writes: Vec<(usize, u16)>,
        sleeps: Vec<bool>,
    }

    #[derive(Clone)]
    struct MockBackend {
        log: Rc<RefCell<Log>>,
        channel_count: u8,
        allow_all_output: bool,
    }

    impl MockBackend {
        fn rgb() -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            let backend = Self {
                log: log.clone(),
                channel_count: 3,
                allow_all_output: true,
            };
            (backend, log)
        }

        fn rgbcw(allow_all_output: bool) -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            let backend = Self {
                log: log.clone(),
                channel_count: 5,
                allow_all_output,
            };
            (backend, log)
        }
    }

    impl Backend for MockBackend {
        fn info(&self) -> BackendInfo {
            BackendInfo {
                name: "mock",
                channel_count: self.channel_count,
                grayscale_levels: 256,
                max_input_value: 255,
                allow_all_output: self.allow_all_output,
                atomic_group_write: false,
                hardware_fade: false,
            }
        }

        fn set_channel(&mut self, channel: usize, value: u16) -> Result<(), Error> {
            self.log.borrow_mut().writes.push((channel, value));
            Ok(())
        }

        fn set_shutdown(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn set_sleep(&mut self, enable: bool) -> Result<(), Error> {
            self.log.borrow_mut().sleeps.push(enable);
            Ok(())
        }
    }

    fn channel_writes(log: &Rc<RefCell<Log>>, channel: usize) -> Vec<u16> {
        log.borrow()
            .writes
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, v)| *v)
            .collect()
    }

    fn passthrough_power() -> PowerLimit {
        PowerLimit {
            color_max_value: 100,
            color_min_value: 0,
            white_max_brightness: 100,
            white_min_brightness: 0,
            color_max_power: 100,
            white_max_power: 200,
        }
    }

    fn no_fade_config() -> LightbulbConfig {
        LightbulbConfig {
            capability: Capability {
                fade_enabled: false,
                ..Capability::default()
            },
            power: passthrough_power(),
            ..LightbulbConfig::default()
        }
    }

    #[test]
    fn test_pure_red_passes_through_unchanged() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();

        bulb.set_hsv(0, 100, 100, Instant::from_millis(0)).unwrap();
        assert_eq!(channel_writes(&log, 0), vec![255]);
        assert_eq!(channel_writes(&log, 1), vec![0]);
        assert_eq!(channel_writes(&log, 2), vec![0]);
        assert!(bulb.get_switch());
    }

    #[test]
    fn test_red_to_green_fade_takes_ten_writes() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();

        bulb.set_hsv(0, 100, 100, Instant::from_millis(0)).unwrap();
        bulb.set_fades(true);
        bulb.set_fade_time(120);

        bulb.set_hsv(120, 100, 100, Instant::from_millis(0)).unwrap();
        for _ in 0..9 {
            bulb.tick();
        }

        // Skip the write from the initial red set.
        let green = &channel_writes(&log, 1)[1..];
        let red = &channel_writes(&log, 0)[1..];
        assert_eq!(green.len(), 10, "{green:?}");
        assert_eq!(red.len(), 10, "{red:?}");
        assert!(green[0] > 0 && green[0] < 255, "first step {}", green[0]);
        assert_eq!(*green.last().unwrap(), 255);
        assert_eq!(*red.last().unwrap(), 0);
        assert!(!bulb.is_fade_active());
    }

    #[test]
    fn test_mode_switch_masks_are_exclusive() {
        let (backend, log) = MockBackend::rgbcw(false);
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_hsv(0, 100, 100, now).unwrap();
        let color_writes = log.borrow().writes.len();

        bulb.set_cctb(50, 100, now).unwrap();
        // Mutually exclusive banks: the white write must not touch 0..=2.
        let writes = log.borrow().writes.clone();
        for (channel, _) in &writes[color_writes..] {
            assert!(*channel >= 3, "unexpected color write after mode switch");
        }
        assert_eq!(channel_writes(&log, 3), vec![255]);
        assert_eq!(channel_writes(&log, 4), vec![255]);
        assert_eq!(bulb.get_mode(), WorkMode::White);
    }

    #[test]
    fn test_mode_switch_fades_other_bank_out_when_allowed() {
        let (backend, log) = MockBackend::rgbcw(true);
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_hsv(0, 100, 100, now).unwrap();
        bulb.set_cctb(50, 100, now).unwrap();
        // Simultaneous banks: switching mode drives the color channels to
        // zero in the same group write.
        assert_eq!(channel_writes(&log, 0), vec![255, 0]);
    }

    #[test]
    fn test_switch_off_zeroes_active_mode() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_hsv(0, 100, 100, now).unwrap();
        bulb.set_switch(false, now).unwrap();
        assert_eq!(channel_writes(&log, 0), vec![255, 0]);
        assert!(!bulb.get_switch());

        // Turning back on replays the stored color.
        bulb.set_switch(true, now).unwrap();
        assert_eq!(channel_writes(&log, 0), vec![255, 0, 255]);
    }

    #[test]
    fn test_switch_on_substitutes_full_brightness_for_zero() {
        let (backend, log) = MockBackend::rgb();
        let mut config = no_fade_config();
        config.capability.auto_on = false;
        let mut bulb = Lightbulb::new(backend, config, Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_hsv(0, 100, 0, now).unwrap();
        assert!(log.borrow().writes.is_empty());

        bulb.set_switch(true, now).unwrap();
        assert_eq!(bulb.get_value().unwrap(), 100);
        assert_eq!(channel_writes(&log, 0), vec![255]);
    }

    #[test]
    fn test_auto_on_disabled_saves_without_writing() {
        let (backend, log) = MockBackend::rgb();
        let mut config = no_fade_config();
        config.capability.auto_on = false;
        let mut bulb = Lightbulb::new(backend, config, Instant::from_millis(0)).unwrap();

        bulb.set_hsv(180, 50, 80, Instant::from_millis(0)).unwrap();
        assert!(log.borrow().writes.is_empty());
        assert!(!bulb.get_switch());
        assert_eq!(bulb.get_hue().unwrap(), 180);
        assert_eq!(bulb.get_value().unwrap(), 80);
    }

    #[test]
    fn test_sync_brightness_mirrors_across_modes() {
        let (backend, _log) = MockBackend::rgbcw(true);
        let mut config = no_fade_config();
        config.capability.sync_change_brightness_value = true;
        let mut bulb = Lightbulb::new(backend, config, Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_hsv(0, 100, 70, now).unwrap();
        assert_eq!(bulb.get_brightness().unwrap(), 70);

        bulb.set_cctb(50, 40, now).unwrap();
        assert_eq!(bulb.get_value().unwrap(), 40);
    }

    #[test]
    fn test_kelvin_input_converts_to_percentage() {
        let (backend, _log) = MockBackend::rgbcw(true);
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_cctb(4600, 100, now).unwrap();
        assert_eq!(bulb.get_cct_percentage().unwrap(), 50);
        assert_eq!(bulb.get_cct_kelvin().unwrap(), 4600);

        assert_eq!(bulb.set_cctb(9000, 100, now), Err(Error::InvalidArgument));
        assert_eq!(bulb.set_cct_kelvin(1000, now), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_white_calls_rejected_on_rgb_only_hardware() {
        let (backend, _log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        assert_eq!(bulb.set_cctb(50, 100, now), Err(Error::InvalidState));
        assert_eq!(bulb.get_brightness(), Err(Error::InvalidState));
    }

    #[test]
    fn test_inverted_power_limits_are_rejected_at_init() {
        let (backend, _log) = MockBackend::rgb();
        let mut config = no_fade_config();
        config.power.color_min_value = 80;
        config.power.color_max_value = 20;
        assert!(matches!(
            Lightbulb::new(backend, config, Instant::from_millis(0)),
            Err(Error::InvalidArgument)
        ));

        let (backend, _log) = MockBackend::rgbcw(true);
        let mut config = no_fade_config();
        config.power.white_min_brightness = 50;
        config.power.white_max_brightness = 10;
        assert!(matches!(
            Lightbulb::new(backend, config, Instant::from_millis(0)),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn test_out_of_range_inputs_leave_status_untouched() {
        let (backend, _log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        assert_eq!(bulb.set_hsv(361, 0, 0, now), Err(Error::InvalidArgument));
        assert_eq!(bulb.set_hsv(0, 101, 0, now), Err(Error::InvalidArgument));
        assert_eq!(bulb.set_hsv(0, 0, 101, now), Err(Error::InvalidArgument));
        assert_eq!(bulb.get_hue().unwrap(), 0);
    }

    static STORAGE_FIRES: AtomicUsize = AtomicUsize::new(0);

    fn count_storage(_status: &LightStatus) {
        STORAGE_FIRES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_storage_debounce_coalesces_rapid_changes() {
        let (backend, _log) = MockBackend::rgb();
        let mut config = no_fade_config();
        config.capability.storage_enabled = true;
        config.capability.storage_delay_ms = 0;
        config.status_callback = Some(count_storage);
        let mut bulb = Lightbulb::new(backend, config, Instant::from_millis(0)).unwrap();

        // fade_ms clamps to at least 100 ms, so the debounce period is
        // max(fade, storage delay) + 1000.
        bulb.set_hsv(0, 100, 100, Instant::from_millis(0)).unwrap();
        bulb.set_hsv(10, 100, 100, Instant::from_millis(500)).unwrap();

        assert!(bulb.poll(Instant::from_millis(1000)).is_none());
        // The second call pushed the deadline out past the first one.
        assert!(bulb.poll(Instant::from_millis(2000)).is_none());

        let snapshot = bulb.poll(Instant::from_millis(2500)).unwrap();
        assert_eq!(snapshot.hue, 10);
        assert_eq!(STORAGE_FIRES.load(Ordering::SeqCst), 1);

        // One-shot: no repeat fire.
        assert!(bulb.poll(Instant::from_millis(5000)).is_none());
    }

    #[test]
    fn test_low_power_engages_after_quiet_period() {
        let (backend, log) = MockBackend::rgb();
        let mut config = no_fade_config();
        config.capability.low_power_enabled = true;
        let mut bulb = Lightbulb::new(backend, config, Instant::from_millis(0)).unwrap();

        bulb.set_hsv(0, 100, 100, Instant::from_millis(0)).unwrap();
        // Activity wakes the chip.
        assert_eq!(log.borrow().sleeps, vec![false]);

        bulb.set_switch(false, Instant::from_millis(100)).unwrap();
        assert!(bulb.next_deadline().is_some());

        bulb.poll(Instant::from_millis(500));
        assert_eq!(log.borrow().sleeps, vec![false]);
        bulb.poll(Instant::from_millis(10_000));
        assert_eq!(log.borrow().sleeps, vec![false, true]);
    }

    static EFFECT_FIRES: AtomicUsize = AtomicUsize::new(0);

    fn count_effect() {
        EFFECT_FIRES.fetch_add(1, Ordering::SeqCst);
    }

    fn breathe_red(interrupt_forbidden: bool, total_ms: u32) -> EffectConfig {
        EffectConfig {
            effect_type: EffectType::Breathe,
            mode: WorkMode::Color,
            red: 255,
            green: 0,
            blue: 0,
            cct: 0,
            min_brightness: 0,
            max_brightness: 100,
            cycle_ms: 240,
            total_ms,
            interrupt_forbidden,
            user_cb: None,
        }
    }

    #[test]
    fn test_protected_effect_turns_set_into_save_only() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.effect_start(&breathe_red(true, 0), now).unwrap();
        assert!(bulb.is_fade_active());
        let writes_during_effect = log.borrow().writes.len();

        bulb.set_hsv(120, 100, 100, now).unwrap();
        assert_eq!(bulb.get_hue().unwrap(), 120);
        assert_eq!(log.borrow().writes.len(), writes_during_effect);
        assert!(bulb.is_fade_active());

        bulb.effect_stop().unwrap();
        assert_eq!(bulb.engine().fade_state(0).cycle, 0);
    }

    #[test]
    fn test_interruptible_effect_yields_to_set_calls() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.effect_start(&breathe_red(false, 0), now).unwrap();
        let writes_during_effect = log.borrow().writes.len();

        bulb.set_hsv(120, 100, 100, now).unwrap();
        assert!(log.borrow().writes.len() > writes_during_effect);
        assert_eq!(*channel_writes(&log, 1).last().unwrap(), 255);
    }

    #[test]
    fn test_effect_auto_stops_and_reports() {
        let (backend, _log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();

        let mut config = breathe_red(false, 500);
        config.user_cb = Some(count_effect);
        bulb.effect_start(&config, Instant::from_millis(0)).unwrap();

        bulb.poll(Instant::from_millis(100));
        assert_eq!(EFFECT_FIRES.load(Ordering::SeqCst), 0);

        bulb.poll(Instant::from_millis(600));
        assert_eq!(EFFECT_FIRES.load(Ordering::SeqCst), 1);
        assert_eq!(bulb.engine().fade_state(0).cycle, 0);
    }

    #[test]
    fn test_effect_stop_and_restore_replays_status() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();
        let now = Instant::from_millis(0);

        bulb.set_hsv(0, 100, 100, now).unwrap();
        bulb.effect_start(&breathe_red(false, 0), now).unwrap();

        bulb.effect_stop_and_restore(now).unwrap();
        assert_eq!(*channel_writes(&log, 0).last().unwrap(), 255);
        assert!(bulb.get_switch());
    }

    #[test]
    fn test_update_status_with_trigger_renders() {
        let (backend, log) = MockBackend::rgb();
        let mut bulb = Lightbulb::new(backend, no_fade_config(), Instant::from_millis(0)).unwrap();

        let status = LightStatus {
            mode: WorkMode::Color,
            on: true,
            hue: 0,
            saturation: 100,
            value: 100,
            cct_percentage: 50,
            brightness: 100,
        };
        bulb.update_status(status, true, Instant::from_millis(0)).unwrap();
        assert_eq!(channel_writes(&log, 0), vec![255]);
    }
}

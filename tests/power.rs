mod tests {
    use bulb_fade_engine::backend::{Backend, BackendInfo};
    use bulb_fade_engine::color::Rgb;
    use bulb_fade_engine::error::Error;
    use bulb_fade_engine::fade::FadeEngine;
    use bulb_fade_engine::gamma::GammaConfig;
    use bulb_fade_engine::power::{apply_value_limit, cct_to_cold_warm, color_power_limit};

    struct NullBackend;

    impl Backend for NullBackend {
        fn info(&self) -> BackendInfo {
            BackendInfo {
                name: "null",
                channel_count: 3,
                grayscale_levels: 256,
                max_input_value: 255,
                allow_all_output: true,
                atomic_group_write: false,
                hardware_fade: false,
            }
        }

        fn set_channel(&mut self, _channel: usize, _value: u16) -> Result<(), Error> {
            Ok(())
        }

        fn set_shutdown(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn test_value_limit_zero_stays_zero() {
        assert_eq!(apply_value_limit(0, 10, 100), 0);
    }

    #[test]
    fn test_value_limit_affine_range() {
        assert_eq!(apply_value_limit(100, 10, 100), 100);
        assert_eq!(apply_value_limit(1, 10, 100), 10);
        assert_eq!(apply_value_limit(50, 10, 100), 55);

        // Strictly increasing over the non-zero domain.
        let mut last = 0;
        for v in 1..=100 {
            let mapped = apply_value_limit(v, 10, 100);
            assert!((10..=100).contains(&mapped));
            assert!(mapped >= last);
            last = mapped;
        }
    }

    #[test]
    fn test_color_power_limit_pure_color_passes_through() {
        let engine = FadeEngine::new(NullBackend, &GammaConfig::default());
        let red = Rgb { r: 255, g: 0, b: 0 };
        // A single-channel color reaches full output even at a 100% budget.
        assert_eq!(color_power_limit(red, engine.gamma(), 255, 100), (255, 0, 0));
        assert_eq!(color_power_limit(red, engine.gamma(), 255, 300), (255, 0, 0));
    }

    #[test]
    fn test_color_power_limit_caps_white_mix() {
        let engine = FadeEngine::new(NullBackend, &GammaConfig::default());
        let white = Rgb {
            r: 255,
            g: 255,
            b: 255,
        };
        // Equal channels: baseline share is 1/3, so a 100% budget caps each
        // channel at a third of full range.
        let (r, g, b) = color_power_limit(white, engine.gamma(), 255, 100);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r.abs_diff(85) <= 1, "capped to {r}");

        // A 300% budget lets all three dies run at full output.
        assert_eq!(color_power_limit(white, engine.gamma(), 255, 300), (255, 255, 255));
    }

    #[test]
    fn test_color_power_limit_black_is_black() {
        let engine = FadeEngine::new(NullBackend, &GammaConfig::default());
        let black = Rgb { r: 0, g: 0, b: 0 };
        assert_eq!(color_power_limit(black, engine.gamma(), 255, 300), (0, 0, 0));
    }

    #[test]
    fn test_cct_mix_at_100_percent_power() {
        // Both dies share one die's power budget.
        let (cold, warm) = cct_to_cold_warm(50, 100, 100);
        assert_eq!((cold, warm), (127, 127));
    }

    #[test]
    fn test_cct_mix_at_200_percent_power() {
        assert_eq!(cct_to_cold_warm(50, 100, 200), (255, 255));
        assert_eq!(cct_to_cold_warm(0, 100, 200), (0, 255));
        assert_eq!(cct_to_cold_warm(100, 100, 200), (255, 0));
        // Asymmetric mix: the dominant die saturates, the other follows
        // the requested ratio.
        assert_eq!(cct_to_cold_warm(20, 100, 200), (63, 255));
    }

    #[test]
    fn test_cct_mix_scales_with_brightness() {
        assert_eq!(cct_to_cold_warm(50, 50, 200), (127, 127));
        assert_eq!(cct_to_cold_warm(50, 0, 200), (0, 0));
    }
}

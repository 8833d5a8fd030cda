//! Lightbulb facade: user-facing color/white API over the fade engine.
//!
//! Translates HSV (color mode) and CCT+brightness (white mode) into raw
//! channel group writes, tracks the externally visible [`LightStatus`],
//! and keeps the soft-timer deadlines (low power, storage debounce, effect
//! auto-stop) that [`Lightbulb::poll`] services.

#[cfg(feature = "esp32-log")]
use esp_println::println;

use embassy_time::{Duration, Instant};

use crate::backend::{
    Backend, CHANNEL_COUNT, COLOR_CHANNEL_MASK, ChannelId, WHITE_CHANNEL_MASK,
};
use crate::color::{KelvinRange, hsv2rgb, kelvin_to_percentage, percentage_to_kelvin};
use crate::error::Error;
use crate::fade::FadeEngine;
use crate::power::{apply_value_limit, cct_to_cold_warm, color_power_limit};

const MIN_FADE_MS: u16 = 100;
const MAX_FADE_MS: u16 = 3000;

/// Which channel bank the bulb is currently rendering with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkMode {
    Color,
    White,
}

/// Externally visible bulb state.
///
/// Stored values are the caller's pre-limit inputs, so power limits can be
/// reconfigured later without recalibrating persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightStatus {
    pub mode: WorkMode,
    pub on: bool,
    /// Color hue, `0..=360`.
    pub hue: u16,
    /// Color saturation, `0..=100`.
    pub saturation: u8,
    /// Color brightness, `0..=100`.
    pub value: u8,
    /// White point, `0..=100` across the kelvin span.
    pub cct_percentage: u8,
    /// White brightness, `0..=100`.
    pub brightness: u8,
}

impl Default for LightStatus {
    fn default() -> Self {
        Self {
            mode: WorkMode::Color,
            on: false,
            hue: 0,
            saturation: 0,
            value: 100,
            cct_percentage: 50,
            brightness: 100,
        }
    }
}

impl LightStatus {
    pub(crate) fn is_valid(&self) -> bool {
        self.hue <= 360
            && self.saturation <= 100
            && self.value <= 100
            && self.cct_percentage <= 100
            && self.brightness <= 100
    }
}

/// Output power limits, all configurable per product.
#[derive(Debug, Clone, Copy)]
pub struct PowerLimit {
    /// Color-mode brightness ceiling, `0..=100`.
    pub color_max_value: u8,
    /// Color-mode brightness floor for non-zero inputs, `0..=100`.
    pub color_min_value: u8,
    /// White-mode brightness ceiling, `0..=100`.
    pub white_max_brightness: u8,
    /// White-mode brightness floor for non-zero inputs, `0..=100`.
    pub white_min_brightness: u8,
    /// Combined RGB power budget in percent of one channel's full range.
    /// Values above 100 let multi-die packages exceed single-channel power.
    pub color_max_power: u16,
    /// Combined cold+warm power budget, percent, `100..=200` meaningful.
    pub white_max_power: u16,
}

impl Default for PowerLimit {
    fn default() -> Self {
        Self {
            color_max_value: 100,
            color_min_value: 10,
            white_max_brightness: 100,
            white_min_brightness: 10,
            color_max_power: 300,
            white_max_power: 200,
        }
    }
}

impl PowerLimit {
    pub(crate) fn is_valid(&self) -> bool {
        self.color_min_value <= self.color_max_value
            && self.color_max_value <= 100
            && self.white_min_brightness <= self.white_max_brightness
            && self.white_max_brightness <= 100
    }
}

/// Feature switches fixed at construction (except where setters exist).
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    /// Smooth transitions on every change.
    pub fade_enabled: bool,
    /// Fade duration in milliseconds, clamped to `100..=3000` at init.
    pub fade_ms: u16,
    /// Drive the R/G/B channels.
    pub enable_color: bool,
    /// Drive the cold/warm channels.
    pub enable_white: bool,
    /// White is mixed in software from cold+warm dies. When false the
    /// hardware has dedicated CCT/brightness control lines.
    pub mixed_white: bool,
    /// Persist status after a debounce delay.
    pub storage_enabled: bool,
    /// Extra debounce on top of the fade time, milliseconds.
    pub storage_delay_ms: u16,
    /// Put the backend in standby after a quiet period.
    pub low_power_enabled: bool,
    /// Mirror `value` and `brightness` into each other across mode
    /// switches, so the bulb keeps one visual brightness concept.
    pub sync_change_brightness_value: bool,
    /// Setting a color or white point while off implicitly turns on.
    pub auto_on: bool,
}

impl Default for Capability {
    fn default() -> Self {
        Self {
            fade_enabled: true,
            fade_ms: 800,
            enable_color: true,
            enable_white: true,
            mixed_white: true,
            storage_enabled: false,
            storage_delay_ms: 0,
            low_power_enabled: false,
            sync_change_brightness_value: false,
            auto_on: true,
        }
    }
}

/// Invoked when the debounced status persistence fires.
pub type StatusCallback = fn(&LightStatus);
/// Invoked when a time-limited effect auto-stops.
pub type EffectCallback = fn();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectType {
    /// Smooth sweep between the endpoints.
    Breathe,
    /// Hard toggle between the endpoints.
    Blink,
}

/// A breathing or blinking pattern request.
#[derive(Debug, Clone, Copy)]
pub struct EffectConfig {
    pub effect_type: EffectType,
    pub mode: WorkMode,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// White point; values above 100 are interpreted as kelvin.
    pub cct: u16,
    /// Envelope floor in percent of the configured color/white point.
    pub min_brightness: u8,
    /// Envelope ceiling in percent.
    pub max_brightness: u8,
    /// Full breathe/blink period, milliseconds.
    pub cycle_ms: u16,
    /// Auto-stop after this long; 0 runs until stopped.
    pub total_ms: u32,
    /// Reject ordinary set calls while the effect runs instead of letting
    /// them cancel it.
    pub interrupt_forbidden: bool,
    /// Called after an auto-stop.
    pub user_cb: Option<EffectCallback>,
}

/// Pin assignments for backends with per-channel outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoPins {
    pub red: Option<u8>,
    pub green: Option<u8>,
    pub blue: Option<u8>,
    pub cold: Option<u8>,
    pub warm: Option<u8>,
}

/// Everything [`Lightbulb::new`] needs.
pub struct LightbulbConfig {
    pub capability: Capability,
    pub gamma: crate::gamma::GammaConfig,
    pub power: PowerLimit,
    pub kelvin: KelvinRange,
    pub init_status: LightStatus,
    pub status_callback: Option<StatusCallback>,
    pub io: Option<IoPins>,
}

impl Default for LightbulbConfig {
    fn default() -> Self {
        Self {
            capability: Capability::default(),
            gamma: crate::gamma::GammaConfig::default(),
            power: PowerLimit::default(),
            kelvin: KelvinRange::default(),
            init_status: LightStatus::default(),
            status_callback: None,
            io: None,
        }
    }
}

/// One lighting fixture. Owns the fade engine and, through it, the
/// backend; one instance per fixture.
pub struct Lightbulb<B: Backend> {
    engine: FadeEngine<B>,
    status: LightStatus,
    cap: Capability,
    power: PowerLimit,
    kelvin: KelvinRange,
    status_cb: Option<StatusCallback>,
    /// Shared period of the low-power and storage timers.
    timer_period: Duration,
    power_deadline: Option<Instant>,
    storage_deadline: Option<Instant>,
    effect_deadline: Option<Instant>,
    effect_cb: Option<EffectCallback>,
    effect_running: bool,
    effect_interrupt_forbidden: bool,
}

impl<B: Backend> Lightbulb<B> {
    /// Construct the bulb and apply the initial status.
    pub fn new(backend: B, config: LightbulbConfig, now: Instant) -> Result<Self, Error> {
        if !config.init_status.is_valid() || !config.power.is_valid() {
            return Err(Error::InvalidArgument);
        }

        let mut cap = config.capability;
        cap.fade_ms = cap.fade_ms.clamp(MIN_FADE_MS, MAX_FADE_MS);

        let engine = FadeEngine::new(backend, &config.gamma);
        let info = *engine.info();
        if cap.enable_white && info.channel_count < 5 {
            #[cfg(feature = "esp32-log")]
            println!(
                "{} exposes {} channels, white mode disabled",
                info.name, info.channel_count
            );
            cap.enable_white = false;
        }
        if !cap.enable_color && !cap.enable_white {
            return Err(Error::InvalidArgument);
        }

        let timer_period =
            Duration::from_millis(u64::from(cap.fade_ms.max(cap.storage_delay_ms)) + 1000);

        let mut bulb = Self {
            engine,
            status: config.init_status,
            cap,
            power: config.power,
            kelvin: config.kelvin,
            status_cb: config.status_callback,
            timer_period,
            power_deadline: None,
            storage_deadline: None,
            effect_deadline: None,
            effect_cb: None,
            effect_running: false,
            effect_interrupt_forbidden: false,
        };

        if let Some(io) = config.io {
            bulb.register_io(&io)?;
        }

        if bulb.status.on {
            bulb.set_switch(true, now)?;
        }
        Ok(bulb)
    }

    fn register_io(&mut self, io: &IoPins) -> Result<(), Error> {
        let pins = [
            (ChannelId::Red, io.red),
            (ChannelId::Green, io.green),
            (ChannelId::Blue, io.blue),
            (ChannelId::ColdCct, io.cold),
            (ChannelId::WarmBrightness, io.warm),
        ];
        for (channel, pin) in pins {
            if let Some(pin) = pin {
                self.engine.register_channel(channel.index(), pin)?;
            }
        }
        Ok(())
    }

    /// Set the full color point. `hue` in `0..=360`, `saturation` and
    /// `value` in `0..=100`.
    pub fn set_hsv(
        &mut self,
        hue: u16,
        saturation: u8,
        value: u8,
        now: Instant,
    ) -> Result<(), Error> {
        if hue > 360 || saturation > 100 || value > 100 {
            return Err(Error::InvalidArgument);
        }
        if !self.cap.enable_color {
            return Err(Error::InvalidState);
        }

        self.rearm_storage(now);

        if self.try_interrupt_effect() && (self.status.on || self.cap.auto_on) {
            self.wake_and_rearm_power(now)?;

            let limited =
                apply_value_limit(value, self.power.color_min_value, self.power.color_max_value);
            let rgb = hsv2rgb(hue, saturation, limited)?;
            let (r, g, b) = color_power_limit(
                rgb,
                self.engine.gamma(),
                self.engine.info().max_input_value,
                self.power.color_max_power,
            );

            let mut values = [0u16; CHANNEL_COUNT];
            values[ChannelId::Red.index()] = r;
            values[ChannelId::Green.index()] = g;
            values[ChannelId::Blue.index()] = b;
            self.engine
                .set_channel_group(&values, self.channel_mask(WorkMode::Color), self.fade_time())?;

            self.status.on = true;
        }

        self.status.mode = WorkMode::Color;
        self.status.hue = hue;
        self.status.saturation = saturation;
        self.status.value = value;
        if self.cap.sync_change_brightness_value && self.cap.enable_white {
            self.status.brightness = value;
        }
        Ok(())
    }

    /// Set the white point as a percentage and keep the current brightness.
    pub fn set_cct_percentage(&mut self, cct: u8, now: Instant) -> Result<(), Error> {
        let brightness = self.status.brightness;
        self.set_white(cct, brightness, now)
    }

    /// Set the white point in kelvin and keep the current brightness.
    pub fn set_cct_kelvin(&mut self, kelvin: u16, now: Instant) -> Result<(), Error> {
        if kelvin < self.kelvin.min || kelvin > self.kelvin.max {
            return Err(Error::InvalidArgument);
        }
        let cct = kelvin_to_percentage(kelvin, self.kelvin);
        let brightness = self.status.brightness;
        self.set_white(cct, brightness, now)
    }

    /// Set white-mode brightness and keep the current white point.
    pub fn set_brightness(&mut self, brightness: u8, now: Instant) -> Result<(), Error> {
        let cct = self.status.cct_percentage;
        self.set_white(cct, brightness, now)
    }

    /// Combined white point + brightness convenience wrapper.
    ///
    /// `cct` values above 100 are interpreted as kelvin and converted.
    /// Prefer [`Lightbulb::set_cct_percentage`] or
    /// [`Lightbulb::set_cct_kelvin`] where the unit is known statically.
    pub fn set_cctb(&mut self, cct: u16, brightness: u8, now: Instant) -> Result<(), Error> {
        let cct = if cct > 100 {
            if cct < self.kelvin.min || cct > self.kelvin.max {
                return Err(Error::InvalidArgument);
            }
            kelvin_to_percentage(cct, self.kelvin)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let cct = cct as u8;
            cct
        };
        self.set_white(cct, brightness, now)
    }

    fn set_white(&mut self, cct: u8, brightness: u8, now: Instant) -> Result<(), Error> {
        if cct > 100 || brightness > 100 {
            return Err(Error::InvalidArgument);
        }
        if !self.cap.enable_white {
            return Err(Error::InvalidState);
        }

        self.rearm_storage(now);

        if self.try_interrupt_effect() && (self.status.on || self.cap.auto_on) {
            self.wake_and_rearm_power(now)?;

            let limited = apply_value_limit(
                brightness,
                self.power.white_min_brightness,
                self.power.white_max_brightness,
            );

            let mut values = [0u16; CHANNEL_COUNT];
            if self.cap.mixed_white {
                let (cold, warm) = cct_to_cold_warm(cct, limited, self.power.white_max_power);
                values[ChannelId::ColdCct.index()] = cold;
                values[ChannelId::WarmBrightness.index()] = warm;
            } else {
                values[ChannelId::ColdCct.index()] = u16::from(cct) * 255 / 100;
                values[ChannelId::WarmBrightness.index()] = u16::from(limited) * 255 / 100;
            }
            self.engine
                .set_channel_group(&values, self.channel_mask(WorkMode::White), self.fade_time())?;

            self.status.on = true;
        }

        self.status.mode = WorkMode::White;
        self.status.cct_percentage = cct;
        self.status.brightness = brightness;
        if self.cap.sync_change_brightness_value && self.cap.enable_color {
            self.status.value = brightness;
        }
        Ok(())
    }

    /// Change only the hue, keeping saturation and value.
    pub fn set_hue(&mut self, hue: u16, now: Instant) -> Result<(), Error> {
        let (saturation, value) = (self.status.saturation, self.status.value);
        self.set_hsv(hue, saturation, value, now)
    }

    /// Change only the saturation.
    pub fn set_saturation(&mut self, saturation: u8, now: Instant) -> Result<(), Error> {
        let (hue, value) = (self.status.hue, self.status.value);
        self.set_hsv(hue, saturation, value, now)
    }

    /// Change only the color-mode brightness.
    pub fn set_value(&mut self, value: u8, now: Instant) -> Result<(), Error> {
        let (hue, saturation) = (self.status.hue, self.status.saturation);
        self.set_hsv(hue, saturation, value, now)
    }

    /// Turn the bulb on or off.
    ///
    /// Turning on replays the stored color or white point, substituting
    /// full brightness if the stored one is zero, so "on" is never a
    /// no-op. Turning off fades the active mode's channels to zero and
    /// arms the low-power timer.
    pub fn set_switch(&mut self, on: bool, now: Instant) -> Result<(), Error> {
        if on {
            match self.status.mode {
                WorkMode::Color => {
                    self.status.on = true;
                    if self.status.value == 0 {
                        self.status.value = 100;
                    }
                    let (hue, saturation, value) =
                        (self.status.hue, self.status.saturation, self.status.value);
                    self.set_hsv(hue, saturation, value, now)
                }
                WorkMode::White => {
                    self.status.on = true;
                    if self.status.brightness == 0 {
                        self.status.brightness = 100;
                    }
                    let (cct, brightness) = (self.status.cct_percentage, self.status.brightness);
                    self.set_white(cct, brightness, now)
                }
            }
        } else {
            if !self.try_interrupt_effect() {
                // The running effect owns the output; record the intent
                // and report the conflict.
                self.status.on = false;
                return Err(Error::InvalidState);
            }
            self.status.on = false;

            if self.cap.low_power_enabled {
                self.power_deadline = Some(now + self.timer_period);
            }

            let zeros = [0u16; CHANNEL_COUNT];
            match self.status.mode {
                WorkMode::Color if self.cap.enable_color => {
                    self.engine.set_channel_group(
                        &zeros,
                        self.channel_mask(WorkMode::Color),
                        self.fade_time(),
                    )?;
                }
                WorkMode::White if self.cap.enable_white => {
                    if self.cap.mixed_white {
                        self.engine.set_channel_group(
                            &zeros,
                            self.channel_mask(WorkMode::White),
                            self.fade_time(),
                        )?;
                    } else {
                        // Hardware-CCT chips keep their CCT line; only the
                        // brightness line goes to zero.
                        self.engine.set_channel(
                            ChannelId::WarmBrightness.index(),
                            0,
                            self.fade_time(),
                        )?;
                    }
                }
                _ => {}
            }
            Ok(())
        }
    }

    /// Start a breathing or blinking pattern.
    pub fn effect_start(&mut self, config: &EffectConfig, now: Instant) -> Result<(), Error> {
        if config.min_brightness > 100 || config.max_brightness > 100 {
            return Err(Error::InvalidArgument);
        }
        let fade = config.effect_type == EffectType::Breathe;

        // An effect is deliberate activity; standby must not engage while
        // it runs.
        self.power_deadline = None;
        self.effect_deadline = None;

        match config.mode {
            WorkMode::Color => {
                if !self.cap.enable_color {
                    return Err(Error::InvalidState);
                }
                let envelope = |brightness: u8| -> [u16; CHANNEL_COUNT] {
                    let scale = |component: u8| -> u8 {
                        #[allow(clippy::cast_possible_truncation)]
                        let scaled = (u16::from(component) * u16::from(brightness) / 100) as u8;
                        scaled
                    };
                    let (r, g, b) = self.engine.gamma().rgb(
                        scale(config.red),
                        scale(config.green),
                        scale(config.blue),
                    );
                    let mut values = [0u16; CHANNEL_COUNT];
                    values[ChannelId::Red.index()] = r;
                    values[ChannelId::Green.index()] = g;
                    values[ChannelId::Blue.index()] = b;
                    values
                };
                let min = envelope(config.min_brightness);
                let max = envelope(config.max_brightness);
                self.engine.start_channel_group_action(
                    &min,
                    &max,
                    self.channel_mask(WorkMode::Color),
                    config.cycle_ms,
                    fade,
                )?;
            }
            WorkMode::White => {
                if !self.cap.enable_white {
                    return Err(Error::InvalidState);
                }
                let cct = if config.cct > 100 {
                    if config.cct < self.kelvin.min || config.cct > self.kelvin.max {
                        return Err(Error::InvalidArgument);
                    }
                    kelvin_to_percentage(config.cct, self.kelvin)
                } else {
                    #[allow(clippy::cast_possible_truncation)]
                    let cct = config.cct as u8;
                    cct
                };

                if self.cap.mixed_white {
                    let mut min = [0u16; CHANNEL_COUNT];
                    let mut max = [0u16; CHANNEL_COUNT];
                    let (cold, warm) =
                        cct_to_cold_warm(cct, config.min_brightness, self.power.white_max_power);
                    min[ChannelId::ColdCct.index()] = cold;
                    min[ChannelId::WarmBrightness.index()] = warm;
                    let (cold, warm) =
                        cct_to_cold_warm(cct, config.max_brightness, self.power.white_max_power);
                    max[ChannelId::ColdCct.index()] = cold;
                    max[ChannelId::WarmBrightness.index()] = warm;
                    self.engine.start_channel_group_action(
                        &min,
                        &max,
                        self.channel_mask(WorkMode::White),
                        config.cycle_ms,
                        fade,
                    )?;
                } else {
                    self.engine.set_channel(
                        ChannelId::ColdCct.index(),
                        u16::from(cct) * 255 / 100,
                        0,
                    )?;
                    self.engine.start_channel_action(
                        ChannelId::WarmBrightness.index(),
                        u16::from(config.min_brightness) * 255 / 100,
                        u16::from(config.max_brightness) * 255 / 100,
                        config.cycle_ms,
                        fade,
                    )?;
                }
            }
        }

        self.effect_running = true;
        self.effect_interrupt_forbidden = config.interrupt_forbidden;
        self.effect_cb = config.user_cb;
        if config.total_ms > 0 {
            self.effect_deadline = Some(now + Duration::from_millis(u64::from(config.total_ms)));
        }
        Ok(())
    }

    /// Stop a running effect, leaving the output wherever the pattern was.
    pub fn effect_stop(&mut self) -> Result<(), Error> {
        let mut mask = 0;
        if self.cap.enable_color {
            mask |= COLOR_CHANNEL_MASK;
        }
        if self.cap.enable_white {
            mask |= WHITE_CHANNEL_MASK;
        }
        self.engine.stop_channel_action(mask)?;
        self.effect_running = false;
        self.effect_interrupt_forbidden = false;
        self.effect_deadline = None;
        self.effect_cb = None;
        Ok(())
    }

    /// Stop a running effect and restore the last steady-state output.
    pub fn effect_stop_and_restore(&mut self, now: Instant) -> Result<(), Error> {
        self.effect_running = false;
        self.effect_interrupt_forbidden = false;
        self.effect_deadline = None;
        self.effect_cb = None;
        let on = self.status.on;
        self.set_switch(on, now)
    }

    /// Replace the whole status; with `trigger` set, immediately render it.
    pub fn update_status(
        &mut self,
        status: LightStatus,
        trigger: bool,
        now: Instant,
    ) -> Result<(), Error> {
        if !status.is_valid() {
            return Err(Error::InvalidArgument);
        }
        self.status = status;
        if trigger {
            let on = self.status.on;
            return self.set_switch(on, now);
        }
        Ok(())
    }

    /// Service expired soft-timer deadlines.
    ///
    /// Returns `Some(status)` when the storage debounce has elapsed and the
    /// caller should persist the snapshot.
    pub fn poll(&mut self, now: Instant) -> Option<LightStatus> {
        if let Some(deadline) = self.power_deadline {
            if now >= deadline {
                self.power_deadline = None;
                if self.engine.sleep_control(true).is_err() {
                    #[cfg(feature = "esp32-log")]
                    println!("standby request failed");
                }
            }
        }

        if let Some(deadline) = self.effect_deadline {
            if now >= deadline {
                let user_cb = self.effect_cb;
                let _ = self.effect_stop();
                if let Some(cb) = user_cb {
                    cb();
                }
            }
        }

        if let Some(deadline) = self.storage_deadline {
            if now >= deadline {
                self.storage_deadline = None;
                if let Some(cb) = self.status_cb {
                    cb(&self.status);
                }
                return Some(self.status);
            }
        }
        None
    }

    /// Earliest pending soft-timer deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut next: Option<Instant> = None;
        for deadline in [self.power_deadline, self.storage_deadline, self.effect_deadline]
            .into_iter()
            .flatten()
        {
            next = Some(next.map_or(deadline, |n| n.min(deadline)));
        }
        next
    }

    /// Advance the fade engine by one tick period.
    pub fn tick(&mut self) {
        self.engine.tick();
    }

    /// Whether any channel still has pending fade work.
    pub fn is_fade_active(&self) -> bool {
        self.engine.is_active()
    }

    pub fn status(&self) -> &LightStatus {
        &self.status
    }

    pub fn get_switch(&self) -> bool {
        self.status.on
    }

    pub fn get_mode(&self) -> WorkMode {
        self.status.mode
    }

    pub fn get_hue(&self) -> Result<u16, Error> {
        if !self.cap.enable_color {
            return Err(Error::InvalidState);
        }
        Ok(self.status.hue)
    }

    pub fn get_saturation(&self) -> Result<u8, Error> {
        if !self.cap.enable_color {
            return Err(Error::InvalidState);
        }
        Ok(self.status.saturation)
    }

    pub fn get_value(&self) -> Result<u8, Error> {
        if !self.cap.enable_color {
            return Err(Error::InvalidState);
        }
        Ok(self.status.value)
    }

    pub fn get_cct_percentage(&self) -> Result<u8, Error> {
        if !self.cap.enable_white {
            return Err(Error::InvalidState);
        }
        Ok(self.status.cct_percentage)
    }

    pub fn get_cct_kelvin(&self) -> Result<u16, Error> {
        if !self.cap.enable_white {
            return Err(Error::InvalidState);
        }
        Ok(percentage_to_kelvin(self.status.cct_percentage, self.kelvin))
    }

    pub fn get_brightness(&self) -> Result<u8, Error> {
        if !self.cap.enable_white {
            return Err(Error::InvalidState);
        }
        Ok(self.status.brightness)
    }

    pub fn fades_enabled(&self) -> bool {
        self.cap.fade_enabled
    }

    /// Enable or disable fading for subsequent changes.
    pub fn set_fades(&mut self, enable: bool) {
        self.cap.fade_enabled = enable;
    }

    /// Change the fade duration for subsequent changes.
    pub fn set_fade_time(&mut self, fade_ms: u16) {
        self.cap.fade_ms = fade_ms.clamp(MIN_FADE_MS, MAX_FADE_MS);
    }

    /// Enable or disable debounced status persistence.
    pub fn set_storage(&mut self, enable: bool) {
        self.cap.storage_enabled = enable;
        if !enable {
            self.storage_deadline = None;
        }
    }

    /// Stop everything and shut the backend down, releasing it.
    pub fn deinit(self) -> Result<B, Error> {
        self.engine.shutdown()
    }

    pub fn engine(&self) -> &FadeEngine<B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FadeEngine<B> {
        &mut self.engine
    }

    fn fade_time(&self) -> u16 {
        if self.cap.fade_enabled { self.cap.fade_ms } else { 0 }
    }

    /// Group-write mask for a mode. When the backend can drive both banks
    /// at once, the other mode's channels are included so the rebuild
    /// fades them to zero; mutually exclusive banks get only the
    /// requested mode's channels.
    fn channel_mask(&self, mode: WorkMode) -> u8 {
        let allow_all = self.engine.info().allow_all_output;
        match mode {
            WorkMode::Color => {
                let mut mask = COLOR_CHANNEL_MASK;
                if self.cap.enable_white && allow_all {
                    mask |= WHITE_CHANNEL_MASK;
                }
                mask
            }
            WorkMode::White => {
                let mut mask = WHITE_CHANNEL_MASK;
                if self.cap.enable_color && allow_all {
                    mask |= COLOR_CHANNEL_MASK;
                }
                mask
            }
        }
    }

    /// Effect interrupt gate for ordinary set calls. Returns whether the
    /// hardware write may proceed; a protected effect turns the call into
    /// a status-only save.
    fn try_interrupt_effect(&mut self) -> bool {
        if !self.effect_running {
            return true;
        }
        if self.effect_interrupt_forbidden {
            #[cfg(feature = "esp32-log")]
            println!("effect is protected, saving the change without output");
            return false;
        }
        #[cfg(feature = "esp32-log")]
        println!("effect stopped by a light-setting call");
        self.effect_running = false;
        self.effect_deadline = None;
        self.effect_cb = None;
        true
    }

    fn rearm_storage(&mut self, now: Instant) {
        if self.cap.storage_enabled {
            self.storage_deadline = Some(now + self.timer_period);
        }
    }

    /// Leave standby and push the quiet-period deadline out.
    fn wake_and_rearm_power(&mut self, now: Instant) -> Result<(), Error> {
        if self.cap.low_power_enabled {
            self.engine.sleep_control(false)?;
            self.power_deadline = Some(now + self.timer_period);
        }
        Ok(())
    }
}

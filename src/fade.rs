//! Fade engine: non-blocking, cancellable transitions over a backend.
//!
//! Each channel carries a small interpolation state advanced once per
//! [`TICK_MS`] by [`FadeEngine::tick`]. Public mutators recompute that
//! state, run one tick synchronously so the first visible change is not
//! delayed by a tick period, and leave the engine flagged active while any
//! channel still has work. Starting a new fade or action on a channel
//! unconditionally supersedes whatever was in flight on it.

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::backend::{Backend, BackendInfo, CHANNEL_COUNT, channel_bit};
use crate::error::Error;
use crate::gamma::{GammaConfig, GammaGroup, TABLE_SIZE};
use embassy_time::Duration;

/// Fade advancement period.
pub const TICK_MS: u64 = 12;

/// [`TICK_MS`] as a `Duration`, for schedulers.
pub const TICK_DURATION: Duration = Duration::from_millis(TICK_MS);

/// Consecutive failed backend writes tolerated before all fades are
/// aborted and the engine stops driving the bus.
pub const ERROR_COUNT_THRESHOLD: u8 = 6;

/// Per-channel interpolation state.
///
/// `cur`, `fin` and `min` define the working range; `step` carries the
/// direction in its sign and zero means snap writes. A channel is idle
/// when both `remaining` and `cycle` are zero. `cycle > 0` marks a
/// self-repeating action that reverses at each endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct FadeState {
    pub cur: f32,
    pub fin: f32,
    pub step: f32,
    pub remaining: u32,
    pub cycle: u32,
    pub min: f32,
}

impl FadeState {
    pub const fn is_idle(&self) -> bool {
        self.remaining == 0 && self.cycle == 0
    }
}

/// Software fade engine over one owned backend.
pub struct FadeEngine<B: Backend> {
    backend: B,
    info: BackendInfo,
    gamma: GammaGroup,
    fades: [FadeState; CHANNEL_COUNT],
    active: bool,
    err_count: u8,
    use_hw_fade: bool,
}

impl<B: Backend> FadeEngine<B> {
    /// Build the engine around a backend, computing the gamma/balance
    /// tables for its grayscale resolution.
    pub fn new(backend: B, gamma: &GammaConfig) -> Self {
        let info = backend.info();
        let tables = GammaGroup::new(gamma, info.grayscale_levels, info.max_input_value);
        Self {
            backend,
            info,
            gamma: tables,
            fades: [FadeState::default(); CHANNEL_COUNT],
            active: false,
            err_count: 0,
            use_hw_fade: false,
        }
    }

    /// Same as [`FadeEngine::new`] but with externally calibrated
    /// 256-entry gamma tables.
    pub fn with_custom_tables(
        backend: B,
        tables: &[[u16; TABLE_SIZE]; 3],
        gamma: &GammaConfig,
    ) -> Self {
        let info = backend.info();
        let group = GammaGroup::with_custom_tables(
            tables,
            info.grayscale_levels,
            info.max_input_value,
            gamma.balance,
        );
        Self {
            backend,
            info,
            gamma: group,
            fades: [FadeState::default(); CHANNEL_COUNT],
            active: false,
            err_count: 0,
            use_hw_fade: false,
        }
    }

    pub fn info(&self) -> &BackendInfo {
        &self.info
    }

    pub fn gamma(&self) -> &GammaGroup {
        &self.gamma
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether any channel still has pending tick work.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Snapshot of one channel's interpolation state.
    pub fn fade_state(&self, channel: usize) -> FadeState {
        self.fades[channel]
    }

    /// Route per-tick writes through the backend's hardware fade.
    ///
    /// Hard error on backends without the capability: this is an explicit
    /// action request, not a capability probe.
    pub fn enable_hw_fade(&mut self) -> Result<(), Error> {
        if !self.info.hardware_fade {
            return Err(Error::NotSupported);
        }
        self.use_hw_fade = true;
        Ok(())
    }

    /// Bind a channel slot to a physical pin or chip output.
    pub fn register_channel(&mut self, channel: usize, pin: u8) -> Result<(), Error> {
        if channel >= usize::from(self.info.channel_count) {
            return Err(Error::InvalidArgument);
        }
        self.backend.register_channel(channel, pin)
    }

    /// Fade one channel to `value` over `fade_ms`.
    pub fn set_channel(&mut self, channel: usize, value: u16, fade_ms: u16) -> Result<(), Error> {
        if channel >= usize::from(self.info.channel_count) {
            return Err(Error::InvalidArgument);
        }

        let mut data = self.fades[channel];
        data.fin = self.final_processing(channel, value);
        data.remaining = ticks_for(fade_ms, data.cur, data.fin);
        data.step = step_for(data.cur, data.fin, data.remaining);
        data.cycle = 0;
        data.min = 0.0;
        self.fades[channel] = data;

        self.tick();
        Ok(())
    }

    /// Fade every channel selected by `channel_mask` to its slot in
    /// `values`, as one batch.
    ///
    /// Unselected channels are reset to idle; the most recent group write
    /// defines the complete driven set, which is what makes mutually
    /// exclusive color/white output banks work.
    pub fn set_channel_group(
        &mut self,
        values: &[u16; CHANNEL_COUNT],
        channel_mask: u8,
        fade_ms: u16,
    ) -> Result<(), Error> {
        let mut group = [FadeState::default(); CHANNEL_COUNT];
        for channel in 0..usize::from(self.info.channel_count) {
            if channel_mask & channel_bit(channel) == 0 {
                continue;
            }
            let mut data = self.fades[channel];
            data.fin = self.final_processing(channel, values[channel]);
            data.remaining = ticks_for(fade_ms, data.cur, data.fin);
            data.step = step_for(data.cur, data.fin, data.remaining);
            data.cycle = 0;
            data.min = 0.0;
            group[channel] = data;
        }
        self.fades = group;

        self.tick();
        Ok(())
    }

    /// Start a self-repeating back-and-forth action on one channel:
    /// breathing when `fade` is set, blinking otherwise.
    pub fn start_channel_action(
        &mut self,
        channel: usize,
        value_min: u16,
        value_max: u16,
        period_ms: u16,
        fade: bool,
    ) -> Result<(), Error> {
        if channel >= usize::from(self.info.channel_count) {
            return Err(Error::InvalidArgument);
        }
        check_period(period_ms)?;

        let data = self.action_state(channel, value_min, value_max, period_ms, fade);
        self.fades[channel] = data;

        self.tick();
        Ok(())
    }

    /// Group form of [`FadeEngine::start_channel_action`]. Unselected
    /// channels are reset to idle, like a group write.
    pub fn start_channel_group_action(
        &mut self,
        value_min: &[u16; CHANNEL_COUNT],
        value_max: &[u16; CHANNEL_COUNT],
        channel_mask: u8,
        period_ms: u16,
        fade: bool,
    ) -> Result<(), Error> {
        check_period(period_ms)?;

        let mut group = [FadeState::default(); CHANNEL_COUNT];
        for channel in 0..usize::from(self.info.channel_count) {
            if channel_mask & channel_bit(channel) == 0 {
                continue;
            }
            group[channel] =
                self.action_state(channel, value_min[channel], value_max[channel], period_ms, fade);
        }
        self.fades = group;

        self.tick();
        Ok(())
    }

    /// Stop cyclic actions on the selected channels.
    ///
    /// Only `cycle` is cleared: any in-flight sweep finishes its countdown
    /// and the last written value becomes the new steady state.
    pub fn stop_channel_action(&mut self, channel_mask: u8) -> Result<(), Error> {
        for channel in 0..usize::from(self.info.channel_count) {
            if channel_mask & channel_bit(channel) == 0 {
                continue;
            }
            self.fades[channel].cycle = 0;
        }

        self.tick();
        Ok(())
    }

    /// Advance every channel by one tick period and write the results.
    ///
    /// Safe to call when idle; the engine deactivates itself once all
    /// channels are idle and nothing was written.
    #[allow(clippy::float_cmp)]
    pub fn tick(&mut self) {
        let count = usize::from(self.info.channel_count);
        let mut wrote_any = false;

        for channel in 0..count {
            let mut data = self.fades[channel];
            let mut write = false;

            if data.remaining > 0 {
                data.remaining -= 1;

                if data.step != 0.0 {
                    data.cur += data.step;

                    // Cyclic mode re-clamps every tick; plain fades have an
                    // exact step count and need no clamp.
                    if data.cycle > 0 {
                        if data.cur > data.fin {
                            data.cur = data.fin;
                        }
                        if data.cur < data.min {
                            data.cur = data.min;
                        }
                    }

                    // Snap on the last step so float accumulation never
                    // leaves residual drift.
                    if data.remaining == 0 {
                        data.cur = if data.cycle > 0 && data.step < 0.0 {
                            data.min
                        } else {
                            data.fin
                        };
                    }
                }
                write = true;
            } else if data.cycle > 0 {
                // Sweep finished: reverse for the next half-period.
                data.remaining = data.cycle - 1;
                if data.step != 0.0 {
                    data.step = -data.step;
                    data.cur += data.step;
                } else {
                    data.cur = if data.cur == data.fin { data.min } else { data.fin };
                }
                write = true;
            }

            self.fades[channel] = data;

            if write {
                wrote_any = true;
                let result = self.write_channel(channel);
                if self.note_write(result) {
                    return;
                }
            }
        }

        if self.info.atomic_group_write && wrote_any {
            let result = self.write_group();
            if self.note_write(result) {
                return;
            }
        }

        self.active = self.any_pending();
    }

    /// Forward sleep/standby control to the backend.
    ///
    /// Unsupported backends are a logged no-op: sleep is a capability
    /// forwarding path, not an action request.
    pub fn sleep_control(&mut self, enable: bool) -> Result<(), Error> {
        match self.backend.set_sleep(enable) {
            Err(Error::NotSupported) => {
                #[cfg(feature = "esp32-log")]
                println!("{} does not support sleep control", self.info.name);
                Ok(())
            }
            other => other,
        }
    }

    /// Stop all fades, drive every output to zero and release the backend.
    pub fn shutdown(mut self) -> Result<B, Error> {
        self.force_stop_all();
        self.active = false;
        self.backend.set_shutdown()?;
        Ok(self.backend)
    }

    fn action_state(
        &self,
        channel: usize,
        value_min: u16,
        value_max: u16,
        period_ms: u16,
        fade: bool,
    ) -> FadeState {
        let mut data = self.fades[channel];
        data.min = self.final_processing(channel, value_min);
        data.fin = self.final_processing(channel, value_max);

        // Clamp the starting point to just below the top endpoint. If a
        // channel started exactly at `fin`, a non-fading multi-channel
        // action would force it to decrement while others increment,
        // desynchronizing the group.
        data.cur = data.cur.min(data.fin - 0.1).max(data.min);

        #[allow(clippy::cast_possible_truncation)]
        let half_period = (u64::from(period_ms) / 2 / TICK_MS) as u32;
        data.cycle = half_period;
        data.remaining = if fade { half_period } else { 0 };
        #[allow(clippy::cast_precision_loss)]
        let step = if fade && data.remaining > 0 {
            (data.fin - data.min) / data.remaining as f32
        } else {
            0.0
        };
        data.step = step;
        data
    }

    /// Map a logical 0-255 value onto the backend range: white channels go
    /// through the linear table, RGB channels are balance-scaled. Gamma
    /// itself is applied upstream, in the conversion layer.
    fn final_processing(&self, channel: usize, value: u16) -> f32 {
        if channel >= 3 {
            let index = if usize::from(value) >= TABLE_SIZE {
                #[cfg(feature = "esp32-log")]
                println!("white channel value {} truncated to 255", value);
                255
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let v = value as u8;
                v
            };
            return f32::from(self.gamma.linear(index));
        }
        self.gamma.balance(channel) * f32::from(value)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_channel(&mut self, channel: usize) -> Result<(), Error> {
        // Atomic-group backends get one combined write after the loop.
        if self.info.atomic_group_write {
            return Ok(());
        }
        let value = self.fades[channel].cur as u16;
        if self.use_hw_fade {
            self.backend.set_hw_fade(channel, value, (TICK_MS - 2) as u16)
        } else {
            self.backend.set_channel(channel, value)
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_group(&mut self) -> Result<(), Error> {
        let mut values = [0u16; CHANNEL_COUNT];
        for (value, fade) in values.iter_mut().zip(&self.fades) {
            *value = fade.cur as u16;
        }
        self.backend.set_channel_group(&values)
    }

    /// Track consecutive write failures. Returns true when the fail-safe
    /// fired and the tick pass must abort.
    fn note_write(&mut self, result: Result<(), Error>) -> bool {
        if result.is_ok() {
            self.err_count = 0;
            return false;
        }
        self.err_count += 1;
        if self.err_count < ERROR_COUNT_THRESHOLD {
            return false;
        }
        // Hardware is likely unresponsive: stop driving the bus. The next
        // set_channel call starts fresh.
        self.err_count = 0;
        self.force_stop_all();
        self.active = false;
        #[cfg(feature = "esp32-log")]
        println!("hardware may be unresponsive, fade terminated");
        true
    }

    fn force_stop_all(&mut self) {
        for fade in &mut self.fades {
            fade.remaining = 0;
            fade.cycle = 0;
        }
    }

    fn any_pending(&self) -> bool {
        self.fades.iter().any(|f| !f.is_idle())
    }
}

/// Tick count for a fade: at least one, exactly one when there is nothing
/// to interpolate.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn ticks_for(fade_ms: u16, cur: f32, fin: f32) -> u32 {
    if cur == fin {
        return 1;
    }
    if u64::from(fade_ms) < TICK_MS {
        1
    } else {
        (u64::from(fade_ms) / TICK_MS) as u32
    }
}

/// Signed per-tick delta moving `cur` toward `fin` in `ticks` steps.
#[allow(clippy::cast_precision_loss)]
fn step_for(cur: f32, fin: f32, ticks: u32) -> f32 {
    (fin - cur) / ticks as f32
}

/// Action periods must cover at least two ticks per half-sweep; zero is
/// accepted and produces an immediate idle (used to park a channel).
fn check_period(period_ms: u16) -> Result<(), Error> {
    if period_ms == 0 || u64::from(period_ms) > TICK_MS * 2 {
        Ok(())
    } else {
        Err(Error::InvalidArgument)
    }
}

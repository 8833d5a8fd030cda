//! Output backend contract.
//!
//! Every physical driver (PWM peripheral, I2C dimming chip, addressable
//! strip) plugs into the fade engine through the [`Backend`] trait. The
//! engine is generic over this trait and owns exactly one backend for its
//! whole lifetime, so "already initialized" and "not initialized" states
//! cannot be observed.

use crate::error::Error;

/// Number of logical output channels the engine manages.
///
/// Channel roles are fixed by position; backends with fewer physical
/// channels simply report a smaller `channel_count` and the upper slots
/// stay idle.
pub const CHANNEL_COUNT: usize = 5;

/// Logical channel roles, by slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelId {
    Red = 0,
    Green = 1,
    Blue = 2,
    /// Cold white, or the CCT control line on hardware-CCT chips.
    ColdCct = 3,
    /// Warm white, or the brightness control line on hardware-CCT chips.
    WarmBrightness = 4,
}

impl ChannelId {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Mask selecting the R/G/B channels.
pub const COLOR_CHANNEL_MASK: u8 = 0b0000_0111;
/// Mask selecting the cold/warm (or CCT/brightness) channels.
pub const WHITE_CHANNEL_MASK: u8 = 0b0001_1000;

/// Bit for a single channel slot.
pub const fn channel_bit(channel: usize) -> u8 {
    1 << channel
}

/// Static capabilities reported by a backend.
#[derive(Debug, Clone, Copy)]
pub struct BackendInfo {
    pub name: &'static str,
    /// Populated channel slots, 3 (RGB only) or 5.
    pub channel_count: u8,
    /// Grayscale resolution (256, 1024 or 4096 depending on bit depth).
    pub grayscale_levels: u32,
    /// Largest raw value the hardware accepts (255, 1023, 4095).
    pub max_input_value: u16,
    /// Whether color and white channels may be driven at the same time.
    pub allow_all_output: bool,
    /// The backend only accepts all-channels-in-one-transaction writes.
    /// The engine then issues one [`Backend::set_channel_group`] call per
    /// tick instead of per-channel writes.
    pub atomic_group_write: bool,
    /// The backend can interpolate between values itself
    /// ([`Backend::set_hw_fade`]).
    pub hardware_fade: bool,
}

/// Capability set a physical output driver must expose.
///
/// Only [`Backend::info`] and [`Backend::set_shutdown`] are mandatory.
/// A backend implements either `set_channel` (per-channel writes) or
/// `set_channel_group` (single-transaction writes, flagged through
/// [`BackendInfo::atomic_group_write`]).
pub trait Backend {
    fn info(&self) -> BackendInfo;

    /// Write one channel's raw value.
    fn set_channel(&mut self, channel: usize, value: u16) -> Result<(), Error> {
        let _ = (channel, value);
        Err(Error::NotSupported)
    }

    /// Write all channels in one transaction.
    fn set_channel_group(&mut self, values: &[u16; CHANNEL_COUNT]) -> Result<(), Error> {
        let _ = values;
        Err(Error::NotSupported)
    }

    /// Bind a channel slot to a physical pin or chip output.
    ///
    /// Single-bus backends (addressable strips) have nothing to bind and
    /// keep the default no-op.
    fn register_channel(&mut self, channel: usize, pin: u8) -> Result<(), Error> {
        let _ = (channel, pin);
        Ok(())
    }

    /// Hardware-interpolated write, bypassing the software fade step.
    fn set_hw_fade(&mut self, channel: usize, value: u16, fade_ms: u16) -> Result<(), Error> {
        let _ = (channel, value, fade_ms);
        Err(Error::NotSupported)
    }

    /// Drive every output to zero.
    fn set_shutdown(&mut self) -> Result<(), Error>;

    /// Enter or leave the chip's standby mode.
    fn set_sleep(&mut self, enable: bool) -> Result<(), Error> {
        let _ = enable;
        Err(Error::NotSupported)
    }
}

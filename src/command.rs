//! Bounded command queue decoupling callers from the tick loop.
//!
//! Any context (other tasks, interrupt handlers, radio callbacks) enqueues
//! [`LightCommand`]s through a [`CommandSender`]; the tick loop drains them
//! with a [`CommandReceiver`] and applies them to the [`Lightbulb`] it
//! owns. Mutation therefore happens from exactly one place and never races
//! a running fade.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::backend::Backend;
use crate::error::Error;
use crate::lightbulb::{EffectConfig, LightStatus, Lightbulb};
use embassy_time::Instant;

/// Error returned when trying to enqueue into a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrySendError<T>(pub T);

/// Error returned when draining an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryReceiveError;

/// A state change request for the lightbulb.
#[derive(Debug, Clone, Copy)]
pub enum LightCommand {
    /// Full color in HSV (hue 0-360, saturation/value 0-100).
    Hsv { hue: u16, saturation: u8, value: u8 },
    /// White point as a percentage of the configured kelvin span.
    CctPercentage(u8),
    /// White point in kelvin.
    CctKelvin(u16),
    /// White point and brightness together; values above 100 are kelvin.
    Cctb { cct: u16, brightness: u8 },
    Hue(u16),
    Saturation(u8),
    /// Color-mode brightness.
    Value(u8),
    /// White-mode brightness.
    Brightness(u8),
    Switch(bool),
    /// Enable or disable fading for subsequent changes.
    Fades(bool),
    /// Fade duration for subsequent changes, milliseconds.
    FadeTime(u16),
    /// Enable or disable debounced status persistence.
    Storage(bool),
    EffectStart(EffectConfig),
    /// Stop a running effect, keeping the output where the effect left it.
    EffectStop,
    /// Stop a running effect and restore the pre-effect status.
    EffectStopAndRestore,
    /// Replace the whole status, rendering it when `trigger` is set.
    UpdateStatus { status: LightStatus, trigger: bool },
}

impl LightCommand {
    /// Apply this command to a lightbulb.
    pub fn apply<B: Backend>(self, bulb: &mut Lightbulb<B>, now: Instant) -> Result<(), Error> {
        match self {
            Self::Hsv { hue, saturation, value } => bulb.set_hsv(hue, saturation, value, now),
            Self::CctPercentage(cct) => bulb.set_cct_percentage(cct, now),
            Self::CctKelvin(kelvin) => bulb.set_cct_kelvin(kelvin, now),
            Self::Cctb { cct, brightness } => bulb.set_cctb(cct, brightness, now),
            Self::Hue(hue) => bulb.set_hue(hue, now),
            Self::Saturation(saturation) => bulb.set_saturation(saturation, now),
            Self::Value(value) => bulb.set_value(value, now),
            Self::Brightness(brightness) => bulb.set_brightness(brightness, now),
            Self::Switch(on) => bulb.set_switch(on, now),
            Self::Fades(enable) => {
                bulb.set_fades(enable);
                Ok(())
            }
            Self::FadeTime(fade_ms) => {
                bulb.set_fade_time(fade_ms);
                Ok(())
            }
            Self::Storage(enable) => {
                bulb.set_storage(enable);
                Ok(())
            }
            Self::EffectStart(config) => bulb.effect_start(&config, now),
            Self::EffectStop => bulb.effect_stop(),
            Self::EffectStopAndRestore => bulb.effect_stop_and_restore(now),
            Self::UpdateStatus { status, trigger } => bulb.update_status(status, trigger, now),
        }
    }
}

/// Bounded, interrupt-safe command queue.
///
/// Backed by a fixed-size `heapless::Deque` behind a critical section, so
/// it is usable from interrupt context and needs no allocator. Multiple
/// senders can share one queue.
pub struct CommandQueue<const SIZE: usize> {
    inner: Mutex<RefCell<Deque<LightCommand, SIZE>>>,
}

impl<const SIZE: usize> CommandQueue<SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Get a sender handle for this queue.
    pub const fn sender(&self) -> CommandSender<'_, SIZE> {
        CommandSender { queue: self }
    }

    /// Get a receiver handle for this queue.
    ///
    /// Intended for the single tick loop; multiple receivers would compete
    /// for commands.
    pub const fn receiver(&self) -> CommandReceiver<'_, SIZE> {
        CommandReceiver { queue: self }
    }

    /// Try to enqueue a command.
    ///
    /// Returns `Err(TrySendError(command))` when the queue is full; the
    /// command is never silently dropped.
    pub fn try_send(&self, command: LightCommand) -> Result<(), TrySendError<LightCommand>> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.push_back(command).map_err(TrySendError)
        })
    }

    /// Try to dequeue the oldest command.
    pub fn try_receive(&self) -> Result<LightCommand, TryReceiveError> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.pop_front().ok_or(TryReceiveError)
        })
    }
}

impl<const SIZE: usize> Default for CommandQueue<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable sender handle for a [`CommandQueue`].
#[derive(Clone, Copy)]
pub struct CommandSender<'a, const SIZE: usize> {
    queue: &'a CommandQueue<SIZE>,
}

impl<const SIZE: usize> CommandSender<'_, SIZE> {
    pub fn try_send(&self, command: LightCommand) -> Result<(), TrySendError<LightCommand>> {
        self.queue.try_send(command)
    }
}

/// Receiver handle for a [`CommandQueue`].
#[derive(Clone, Copy)]
pub struct CommandReceiver<'a, const SIZE: usize> {
    queue: &'a CommandQueue<SIZE>,
}

impl<const SIZE: usize> CommandReceiver<'_, SIZE> {
    pub fn try_receive(&self) -> Result<LightCommand, TryReceiveError> {
        self.queue.try_receive()
    }
}

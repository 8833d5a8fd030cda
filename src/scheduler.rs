//! Tick loop driver.
//!
//! Owns the [`Lightbulb`] and pumps it: drains the command queue, services
//! soft-timer deadlines, advances fades at the fixed tick period, and
//! persists status snapshots when the debounce elapses. Pacing is portable
//! and synchronous; the caller supplies `now` and sleeps between calls, so
//! the same loop runs on a bare-metal task or in a host test.

use embassy_time::{Duration, Instant};

use crate::backend::Backend;
use crate::command::CommandReceiver;
use crate::fade::{TICK_DURATION, TICK_MS};
use crate::lightbulb::Lightbulb;
use crate::storage::StatusStore;

/// Drift ceiling before tick timing resets (2 tick periods).
///
/// Falling behind further than this skips the backlog instead of bursting
/// catch-up ticks, which would make fades visibly jump.
pub const MAX_DRIFT: Duration = Duration::from_millis(2 * TICK_MS);

/// Result of one scheduler pass.
#[derive(Debug, Clone, Copy)]
pub struct TickResult {
    /// The deadline for the next pass.
    pub next_deadline: Instant,
    /// How long to wait until the next pass (zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Synchronous tick loop around one lightbulb.
///
/// # Usage
///
/// ```ignore
/// let mut scheduler = TickScheduler::new(bulb, queue.receiver(), store);
///
/// loop {
///     let result = scheduler.tick(Instant::now());
///     // platform-specific sleep
///     sleep_ms(result.sleep_duration.as_millis());
/// }
/// ```
pub struct TickScheduler<'a, B: Backend, S: StatusStore, const QUEUE_SIZE: usize> {
    bulb: Lightbulb<B>,
    commands: CommandReceiver<'a, QUEUE_SIZE>,
    store: S,
    next_tick: Instant,
}

impl<'a, B: Backend, S: StatusStore, const QUEUE_SIZE: usize>
    TickScheduler<'a, B, S, QUEUE_SIZE>
{
    pub fn new(bulb: Lightbulb<B>, commands: CommandReceiver<'a, QUEUE_SIZE>, store: S) -> Self {
        Self {
            bulb,
            commands,
            store,
            next_tick: Instant::from_millis(0),
        }
    }

    /// Run one scheduler pass and return timing information.
    ///
    /// 1. Applies drift correction if the loop has fallen too far behind.
    /// 2. Drains and applies all queued commands.
    /// 3. Services expired soft-timer deadlines, persisting the status
    ///    snapshot when the storage debounce fires.
    /// 4. Advances fades if the tick deadline has arrived.
    ///
    /// The caller is responsible for waiting until `next_deadline` before
    /// calling `tick` again.
    pub fn tick(&mut self, now: Instant) -> TickResult {
        if now > self.next_tick + MAX_DRIFT {
            self.next_tick = now;
        }

        // Command errors are caller mistakes (out-of-range values, modes
        // the hardware lacks); the loop itself keeps running.
        while let Ok(command) = self.commands.try_receive() {
            let _ = command.apply(&mut self.bulb, now);
        }

        if let Some(status) = self.bulb.poll(now) {
            let _ = self.store.save(&status);
        }

        if now >= self.next_tick {
            self.bulb.tick();
            self.next_tick += TICK_DURATION;
        }

        let sleep_duration = if self.next_tick > now {
            self.next_tick - now
        } else {
            Duration::from_millis(0)
        };

        // A pending soft-timer deadline may be closer than the next tick.
        let next_deadline = match self.bulb.next_deadline() {
            Some(deadline) => deadline.min(self.next_tick),
            None => self.next_tick,
        };
        let sleep_duration = if next_deadline > now {
            sleep_duration.min(next_deadline - now)
        } else {
            Duration::from_millis(0)
        };

        TickResult {
            next_deadline,
            sleep_duration,
        }
    }

    pub fn bulb(&self) -> &Lightbulb<B> {
        &self.bulb
    }

    pub fn bulb_mut(&mut self) -> &mut Lightbulb<B> {
        &mut self.bulb
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear the loop down, shutting the bulb's backend off.
    pub fn into_parts(self) -> (Lightbulb<B>, S) {
        (self.bulb, self.store)
    }
}

//! Tick-driven flush countdown.
//!
//! A flush request arms a countdown of `delay_ticks` hardware ticks; the
//! tick that brings it to zero fires exactly one rotation. A new request
//! while armed restarts the countdown (requests coalesce, last one wins).

use std::sync::atomic::{AtomicU32, Ordering};

pub struct TickScheduler {
    delay_ticks: u32,
    countdown: AtomicU32,
}

impl TickScheduler {
    pub fn new(delay_ticks: u32) -> Self {
        Self {
            delay_ticks,
            countdown: AtomicU32::new(0),
        }
    }

    pub fn delay_ticks(&self) -> u32 {
        self.delay_ticks
    }

    /// Arm the countdown. Returns `true` when the flush must happen right now
    /// (zero delay), in which case nothing is armed.
    pub fn request_flush(&self) -> bool {
        if self.delay_ticks == 0 {
            return true;
        }
        self.countdown.store(self.delay_ticks, Ordering::Release);
        false
    }

    /// Count one hardware tick. Returns `true` on the tick that expires the countdown.
    pub fn on_tick(&self) -> bool {
        self.countdown
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |ticks| {
                ticks.checked_sub(1)
            })
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }

    pub fn is_armed(&self) -> bool {
        self.ticks_remaining() > 0
    }

    pub fn ticks_remaining(&self) -> u32 {
        self.countdown.load(Ordering::Acquire)
    }

    pub fn disarm(&self) {
        self.countdown.store(0, Ordering::Release);
    }
}

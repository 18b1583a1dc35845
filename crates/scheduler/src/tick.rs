use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Host scheduling quantum. Always non-negative.
pub type Tick = u64;

/// Wall-clock length of one host tick, in milliseconds.
pub const DEFAULT_TICK_MILLIS: u64 = 50;

/// Unit attached to a delay or period passed to a [`Worker`](crate::Worker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit to whole milliseconds.
    ///
    /// Sub-millisecond remainders are truncated; overflow saturates.
    pub fn to_millis(self, amount: u64) -> u64 {
        match self {
            TimeUnit::Nanoseconds => amount / 1_000_000,
            TimeUnit::Microseconds => amount / 1_000,
            TimeUnit::Milliseconds => amount,
            TimeUnit::Seconds => amount.saturating_mul(1_000),
            TimeUnit::Minutes => amount.saturating_mul(60_000),
            TimeUnit::Hours => amount.saturating_mul(3_600_000),
            TimeUnit::Days => amount.saturating_mul(86_400_000),
        }
    }
}

const DEFAULT_TICK: NonZeroU64 = match NonZeroU64::new(DEFAULT_TICK_MILLIS) {
    Some(tick) => tick,
    None => panic!("DEFAULT_TICK_MILLIS must be positive"),
};

/// Converts wall-clock delays into host ticks, rounding to the nearest tick.
///
/// A zero or sub-tick delay converts to tick 0, which the host interprets as
/// "next tick boundary", not "immediately".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConverter {
    tick_millis: NonZeroU64,
}

impl TickConverter {
    /// Create a converter for a host whose tick lasts `tick_millis` milliseconds.
    pub fn new(tick_millis: u64) -> Result<Self, SchedulerError> {
        NonZeroU64::new(tick_millis)
            .map(|tick_millis| Self { tick_millis })
            .ok_or(SchedulerError::InvalidTickLength(tick_millis))
    }

    pub fn tick_millis(&self) -> u64 {
        self.tick_millis.get()
    }

    /// Convert `delay` expressed in `unit` to ticks.
    pub fn to_ticks(&self, delay: u64, unit: TimeUnit) -> Tick {
        self.millis_to_ticks(u128::from(unit.to_millis(delay)))
    }

    /// Convert a [`Duration`] to ticks (sub-millisecond part truncated).
    pub fn to_ticks_duration(&self, delay: Duration) -> Tick {
        self.millis_to_ticks(delay.as_millis())
    }

    // round(millis / tick) with ties away from zero, in integer arithmetic:
    // floor((2 * millis + tick) / (2 * tick)).
    fn millis_to_ticks(&self, millis: u128) -> Tick {
        let tick = u128::from(self.tick_millis.get());
        let ticks = millis.saturating_mul(2).saturating_add(tick) / (2 * tick);
        Tick::try_from(ticks).unwrap_or(Tick::MAX)
    }
}

impl Default for TickConverter {
    fn default() -> Self {
        Self {
            tick_millis: DEFAULT_TICK,
        }
    }
}

/// Convert a delay to ticks using the default 50 ms tick.
pub fn to_ticks(delay: u64, unit: TimeUnit) -> Tick {
    TickConverter::default().to_ticks(delay, unit)
}

//! Clock and random sources.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::infrastructure::ports::{ClockPort, RandomPort};

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Thread-local RNG. Rolls are uniform on the closed range.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl RandomPort for SystemRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn gen_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Fixed clock for testing.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Always answers `0`, clamped into the requested range.
#[cfg(test)]
pub struct FixedRandom(pub i32);

#[cfg(test)]
impl RandomPort for FixedRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        self.0.clamp(min, max.max(min))
    }

    fn gen_uuid(&self) -> Uuid {
        Uuid::nil()
    }
}

/// Picks the low end of every range on even calls and the high end on odd
/// calls, so tests can observe both bounds.
#[cfg(test)]
#[derive(Default)]
pub struct AlternatingRandom(std::sync::atomic::AtomicUsize);

#[cfg(test)]
impl RandomPort for AlternatingRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        let call = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if call % 2 == 0 {
            min
        } else {
            max
        }
    }

    fn gen_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

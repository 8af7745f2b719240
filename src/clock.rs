/*
 * Copyright 2021 Luca Fulchir <luker@fenrirproject.org>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Time sources for the time-ordered structures
//!
//! The caches never look at wall time: they only compare two readings of
//! the same clock. Seconds, ticks or a cycle counter are all fine as long
//! as the unit is the same for stamping and for the timeouts.

use ::std::cell::Cell;
use ::std::rc::Rc;
use ::std::time::Instant;

/// A monotonic time source
pub trait Clock {
    fn now(&self) -> u64;
}

impl<F> Clock for F
where
    F: Fn() -> u64,
{
    #[inline]
    fn now(&self) -> u64 {
        self()
    }
}

/// Resolution of `MonotonicClock`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

/// Time elapsed since the clock was created, backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
    unit: Unit,
}

impl MonotonicClock {
    pub fn new(unit: Unit) -> Self {
        MonotonicClock {
            start: Instant::now(),
            unit,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock::new(Unit::Seconds)
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        let elapsed = self.start.elapsed();
        match self.unit {
            Unit::Seconds => elapsed.as_secs(),
            Unit::Millis => elapsed.as_millis() as u64,
            Unit::Micros => elapsed.as_micros() as u64,
            Unit::Nanos => elapsed.as_nanos() as u64,
        }
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so the caller can keep one copy and hand
/// the other to a cache. Single-thread only, like everything else here.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        ManualClock {
            time: Rc::new(Cell::new(start)),
        }
    }
    pub fn set(&self, time: u64) {
        self.time.set(time);
    }
    pub fn advance(&self, delta: u64) {
        self.time.set(self.time.get().saturating_add(delta));
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> u64 {
        self.time.get()
    }
}

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

use crate::clock::Clock;
use crate::config::Config;
use crate::hashmap::DefaultHashBuilder;
use crate::pool::LinkedHashPool;
use crate::results::{Error, InvariantError};
use crate::timer::next_stamp;
use crate::user::Stamped;
use ::std::hash::BuildHasher;

/// Let each key through at most once per period
///
/// Keys are kept in admission order, so when the limiter is full the key
/// admitted longest ago is forgotten to make room for a new one.
/// There is no background sweep: old keys are only dropped when room is
/// needed or when the caller runs `expire`.
///
/// ```
/// use shardcache::clock::ManualClock;
/// use shardcache::ratelimit::RateLimiter;
///
/// let clock = ManualClock::new(0);
/// let mut limiter = RateLimiter::<u32, _>::new(128, clock.clone()).unwrap();
/// assert!(limiter.check(42, 10));
/// clock.set(5);
/// assert!(!limiter.check(42, 10));
/// clock.set(11);
/// assert!(limiter.check(42, 10));
/// ```
pub struct RateLimiter<K, C, HB = DefaultHashBuilder>
where
    K: crate::user::Hash,
    C: Clock,
    HB: BuildHasher,
{
    _pool: LinkedHashPool<K, Stamped<()>, HB>,
    _clock: C,
}

impl<K, C> RateLimiter<K, C, DefaultHashBuilder>
where
    K: crate::user::Hash,
    C: Clock,
{
    pub fn new(entries: usize, clock: C) -> Result<Self, Error> {
        Self::with_config(Config::new(entries), clock)
    }
    pub fn with_config(config: Config, clock: C) -> Result<Self, Error> {
        Self::with_config_and_hasher(
            config,
            clock,
            DefaultHashBuilder::default(),
        )
    }
}

impl<K, C, HB> RateLimiter<K, C, HB>
where
    K: crate::user::Hash,
    C: Clock,
    HB: BuildHasher,
{
    pub fn with_config_and_hasher(
        config: Config,
        clock: C,
        hash_builder: HB,
    ) -> Result<Self, Error> {
        Ok(RateLimiter {
            _pool: LinkedHashPool::with_config_and_hasher(config, hash_builder)?,
            _clock: clock,
        })
    }
    pub fn capacity(&self) -> usize {
        self._pool.capacity()
    }
    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self._pool.len()
    }
    pub fn is_empty(&self) -> bool {
        self._pool.is_empty()
    }
    /// `true` if `key` may pass now.
    ///
    /// * unknown key: admitted and stamped, evicting the oldest key if
    ///   full
    /// * known key, stamped less than `period` ago: `false`, nothing changes
    /// * known key, older: re-stamped and moved to the back
    pub fn check(&mut self, key: K, period: u64) -> bool {
        let now = self._clock.now();
        if let Some(node) = self._pool.find(&key) {
            match self._pool.value(node) {
                Some(stamped) if stamped.age(now) < period => return false,
                _ => {}
            }
            let time = next_stamp(&self._pool, now);
            self._pool.move_back(node);
            self._pool.replace_value(node, Stamped::new(time, ()));
            return true;
        }
        let time = next_stamp(&self._pool, now);
        if self._pool.is_full() {
            self._pool.pop_front();
            ::tracing::trace!(
                len = self._pool.len(),
                "rate limiter full, evicting oldest"
            );
        }
        match self._pool.push_back_duplicate(key) {
            Some(node) => {
                self._pool.replace_value(node, Stamped::new(time, ()));
            }
            None => debug_assert!(false, "no free node after eviction"),
        }
        true
    }
    /// When `key` was last let through
    pub fn last_seen(&self, key: &K) -> Option<u64> {
        let node = self._pool.find(key)?;
        self._pool.value(node).map(|s| s.time)
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self._pool.contains_key(key)
    }
    /// Forget `key`: its next `check` will pass
    pub fn remove(&mut self, key: &K) -> bool {
        self._pool.remove_key(key).is_some()
    }
    /// Forget every key last let through at least `period` ago.
    /// They would pass anyway, this only makes room.
    /// Returns how many were dropped
    pub fn expire(&mut self, period: u64) -> usize {
        let now = self._clock.now();
        let mut count = 0;
        while let Some(node) = self._pool.front() {
            match self._pool.value(node) {
                Some(stamped) if stamped.age(now) >= period => {}
                _ => break,
            }
            self._pool.remove(node);
            count += 1;
        }
        count
    }
    /// Forget every key. O(n)
    pub fn reset(&mut self) {
        self._pool.clear()
    }
    /// Keys from the least to the most recently admitted, with their stamp
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, u64)> + '_ {
        self._pool.iter().map(|(_, k, s)| (k, s.time))
    }
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self._pool.check_invariants()
    }
}

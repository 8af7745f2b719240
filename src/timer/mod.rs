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

//! Time-ordered expiry queue
//!
//! Entries are stamped with the clock when they are pushed and appended to
//! the back, so the front is always the oldest one and expiring only ever
//! needs to look at the front.
//!
//! For that to hold the stamps must never decrease along the list. We
//! never take a time from the caller: the stamp is always the clock's
//! `now()`, and if the clock ever goes back we reuse the newest stamp in
//! the queue instead.

use crate::clock::Clock;
use crate::config::Config;
use crate::handle::NodeRef;
use crate::hashmap::DefaultHashBuilder;
use crate::pool::LinkedHashPool;
use crate::results::{Error, InvariantError};
use crate::user::Stamped;
use ::std::hash::BuildHasher;

/// The stamp for a node going to the back of `pool` at time `now`.
///
/// Never lower than the current back, so the list stays sorted
pub(crate) fn next_stamp<K, V, HB>(
    pool: &LinkedHashPool<K, Stamped<V>, HB>,
    now: u64,
) -> u64
where
    K: crate::user::Hash,
    V: crate::user::Val,
    HB: BuildHasher,
{
    let newest = match pool.back().and_then(|node| pool.value(node)) {
        Some(stamped) => stamped.time,
        None => return now,
    };
    if now < newest {
        ::tracing::warn!(now, newest, "clock went backwards, clamping stamp");
        newest
    } else {
        now
    }
}

/// Fixed-size queue of keyed entries that expire after a timeout
///
/// ```
/// use shardcache::clock::ManualClock;
/// use shardcache::timer::TimerQueue;
///
/// let clock = ManualClock::new(0);
/// let mut queue = TimerQueue::<u32, &str, _>::new(16, clock.clone()).unwrap();
/// queue.push_back(1, "first");
/// clock.advance(1);
/// queue.push_back(2, "second");
///
/// assert_eq!(queue.pop_front(5), None);
/// clock.advance(5);
/// assert_eq!(queue.pop_front(5), Some((1, "first")));
/// assert_eq!(queue.pop_front(5), Some((2, "second")));
/// ```
pub struct TimerQueue<K, V, C, HB = DefaultHashBuilder>
where
    K: crate::user::Hash,
    V: crate::user::Val,
    C: Clock,
    HB: BuildHasher,
{
    _pool: LinkedHashPool<K, Stamped<V>, HB>,
    _clock: C,
}

impl<K, V, C> TimerQueue<K, V, C, DefaultHashBuilder>
where
    K: crate::user::Hash,
    V: crate::user::Val,
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

impl<K, V, C, HB> TimerQueue<K, V, C, HB>
where
    K: crate::user::Hash,
    V: crate::user::Val,
    C: Clock,
    HB: BuildHasher,
{
    pub fn with_config_and_hasher(
        config: Config,
        clock: C,
        hash_builder: HB,
    ) -> Result<Self, Error> {
        Ok(TimerQueue {
            _pool: LinkedHashPool::with_config_and_hasher(config, hash_builder)?,
            _clock: clock,
        })
    }
    pub fn capacity(&self) -> usize {
        self._pool.capacity()
    }
    pub fn len(&self) -> usize {
        self._pool.len()
    }
    pub fn is_empty(&self) -> bool {
        self._pool.is_empty()
    }
    /// Current reading of the clock
    pub fn now(&self) -> u64 {
        self._clock.now()
    }
    pub fn clock(&self) -> &C {
        &self._clock
    }

    /// Stamp `key` with the current time and put it at the back.
    ///
    /// If the key is already queued its value is overwritten and it is
    /// re-stamped and moved to the back.
    /// If the queue is full, the oldest entry is evicted to make room and
    /// returned.
    pub fn push_back(&mut self, key: K, val: V) -> Option<(K, V)> {
        let time = next_stamp(&self._pool, self._clock.now());
        if let Some(node) = self._pool.find(&key) {
            self._pool.move_back(node);
            self._pool.replace_value(node, Stamped::new(time, val));
            return None;
        }
        self.push_new(key, Stamped::new(time, val))
    }
    /// Like `push_back`, but always adds a new entry, even if `key` is
    /// already queued.
    pub fn push_back_multi(&mut self, key: K, val: V) -> Option<(K, V)> {
        let time = next_stamp(&self._pool, self._clock.now());
        self.push_new(key, Stamped::new(time, val))
    }
    fn push_new(&mut self, key: K, stamped: Stamped<V>) -> Option<(K, V)> {
        let evicted = if self._pool.is_full() {
            let oldest = self._pool.pop_front().map(|(k, s)| (k, s.val));
            ::tracing::trace!(
                len = self._pool.len(),
                "timer queue full, evicting oldest"
            );
            oldest
        } else {
            None
        };
        match self._pool.push_back_duplicate(key) {
            Some(node) => {
                self._pool.replace_value(node, stamped);
            }
            None => debug_assert!(false, "no free node after eviction"),
        }
        evicted
    }
    /// Pop the oldest entry if it's at least `timeout` old.
    ///
    /// Only the front is checked: if it's not expired nothing else can be
    pub fn pop_front(&mut self, timeout: u64) -> Option<(K, V)> {
        let now = self._clock.now();
        self.pop_expired(now, timeout)
    }
    fn pop_expired(&mut self, now: u64, timeout: u64) -> Option<(K, V)> {
        let node = self._pool.front()?;
        let age = self._pool.value(node)?.age(now);
        if age < timeout {
            return None;
        }
        self._pool.remove(node).map(|(k, s)| (k, s.val))
    }
    /// Pop every entry at least `timeout` old, oldest first, passing
    /// each one to `f`. Returns how many were popped.
    ///
    /// The clock is read once, at the start.
    pub fn expire<F>(&mut self, timeout: u64, mut f: F) -> usize
    where
        F: FnMut(K, V),
    {
        let now = self._clock.now();
        let mut count = 0;
        while let Some((k, v)) = self.pop_expired(now, timeout) {
            f(k, v);
            count += 1;
        }
        count
    }
    /// The oldest entry with its stamp
    pub fn front(&self) -> Option<(&K, &V, u64)> {
        let node = self._pool.front()?;
        self._pool.get(node).map(|(k, s)| (k, &s.val, s.time))
    }
    /// How long the oldest entry has been waiting
    pub fn front_age(&self) -> Option<u64> {
        let node = self._pool.front()?;
        let now = self._clock.now();
        self._pool.value(node).map(|s| s.age(now))
    }
    /// Value of the most recent entry for `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        self.stamped(key).map(|s| &s.val)
    }
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let node = self._pool.find(key)?;
        self._pool.value_mut(node).map(|s| &mut s.val)
    }
    /// When the most recent entry for `key` was stamped
    pub fn stamp_of(&self, key: &K) -> Option<u64> {
        self.stamped(key).map(|s| s.time)
    }
    fn stamped(&self, key: &K) -> Option<&Stamped<V>> {
        let node = self._pool.find(key)?;
        self._pool.value(node)
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self._pool.contains_key(key)
    }
    /// Remove the most recent entry for `key`, wherever it is in the queue
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self._pool.remove_key(key).map(|(_, s)| s.val)
    }
    /// Remove every entry for `key`, passing each value to `f`, most
    /// recent first. Returns how many were removed
    pub fn remove_all_with<F>(&mut self, key: &K, mut f: F) -> usize
    where
        F: FnMut(V),
    {
        let mut count = 0;
        while let Some(v) = self.remove(key) {
            f(v);
            count += 1;
        }
        count
    }
    /// Remove every entry for `key`. Returns how many were removed
    pub fn remove_all(&mut self, key: &K) -> usize {
        self.remove_all_with(key, |_| {})
    }
    /// Drop every entry. O(n)
    pub fn reset(&mut self) {
        self._pool.clear()
    }
    /// Oldest to newest, with the stamps
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = (&K, &V, u64)> + '_ {
        self._pool.iter().map(|(_, k, s)| (k, &s.val, s.time))
    }
    /// Handle to the oldest node, for callers that keep the pool view
    pub fn front_node(&self) -> Option<NodeRef> {
        self._pool.front()
    }
    /// Pool consistency, plus stamps non-decreasing from front to back
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self._pool.check_invariants()?;
        let mut last = 0;
        for (_, _, time) in self.iter() {
            if time < last {
                return Err(InvariantError(format!(
                    "stamp {} after stamp {}",
                    time, last
                )));
            }
            last = time;
        }
        Ok(())
    }
}

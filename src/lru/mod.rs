/*
 * Copyright 2021 Luca Fulchir <luca@fenrirproject.org>
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

use crate::config::Config;
use crate::hashmap::DefaultHashBuilder;
use crate::pool::LinkedHashPool;
use crate::results::{Error, InsertResult, InvariantError, UpdateKind};
use ::std::hash::BuildHasher;

/// Simple fixed-size LRU
///
/// The front of the list is the least recently used entry, the back the
/// most recent one. When full, an insert of a new key evicts the front
/// and reuses its node: the capacity is never exceeded and nothing is
/// allocated after construction.
///
/// ```
/// use shardcache::lru::LRU;
/// use shardcache::results::UpdateKind;
///
/// let mut lru = LRU::<u32, u32>::new(2).unwrap();
/// assert_eq!(lru.put(1, 10), UpdateKind::Inserted);
/// assert_eq!(lru.put(2, 20), UpdateKind::Inserted);
/// assert_eq!(lru.put(1, 11), UpdateKind::Refreshed);
/// // 2 is now the least recently used
/// lru.put(3, 30);
/// assert_eq!(lru.get(&2), None);
/// assert_eq!(lru.get(&1), Some(&11));
/// ```
pub struct LRU<K, V, HB = DefaultHashBuilder>
where
    K: crate::user::Hash,
    V: crate::user::Val,
    HB: BuildHasher,
{
    _pool: LinkedHashPool<K, V, HB>,
}

impl<K, V> LRU<K, V, DefaultHashBuilder>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    pub fn new(entries: usize) -> Result<Self, Error> {
        Self::with_config(Config::new(entries))
    }
    pub fn with_config(config: Config) -> Result<Self, Error> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V, HB> LRU<K, V, HB>
where
    K: crate::user::Hash,
    V: crate::user::Val,
    HB: BuildHasher,
{
    pub fn with_config_and_hasher(
        config: Config,
        hash_builder: HB,
    ) -> Result<Self, Error> {
        Ok(LRU {
            _pool: LinkedHashPool::with_config_and_hasher(config, hash_builder)?,
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
    /// Insert or refresh `key`, making it the most recently used.
    pub fn put(&mut self, key: K, val: V) -> UpdateKind {
        self.insert(key, val).kind()
    }
    /// Like `put`, but hands back what was replaced:
    /// * `OldEntry(v)`: the key was present, `v` was its value
    /// * `OldTail(k, v)`: the cache was full, `k` was evicted
    /// * `Success`: new key, there was room
    pub fn insert(&mut self, key: K, val: V) -> InsertResult<K, V> {
        if let Some(node) = self._pool.find(&key) {
            self._pool.move_back(node);
            return match self._pool.replace_value(node, val) {
                Some(old) => InsertResult::OldEntry(old),
                None => InsertResult::Success,
            };
        }
        let evicted = if self._pool.is_full() {
            // the pool takes it out of the map first, then the list
            let tail = self._pool.pop_front();
            ::tracing::trace!(len = self._pool.len(), "lru eviction");
            tail
        } else {
            None
        };
        match self._pool.push_back_duplicate(key) {
            Some(node) => {
                self._pool.replace_value(node, val);
            }
            None => debug_assert!(false, "no free node after eviction"),
        }
        match evicted {
            Some((k, v)) => InsertResult::OldTail(k, v),
            None => InsertResult::Success,
        }
    }
    /// Look up a value without touching the LRU order
    pub fn get(&self, key: &K) -> Option<&V> {
        let node = self._pool.find(key)?;
        self._pool.value(node)
    }
    /// Mutable lookup, without touching the LRU order
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let node = self._pool.find(key)?;
        self._pool.value_mut(node)
    }
    /// Look up a value and mark it as the most recently used
    pub fn get_refresh(&mut self, key: &K) -> Option<&mut V> {
        let node = self._pool.find(key)?;
        self._pool.move_back(node);
        self._pool.value_mut(node)
    }
    /// Mark `key` as the most recently used, without reading it
    pub fn make_head(&mut self, key: &K) -> bool {
        match self._pool.find(key) {
            Some(node) => self._pool.move_back(node),
            None => false,
        }
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self._pool.contains_key(key)
    }
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self._pool.remove_key(key).map(|(_, v)| v)
    }
    /// The entry that would be evicted next
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let node = self._pool.front()?;
        self._pool.get(node)
    }
    /// Evict the least recently used entry now
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        self._pool.pop_front()
    }
    /// Drop every entry. O(n)
    pub fn reset(&mut self) {
        self._pool.clear()
    }
    /// Least to most recently used
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> + '_ {
        self._pool.iter().map(|(_, k, v)| (k, v))
    }
    /// Least to most recently used, mutable values
    pub fn iter_mut(
        &mut self,
    ) -> impl DoubleEndedIterator<Item = (&K, &mut V)> + '_ {
        self._pool.iter_mut().map(|(_, k, v)| (k, v))
    }
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self._pool.check_invariants()
    }
}

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

//! Keyed node pool: arena + list + hashmap, without an eviction rule
//!
//! Every cached node is both in the list and in the map. The pool never
//! evicts on its own: when it's full `push_back` returns `None`, and the
//! caller decides whether to `pop_front` and try again.
//!
//! The caches in this crate (LRU, timer queue, rate limiter) are thin
//! policies on top of this.

use crate::arena::{Arena, State};
use crate::config::Config;
use crate::handle::NodeRef;
use crate::hashmap::{ChainedHmap, DefaultHashBuilder};
use crate::list::{Iter, IterMut, List};
use crate::results::{Collision, Error, InvariantError};
use ::std::hash::BuildHasher;

/// Fixed-capacity pool of keyed nodes, ordered by a list.
///
/// ```
/// use shardcache::pool::LinkedHashPool;
///
/// let mut pool = LinkedHashPool::<u32, &str>::new(2).unwrap();
/// let (a, existing) = pool.push_back(1).unwrap();
/// assert!(!existing);
/// *pool.value_mut(a).unwrap() = "one";
/// pool.push_back(2).unwrap();
/// // full: the caller decides what to evict
/// assert!(pool.push_back(3).is_none());
/// assert_eq!(pool.pop_front(), Some((1, "one")));
/// assert!(pool.push_back(3).is_some());
/// ```
pub struct LinkedHashPool<K, V, HB = DefaultHashBuilder>
where
    K: crate::user::Hash,
    V: crate::user::Val,
    HB: BuildHasher,
{
    _arena: Arena<K, V>,
    _list: List,
    _hmap: ChainedHmap<K, HB>,
}

impl<K, V> LinkedHashPool<K, V, DefaultHashBuilder>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    /// Pool of `capacity` nodes with the default load factor and hasher
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Self::with_config(Config::new(capacity))
    }
    pub fn with_config(config: Config) -> Result<Self, Error> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V, HB> LinkedHashPool<K, V, HB>
where
    K: crate::user::Hash,
    V: crate::user::Val,
    HB: BuildHasher,
{
    /// Allocate every node and bucket now. Nothing is allocated later
    pub fn with_config_and_hasher(
        config: Config,
        hash_builder: HB,
    ) -> Result<Self, Error> {
        config.validate()?;
        let hmap = ChainedHmap::with_config_and_hasher(&config, hash_builder)?;
        let arena = Arena::with_capacity(config.capacity())?;
        Ok(LinkedHashPool {
            _arena: arena,
            _list: List::new(),
            _hmap: hmap,
        })
    }
    /// Total number of nodes
    pub fn capacity(&self) -> usize {
        self._arena.capacity()
    }
    /// Number of cached nodes
    pub fn len(&self) -> usize {
        self._arena.size()
    }
    pub fn is_empty(&self) -> bool {
        self._arena.size() == 0
    }
    /// Number of free nodes
    pub fn available(&self) -> usize {
        self._arena.available()
    }
    pub fn is_full(&self) -> bool {
        self._arena.available() == 0
    }
    /// Number of hash buckets, fixed at construction
    pub fn buckets(&self) -> usize {
        self._hmap.buckets()
    }
    /// Length of the longest hash chain, O(n + buckets)
    pub fn longest_chain(&self) -> usize {
        self._hmap.longest_chain(&self._arena)
    }
    /// Read-only access to the node storage
    pub fn arena(&self) -> &Arena<K, V> {
        &self._arena
    }

    pub fn find(&self, key: &K) -> Option<NodeRef> {
        self._hmap.find(&self._arena, key)
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }
    /// All the nodes holding `key`, most recent first.
    /// Only useful with `push_back_duplicate`
    pub fn find_all<'a>(
        &'a self,
        key: &'a K,
    ) -> impl Iterator<Item = NodeRef> + 'a {
        self._hmap.find_all(&self._arena, key)
    }
    pub fn get(&self, node: NodeRef) -> Option<(&K, &V)> {
        self._arena.get(node)
    }
    pub fn get_mut(&mut self, node: NodeRef) -> Option<(&K, &mut V)> {
        self._arena.get_mut(node)
    }
    pub fn key(&self, node: NodeRef) -> Option<&K> {
        self._arena.key(node)
    }
    pub fn value(&self, node: NodeRef) -> Option<&V> {
        self._arena.value(node)
    }
    pub fn value_mut(&mut self, node: NodeRef) -> Option<&mut V> {
        self._arena.value_mut(node)
    }
    /// Overwrite the value of a node, returning the old one
    pub fn replace_value(&mut self, node: NodeRef, val: V) -> Option<V> {
        self._arena.replace_value(node, val)
    }
    /// The first node (least recent / oldest)
    pub fn front(&self) -> Option<NodeRef> {
        self._list.front(&self._arena)
    }
    /// The last node (most recent / newest)
    pub fn back(&self) -> Option<NodeRef> {
        self._list.back(&self._arena)
    }

    /// Make sure `key` is at the back of the list.
    ///
    /// Returns the node and `true` if the key was already there (it is
    /// moved to the back), or a fresh node and `false`. The value of a
    /// fresh node is whatever the slot held before: set it.
    /// `None` if the key is new and there are no free nodes.
    pub fn push_back(&mut self, key: K) -> Option<(NodeRef, bool)> {
        if let Some(node) = self.find(&key) {
            self._list.move_to_back(&mut self._arena, node);
            return Some((node, true));
        }
        self.push_back_duplicate(key).map(|node| (node, false))
    }
    /// Take a free node for `key` without looking for it first.
    ///
    /// If the key is already present, both nodes stay in the pool and
    /// `find` returns the newest one. `None` if there are no free nodes.
    pub fn push_back_duplicate(&mut self, key: K) -> Option<NodeRef> {
        let node = self._arena.acquire()?;
        // list first: the map only takes listed nodes
        self._list.push_back(&mut self._arena, node);
        self._hmap.put_duplicate(&mut self._arena, key, node);
        Some(node)
    }
    /// Evict the front node, giving back its key and value.
    /// The node goes back to the free list
    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let node = self.front()?;
        self.remove(node)
    }
    /// Mark the node as the most recent
    pub fn move_back(&mut self, node: NodeRef) -> bool {
        self._list.move_to_back(&mut self._arena, node)
    }
    /// Mark the node as the least recent
    pub fn move_front(&mut self, node: NodeRef) -> bool {
        self._list.move_to_front(&mut self._arena, node)
    }
    /// Remove a node from both map and list and free it.
    /// `None` if the handle is stale
    pub fn remove(&mut self, node: NodeRef) -> Option<(K, V)> {
        match self._arena.state(node)? {
            State::Keyed => {
                self._hmap.remove_node(&mut self._arena, node);
            }
            State::Listed => {}
            State::Free | State::Detached => return None,
        }
        self._list.remove(&mut self._arena, node);
        self._arena.release_take(node)
    }
    /// Remove the (most recent) node holding `key`
    pub fn remove_key(&mut self, key: &K) -> Option<(K, V)> {
        let node = self._hmap.remove(&mut self._arena, key)?;
        self._list.remove(&mut self._arena, node);
        self._arena.release_take(node)
    }
    /// Change the key of a node, keeping its place in the list.
    ///
    /// Returns `Ok(false)` on stale handles. If another node already
    /// holds `key`, nothing changes and that node is returned as
    /// `Collision`.
    pub fn rekey(&mut self, node: NodeRef, key: K) -> Result<bool, Collision> {
        if !self._arena.contains(node) {
            return Ok(false);
        }
        if let Some(existing) = self.find(&key) {
            if existing == node {
                return Ok(true);
            }
            return Err(Collision(existing));
        }
        // the node is only in the list between these two
        self._hmap.remove_node(&mut self._arena, node);
        self._hmap.put_duplicate(&mut self._arena, key, node);
        Ok(true)
    }
    /// Free every node, dropping keys and values. O(n)
    pub fn clear(&mut self) {
        let cached = self._list.len();
        self._hmap.clear(&mut self._arena);
        while let Some(node) = self._list.pop_front(&mut self._arena) {
            self._arena.release_take(node);
        }
        ::tracing::debug!(cached, "pool cleared");
    }
    /// Front to back
    pub fn iter(&self) -> Iter<'_, K, V> {
        self._list.iter(&self._arena)
    }
    /// Front to back, mutable values
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self._list.iter_mut(&mut self._arena)
    }

    /// Full consistency check, O(n + buckets).
    ///
    /// * free + cached == capacity, and the free list really has `free`
    ///   nodes
    /// * every cached node is in the list, with coherent links
    /// * every listed node is also in the map, in the right bucket
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let arena = &self._arena;
        if arena.available() + arena.size() != arena.capacity() {
            return Err(InvariantError(format!(
                "free {} + cached {} != capacity {}",
                arena.available(),
                arena.size(),
                arena.capacity()
            )));
        }
        let free = arena.walk_free_list().map_err(InvariantError)?;
        if free != arena.available() {
            return Err(InvariantError(format!(
                "free list has {} nodes, expected {}",
                free,
                arena.available()
            )));
        }
        if self._list.len() != arena.size() {
            return Err(InvariantError(format!(
                "list has {} nodes, {} are cached",
                self._list.len(),
                arena.size()
            )));
        }
        let mut walked = 0;
        let mut prev: Option<NodeRef> = None;
        for (node, _, _) in self._list.iter(arena) {
            walked += 1;
            if self._list.prev(arena, node) != prev {
                return Err(InvariantError(format!(
                    "broken back link at slot {}",
                    node.slot()
                )));
            }
            if arena.state(node) != Some(State::Keyed) {
                return Err(InvariantError(format!(
                    "listed node at slot {} is not in the map",
                    node.slot()
                )));
            }
            prev = Some(node);
        }
        if walked != self._list.len() || prev != self.back() {
            return Err(InvariantError("list walk doesn't reach the tail".into()));
        }
        let keyed = self._hmap.walk_buckets(arena).map_err(InvariantError)?;
        if keyed != self._hmap.len() || keyed != self._list.len() {
            return Err(InvariantError(format!(
                "map has {} nodes (len {}), list has {}",
                keyed,
                self._hmap.len(),
                self._list.len()
            )));
        }
        Ok(())
    }
}

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

//! Intrusive chained hashmap over the arena nodes
//!
//! This simple hashmap has some limitations:
//! * It will not resize
//! * It always has the same number of buckets
//! * Should not be used in multithread
//!
//! But it's stable: nodes never move, and inserting or removing never
//! touches anything but the chain of one bucket.
//!
//! Each bucket only holds the index of the first node, the chain goes
//! through the `bucket_next` link stored in the node. A node must already
//! be in a list before it can be put in the map: this way "in the map but
//! not in the list" is not a state that can exist.
//!
//! Like the list, the map is tied to the first arena it keys a node of,
//! and only unlinks nodes from its own chains.

use crate::arena::{next_id, Arena, Membership};
use crate::handle::NodeRef;
use crate::results::{Collision, Error};
use ::std::hash::{BuildHasher, Hash, Hasher};

/// Default hasher, same as `hashbrown`
pub type DefaultHashBuilder = ::hashbrown::hash_map::DefaultHashBuilder;

/// Fixed-bucket chained hashmap.
///
/// Does not own the nodes, every operation takes the arena they live in.
pub struct ChainedHmap<K, HB = DefaultHashBuilder>
where
    HB: BuildHasher,
{
    _id: u32,
    _arena: Option<u32>,
    _buckets: Vec<Option<u32>>,
    _len: usize,
    _hash_builder: HB,
    _k: ::std::marker::PhantomData<K>,
}

impl<K, HB> ChainedHmap<K, HB>
where
    K: crate::user::Hash,
    HB: BuildHasher,
{
    /// Allocate `bucket_count` empty buckets. At least one bucket is
    /// always created
    pub fn with_buckets_and_hasher(
        bucket_count: usize,
        hash_builder: HB,
    ) -> Result<Self, Error> {
        let bucket_count = ::std::cmp::max(1, bucket_count);
        let mut buckets = Vec::new();
        if buckets.try_reserve_exact(bucket_count).is_err() {
            return Err(Error::Allocation(bucket_count));
        }
        buckets.resize(bucket_count, None);
        Ok(ChainedHmap {
            _id: next_id(),
            _arena: None,
            _buckets: buckets,
            _len: 0,
            _hash_builder: hash_builder,
            _k: ::std::marker::PhantomData,
        })
    }
    /// Buckets sized with `Config::bucket_count()`
    pub fn with_config_and_hasher(
        config: &crate::config::Config,
        hash_builder: HB,
    ) -> Result<Self, Error> {
        config.validate()?;
        Self::with_buckets_and_hasher(config.bucket_count(), hash_builder)
    }
    /// Number of keyed nodes
    #[inline]
    pub fn len(&self) -> usize {
        self._len
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self._len == 0
    }
    /// Number of buckets, fixed at construction
    #[inline]
    pub fn buckets(&self) -> usize {
        self._buckets.len()
    }
    pub fn hasher(&self) -> &HB {
        &self._hash_builder
    }
    fn hash(&self, key: &K) -> u64 {
        let mut hasher = self._hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }
    #[inline]
    fn bucket_of(&self, key: &K) -> usize {
        (self.hash(key) % (self._buckets.len() as u64)) as usize
    }
    /// Tie the map to `arena` on first use.
    /// `false` if it's already tied to another one
    fn bind<V>(&mut self, arena: &Arena<K, V>) -> bool
    where
        V: crate::user::Val,
    {
        match self._arena {
            None => {
                self._arena = Some(arena.id());
                true
            }
            Some(id) if id == arena.id() => true,
            Some(_) => {
                debug_assert!(false, "map used with a different arena");
                false
            }
        }
    }
    #[inline]
    fn foreign<V>(&self, arena: &Arena<K, V>) -> bool
    where
        V: crate::user::Val,
    {
        matches!(self._arena, Some(id) if id != arena.id())
    }
    /// Find the node holding `key`.
    /// If the key was inserted more than once, this is the most recent one
    pub fn find<V>(&self, arena: &Arena<K, V>, key: &K) -> Option<NodeRef>
    where
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return None;
        }
        let mut current = self._buckets[self.bucket_of(key)];
        while let Some(idx) = current {
            let node = arena.slot(idx);
            if node.key == *key {
                return Some(arena.handle(idx));
            }
            current = node.membership.bucket_next();
        }
        None
    }
    /// Iterate over every node holding `key`, most recent first
    pub fn find_all<'a, V>(
        &self,
        arena: &'a Arena<K, V>,
        key: &'a K,
    ) -> FindAll<'a, K, V>
    where
        V: crate::user::Val,
    {
        let current = if self.foreign(arena) {
            None
        } else {
            self._buckets[self.bucket_of(key)]
        };
        FindAll {
            arena,
            key,
            current,
        }
    }
    /// Key the node and link it at the head of its bucket.
    ///
    /// If the key is already present nothing changes and the node holding
    /// it is returned as a `Collision`, so the caller can decide to refresh
    /// that one instead.
    /// `node` must be in a list, and not already in the map.
    pub fn put<V>(
        &mut self,
        arena: &mut Arena<K, V>,
        key: K,
        node: NodeRef,
    ) -> Result<NodeRef, Collision>
    where
        V: crate::user::Val,
    {
        if let Some(existing) = self.find(arena, &key) {
            return Err(Collision(existing));
        }
        Ok(self.put_duplicate(arena, key, node))
    }
    /// Like `put`, but doesn't check if the key is already there.
    /// Used for multi-value keys
    pub fn put_duplicate<V>(
        &mut self,
        arena: &mut Arena<K, V>,
        key: K,
        node: NodeRef,
    ) -> NodeRef
    where
        V: crate::user::Val,
    {
        if !self.bind(arena) {
            return node;
        }
        let idx = match arena.resolve(node) {
            Some(idx) => idx,
            None => {
                debug_assert!(false, "map put of a stale node handle");
                return node;
            }
        };
        let link = match arena.membership(idx) {
            Membership::Listed(link) => *link,
            _ => {
                debug_assert!(false, "map put of a node not in a list");
                return node;
            }
        };
        let bucket = self.bucket_of(&key);
        let slot = arena.slot_mut(idx);
        slot.key = key;
        slot.membership = Membership::Keyed {
            link,
            bucket_next: self._buckets[bucket],
            map: self._id,
        };
        self._buckets[bucket] = Some(idx);
        self._len += 1;
        node
    }
    /// Unlink the node holding `key` from its bucket.
    /// The node stays in its list, with its key
    pub fn remove<V>(
        &mut self,
        arena: &mut Arena<K, V>,
        key: &K,
    ) -> Option<NodeRef>
    where
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return None;
        }
        let bucket = self.bucket_of(key);
        let mut prev: Option<u32> = None;
        let mut current = self._buckets[bucket];
        while let Some(idx) = current {
            let node = arena.slot(idx);
            if node.key == *key {
                self.unlink(arena, bucket, prev, idx);
                return Some(arena.handle(idx));
            }
            prev = Some(idx);
            current = node.membership.bucket_next();
        }
        None
    }
    /// Unlink exactly this node, even if other nodes share its key
    pub fn remove_node<V>(
        &mut self,
        arena: &mut Arena<K, V>,
        node: NodeRef,
    ) -> bool
    where
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return false;
        }
        let target = match arena.resolve(node) {
            Some(idx) => idx,
            None => return false,
        };
        match arena.membership(target) {
            Membership::Keyed { map, .. } if *map == self._id => {}
            _ => return false,
        }
        let bucket = self.bucket_of(&arena.slot(target).key);
        let mut prev: Option<u32> = None;
        let mut current = self._buckets[bucket];
        while let Some(idx) = current {
            if idx == target {
                self.unlink(arena, bucket, prev, idx);
                return true;
            }
            prev = Some(idx);
            current = arena.membership(idx).bucket_next();
        }
        debug_assert!(false, "keyed node not found in its bucket");
        false
    }
    /// Unlink all nodes. They are left in their list, O(n + buckets)
    pub fn clear<V>(&mut self, arena: &mut Arena<K, V>)
    where
        V: crate::user::Val,
    {
        if !self.bind(arena) {
            return;
        }
        for bucket in self._buckets.iter_mut() {
            let mut current = bucket.take();
            while let Some(idx) = current {
                let membership = arena.membership_mut(idx);
                current = membership.bucket_next();
                if let Membership::Keyed { link, .. } = *membership {
                    *membership = Membership::Listed(link);
                }
            }
        }
        self._len = 0;
    }
    /// Length of the longest bucket chain, O(n + buckets)
    pub fn longest_chain<V>(&self, arena: &Arena<K, V>) -> usize
    where
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return 0;
        }
        self._buckets
            .iter()
            .map(|head| {
                let mut len = 0;
                let mut current = *head;
                while let Some(idx) = current {
                    len += 1;
                    current = arena.membership(idx).bucket_next();
                }
                len
            })
            .max()
            .unwrap_or(0)
    }
    /// Walk all chains checking that each node sits in the right bucket.
    /// Returns the number of nodes found
    pub(crate) fn walk_buckets<V>(
        &self,
        arena: &Arena<K, V>,
    ) -> Result<usize, String>
    where
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return Err("map used with a different arena".to_owned());
        }
        let mut count = 0;
        for (bucket, head) in self._buckets.iter().enumerate() {
            let mut current = *head;
            while let Some(idx) = current {
                count += 1;
                if count > arena.capacity() {
                    return Err("bucket chains have a cycle".to_owned());
                }
                let node = arena.slot(idx);
                match node.membership {
                    Membership::Keyed { map, .. } if map == self._id => {}
                    Membership::Keyed { .. } => {
                        return Err(format!(
                            "node {} keyed by another map",
                            idx
                        ))
                    }
                    _ => {
                        return Err(format!(
                            "node {} in a bucket but not keyed",
                            idx
                        ))
                    }
                }
                if self.bucket_of(&node.key) != bucket {
                    return Err(format!("node {} in the wrong bucket", idx));
                }
                current = node.membership.bucket_next();
            }
        }
        Ok(count)
    }
    fn unlink<V>(
        &mut self,
        arena: &mut Arena<K, V>,
        bucket: usize,
        prev: Option<u32>,
        idx: u32,
    ) where
        V: crate::user::Val,
    {
        let (link, next) = match *arena.membership(idx) {
            Membership::Keyed {
                link,
                bucket_next,
                ..
            } => (link, bucket_next),
            _ => return,
        };
        match prev {
            None => self._buckets[bucket] = next,
            Some(p) => {
                if let Membership::Keyed { bucket_next, .. } =
                    arena.membership_mut(p)
                {
                    *bucket_next = next;
                }
            }
        }
        *arena.membership_mut(idx) = Membership::Listed(link);
        self._len -= 1;
    }
}

impl<K> ChainedHmap<K, DefaultHashBuilder>
where
    K: crate::user::Hash,
{
    pub fn with_buckets(bucket_count: usize) -> Result<Self, Error> {
        Self::with_buckets_and_hasher(
            bucket_count,
            DefaultHashBuilder::default(),
        )
    }
}

/// Every node sharing a key, see `ChainedHmap::find_all`
pub struct FindAll<'a, K, V> {
    arena: &'a Arena<K, V>,
    key: &'a K,
    current: Option<u32>,
}

impl<'a, K, V> Iterator for FindAll<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        while let Some(idx) = self.current {
            let node = self.arena.slot(idx);
            self.current = node.membership.bucket_next();
            if node.key == *self.key {
                return Some(self.arena.handle(idx));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::State;
    use crate::list::List;

    /// Every key hashes to the same value: one long chain
    #[derive(Default, Clone)]
    struct Collide;
    impl Hasher for Collide {
        fn finish(&self) -> u64 {
            0
        }
        fn write(&mut self, _bytes: &[u8]) {}
    }
    impl BuildHasher for Collide {
        type Hasher = Collide;
        fn build_hasher(&self) -> Collide {
            Collide
        }
    }

    fn listed(
        arena: &mut Arena<u32, u32>,
        list: &mut List,
        n: usize,
    ) -> Vec<NodeRef> {
        (0..n)
            .map(|_| {
                let node = arena.acquire().unwrap();
                list.push_back(arena, node);
                node
            })
            .collect()
    }

    #[test]
    fn put_find_remove() {
        let mut arena = Arena::<u32, u32>::with_capacity(8).unwrap();
        let mut list = List::new();
        let mut map = ChainedHmap::<u32>::with_buckets(9).unwrap();
        let nodes = listed(&mut arena, &mut list, 8);
        for (i, n) in nodes.iter().enumerate() {
            assert_eq!(map.put(&mut arena, i as u32, *n), Ok(*n));
        }
        assert_eq!(map.len(), 8);
        assert_eq!(map.buckets(), 9);
        for (i, n) in nodes.iter().enumerate() {
            assert_eq!(map.find(&arena, &(i as u32)), Some(*n));
            assert_eq!(arena.key(*n), Some(&(i as u32)));
            assert_eq!(arena.state(*n), Some(State::Keyed));
        }
        assert_eq!(map.find(&arena, &100), None);

        assert_eq!(map.remove(&mut arena, &3), Some(nodes[3]));
        assert_eq!(map.remove(&mut arena, &3), None);
        assert_eq!(map.find(&arena, &3), None);
        assert_eq!(arena.state(nodes[3]), Some(State::Listed));
        // still in the list
        assert_eq!(list.len(), 8);
        assert_eq!(map.walk_buckets(&arena), Ok(7));
    }

    #[test]
    fn collision_returns_existing() {
        let mut arena = Arena::<u32, u32>::with_capacity(2).unwrap();
        let mut list = List::new();
        let mut map = ChainedHmap::<u32>::with_buckets(3).unwrap();
        let nodes = listed(&mut arena, &mut list, 2);
        map.put(&mut arena, 42, nodes[0]).unwrap();
        assert_eq!(map.put(&mut arena, 42, nodes[1]), Err(Collision(nodes[0])));
        assert_eq!(arena.state(nodes[1]), Some(State::Listed));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn single_chain_still_works() {
        let mut arena = Arena::<u32, u32>::with_capacity(6).unwrap();
        let mut list = List::new();
        let mut map =
            ChainedHmap::<u32, Collide>::with_buckets_and_hasher(4, Collide)
                .unwrap();
        let nodes = listed(&mut arena, &mut list, 6);
        for (i, n) in nodes.iter().enumerate() {
            map.put(&mut arena, i as u32, *n).unwrap();
        }
        assert_eq!(map.longest_chain(&arena), 6);
        // head, middle and tail of the chain
        assert_eq!(map.remove(&mut arena, &5), Some(nodes[5]));
        assert_eq!(map.remove(&mut arena, &2), Some(nodes[2]));
        assert_eq!(map.remove(&mut arena, &0), Some(nodes[0]));
        for k in [1u32, 3, 4].iter() {
            assert_eq!(map.find(&arena, k), Some(nodes[*k as usize]));
        }
        assert_eq!(map.walk_buckets(&arena), Ok(3));
    }

    #[test]
    fn duplicates_and_remove_node() {
        let mut arena = Arena::<u32, u32>::with_capacity(3).unwrap();
        let mut list = List::new();
        let mut map = ChainedHmap::<u32>::with_buckets(4).unwrap();
        let nodes = listed(&mut arena, &mut list, 3);
        map.put_duplicate(&mut arena, 7, nodes[0]);
        map.put_duplicate(&mut arena, 7, nodes[1]);
        map.put(&mut arena, 8, nodes[2]).unwrap();
        assert_eq!(map.find(&arena, &7), Some(nodes[1]));
        let all: Vec<NodeRef> = map.find_all(&arena, &7).collect();
        assert_eq!(all, vec![nodes[1], nodes[0]]);

        assert!(map.remove_node(&mut arena, nodes[0]));
        assert!(!map.remove_node(&mut arena, nodes[0]));
        assert_eq!(map.find_all(&arena, &7).count(), 1);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn clear_leaves_nodes_listed() {
        let mut arena = Arena::<u32, u32>::with_capacity(4).unwrap();
        let mut list = List::new();
        let mut map = ChainedHmap::<u32>::with_buckets(2).unwrap();
        let nodes = listed(&mut arena, &mut list, 4);
        for (i, n) in nodes.iter().enumerate() {
            map.put(&mut arena, i as u32, *n).unwrap();
        }
        map.clear(&mut arena);
        assert!(map.is_empty());
        for n in &nodes {
            assert_eq!(arena.state(*n), Some(State::Listed));
        }
        list.clear(&mut arena);
        for n in nodes {
            arena.release(n);
        }
        assert_eq!(arena.available(), 4);
    }

    #[test]
    fn other_arena_is_never_walked() {
        let mut arena = Arena::<u32, u32>::with_capacity(8).unwrap();
        let mut list = List::new();
        let mut map = ChainedHmap::<u32>::with_buckets(3).unwrap();
        let nodes = listed(&mut arena, &mut list, 8);
        for (i, n) in nodes.iter().enumerate() {
            map.put(&mut arena, i as u32, *n).unwrap();
        }
        // the chains hold indexes up to 7, the other arena has one slot
        let mut other = Arena::<u32, u32>::with_capacity(1).unwrap();
        let stray = other.acquire().unwrap();
        for k in 0..8u32 {
            assert_eq!(map.find(&other, &k), None);
            assert_eq!(map.find_all(&other, &k).count(), 0);
        }
        assert!(map.walk_buckets(&other).is_err());
        assert_eq!(map.longest_chain(&other), 0);
        assert_eq!(map.remove(&mut other, &7), None);
        assert!(!map.remove_node(&mut other, stray));
        assert_eq!(map.len(), 8);
        assert_eq!(map.walk_buckets(&arena), Ok(8));
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "map used with a different arena")
    )]
    fn put_into_other_arena_is_refused() {
        let mut arena = Arena::<u32, u32>::with_capacity(1).unwrap();
        let mut list = List::new();
        let mut map = ChainedHmap::<u32>::with_buckets(2).unwrap();
        let nodes = listed(&mut arena, &mut list, 1);
        map.put(&mut arena, 1, nodes[0]).unwrap();

        let mut other = Arena::<u32, u32>::with_capacity(1).unwrap();
        let mut other_list = List::new();
        let stray = listed(&mut other, &mut other_list, 1)[0];
        map.put_duplicate(&mut other, 2, stray);
        assert_eq!(other.state(stray), Some(State::Listed));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn maps_sharing_an_arena_keep_their_nodes() {
        let mut arena = Arena::<u32, u32>::with_capacity(2).unwrap();
        let mut list = List::new();
        let mut map_a = ChainedHmap::<u32>::with_buckets(2).unwrap();
        let mut map_b = ChainedHmap::<u32>::with_buckets(2).unwrap();
        let nodes = listed(&mut arena, &mut list, 2);
        map_a.put(&mut arena, 1, nodes[0]).unwrap();
        map_b.put(&mut arena, 2, nodes[1]).unwrap();

        assert!(!map_b.remove_node(&mut arena, nodes[0]));
        assert_eq!(map_b.remove(&mut arena, &1), None);
        assert_eq!(map_a.find(&arena, &1), Some(nodes[0]));
        assert_eq!(arena.state(nodes[0]), Some(State::Keyed));
        assert_eq!(map_a.walk_buckets(&arena), Ok(1));
        assert_eq!(map_b.walk_buckets(&arena), Ok(1));

        assert!(map_a.remove_node(&mut arena, nodes[0]));
        assert_eq!(map_b.len(), 1);
    }
}

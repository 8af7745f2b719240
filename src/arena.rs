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

//! Fixed node storage plus the free list
//!
//! All the nodes are allocated in one go and live until the arena is
//! dropped. Nodes are never constructed or destroyed after that, they only
//! move between the free list and whatever list/map the caller links them
//! into.
//!
//! The free list is a stack threaded through the `Free` variant of the
//! node membership, so acquire/release are O(1) and need no extra memory.

mod node;

use crate::handle::NodeRef;
use crate::results::Error;
pub(crate) use node::{ListLink, Membership, Node};
pub use node::State;
use ::std::convert::TryFrom;
use ::std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Process-wide id for arenas, lists and maps.
/// Lists and maps use it to refuse nodes and arenas that are not theirs
pub(crate) fn next_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Owner of every node
///
/// `available() + size() == capacity()` at all times
#[derive(Debug)]
pub struct Arena<K, V> {
    _id: u32,
    _nodes: Vec<Node<K, V>>,
    _free_head: Option<u32>,
    _free: usize,
    _allocated: bool,
}

impl<K, V> Arena<K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    /// An arena with no nodes. Use `allocate()` before anything else
    pub fn new() -> Self {
        Arena {
            _id: next_id(),
            _nodes: Vec::new(),
            _free_head: None,
            _free: 0,
            _allocated: false,
        }
    }
    /// `new()` + `allocate()`
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        let mut res = Arena::new();
        res.allocate(capacity)?;
        Ok(res)
    }
    /// Reserve and default-construct `capacity` nodes, all of them free.
    ///
    /// Can only be done once: a second call returns
    /// `Error::AlreadyAllocated` and leaves the arena untouched
    pub fn allocate(&mut self, capacity: usize) -> Result<(), Error> {
        if self._allocated {
            return Err(Error::AlreadyAllocated);
        }
        let count = match u32::try_from(capacity) {
            Ok(cap) => cap,
            Err(_) => {
                return Err(Error::InvalidConfig(
                    "capacity must fit in 32 bits",
                ))
            }
        };
        let mut nodes = Vec::new();
        if nodes.try_reserve_exact(capacity).is_err() {
            return Err(Error::Allocation(capacity));
        }
        for idx in 0..count {
            let next = idx + 1;
            let next_free = if next < count { Some(next) } else { None };
            nodes.push(Node::free(next_free));
        }
        self._nodes = nodes;
        self._free_head = if capacity > 0 { Some(0) } else { None };
        self._free = capacity;
        self._allocated = true;
        ::tracing::debug!(
            capacity,
            node_size = ::std::mem::size_of::<Node<K, V>>(),
            "arena allocated"
        );
        Ok(())
    }
    pub fn is_allocated(&self) -> bool {
        self._allocated
    }
    /// Total number of nodes
    #[inline]
    pub fn capacity(&self) -> usize {
        self._nodes.len()
    }
    /// Number of nodes out of the free list
    #[inline]
    pub fn size(&self) -> usize {
        self._nodes.len() - self._free
    }
    /// Number of nodes in the free list
    #[inline]
    pub fn available(&self) -> usize {
        self._free
    }
    /// Take one node out of the free list.
    /// The node is `Detached`: not linked in any list or map yet
    pub fn acquire(&mut self) -> Option<NodeRef> {
        let idx = self._free_head?;
        let node = &mut self._nodes[idx as usize];
        match node.membership {
            Membership::Free { next_free } => {
                self._free_head = next_free;
            }
            _ => {
                debug_assert!(false, "free list points to a cached node");
                return None;
            }
        }
        node.membership = Membership::Detached;
        self._free -= 1;
        Some(NodeRef::new(idx, node.generation))
    }
    /// Put a node back in the free list.
    ///
    /// The node must be `Detached`: unlink it from its list and map first.
    /// After this every handle to the node is stale.
    /// Key and value are left in place until the slot is reused, use
    /// `release_take` to get them back.
    pub fn release(&mut self, node: NodeRef) {
        let idx = match self.resolve(node) {
            Some(idx) => idx,
            None => {
                debug_assert!(false, "release of a stale node handle");
                return;
            }
        };
        let slot = &mut self._nodes[idx as usize];
        if slot.membership != Membership::Detached {
            debug_assert!(false, "release of a node still linked");
            return;
        }
        slot.membership = Membership::Free {
            next_free: self._free_head,
        };
        slot.generation = slot.generation.wrapping_add(1);
        self._free_head = Some(idx);
        self._free += 1;
    }
    /// Like `release`, but moves key and value out of the node
    pub fn release_take(&mut self, node: NodeRef) -> Option<(K, V)> {
        let idx = self.resolve(node)?;
        if self._nodes[idx as usize].membership != Membership::Detached {
            debug_assert!(false, "release of a node still linked");
            return None;
        }
        let slot = &mut self._nodes[idx as usize];
        let key = ::std::mem::take(&mut slot.key);
        let val = ::std::mem::take(&mut slot.val);
        self.release(node);
        Some((key, val))
    }
    /// `true` if the handle still points to a cached node
    pub fn contains(&self, node: NodeRef) -> bool {
        self.resolve(node).is_some()
    }
    /// State of the node behind the handle. `None` on stale handles
    pub fn state(&self, node: NodeRef) -> Option<State> {
        let idx = self.resolve(node)?;
        Some(self._nodes[idx as usize].membership.state())
    }
    pub fn get(&self, node: NodeRef) -> Option<(&K, &V)> {
        let idx = self.resolve(node)?;
        let slot = &self._nodes[idx as usize];
        Some((&slot.key, &slot.val))
    }
    pub fn get_mut(&mut self, node: NodeRef) -> Option<(&K, &mut V)> {
        let idx = self.resolve(node)?;
        let slot = &mut self._nodes[idx as usize];
        Some((&slot.key, &mut slot.val))
    }
    pub fn key(&self, node: NodeRef) -> Option<&K> {
        self.get(node).map(|(k, _)| k)
    }
    pub fn value(&self, node: NodeRef) -> Option<&V> {
        self.get(node).map(|(_, v)| v)
    }
    pub fn value_mut(&mut self, node: NodeRef) -> Option<&mut V> {
        self.get_mut(node).map(|(_, v)| v)
    }
    /// Overwrite the value, returning the old one
    pub fn replace_value(&mut self, node: NodeRef, val: V) -> Option<V> {
        self.value_mut(node)
            .map(|old| ::std::mem::replace(old, val))
    }

    #[inline]
    pub(crate) fn id(&self) -> u32 {
        self._id
    }
    /// Validate a handle: in range, same generation, not free
    #[inline]
    pub(crate) fn resolve(&self, node: NodeRef) -> Option<u32> {
        let slot = self._nodes.get(node.slot())?;
        if slot.generation != node.generation() {
            return None;
        }
        match slot.membership {
            Membership::Free { .. } => None,
            _ => Some(node.index()),
        }
    }
    /// Handle for a slot that we know is cached
    #[inline]
    pub(crate) fn handle(&self, idx: u32) -> NodeRef {
        NodeRef::new(idx, self._nodes[idx as usize].generation)
    }
    #[inline]
    pub(crate) fn membership(&self, idx: u32) -> &Membership {
        &self._nodes[idx as usize].membership
    }
    #[inline]
    pub(crate) fn membership_mut(&mut self, idx: u32) -> &mut Membership {
        &mut self._nodes[idx as usize].membership
    }
    #[inline]
    pub(crate) fn slot(&self, idx: u32) -> &Node<K, V> {
        &self._nodes[idx as usize]
    }
    #[inline]
    pub(crate) fn slot_mut(&mut self, idx: u32) -> &mut Node<K, V> {
        &mut self._nodes[idx as usize]
    }
    /// raw access for the mutable list iterator
    #[inline]
    pub(crate) fn slots_ptr(&mut self) -> *mut Node<K, V> {
        self._nodes.as_mut_ptr()
    }
    /// Count the nodes reachable from the free list, checking that
    /// all of them are actually marked free
    pub(crate) fn walk_free_list(&self) -> Result<usize, String> {
        let mut count = 0;
        let mut current = self._free_head;
        while let Some(idx) = current {
            count += 1;
            if count > self._nodes.len() {
                return Err("free list has a cycle".to_owned());
            }
            match self._nodes[idx as usize].membership {
                Membership::Free { next_free } => current = next_free,
                _ => {
                    return Err(format!("free list reaches cached node {}", idx))
                }
            }
        }
        Ok(count)
    }
}

impl<K, V> Default for Arena<K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    fn default() -> Self {
        Arena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_once() {
        let mut arena = Arena::<u32, u32>::new();
        assert_eq!(arena.capacity(), 0);
        assert!(arena.acquire().is_none());
        assert!(!arena.is_allocated());
        arena.allocate(3).unwrap();
        assert!(arena.is_allocated());
        assert_eq!(arena.allocate(3), Err(Error::AlreadyAllocated));
        assert_eq!(arena.capacity(), 3);
        assert_eq!(arena.available(), 3);
        assert_eq!(arena.size(), 0);
    }

    #[test]
    fn acquire_until_empty_then_release() {
        let mut arena = Arena::<u32, u32>::with_capacity(2).unwrap();
        let a = arena.acquire().unwrap();
        let b = arena.acquire().unwrap();
        assert_ne!(a.index(), b.index());
        assert!(arena.acquire().is_none());
        assert_eq!(arena.size(), 2);
        assert_eq!(arena.available(), 0);

        arena.release(a);
        assert_eq!(arena.size() + arena.available(), arena.capacity());
        assert_eq!(arena.available(), 1);
        assert!(!arena.contains(a));
        assert!(arena.contains(b));
        let c = arena.acquire().unwrap();
        // same slot, different generation
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn release_take_moves_data_out() {
        let mut arena = Arena::<String, Vec<u8>>::with_capacity(1).unwrap();
        let n = arena.acquire().unwrap();
        arena.slot_mut(n.index()).key = "flow".to_owned();
        *arena.value_mut(n).unwrap() = vec![1, 2, 3];
        assert_eq!(arena.state(n), Some(State::Detached));
        assert!(State::Detached.is_cached());
        assert!(!State::Free.is_cached());
        let (k, v) = arena.release_take(n).unwrap();
        assert_eq!(k, "flow");
        assert_eq!(v, vec![1, 2, 3]);
        assert_eq!(arena.available(), 1);
        assert_eq!(arena.state(n), None);
    }

    #[test]
    fn free_list_walk() {
        let mut arena = Arena::<u32, ()>::with_capacity(5).unwrap();
        assert_eq!(arena.walk_free_list(), Ok(5));
        let n = arena.acquire().unwrap();
        assert_eq!(arena.walk_free_list(), Ok(4));
        arena.release(n);
        assert_eq!(arena.walk_free_list(), Ok(5));
    }

    #[test]
    fn every_arena_gets_its_own_id() {
        let a = Arena::<u32, u32>::new();
        let b = Arena::<u32, u32>::default();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), next_id());
    }

    #[test]
    fn replace_value() {
        let mut arena = Arena::<u32, u32>::with_capacity(1).unwrap();
        let n = arena.acquire().unwrap();
        assert_eq!(arena.replace_value(n, 9), Some(0));
        assert_eq!(arena.value(n), Some(&9));
    }
}

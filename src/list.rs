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

//! Intrusive doubly linked list over the arena nodes
//!
//! The list only keeps `head`, `tail` and the length: the links live in the
//! nodes themselves. Every operation takes the arena as a parameter, so
//! the same nodes can also be reached through the hashmap.
//!
//! ```text
//!   front (LRU / oldest)                          back (MRU / newest)
//!   head ─► [3] ◄──► [0] ◄──► [7] ◄── tail
//! ```
//!
//! A list is tied to the first arena it links a node of, and every node
//! it links is tagged with the list id. Nodes linked by another list are
//! ignored, as if they were not linked at all.
//!
//! Linking a node that is already linked, unlinking a node that is
//! still in the hashmap, or linking into a different arena breaks the
//! contract: it's caught by `debug_assert!` and ignored in release builds.

mod iter;

use crate::arena::{next_id, Arena, ListLink, Membership};
use crate::handle::NodeRef;
pub use iter::{Iter, IterMut};

/// Head/tail of an intrusive list. Does not own the nodes
#[derive(Debug)]
pub struct List {
    _id: u32,
    _arena: Option<u32>,
    _head: Option<u32>,
    _tail: Option<u32>,
    _len: usize,
}

impl List {
    pub fn new() -> Self {
        List {
            _id: next_id(),
            _arena: None,
            _head: None,
            _tail: None,
            _len: 0,
        }
    }
    #[inline]
    pub fn len(&self) -> usize {
        self._len
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self._len == 0
    }
    pub fn front<K, V>(&self, arena: &Arena<K, V>) -> Option<NodeRef>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return None;
        }
        self._head.map(|idx| arena.handle(idx))
    }
    pub fn back<K, V>(&self, arena: &Arena<K, V>) -> Option<NodeRef>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return None;
        }
        self._tail.map(|idx| arena.handle(idx))
    }
    /// The node after `node`, towards the back
    pub fn next<K, V>(
        &self,
        arena: &Arena<K, V>,
        node: NodeRef,
    ) -> Option<NodeRef>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (_, link) = self.linked(arena, node)?;
        Some(arena.handle(link.next?))
    }
    /// The node before `node`, towards the front
    pub fn prev<K, V>(
        &self,
        arena: &Arena<K, V>,
        node: NodeRef,
    ) -> Option<NodeRef>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (_, link) = self.linked(arena, node)?;
        Some(arena.handle(link.prev?))
    }
    /// `true` if the node is linked in this list
    pub fn is_linked<K, V>(&self, arena: &Arena<K, V>, node: NodeRef) -> bool
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        self.linked(arena, node).is_some()
    }

    pub fn push_front<K, V>(&mut self, arena: &mut Arena<K, V>, node: NodeRef)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if let Some(idx) = self.take_detached(arena, node) {
            let head = self._head;
            self.link_between(arena, idx, None, head);
        }
    }
    pub fn push_back<K, V>(&mut self, arena: &mut Arena<K, V>, node: NodeRef)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if let Some(idx) = self.take_detached(arena, node) {
            let tail = self._tail;
            self.link_between(arena, idx, tail, None);
        }
    }
    /// Link `node` right before the already linked `anchor`
    pub fn insert_before<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        anchor: NodeRef,
        node: NodeRef,
    ) where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (anchor_idx, anchor_link) = match self.linked(arena, anchor) {
            Some(found) => found,
            None => {
                debug_assert!(false, "insert_before an unlinked anchor");
                return;
            }
        };
        if let Some(idx) = self.take_detached(arena, node) {
            self.link_between(arena, idx, anchor_link.prev, Some(anchor_idx));
        }
    }
    /// Link `node` right after the already linked `anchor`
    pub fn insert_after<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        anchor: NodeRef,
        node: NodeRef,
    ) where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (anchor_idx, anchor_link) = match self.linked(arena, anchor) {
            Some(found) => found,
            None => {
                debug_assert!(false, "insert_after an unlinked anchor");
                return;
            }
        };
        if let Some(idx) = self.take_detached(arena, node) {
            self.link_between(arena, idx, Some(anchor_idx), anchor_link.next);
        }
    }
    /// Unlink the front node. It's returned `Detached`
    pub fn pop_front<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
    ) -> Option<NodeRef>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let node = self.front(arena)?;
        if self.remove(arena, node) {
            Some(node)
        } else {
            None
        }
    }
    /// Unlink the back node. It's returned `Detached`
    pub fn pop_back<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
    ) -> Option<NodeRef>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let node = self.back(arena)?;
        if self.remove(arena, node) {
            Some(node)
        } else {
            None
        }
    }
    /// Unlink a node from wherever it is.
    /// The node must have been removed from the hashmap first
    pub fn remove<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        node: NodeRef,
    ) -> bool
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (idx, link) = match self.linked(arena, node) {
            Some(found) => found,
            None => return false,
        };
        if let Membership::Keyed { .. } = arena.membership(idx) {
            debug_assert!(false, "list remove of a node still in the map");
            return false;
        }
        self.splice_out(arena, link);
        *arena.membership_mut(idx) = Membership::Detached;
        true
    }
    /// Move a linked node to the front. Works for keyed nodes too
    pub fn move_to_front<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        node: NodeRef,
    ) -> bool
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (idx, link) = match self.linked(arena, node) {
            Some(found) => found,
            None => return false,
        };
        if self._head != Some(idx) {
            self.splice_out(arena, link);
            let head = self._head;
            self.link_between(arena, idx, None, head);
        }
        true
    }
    /// Move a linked node to the back. Works for keyed nodes too
    pub fn move_to_back<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        node: NodeRef,
    ) -> bool
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let (idx, link) = match self.linked(arena, node) {
            Some(found) => found,
            None => return false,
        };
        if self._tail != Some(idx) {
            self.splice_out(arena, link);
            let tail = self._tail;
            self.link_between(arena, idx, tail, None);
        }
        true
    }
    /// Unlink every node, O(n).
    /// The hashmap must already be empty
    pub fn clear<K, V>(&mut self, arena: &mut Arena<K, V>)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if !self.bind(arena) {
            return;
        }
        let mut current = self._head;
        while let Some(idx) = current {
            let membership = arena.membership_mut(idx);
            current = membership.list_link().and_then(|link| link.next);
            debug_assert!(
                matches!(membership, Membership::Listed(_)),
                "list clear with nodes still in the map"
            );
            *membership = Membership::Detached;
        }
        self._head = None;
        self._tail = None;
        self._len = 0;
    }
    /// Front to back, read only
    pub fn iter<'a, K, V>(&self, arena: &'a Arena<K, V>) -> Iter<'a, K, V>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return Iter::new(arena, None, None, 0);
        }
        Iter::new(arena, self._head, self._tail, self._len)
    }
    /// Front to back, with mutable values
    pub fn iter_mut<'a, K, V>(
        &self,
        arena: &'a mut Arena<K, V>,
    ) -> IterMut<'a, K, V>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return IterMut::new(arena, None, None, 0);
        }
        IterMut::new(arena, self._head, self._tail, self._len)
    }

    /// Tie the list to `arena` on first use.
    /// `false` if it's already tied to another one
    fn bind<K, V>(&mut self, arena: &Arena<K, V>) -> bool
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        match self._arena {
            None => {
                self._arena = Some(arena.id());
                true
            }
            Some(id) if id == arena.id() => true,
            Some(_) => {
                debug_assert!(false, "list used with a different arena");
                false
            }
        }
    }
    #[inline]
    fn foreign<K, V>(&self, arena: &Arena<K, V>) -> bool
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        matches!(self._arena, Some(id) if id != arena.id())
    }
    /// Resolve a handle that must be `Detached`, and mark it as ours
    fn take_detached<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        node: NodeRef,
    ) -> Option<u32>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if !self.bind(arena) {
            return None;
        }
        let idx = arena.resolve(node)?;
        let membership = arena.membership_mut(idx);
        if *membership != Membership::Detached {
            debug_assert!(false, "linking a node that is already linked");
            return None;
        }
        *membership = Membership::Listed(ListLink {
            prev: None,
            next: None,
            owner: self._id,
        });
        Some(idx)
    }
    /// Resolve a handle that must be linked in this list, and return its
    /// link
    fn linked<K, V>(
        &self,
        arena: &Arena<K, V>,
        node: NodeRef,
    ) -> Option<(u32, ListLink)>
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if self.foreign(arena) {
            return None;
        }
        let idx = arena.resolve(node)?;
        let link = *arena.membership(idx).list_link()?;
        if link.owner != self._id {
            return None;
        }
        Some((idx, link))
    }
    fn set_link<K, V>(arena: &mut Arena<K, V>, idx: u32, link: ListLink)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if let Some(l) = arena.membership_mut(idx).list_link_mut() {
            *l = link;
        }
    }
    fn set_prev<K, V>(arena: &mut Arena<K, V>, idx: u32, prev: Option<u32>)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if let Some(l) = arena.membership_mut(idx).list_link_mut() {
            l.prev = prev;
        }
    }
    fn set_next<K, V>(arena: &mut Arena<K, V>, idx: u32, next: Option<u32>)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        if let Some(l) = arena.membership_mut(idx).list_link_mut() {
            l.next = next;
        }
    }
    /// Link `idx` between two adjacent positions.
    /// `None` means the head (for `prev`) or the tail (for `next`)
    fn link_between<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        idx: u32,
        prev: Option<u32>,
        next: Option<u32>,
    ) where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        let owner = self._id;
        Self::set_link(arena, idx, ListLink { prev, next, owner });
        match prev {
            Some(p) => Self::set_next(arena, p, Some(idx)),
            None => self._head = Some(idx),
        }
        match next {
            Some(n) => Self::set_prev(arena, n, Some(idx)),
            None => self._tail = Some(idx),
        }
        self._len += 1;
    }
    /// Connect the neighbours of a node to each other.
    /// The node itself is left untouched
    fn splice_out<K, V>(&mut self, arena: &mut Arena<K, V>, link: ListLink)
    where
        K: crate::user::Hash,
        V: crate::user::Val,
    {
        match link.prev {
            Some(p) => Self::set_next(arena, p, link.next),
            None => self._head = link.next,
        }
        match link.next {
            Some(n) => Self::set_prev(arena, n, link.prev),
            None => self._tail = link.prev,
        }
        self._len -= 1;
    }
}

impl Default for List {
    fn default() -> Self {
        List::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::State;

    fn setup(n: usize) -> (Arena<u32, u32>, List, Vec<NodeRef>) {
        let mut arena = Arena::with_capacity(n).unwrap();
        let mut nodes = Vec::new();
        for i in 0..n {
            let node = arena.acquire().unwrap();
            *arena.value_mut(node).unwrap() = i as u32;
            nodes.push(node);
        }
        (arena, List::new(), nodes)
    }

    fn values(list: &List, arena: &Arena<u32, u32>) -> Vec<u32> {
        list.iter(arena).map(|(_, _, v)| *v).collect()
    }

    #[test]
    fn push_and_pop_both_ends() {
        let (mut arena, mut list, nodes) = setup(4);
        list.push_back(&mut arena, nodes[1]);
        list.push_back(&mut arena, nodes[2]);
        list.push_front(&mut arena, nodes[0]);
        list.push_back(&mut arena, nodes[3]);
        assert_eq!(values(&list, &arena), vec![0, 1, 2, 3]);
        assert_eq!(list.len(), 4);

        assert_eq!(list.pop_front(&mut arena), Some(nodes[0]));
        assert_eq!(list.pop_back(&mut arena), Some(nodes[3]));
        assert_eq!(values(&list, &arena), vec![1, 2]);
        assert_eq!(arena.state(nodes[0]), Some(State::Detached));
        assert_eq!(arena.state(nodes[1]), Some(State::Listed));

        assert_eq!(list.pop_front(&mut arena), Some(nodes[1]));
        assert_eq!(list.pop_front(&mut arena), Some(nodes[2]));
        assert_eq!(list.pop_front(&mut arena), None);
        assert_eq!(list.pop_back(&mut arena), None);
        assert!(list.is_empty());
    }

    #[test]
    fn insert_relative_to_anchor() {
        let (mut arena, mut list, nodes) = setup(4);
        list.push_back(&mut arena, nodes[1]);
        list.insert_before(&mut arena, nodes[1], nodes[0]);
        list.insert_after(&mut arena, nodes[1], nodes[3]);
        list.insert_before(&mut arena, nodes[3], nodes[2]);
        assert_eq!(values(&list, &arena), vec![0, 1, 2, 3]);
        assert_eq!(list.front(&arena), Some(nodes[0]));
        assert_eq!(list.back(&arena), Some(nodes[3]));
        assert_eq!(list.next(&arena, nodes[1]), Some(nodes[2]));
        assert_eq!(list.prev(&arena, nodes[1]), Some(nodes[0]));
        assert_eq!(list.prev(&arena, nodes[0]), None);
    }

    #[test]
    fn remove_from_the_middle() {
        let (mut arena, mut list, nodes) = setup(3);
        for n in &nodes {
            list.push_back(&mut arena, *n);
        }
        assert!(list.remove(&mut arena, nodes[1]));
        assert!(!list.remove(&mut arena, nodes[1]));
        assert_eq!(values(&list, &arena), vec![0, 2]);
        assert!(!list.is_linked(&arena, nodes[1]));
        arena.release(nodes[1]);
        assert_eq!(arena.available(), 1);
    }

    #[test]
    fn move_to_ends() {
        let (mut arena, mut list, nodes) = setup(4);
        for n in &nodes {
            list.push_back(&mut arena, *n);
        }
        assert!(list.move_to_back(&mut arena, nodes[0]));
        assert_eq!(values(&list, &arena), vec![1, 2, 3, 0]);
        assert!(list.move_to_front(&mut arena, nodes[2]));
        assert_eq!(values(&list, &arena), vec![2, 1, 3, 0]);
        // already there
        assert!(list.move_to_back(&mut arena, nodes[0]));
        assert!(list.move_to_front(&mut arena, nodes[2]));
        assert_eq!(values(&list, &arena), vec![2, 1, 3, 0]);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn reverse_and_mutable_iteration() {
        let (mut arena, mut list, nodes) = setup(5);
        for n in &nodes {
            list.push_back(&mut arena, *n);
        }
        let rev: Vec<u32> = list.iter(&arena).rev().map(|(_, _, v)| *v).collect();
        assert_eq!(rev, vec![4, 3, 2, 1, 0]);

        for (_, _, v) in list.iter_mut(&mut arena) {
            *v *= 10;
        }
        assert_eq!(values(&list, &arena), vec![0, 10, 20, 30, 40]);

        // both ends meet in the middle without yielding twice
        let mut it = list.iter(&arena);
        assert_eq!(it.next().map(|(_, _, v)| *v), Some(0));
        assert_eq!(it.next_back().map(|(_, _, v)| *v), Some(40));
        assert_eq!(it.len(), 3);
        let rest: Vec<u32> = it.map(|(_, _, v)| *v).collect();
        assert_eq!(rest, vec![10, 20, 30]);

        let mut it = list.iter_mut(&mut arena);
        it.next_back();
        it.next_back();
        let rest: Vec<u32> = it.map(|(_, _, v)| *v).collect();
        assert_eq!(rest, vec![0, 10, 20]);
    }

    #[test]
    fn clear_detaches_everything() {
        let (mut arena, mut list, nodes) = setup(3);
        for n in &nodes {
            list.push_back(&mut arena, *n);
        }
        list.clear(&mut arena);
        assert!(list.is_empty());
        assert_eq!(list.iter(&arena).count(), 0);
        for n in &nodes {
            assert_eq!(arena.state(*n), Some(State::Detached));
        }
    }

    #[test]
    fn stale_handles_are_ignored() {
        let (mut arena, mut list, nodes) = setup(2);
        list.push_back(&mut arena, nodes[0]);
        arena.release(nodes[1]);
        assert!(!list.move_to_back(&mut arena, nodes[1]));
        assert!(!list.remove(&mut arena, nodes[1]));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn nodes_of_another_list_are_left_alone() {
        let (mut arena, mut a, nodes) = setup(2);
        let mut b = List::new();
        a.push_back(&mut arena, nodes[0]);
        b.push_back(&mut arena, nodes[1]);
        assert!(!b.remove(&mut arena, nodes[0]));
        assert!(!b.move_to_back(&mut arena, nodes[0]));
        assert!(!b.move_to_front(&mut arena, nodes[0]));
        assert!(!b.is_linked(&arena, nodes[0]));
        assert_eq!(b.pop_front(&mut arena), Some(nodes[1]));
        assert_eq!(b.pop_front(&mut arena), None);

        assert!(a.is_linked(&arena, nodes[0]));
        assert_eq!(a.len(), 1);
        assert_eq!(a.iter_mut(&mut arena).count(), 1);
        assert!(a.remove(&mut arena, nodes[0]));
        assert!(a.is_empty());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "already linked"))]
    fn relink_after_remove_from_another_list_is_refused() {
        let (mut arena, mut a, nodes) = setup(1);
        let mut b = List::new();
        a.push_back(&mut arena, nodes[0]);
        // `b` does not own the node: it stays linked in `a`
        assert!(!b.remove(&mut arena, nodes[0]));
        a.push_front(&mut arena, nodes[0]);
        assert_eq!(a.len(), 1);
        let mut seen = Vec::new();
        for (node, _, v) in a.iter_mut(&mut arena) {
            *v += 1;
            seen.push(node);
        }
        assert_eq!(seen, vec![nodes[0]]);
        assert_eq!(arena.value(nodes[0]), Some(&1));
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "list used with a different arena")
    )]
    fn list_is_tied_to_one_arena() {
        let (mut arena, mut list, nodes) = setup(3);
        for n in &nodes {
            list.push_back(&mut arena, *n);
        }
        // the list holds indexes up to 2, the other arena has one slot
        let mut other = Arena::<u32, u32>::with_capacity(1).unwrap();
        let stray = other.acquire().unwrap();
        assert_eq!(list.iter_mut(&mut other).count(), 0);
        assert_eq!(list.iter(&other).count(), 0);
        assert_eq!(list.front(&other), None);
        assert_eq!(list.back(&other), None);
        assert!(!list.remove(&mut other, stray));
        list.push_back(&mut other, stray);
        assert_eq!(other.state(stray), Some(State::Detached));
        assert_eq!(values(&list, &arena), vec![0, 1, 2]);
    }
}

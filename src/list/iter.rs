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

use crate::arena::{Arena, Node};
use crate::handle::NodeRef;

/// Read-only walk of a list, front to back or back to front.
///
/// Holds a shared borrow of the arena, so nothing can be relinked while
/// the iteration is in progress. To restart just ask for a new one.
pub struct Iter<'a, K, V> {
    arena: &'a Arena<K, V>,
    front: Option<u32>,
    back: Option<u32>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(
        arena: &'a Arena<K, V>,
        front: Option<u32>,
        back: Option<u32>,
        remaining: usize,
    ) -> Self {
        Iter {
            arena,
            front,
            back,
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    type Item = (NodeRef, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.front?;
        let arena: &'a Arena<K, V> = self.arena;
        let node = arena.slot(idx);
        self.front = node.membership.list_link().and_then(|l| l.next);
        self.remaining -= 1;
        Some((NodeRef::new(idx, node.generation), &node.key, &node.val))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.back?;
        let arena: &'a Arena<K, V> = self.arena;
        let node = arena.slot(idx);
        self.back = node.membership.list_link().and_then(|l| l.prev);
        self.remaining -= 1;
        Some((NodeRef::new(idx, node.generation), &node.key, &node.val))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
}

/// Like `Iter`, but the values are mutable.
///
/// Keys stay read-only: changing a key in place would leave the node in
/// the wrong bucket.
pub struct IterMut<'a, K, V> {
    nodes: *mut Node<K, V>,
    front: Option<u32>,
    back: Option<u32>,
    remaining: usize,
    _arena: ::std::marker::PhantomData<&'a mut Arena<K, V>>,
}

impl<'a, K, V> IterMut<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    pub(crate) fn new(
        arena: &'a mut Arena<K, V>,
        front: Option<u32>,
        back: Option<u32>,
        remaining: usize,
    ) -> Self {
        IterMut {
            nodes: arena.slots_ptr(),
            front,
            back,
            remaining,
            _arena: ::std::marker::PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    type Item = (NodeRef, &'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.front?;
        // SAFETY: a list only starts an `IterMut` on the arena it is tied
        // to, so its indexes are in bounds. Only the owning list rewrites
        // the links of its nodes, so the chain has no cycles and holds
        // `remaining` nodes between `front` and `back`: each node is
        // handed out exactly once. The arena stays mutably borrowed for 'a.
        let node: &'a mut Node<K, V> =
            unsafe { &mut *self.nodes.add(idx as usize) };
        self.front = node.membership.list_link().and_then(|l| l.next);
        self.remaining -= 1;
        Some((NodeRef::new(idx, node.generation), &node.key, &mut node.val))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.back?;
        // SAFETY: same as `next`
        let node: &'a mut Node<K, V> =
            unsafe { &mut *self.nodes.add(idx as usize) };
        self.back = node.membership.list_link().and_then(|l| l.prev);
        self.remaining -= 1;
        Some((NodeRef::new(idx, node.generation), &node.key, &mut node.val))
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V>
where
    K: crate::user::Hash,
    V: crate::user::Val,
{
}

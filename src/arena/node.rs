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

/// Position of a node inside a list.
/// `prev` goes towards the front, `next` towards the back.
/// `owner` is the id of the list that linked the node: only that list
/// may relink it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListLink {
    pub(crate) prev: Option<u32>,
    pub(crate) next: Option<u32>,
    pub(crate) owner: u32,
}

/// Where a node currently lives.
///
/// The links are stored inside the variant, so a node can't be in the
/// map without being in the list, and a free node can't be linked
/// anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Membership {
    /// in the free list, chained through `next_free`
    Free { next_free: Option<u32> },
    /// acquired from the free list but not linked anywhere yet
    Detached,
    /// linked in a list only
    Listed(ListLink),
    /// linked in a list and in a bucket chain of the map with id `map`
    Keyed {
        link: ListLink,
        bucket_next: Option<u32>,
        map: u32,
    },
}

impl Membership {
    #[inline]
    pub(crate) fn list_link(&self) -> Option<&ListLink> {
        match self {
            Membership::Listed(link) | Membership::Keyed { link, .. } => {
                Some(link)
            }
            _ => None,
        }
    }
    #[inline]
    pub(crate) fn list_link_mut(&mut self) -> Option<&mut ListLink> {
        match self {
            Membership::Listed(link) | Membership::Keyed { link, .. } => {
                Some(link)
            }
            _ => None,
        }
    }
    #[inline]
    pub(crate) fn bucket_next(&self) -> Option<u32> {
        match self {
            Membership::Keyed { bucket_next, .. } => *bucket_next,
            _ => None,
        }
    }
    pub(crate) fn state(&self) -> State {
        match self {
            Membership::Free { .. } => State::Free,
            Membership::Detached => State::Detached,
            Membership::Listed(_) => State::Listed,
            Membership::Keyed { .. } => State::Keyed,
        }
    }
}

/// Public view of a node's membership, without the links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Free,
    Detached,
    Listed,
    Keyed,
}

impl State {
    /// Everything that is not in the free list counts as cached
    pub fn is_cached(&self) -> bool {
        *self != State::Free
    }
}

/// One arena slot
#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) generation: u32,
    pub(crate) membership: Membership,
    pub(crate) key: K,
    pub(crate) val: V,
}

impl<K: Default, V: Default> Node<K, V> {
    pub(crate) fn free(next_free: Option<u32>) -> Self {
        Node {
            generation: 0,
            membership: Membership::Free { next_free },
            key: K::default(),
            val: V::default(),
        }
    }
}

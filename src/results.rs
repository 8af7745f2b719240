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

use crate::handle::NodeRef;

/// Errors that can only happen while building a structure.
///
/// Once construction succeeded nothing in this crate fails: a full pool,
/// a missing key or a clashing key are all reported as normal results.
#[derive(::thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The backing memory for the nodes or buckets could not be reserved
    #[error("Can't allocate space for {0} elements")]
    Allocation(usize),
    /// `allocate()` was called on an arena that already has its nodes
    #[error("Arena is already allocated")]
    AlreadyAllocated,
    /// Capacity or load factor out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Returned by `check_invariants()` when the list, map and free list
/// disagree with each other
#[derive(::thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invariant violated: {0}")]
pub struct InvariantError(pub String);

/// The key is already in the map. Carries the node that holds it, so the
/// caller can refresh it in place instead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision(pub NodeRef);

impl Collision {
    /// the node that already holds the key
    pub fn existing(&self) -> NodeRef {
        self.0
    }
}

/// What `put` did with the key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// new key, took a free node or recycled the evicted one
    Inserted,
    /// key was already cached, value overwritten in place
    Refreshed,
}

/// Detailed result of an insert: what happened to the data we replaced
#[derive(Debug, PartialEq, Eq)]
pub enum InsertResult<K, V> {
    /// The key was new and there was a free node
    Success,
    /// The key was already present, here is its previous value
    OldEntry(V),
    /// The key was new but the cache was full: the least recent entry
    /// was evicted to make room
    OldTail(K, V),
}

impl<K, V> InsertResult<K, V> {
    /// Collapse to the simpler `UpdateKind`
    pub fn kind(&self) -> UpdateKind {
        match self {
            InsertResult::OldEntry(_) => UpdateKind::Refreshed,
            InsertResult::Success | InsertResult::OldTail(_, _) => {
                UpdateKind::Inserted
            }
        }
    }
}

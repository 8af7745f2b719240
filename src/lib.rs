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

//! A single-thread only library of fixed-capacity, allocation-free
//! containers built over one node pool
//!
//! # Single thread
//! All of this is designed to be used only in single-thread applications.
//! The project was born out of a need for caches and timers in a heavily
//! sharded application: each shard owns its own containers, so nothing
//! here is `Sync` and nothing locks.
//!
//! # One pool, two views
//! Every node lives in an [Arena](arena), allocated once up front.
//! A node can be threaded in a doubly linked [List](list) and, while it's
//! in the list, also indexed by key in a chained [hashmap](hashmap). Both
//! views link through the node's slot index, so moving or removing an
//! entry never allocates and never moves its data.
//!
//! Nodes are addressed through generation-checked [handles](handle): a
//! handle to a released node stops resolving.
//!
//! # Containers
//! [LinkedHashPool](pool) ties the three together and the project
//! currently implements on top of it:
//! * [LRU](lru)
//! * [TimerQueue](timer), a time-ordered expiry queue
//! * [RateLimiter](ratelimit)

/// fixed node storage, with a free list
pub mod arena;
/// time sources for the timed containers
pub mod clock;
pub mod config;
/// generation-checked node references
pub mod handle;
/// chained hashmap indexing arena nodes by key
pub mod hashmap;
/// intrusive doubly linked list over arena nodes
pub mod list;
pub mod lru;
pub mod pool;
pub mod ratelimit;
/// common errors and results
pub mod results;
pub mod timer;
/// traits for keys and values
pub mod user;

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

//! Bounds on what can be stored in a node
//!
//! Every node is default-constructed once when the arena is allocated and
//! then only overwritten, so both keys and values need `Default`.

/// Standard `Hash` type, plus `Sized`, `Eq`, `Default`
pub trait Hash: Sized + ::std::hash::Hash + Eq + Default {}
impl<T> Hash for T where T: Sized + ::std::hash::Hash + Eq + Default {}

/// The actual value in the node: `Sized` and `Default`
pub trait Val: Sized + Default {}
impl<T> Val for T where T: Sized + Default {}

/// A value tagged with the time it was (re)inserted.
///
/// Used by the time-ordered structures, the unit is whatever the
/// `Clock` returns
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stamped<V> {
    pub time: u64,
    pub val: V,
}

impl<V> Stamped<V> {
    pub fn new(time: u64, val: V) -> Self {
        Stamped { time, val }
    }
    /// time elapsed since the stamp. A clock that went backwards
    /// reports zero
    #[inline]
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.time)
    }
}

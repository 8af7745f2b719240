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

//! Generation-checked node handles
//!
//! A `NodeRef` is the only way to point at a node from outside the arena.
//! It packs the slot index and the slot generation in a single `u64`:
//! every time a node goes back to the free list its generation is bumped,
//! so an old handle will simply fail to resolve instead of pointing to
//! whatever key now lives in that slot.

use ::bitfield::bitfield;

bitfield! {
    #[derive(PartialEq, Eq, Copy, Clone, Hash)]
    pub struct NodeRef(u64);
    impl Debug;
    #[inline]
    pub u32, index, set_index: 31, 0;
    #[inline]
    pub u32, generation, set_generation: 63, 32;
}

impl NodeRef {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        let mut res = NodeRef(0);
        res.set_index(index);
        res.set_generation(generation);
        res
    }
    /// slot position inside the arena
    #[inline]
    pub fn slot(&self) -> usize {
        self.index() as usize
    }
    /// raw packed representation, useful to store the handle in
    /// external tables
    #[inline]
    pub fn to_bits(&self) -> u64 {
        self.0
    }
    /// rebuild a handle from `to_bits()`.
    /// The arena will still validate it on use
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        NodeRef(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack() {
        let r = NodeRef::new(7, 3);
        assert_eq!(r.index(), 7);
        assert_eq!(r.generation(), 3);
        assert_eq!(r.slot(), 7);
        assert_eq!(r.to_bits(), (3u64 << 32) | 7);
        assert_eq!(NodeRef::from_bits(r.to_bits()), r);
    }

    #[test]
    fn full_range() {
        let r = NodeRef::new(u32::MAX, u32::MAX);
        assert_eq!(r.index(), u32::MAX);
        assert_eq!(r.generation(), u32::MAX);
        assert_ne!(NodeRef::new(1, 0), NodeRef::new(1, 1));
    }
}

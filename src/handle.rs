// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity handles: opaque 64-bit values packing an index, a version and a storage shard.

use std::fmt;

/// Bit width of the `index` field.
pub const INDEX_BITS: u32 = 32;
/// Bit width of the `version` field.
pub const VERSION_BITS: u32 = 24;
/// Bit width of the `storage` field.
pub const STORAGE_BITS: u32 = 8;

const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;
const VERSION_MASK: u64 = (1u64 << VERSION_BITS) - 1;
const STORAGE_MASK: u64 = (1u64 << STORAGE_BITS) - 1;

/// An opaque, comparable, hashable reference to an entity.
///
/// A handle is never dereferenced directly; it is only ever looked up through a
/// [`crate::slotmap::SlotMap`] shard. The all-ones value is reserved as the "invalid"
/// sentinel and is never produced by [`Handle::new`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// The sentinel handle: never alive, never returned by `insert`.
    pub const INVALID: Handle = Handle(u64::MAX);

    /// Pack an `(index, version, storage)` triple into a handle.
    ///
    /// # Panics
    /// Panics (debug and release) if any field overflows its bit width; this is a
    /// programmer error in the slot map / registry, never caller-triggerable.
    pub fn new(index: u32, version: u32, storage: u8) -> Handle {
        assert!((index as u64) <= INDEX_MASK, "entity index overflowed its bit field");
        assert!((version as u64) <= VERSION_MASK, "entity version overflowed its bit field");
        let mut value = index as u64;
        value |= (version as u64 & VERSION_MASK) << INDEX_BITS;
        value |= (storage as u64 & STORAGE_MASK) << (INDEX_BITS + VERSION_BITS);
        let handle = Handle(value);
        debug_assert!(handle != Handle::INVALID, "packed handle collided with the sentinel");
        handle
    }

    /// Position of this handle's slot within its shard.
    pub fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Version stamped on this handle at creation time.
    pub fn version(self) -> u32 {
        ((self.0 >> INDEX_BITS) & VERSION_MASK) as u32
    }

    /// Which slot-map shard owns this handle.
    pub fn storage(self) -> u8 {
        ((self.0 >> (INDEX_BITS + VERSION_BITS)) & STORAGE_MASK) as u8
    }

    /// Whether this handle is the reserved sentinel.
    pub fn is_valid(self) -> bool {
        self.0 != Handle::INVALID.0
    }

    /// Index and version combined into a single ordering/dedup key, ignoring storage.
    pub fn versioned_index(self) -> u64 {
        ((self.version() as u64) << INDEX_BITS) | self.index() as u64
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "Handle(invalid)");
        }
        f.debug_struct("Handle")
            .field("index", &self.index())
            .field("version", &self.version())
            .field("storage", &self.storage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fields() {
        let h = Handle::new(42, 7, 3);
        assert_eq!(h.index(), 42);
        assert_eq!(h.version(), 7);
        assert_eq!(h.storage(), 3);
        assert!(h.is_valid());
    }

    #[test]
    fn sentinel_is_invalid() {
        assert!(!Handle::INVALID.is_valid());
        assert_eq!(Handle::default(), Handle::INVALID);
    }

    #[test]
    fn max_fields_do_not_collide_with_sentinel() {
        let h = Handle::new(u32::MAX, (1 << VERSION_BITS) - 2, 255);
        assert!(h.is_valid());
    }

    #[test]
    fn equality_and_hash_use_raw_value() {
        let a = Handle::new(1, 1, 0);
        let b = Handle::new(1, 1, 0);
        let c = Handle::new(1, 2, 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

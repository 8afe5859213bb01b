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

//! Versioned slot map: the indirection layer between a [`Handle`] and the `(archetype, row)`
//! pair it currently names.
//!
//! A handle is alive iff `slot[handle.index()].version == handle.version()`; nothing else
//! about the slot (in particular, whether it is linked into the free list) is part of that
//! contract. Erasing a slot only bumps its version and links it into the free list — it never
//! touches the archetype it used to point at, that is the caller's job.

use crate::error::{EcrError, Result};
use crate::handle::{Handle, VERSION_BITS};

const VERSION_MASK: u32 = (1u32 << VERSION_BITS) - 1;
const NO_FREE: i64 = -1;

#[derive(Clone, Copy)]
struct Slot {
    version: u32,
    /// Meaningful only while the slot is free: index of the next free slot, or `NO_FREE`.
    next_free: i64,
    /// Meaningful only while the slot is occupied.
    archetype: u32,
    row: u32,
}

/// One shard of the registry's entity directory.
///
/// Sharding exists purely to spread lock contention across threads inserting/erasing
/// concurrently; a given entity always lives in exactly one shard for its whole lifetime (the
/// shard index is baked into its [`Handle::storage`] field at creation).
pub struct SlotMap {
    storage_index: u8,
    slots: Vec<Slot>,
    free_head: i64,
    len: usize,
}

impl SlotMap {
    pub fn new(storage_index: u8) -> SlotMap {
        SlotMap { storage_index, slots: Vec::new(), free_head: NO_FREE, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocate a fresh slot pointing at `(archetype, row)`, returning its handle.
    pub fn insert(&mut self, archetype: u32, row: u32) -> Result<Handle> {
        let index = if self.free_head != NO_FREE {
            let index = self.free_head as usize;
            self.free_head = self.slots[index].next_free;
            let slot = &mut self.slots[index];
            slot.next_free = NO_FREE;
            slot.archetype = archetype;
            slot.row = row;
            index
        } else {
            if self.slots.len() >= u32::MAX as usize {
                return Err(EcrError::OutOfCapacity);
            }
            let index = self.slots.len();
            self.slots.push(Slot { version: 0, next_free: NO_FREE, archetype, row });
            index
        };
        self.len += 1;
        Ok(Handle::new(index as u32, self.slots[index].version, self.storage_index))
    }

    /// The `(archetype, row)` a live handle currently names, or `None` if it is dead.
    pub fn get(&self, handle: Handle) -> Option<(u32, u32)> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.version != handle.version() {
            return None;
        }
        Some((slot.archetype, slot.row))
    }

    pub fn is_alive(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Retarget a live handle's slot to a new `(archetype, row)`, e.g. after a migration or a
    /// swap-with-last displacement. No-op (returns `false`) if the handle is already dead.
    pub fn retarget(&mut self, handle: Handle, archetype: u32, row: u32) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index() as usize) else { return false };
        if slot.version != handle.version() {
            return false;
        }
        slot.archetype = archetype;
        slot.row = row;
        true
    }

    /// Free `handle`'s slot: bump its version (wrapping within the version field's bit width)
    /// and return it to the free list. No-op if the handle is already dead.
    pub fn erase(&mut self, handle: Handle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index() as usize) else { return false };
        if slot.version != handle.version() {
            return false;
        }
        slot.version = (slot.version + 1) & VERSION_MASK;
        slot.next_free = self.free_head;
        self.free_head = handle.index() as i64;
        self.len -= 1;
        true
    }

    /// Free every slot, bumping every version so outstanding handles die.
    pub fn clear(&mut self) {
        let n = self.slots.len();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.version = (slot.version + 1) & VERSION_MASK;
            slot.next_free = if i + 1 < n { i as i64 + 1 } else { NO_FREE };
        }
        self.free_head = if n == 0 { NO_FREE } else { 0 };
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_erase_roundtrip() {
        let mut map = SlotMap::new(0);
        let h = map.insert(1, 2).unwrap();
        assert_eq!(map.get(h), Some((1, 2)));
        assert!(map.erase(h));
        assert_eq!(map.get(h), None);
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn reused_slot_gets_new_version() {
        let mut map = SlotMap::new(0);
        let h1 = map.insert(0, 0).unwrap();
        map.erase(h1);
        let h2 = map.insert(5, 6).unwrap();
        assert_eq!(h1.index(), h2.index(), "free slot is reused");
        assert_ne!(h1.version(), h2.version(), "reused slot gets a fresh version");
        assert_eq!(map.get(h1), None, "old handle stays dead");
        assert_eq!(map.get(h2), Some((5, 6)));
    }

    #[test]
    fn retarget_moves_live_handle() {
        let mut map = SlotMap::new(0);
        let h = map.insert(0, 0).unwrap();
        assert!(map.retarget(h, 3, 4));
        assert_eq!(map.get(h), Some((3, 4)));
    }

    #[test]
    fn erase_on_already_dead_handle_is_a_no_op() {
        let mut map = SlotMap::new(0);
        let h = map.insert(0, 0).unwrap();
        map.erase(h);
        assert!(!map.erase(h));
    }

    #[test]
    fn storage_index_is_stamped_into_every_handle() {
        let mut map = SlotMap::new(7);
        let h = map.insert(0, 0).unwrap();
        assert_eq!(h.storage(), 7);
    }

    #[test]
    fn free_list_reuses_slots_in_lifo_order() {
        let mut map = SlotMap::new(0);
        let a = map.insert(0, 0).unwrap();
        let b = map.insert(0, 1).unwrap();
        map.erase(a);
        map.erase(b);
        let c = map.insert(0, 2).unwrap();
        assert_eq!(c.index(), b.index());
    }
}

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

//! Archetypes: dense, structure-of-arrays storage for one exact component/tag signature.
//!
//! An archetype never shrinks its signature in place; adding or removing a component or tag
//! always means moving an entity's row into a different archetype via [`Archetype::move_from`].
//! Within a single archetype, rows stay dense: [`Archetype::erase_row`] always swaps the tail
//! row into the freed slot, matching [`crate::column::Column::swap_remove`].

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::column::Column;
use crate::component::Component;
use crate::handle::Handle;
use crate::signature::Signature;

/// Maximum number of component types a single [`Bundle`] may carry.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// A single archetype: one signature, one set of dense columns, one handle column.
pub struct Archetype {
    signature: Signature,
    segment_bits: u32,
    entities: Vec<Handle>,
    columns: Vec<Column>,
    column_index: FxHashMap<u64, usize>,
    /// Bumped on every structural mutation (insert, erase, migration in or out). Exposed to
    /// callers that want a cheap "did anything change" probe without diffing rows.
    change_counter: u64,
}

impl Archetype {
    /// An empty archetype for `signature`, with no columns registered yet.
    pub fn new(signature: Signature, segment_bits: u32) -> Archetype {
        Archetype {
            signature,
            segment_bits,
            entities: Vec::new(),
            columns: Vec::new(),
            column_index: FxHashMap::default(),
            change_counter: 0,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn change_counter(&self) -> u64 {
        self.change_counter
    }

    /// Approximate heap bytes retained by this archetype's columns (excludes the handle
    /// vector and bookkeeping maps, which are small relative to component storage).
    pub fn byte_size(&self) -> usize {
        self.columns.iter().map(Column::byte_size).sum()
    }

    /// The handles of every row currently stored, in row order. Rows erased during an active
    /// iteration but not yet flushed hold [`Handle::INVALID`].
    pub fn entities(&self) -> &[Handle] {
        &self.entities
    }

    pub fn handle_at(&self, row: usize) -> Handle {
        self.entities[row]
    }

    /// Overwrite the handle column at `row`, without touching any component column.
    ///
    /// Used by [`crate::registry::Registry::swap`] to exchange which entity a pair of rows
    /// identifies; the caller is responsible for retargeting the affected handles' slots to
    /// match.
    pub(crate) fn set_handle_at(&mut self, row: usize, handle: Handle) {
        self.entities[row] = handle;
    }

    /// Whether `key` (a component type key or a tag key) is part of this archetype's shape.
    pub fn has(&self, key: u64) -> bool {
        self.signature.contains(key)
    }

    /// Type keys of this archetype's columns, in column order. A subset of
    /// [`Archetype::signature`]: tag keys have no backing column.
    pub fn column_keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.columns.iter().map(|c| c.type_key())
    }

    fn column(&self, type_key: u64) -> Option<&Column> {
        self.column_index.get(&type_key).map(|&i| &self.columns[i])
    }

    fn column_mut(&mut self, type_key: u64) -> Option<&mut Column> {
        self.column_index.get(&type_key).map(|&i| &mut self.columns[i])
    }

    /// Register a column for `T` if one is not already present; a no-op otherwise.
    ///
    /// Does not touch `self.signature` or extend existing rows: callers that add a column to
    /// a non-empty archetype must immediately give every existing row a value (or this
    /// archetype violates its own row-alignment invariant).
    pub(crate) fn register_column<T: Component>(&mut self, type_key: u64) {
        if self.column_index.contains_key(&type_key) {
            return;
        }
        let idx = self.columns.len();
        self.columns.push(Column::new::<T>(type_key, self.segment_bits));
        self.column_index.insert(type_key, idx);
    }

    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.column(crate::component::type_key::<T>()).map(|c| c.get::<T>(row))
    }

    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        let key = crate::component::type_key::<T>();
        self.column_mut(key).map(|c| c.get_mut::<T>(row))
    }

    pub fn put<T: Component>(&mut self, row: usize, value: T) -> bool {
        let key = crate::component::type_key::<T>();
        match self.column_mut(key) {
            Some(c) => {
                c.put(row, value);
                self.change_counter += 1;
                true
            }
            None => false,
        }
    }

    /// Insert a brand new row built from `bundle`, appending to every column in lockstep.
    /// Returns the new row index.
    pub fn insert<B: Bundle>(&mut self, handle: Handle, bundle: B) -> usize {
        let row = self.entities.len();
        self.entities.push(handle);
        bundle.write_or_overwrite(self, row);
        self.change_counter += 1;
        row
    }

    /// Remove `row` immediately, swapping the tail row into its place.
    ///
    /// Returns the handle that used to own the tail row if a swap actually happened (i.e. the
    /// caller must update that handle's slot-map entry to point at `row`), or
    /// [`Handle::INVALID`] if `row` was already the tail.
    pub fn erase_row(&mut self, row: usize) -> Handle {
        let last = self.entities.len() - 1;
        let moved = if row != last { Some(self.entities[last]) } else { None };
        self.entities.swap_remove(row);
        for col in &mut self.columns {
            col.swap_remove(row);
        }
        self.change_counter += 1;
        moved.unwrap_or(Handle::INVALID)
    }

    /// Like [`Archetype::erase_row`], but columns whose type key is in `moved_keys` are
    /// retired without running their drop glue: their values have already been relocated into
    /// a destination archetype by [`Archetype::move_from`].
    fn erase_row_for_migration(&mut self, row: usize, moved_keys: &[u64]) -> Handle {
        let last = self.entities.len() - 1;
        let moved = if row != last { Some(self.entities[last]) } else { None };
        self.entities.swap_remove(row);
        for col in &mut self.columns {
            if moved_keys.contains(&col.type_key()) {
                col.swap_remove_no_drop(row);
            } else {
                col.swap_remove(row);
            }
        }
        self.change_counter += 1;
        moved.unwrap_or(Handle::INVALID)
    }

    /// Mark `row` as erased without physically removing it: overwrite its handle with
    /// [`Handle::INVALID`] and leave every column's bytes at `row` untouched.
    ///
    /// Used when the erase happens at or before the row an in-progress view iteration is
    /// currently visiting; the real removal is deferred to [`Archetype::flush_gaps`] so the
    /// iteration's row indices stay stable while it runs.
    pub(crate) fn mark_gap(&mut self, row: usize) {
        self.entities[row] = Handle::INVALID;
    }

    /// Physically remove every row in `gaps` (in any order), swapping tails into freed slots.
    ///
    /// Returns `(relocated_handle, new_row)` for every entity that was moved into a gap's
    /// slot, so the caller can fix up its slot-map entry.
    pub(crate) fn flush_gaps(&mut self, mut gaps: Vec<usize>) -> Vec<(Handle, usize)> {
        gaps.sort_unstable_by(|a, b| b.cmp(a));
        gaps.dedup();
        let mut relocations = Vec::with_capacity(gaps.len());
        for row in gaps {
            let moved = self.erase_row(row);
            if moved.is_valid() {
                relocations.push((moved, row));
            }
        }
        relocations
    }

    /// Relocate the row at `other_row` of `other` into a new tail row of `self`.
    ///
    /// Only columns common to both archetypes are moved; columns unique to `self` (newly
    /// added component types) are left at their previous length and must be given a value by
    /// the caller (see [`Bundle::write_or_overwrite`]) before the archetype is next observed.
    /// Columns unique to `other` (component types being removed) are dropped from `other`.
    ///
    /// Returns `(new_row, displaced_handle)`, where `displaced_handle` is the entity that used
    /// to occupy `other`'s tail row if `other_row` was not already the tail (see
    /// [`Archetype::erase_row`]).
    pub fn move_from(&mut self, other: &mut Archetype, other_row: usize) -> (usize, Handle) {
        let handle = other.entities[other_row];
        let new_row = self.entities.len();
        let mut moved_keys: SmallVec<[u64; 8]> = SmallVec::new();
        for col in &mut self.columns {
            if let Some(src_col) = other.column(col.type_key()) {
                col.relocate_append(src_col, other_row);
                moved_keys.push(col.type_key());
            }
        }
        self.entities.push(handle);
        self.change_counter += 1;
        let displaced = other.erase_row_for_migration(other_row, &moved_keys);
        (new_row, displaced)
    }

    /// Build an empty archetype with the same columns as `self`, minus any key in
    /// `ignore_keys`.
    ///
    /// Used for component/tag removal: the destination archetype's shape is always a subset
    /// of the source's, so every one of its columns can be cloned (empty) from the source
    /// without knowing any concrete component type at the call site.
    pub fn clone_shape(&self, ignore_keys: &[u64]) -> Archetype {
        let new_signature = self.signature.without(ignore_keys);
        let mut archetype = Archetype::new(new_signature, self.segment_bits);
        for col in &self.columns {
            if !ignore_keys.contains(&col.type_key()) {
                let idx = archetype.columns.len();
                archetype.columns.push(col.empty_like());
                archetype.column_index.insert(col.type_key(), idx);
            }
        }
        archetype
    }

    /// Widen this archetype's signature to also carry every key in `added_keys`.
    ///
    /// Only touches the signature; callers adding component types must still call
    /// [`Archetype::register_column`] for each one.
    pub(crate) fn extend_signature(&mut self, added_keys: &[u64]) {
        let mut sig = self.signature.clone();
        for key in added_keys {
            sig = sig.with(*key);
        }
        self.signature = sig;
    }
}

/// A fixed-arity set of component values that can be written into an archetype row in one
/// shot, used by [`crate::registry::Registry::put`].
///
/// Implemented for tuples of up to [`MAX_BUNDLE_COMPONENTS`] distinct [`Component`] types.
pub trait Bundle: 'static {
    /// The stable type key of every component in the bundle, in declaration order.
    fn type_keys() -> SmallVec<[u64; MAX_BUNDLE_COMPONENTS]>;

    /// Register a column for every component type in the bundle that `archetype` does not
    /// already carry.
    fn ensure_columns(archetype: &mut Archetype);

    /// Write every value at `row`: overwrite if the column already reached `row` (the type
    /// pre-existed and this is a value update), or push if it did not (the type is new to
    /// this archetype and `row` is the first value it needs).
    fn write_or_overwrite(self, archetype: &mut Archetype, row: usize);
}

macro_rules! impl_bundle {
    ($($t:ident),+) => {
        impl<$($t: Component),+> Bundle for ($($t,)+) {
            fn type_keys() -> SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> {
                let mut keys = SmallVec::new();
                $(keys.push(crate::component::type_key::<$t>());)+
                keys
            }

            fn ensure_columns(archetype: &mut Archetype) {
                $(archetype.register_column::<$t>(crate::component::type_key::<$t>());)+
            }

            #[allow(non_snake_case)]
            fn write_or_overwrite(self, archetype: &mut Archetype, row: usize) {
                let ($($t,)+) = self;
                $(
                    let key = crate::component::type_key::<$t>();
                    let needs_push = archetype.column(key).map(|c| c.len() == row).unwrap_or(true);
                    if needs_push {
                        archetype.column_mut(key).expect("column registered by ensure_columns").push($t);
                    } else {
                        archetype.put(row, $t);
                    }
                )+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::type_key;

    fn sig_for<B: Bundle>() -> Signature {
        Signature::from_keys(B::type_keys())
    }

    #[test]
    fn insert_and_read_single_component() {
        let mut arch = Archetype::new(sig_for::<(i32,)>(), 5);
        <(i32,)>::ensure_columns(&mut arch);
        let h = Handle::new(0, 0, 0);
        let row = arch.insert(h, (7i32,));
        assert_eq!(row, 0);
        assert_eq!(*arch.get::<i32>(0).unwrap(), 7);
        assert_eq!(arch.len(), 1);
    }

    #[test]
    fn put_overwrites_existing_value() {
        let mut arch = Archetype::new(sig_for::<(i32,)>(), 5);
        <(i32,)>::ensure_columns(&mut arch);
        let h = Handle::new(0, 0, 0);
        arch.insert(h, (7i32,));
        assert!(arch.put(0, 42i32));
        assert_eq!(*arch.get::<i32>(0).unwrap(), 42);
    }

    #[test]
    fn erase_row_swaps_tail_in_and_reports_displaced_handle() {
        let mut arch = Archetype::new(sig_for::<(i32,)>(), 5);
        <(i32,)>::ensure_columns(&mut arch);
        let h0 = Handle::new(0, 0, 0);
        let h1 = Handle::new(1, 0, 0);
        let h2 = Handle::new(2, 0, 0);
        arch.insert(h0, (1i32,));
        arch.insert(h1, (2i32,));
        arch.insert(h2, (3i32,));

        let displaced = arch.erase_row(0);
        assert_eq!(displaced, h2, "tail entity moved into the freed row");
        assert_eq!(arch.len(), 2);
        assert_eq!(*arch.get::<i32>(0).unwrap(), 3);
        assert_eq!(arch.handle_at(0), h2);
    }

    #[test]
    fn mark_gap_then_flush_runs_exactly_one_swap_remove() {
        let mut arch = Archetype::new(sig_for::<(i32,)>(), 5);
        <(i32,)>::ensure_columns(&mut arch);
        for i in 0..4i32 {
            arch.insert(Handle::new(i as u32, 0, 0), (i,));
        }
        arch.mark_gap(1);
        assert_eq!(arch.handle_at(1), Handle::INVALID);
        assert_eq!(arch.len(), 4, "row stays physically present until flush");

        let relocations = arch.flush_gaps(vec![1]);
        assert_eq!(arch.len(), 3);
        assert_eq!(relocations, vec![(Handle::new(3, 0, 0), 1)]);
        assert_eq!(*arch.get::<i32>(1).unwrap(), 3);
    }

    #[test]
    fn move_from_relocates_common_columns_and_retires_unique_ones() {
        use std::sync::atomic::{AtomicI32, Ordering};
        use std::sync::Arc;

        struct Tracked(Arc<AtomicI32>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(AtomicI32::new(0));
        let mut src = Archetype::new(Signature::from_keys([type_key::<i32>(), type_key::<Tracked>()]), 5);
        src.register_column::<i32>(type_key::<i32>());
        src.register_column::<Tracked>(type_key::<Tracked>());
        let h = Handle::new(0, 0, 0);
        let row = src.entities.len();
        src.entities.push(h);
        src.column_mut(type_key::<i32>()).unwrap().push(9i32);
        src.column_mut(type_key::<Tracked>()).unwrap().push(Tracked(counter.clone()));

        // destination keeps i32 but drops Tracked (component removal).
        let mut dst = src.clone_shape(&[type_key::<Tracked>()]);
        let (new_row, displaced) = dst.move_from(&mut src, row);
        assert_eq!(new_row, 0);
        assert!(!displaced.is_valid(), "only row in the archetype, no tail to displace");
        assert_eq!(*dst.get::<i32>(0).unwrap(), 9);
        assert_eq!(src.len(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "Tracked dropped exactly once when removed during migration");
    }

    #[test]
    fn set_handle_at_overwrites_only_the_handle_column() {
        let mut arch = Archetype::new(sig_for::<(i32,)>(), 5);
        <(i32,)>::ensure_columns(&mut arch);
        let h0 = Handle::new(0, 0, 0);
        let h1 = Handle::new(1, 0, 0);
        arch.insert(h0, (1i32,));
        arch.insert(h1, (2i32,));

        arch.set_handle_at(0, h1);
        arch.set_handle_at(1, h0);
        assert_eq!(arch.handle_at(0), h1);
        assert_eq!(arch.handle_at(1), h0);
        assert_eq!(*arch.get::<i32>(0).unwrap(), 1, "component values are untouched");
        assert_eq!(*arch.get::<i32>(1).unwrap(), 2);
    }

    #[test]
    fn move_from_leaves_new_columns_for_caller_to_fill() {
        let mut src = Archetype::new(sig_for::<(i32,)>(), 5);
        <(i32,)>::ensure_columns(&mut src);
        let h = Handle::new(0, 0, 0);
        src.insert(h, (5i32,));

        let mut dst = src.clone_shape(&[]);
        <(i32, f64)>::ensure_columns(&mut dst);
        dst.extend_signature(&[type_key::<f64>()]);
        let (new_row, _) = dst.move_from(&mut src, 0);
        assert_eq!(dst.get::<i32>(new_row).copied(), Some(5));
        <(i32, f64)>::write_or_overwrite((5i32, 3.5f64), &mut dst, new_row);
        assert_eq!(*dst.get::<f64>(new_row).unwrap(), 3.5);
    }
}

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

//! The registry: the archetype directory, the sharded slot map, and the public entity API.
//!
//! Lock hierarchy, always acquired in this order: the directory lock (R), then an archetype's
//! lock (A) — two archetype locks at once (only during migration) are taken in ascending
//! pointer order — then a slot-map shard lock (S). Nothing ever acquires R while already
//! holding an A or S lock.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, Bundle, MAX_BUNDLE_COMPONENTS};
use crate::component::{type_key, Component};
use crate::config::RegistryConfig;
use crate::error::{EcrError, Result};
use crate::handle::Handle;
use crate::safe_ref::{ComponentRef, ComponentRefMut};
use crate::signature::Signature;
use crate::slotmap::SlotMap;
use crate::view::{Fetch, View};

struct DirectoryEntry {
    signature: Signature,
    archetype: Arc<Mutex<Archetype>>,
}

#[derive(Default)]
struct Directory {
    entries: Vec<DirectoryEntry>,
    by_hash: FxHashMap<u64, SmallVec<[usize; 1]>>,
}

impl Directory {
    fn find(&self, hash: u64, signature: &Signature) -> Option<usize> {
        self.by_hash.get(&hash)?.iter().copied().find(|&idx| &self.entries[idx].signature == signature)
    }
}

/// Per-thread bookkeeping for an in-progress [`View`] pass over one archetype.
///
/// While a frame for archetype `a` is on the stack, [`Registry::erase`] targeting an entity in
/// `a` always defers (marks a gap instead of swapping immediately) so the view's row indices
/// stay stable until it releases that archetype. Views must be driven to completion or dropped
/// before a *different*, non-nested view begins on the same registry from the same thread;
/// properly nested views (one started from inside another's loop body) are supported, since the
/// whole stack — not just the top — is searched for a matching archetype.
pub(crate) struct IterFrame {
    archetype_index: usize,
    gaps: Vec<usize>,
}

impl IterFrame {
    fn new(archetype_index: usize) -> IterFrame {
        IterFrame { archetype_index, gaps: Vec::new() }
    }

    pub(crate) fn into_gaps(self) -> Vec<usize> {
        self.gaps
    }
}

thread_local! {
    static ITERATING: RefCell<Vec<IterFrame>> = RefCell::new(Vec::new());
    static SHARD_PICKER: Cell<u32> = const { Cell::new(0) };
}

pub(crate) fn push_iter_frame(archetype_index: usize) {
    ITERATING.with(|stack| stack.borrow_mut().push(IterFrame::new(archetype_index)));
}

pub(crate) fn pop_iter_frame() -> IterFrame {
    ITERATING.with(|stack| stack.borrow_mut().pop().expect("pop_iter_frame called without a matching push"))
}

/// The central entity directory: archetype storage plus handle indirection.
pub struct Registry {
    directory: RwLock<Directory>,
    shards: Vec<RwLock<SlotMap>>,
    config: RegistryConfig,
    type_names: Mutex<FxHashMap<u64, String>>,
    tag_names: Mutex<FxHashMap<u64, String>>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Result<Registry> {
        let config = config.validated()?;
        let shards = (0..config.slotmap_shards).map(|i| RwLock::new(SlotMap::new(i as u8))).collect();
        Ok(Registry {
            directory: RwLock::new(Directory::default()),
            shards,
            config,
            type_names: Mutex::new(FxHashMap::default()),
            tag_names: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Total number of live entities across every shard.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a human-readable name for a component type, used by [`crate::snapshot`].
    pub fn name_type<T: Component>(&self, name: impl Into<String>) {
        self.type_names.lock().insert(type_key::<T>(), name.into());
    }

    /// Register a human-readable name for a tag key, used by [`crate::snapshot`].
    pub fn name_tag(&self, tag: u64, name: impl Into<String>) {
        self.tag_names.lock().insert(tag, name.into());
    }

    pub(crate) fn type_name(&self, key: u64) -> Option<String> {
        self.type_names.lock().get(&key).cloned()
    }

    pub(crate) fn tag_name(&self, key: u64) -> Option<String> {
        self.tag_names.lock().get(&key).cloned()
    }

    fn pick_shard(&self) -> usize {
        SHARD_PICKER.with(|cell| {
            let next = cell.get().wrapping_add(1);
            cell.set(next);
            next as usize % self.shards.len()
        })
    }

    pub(crate) fn shard_index(&self, handle: Handle) -> usize {
        handle.storage() as usize % self.shards.len()
    }

    fn resolve(&self, handle: Handle) -> Result<(u32, u32)> {
        self.shards[self.shard_index(handle)].read().get(handle).ok_or(EcrError::DeadHandle)
    }

    pub(crate) fn archetype_by_index(&self, index: usize) -> Arc<Mutex<Archetype>> {
        self.directory.read().entries[index].archetype.clone()
    }

    pub(crate) fn archetype_count(&self) -> usize {
        self.directory.read().entries.len()
    }

    pub(crate) fn archetype_signature(&self, index: usize) -> Signature {
        self.directory.read().entries[index].signature.clone()
    }

    fn lock_pair<'a>(
        &self,
        a: &'a Arc<Mutex<Archetype>>,
        b: &'a Arc<Mutex<Archetype>>,
    ) -> (MutexGuard<'a, Archetype>, MutexGuard<'a, Archetype>) {
        if (Arc::as_ptr(a) as usize) <= (Arc::as_ptr(b) as usize) {
            let ga = a.lock();
            let gb = b.lock();
            (ga, gb)
        } else {
            let gb = b.lock();
            let ga = a.lock();
            (ga, gb)
        }
    }

    /// Find the archetype with exactly `signature`, creating it (via `shape`) if absent.
    fn find_or_create_plain(
        &self,
        signature: &Signature,
        shape: impl FnOnce() -> Archetype,
    ) -> (usize, Arc<Mutex<Archetype>>) {
        let hash = signature.hash();
        let dir = self.directory.upgradable_read();
        if let Some(idx) = dir.find(hash, signature) {
            return (idx, dir.entries[idx].archetype.clone());
        }
        let mut dir = RwLockUpgradableReadGuard::upgrade(dir);
        if let Some(idx) = dir.find(hash, signature) {
            return (idx, dir.entries[idx].archetype.clone());
        }
        let new_archetype = shape();
        let idx = dir.entries.len();
        #[cfg(feature = "profiling")]
        tracing::debug!(archetype_index = idx, signature_hash = hash, key_count = signature.len(), "created archetype");
        let arc = Arc::new(Mutex::new(new_archetype));
        dir.entries.push(DirectoryEntry { signature: signature.clone(), archetype: arc.clone() });
        dir.by_hash.entry(hash).or_default().push(idx);
        (idx, arc)
    }

    /// Find the archetype with exactly `dest_signature`, creating it by cloning `src_arc`'s
    /// shape (via `shape`) if absent. `shape` is only invoked while the directory's exclusive
    /// lock is held and `src_arc` is briefly locked, so it always sees a consistent snapshot.
    fn find_or_create_related(
        &self,
        src_arc: &Arc<Mutex<Archetype>>,
        dest_signature: &Signature,
        shape: impl FnOnce(&Archetype) -> Archetype,
    ) -> (usize, Arc<Mutex<Archetype>>) {
        self.find_or_create_plain(dest_signature, || shape(&src_arc.lock()))
    }

    /// Create a new entity holding the components in `bundle`.
    pub fn insert<B: Bundle>(&self, bundle: B) -> Result<Handle> {
        let signature = Signature::from_keys(B::type_keys());
        let (arch_idx, arch_arc) = self.find_or_create_plain(&signature, || {
            let mut a = Archetype::new(signature.clone(), self.config.segment_bits);
            B::ensure_columns(&mut a);
            a
        });

        let mut guard = arch_arc.lock();
        let row = guard.len();
        let shard_idx = self.pick_shard();
        let handle = self.shards[shard_idx].write().insert(arch_idx as u32, row as u32)?;
        guard.insert(handle, bundle);
        Ok(handle)
    }

    pub fn exists(&self, handle: Handle) -> bool {
        self.shards[self.shard_index(handle)].read().is_alive(handle)
    }

    pub fn has<T: Component>(&self, handle: Handle) -> Result<bool> {
        let (arch_idx, _) = self.resolve(handle)?;
        Ok(self.archetype_by_index(arch_idx as usize).lock().has(type_key::<T>()))
    }

    /// Whether `handle`'s current signature carries `tag_key`.
    ///
    /// Tags have no Rust type to monomorphize [`Registry::has`] over, so a runtime key is
    /// checked directly against the archetype's signature instead.
    pub fn has_tag(&self, handle: Handle, tag_key: u64) -> Result<bool> {
        let (arch_idx, _) = self.resolve(handle)?;
        Ok(self.archetype_signature(arch_idx as usize).contains(tag_key))
    }

    /// The full set of component and tag keys currently on `handle`.
    pub fn types(&self, handle: Handle) -> Result<Signature> {
        let (arch_idx, _) = self.resolve(handle)?;
        Ok(self.archetype_signature(arch_idx as usize))
    }

    /// Read a copy of `T`'s current value on `handle`.
    pub fn get<T: Component + Clone>(&self, handle: Handle) -> Result<T> {
        self.read_component::<T>(handle).ok_or(EcrError::MissingComponent)
    }

    /// A safe, revalidating reference to `T` on `handle` (see [`ComponentRef`]).
    pub fn get_ref<T: Component>(&self, handle: Handle) -> Result<ComponentRef<'_, T>> {
        if !self.has::<T>(handle)? {
            return Err(EcrError::MissingComponent);
        }
        Ok(ComponentRef::new(self, handle))
    }

    /// A safe, revalidating mutable reference to `T` on `handle` (see [`ComponentRefMut`]).
    pub fn get_mut_ref<T: Component>(&self, handle: Handle) -> Result<ComponentRefMut<'_, T>> {
        if !self.has::<T>(handle)? {
            return Err(EcrError::MissingComponent);
        }
        Ok(ComponentRefMut::new(self, handle))
    }

    pub(crate) fn read_component<T: Component + Clone>(&self, handle: Handle) -> Option<T> {
        let (arch_idx, row) = self.resolve(handle).ok()?;
        self.archetype_by_index(arch_idx as usize).lock().get::<T>(row as usize).cloned()
    }

    /// Revalidate `handle` against `T`, then hand `f` a mutable reference to its current value
    /// for the duration of the call. The archetype lock is held only for `f`'s body, matching
    /// [`Registry::read_component`]'s "no lock held between calls" rule.
    pub(crate) fn write_component<T: Component, R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let (arch_idx, row) = self.resolve(handle).ok()?;
        let archetype = self.archetype_by_index(arch_idx as usize);
        let mut guard = archetype.lock();
        let value = guard.get_mut::<T>(row as usize)?;
        Some(f(value))
    }

    pub(crate) fn component_exists(&self, handle: Handle, type_key: u64) -> bool {
        match self.resolve(handle) {
            Ok((arch_idx, _)) => self.archetype_by_index(arch_idx as usize).lock().has(type_key),
            Err(_) => false,
        }
    }

    /// Write `bundle`'s values onto `handle`, migrating to a new archetype if any of its
    /// component types are not already part of the entity's shape.
    pub fn put<B: Bundle>(&self, handle: Handle, bundle: B) -> Result<()> {
        loop {
            let (src_idx, row) = self.resolve(handle)?;
            let src_signature = self.archetype_signature(src_idx as usize);
            let new_keys: SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> =
                B::type_keys().into_iter().filter(|k| !src_signature.contains(*k)).collect();
            let src_arc = self.archetype_by_index(src_idx as usize);

            if new_keys.is_empty() {
                let mut guard = src_arc.lock();
                if self.resolve(handle).ok() != Some((src_idx, row)) {
                    continue;
                }
                bundle.write_or_overwrite(&mut guard, row as usize);
                return Ok(());
            }

            let dest_signature = src_signature.with_all(&new_keys);
            let (dest_idx, dest_arc) = self.find_or_create_related(&src_arc, &dest_signature, |src| {
                let mut a = src.clone_shape(&[]);
                B::ensure_columns(&mut a);
                a.extend_signature(&new_keys);
                a
            });

            let (mut src_guard, mut dest_guard) = self.lock_pair(&src_arc, &dest_arc);
            if self.resolve(handle).ok() != Some((src_idx, row)) {
                drop(src_guard);
                drop(dest_guard);
                continue;
            }
            let (new_row, displaced) = dest_guard.move_from(&mut src_guard, row as usize);
            bundle.write_or_overwrite(&mut dest_guard, new_row);
            drop(src_guard);
            drop(dest_guard);

            #[cfg(feature = "profiling")]
            tracing::trace!(from = src_idx, to = dest_idx, row, new_row, "migrated entity row for put");

            if displaced.is_valid() {
                let moved_shard = self.shard_index(displaced);
                self.shards[moved_shard].write().retarget(displaced, src_idx, row);
            }
            let dest_shard = self.shard_index(handle);
            self.shards[dest_shard].write().retarget(handle, dest_idx as u32, new_row as u32);
            return Ok(());
        }
    }

    /// Remove every component type in `B` from `handle`, migrating to the archetype missing
    /// exactly those types.
    pub fn erase_components<B: Bundle>(&self, handle: Handle) -> Result<()> {
        let remove_keys = B::type_keys();
        self.shrink_signature(handle, &remove_keys, true)
    }

    pub fn add_tags(&self, handle: Handle, tags: &[u64]) -> Result<()> {
        loop {
            let (src_idx, row) = self.resolve(handle)?;
            let src_signature = self.archetype_signature(src_idx as usize);
            let new_tags: SmallVec<[u64; 4]> = tags.iter().copied().filter(|k| !src_signature.contains(*k)).collect();
            if new_tags.is_empty() {
                return Ok(());
            }
            let src_arc = self.archetype_by_index(src_idx as usize);
            let dest_signature = src_signature.with_all(&new_tags);
            let (dest_idx, dest_arc) = self.find_or_create_related(&src_arc, &dest_signature, |src| {
                let mut a = src.clone_shape(&[]);
                a.extend_signature(&new_tags);
                a
            });
            if self.migrate_row(handle, src_idx, row, &src_arc, dest_idx, &dest_arc)? {
                return Ok(());
            }
        }
    }

    /// Removing a tag that is not currently set is a no-op, unlike removing a component type
    /// the entity does not have (see [`Registry::erase_components`]).
    pub fn erase_tags(&self, handle: Handle, tags: &[u64]) -> Result<()> {
        self.shrink_signature(handle, tags, false)
    }

    /// Shared path for component removal and tag removal: both just drop keys from the
    /// signature and clone the surviving columns, so `clone_shape` does all the work.
    ///
    /// `error_if_missing` distinguishes the two callers: `erase_components` treats a type the
    /// entity doesn't carry as a caller error, `erase_tags` silently ignores a tag that was
    /// never set.
    fn shrink_signature(&self, handle: Handle, remove_keys: &[u64], error_if_missing: bool) -> Result<()> {
        loop {
            let (src_idx, row) = self.resolve(handle)?;
            let src_signature = self.archetype_signature(src_idx as usize);
            if error_if_missing && !src_signature.is_superset_of(remove_keys) {
                return Err(EcrError::MissingComponent);
            }
            let present_keys: SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> =
                remove_keys.iter().copied().filter(|k| src_signature.contains(*k)).collect();
            if present_keys.is_empty() {
                return Ok(());
            }
            let dest_signature = src_signature.without(&present_keys);
            let src_arc = self.archetype_by_index(src_idx as usize);
            let (dest_idx, dest_arc) =
                self.find_or_create_related(&src_arc, &dest_signature, |src| src.clone_shape(&present_keys));
            if self.migrate_row(handle, src_idx, row, &src_arc, dest_idx, &dest_arc)? {
                return Ok(());
            }
        }
    }

    /// Move `handle`'s row from `src_idx` to `dest_idx`, re-validating under lock. Returns
    /// `Ok(false)` if the entity moved out from under us between resolving and locking (the
    /// caller should recompute everything and retry).
    fn migrate_row(
        &self,
        handle: Handle,
        src_idx: u32,
        row: u32,
        src_arc: &Arc<Mutex<Archetype>>,
        dest_idx: usize,
        dest_arc: &Arc<Mutex<Archetype>>,
    ) -> Result<bool> {
        let (mut src_guard, mut dest_guard) = self.lock_pair(src_arc, dest_arc);
        if self.resolve(handle).ok() != Some((src_idx, row)) {
            return Ok(false);
        }
        let (new_row, displaced) = dest_guard.move_from(&mut src_guard, row as usize);
        drop(src_guard);
        drop(dest_guard);

        #[cfg(feature = "profiling")]
        tracing::trace!(from = src_idx, to = dest_idx, row, new_row, "migrated entity row");

        if displaced.is_valid() {
            let moved_shard = self.shard_index(displaced);
            self.shards[moved_shard].write().retarget(displaced, src_idx, row);
        }
        let dest_shard = self.shard_index(handle);
        self.shards[dest_shard].write().retarget(handle, dest_idx as u32, new_row as u32);
        Ok(true)
    }

    /// Remove `handle` if it is alive; a no-op otherwise.
    pub fn erase(&self, handle: Handle) -> Result<()> {
        let shard_idx = self.shard_index(handle);
        let Some((archetype_index, row)) = self.shards[shard_idx].read().get(handle) else {
            return Ok(());
        };

        let deferred = ITERATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(frame) = stack.iter_mut().rev().find(|f| f.archetype_index == archetype_index as usize) {
                frame.gaps.push(row as usize);
                true
            } else {
                false
            }
        });

        if deferred {
            self.archetype_by_index(archetype_index as usize).lock().mark_gap(row as usize);
            self.shards[shard_idx].write().erase(handle);
            return Ok(());
        }

        let moved = self.archetype_by_index(archetype_index as usize).lock().erase_row(row as usize);
        if moved.is_valid() {
            let moved_shard = self.shard_index(moved);
            self.shards[moved_shard].write().retarget(moved, archetype_index, row);
        }
        self.shards[shard_idx].write().erase(handle);
        Ok(())
    }

    /// Exchange which entity `h1` and `h2` name: each ends up pointing at the row the other
    /// used to, and each archetype's handle column is rewritten so that row reports its new
    /// owner. Pure slot/handle-column bookkeeping — no component values move, no version is
    /// bumped, and (unlike [`Registry::put`]/[`Registry::erase_components`]) no archetype
    /// lookup or migration happens, since neither handle's signature changes.
    ///
    /// Returns `DeadHandle` if either handle is already dead; a no-op returning `Ok(true)` if
    /// `h1 == h2`.
    pub fn swap(&self, h1: Handle, h2: Handle) -> Result<bool> {
        let (arch1, row1) = self.resolve(h1)?;
        let (arch2, row2) = self.resolve(h2)?;
        if h1 == h2 {
            return Ok(true);
        }

        let arc1 = self.archetype_by_index(arch1 as usize);
        let arc2 = self.archetype_by_index(arch2 as usize);
        if Arc::ptr_eq(&arc1, &arc2) {
            let mut guard = arc1.lock();
            guard.set_handle_at(row1 as usize, h2);
            guard.set_handle_at(row2 as usize, h1);
        } else {
            let (mut g1, mut g2) = self.lock_pair(&arc1, &arc2);
            g1.set_handle_at(row1 as usize, h2);
            g2.set_handle_at(row2 as usize, h1);
        }

        let shard1 = self.shard_index(h1);
        let shard2 = self.shard_index(h2);
        self.shards[shard1].write().retarget(h1, arch2, row2);
        self.shards[shard2].write().retarget(h2, arch1, row1);
        Ok(true)
    }

    /// Point `handle`'s slot at `(archetype_idx, row)`. Used by [`crate::view::View`] after
    /// flushing deferred gaps, where the relocated handle is already known to be alive.
    pub(crate) fn retarget_for_flush(&self, handle: Handle, archetype_idx: usize, row: usize) {
        let shard = self.shard_index(handle);
        self.shards[shard].write().retarget(handle, archetype_idx as u32, row as u32);
    }

    /// Begin a view over every archetype whose signature is a superset of `F`'s required
    /// component types (and whatever tag filters are chained onto the returned [`View`]).
    pub fn view<F: Fetch>(&self) -> View<'_, F> {
        View::new(self)
    }

    /// Drop every entity and archetype, invalidating every outstanding handle.
    pub fn clear(&self) {
        let mut dir = self.directory.write();
        #[cfg(feature = "profiling")]
        tracing::debug!(archetype_count = dir.entries.len(), entity_count = self.len(), "clearing registry");
        dir.entries.clear();
        dir.by_hash.clear();
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    /// Rough live statistics, used by [`crate::snapshot::live_stats`].
    pub(crate) fn for_each_archetype<R>(&self, mut f: impl FnMut(&Signature, &Archetype) -> R) -> Vec<R> {
        let dir = self.directory.read();
        dir.entries.iter().map(|e| f(&e.signature, &e.archetype.lock())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;

    fn registry() -> Registry {
        Registry::new(RegistryConfig::sequential()).unwrap()
    }

    #[test]
    fn config_reports_the_validated_construction_parameters() {
        let r = Registry::new(RegistryConfig { segment_bits: 3, ..RegistryConfig::sequential() }).unwrap();
        assert_eq!(r.config().segment_bits, 5, "validated() floors segment_bits at the column minimum");
    }

    #[test]
    fn insert_exists_and_get() {
        let r = registry();
        let h = r.insert((1i32, 2.0f32)).unwrap();
        assert!(r.exists(h));
        assert_eq!(r.get::<i32>(h).unwrap(), 1);
        assert_eq!(r.get::<f32>(h).unwrap(), 2.0);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn erase_invalidates_handle() {
        let r = registry();
        let h = r.insert((1i32,)).unwrap();
        r.erase(h).unwrap();
        assert!(!r.exists(h));
        assert_eq!(r.len(), 0);
        r.erase(h).unwrap(); // idempotent
    }

    #[test]
    fn put_with_no_new_types_overwrites_in_place() {
        let r = registry();
        let h = r.insert((1i32, 2.0f32)).unwrap();
        let archetypes_before = r.archetype_count();
        r.put(h, (9i32, 9.0f32)).unwrap();
        assert_eq!(r.get::<i32>(h).unwrap(), 9);
        assert_eq!(r.archetype_count(), archetypes_before, "no migration when no new types");
    }

    #[test]
    fn put_with_new_type_migrates_and_preserves_old_values() {
        let r = registry();
        let h = r.insert((1i32,)).unwrap();
        r.put(h, (2.5f64,)).unwrap();
        assert_eq!(r.get::<i32>(h).unwrap(), 1, "pre-existing component survives migration");
        assert_eq!(r.get::<f64>(h).unwrap(), 2.5);
    }

    #[test]
    fn put_preserves_an_unrelated_third_component_across_migration() {
        let r = registry();
        let h = r.insert((1i32, "x".to_string())).unwrap();
        r.put(h, (7.5f64,)).unwrap();
        assert_eq!(r.get::<i32>(h).unwrap(), 1);
        assert_eq!(r.get::<String>(h).unwrap(), "x");
        assert_eq!(r.get::<f64>(h).unwrap(), 7.5);
    }

    #[test]
    fn erase_components_migrates_and_drops_removed_type() {
        let r = registry();
        let h = r.insert((1i32, 2.0f32)).unwrap();
        r.erase_components::<(f32,)>(h).unwrap();
        assert!(!r.has::<f32>(h).unwrap());
        assert_eq!(r.get::<i32>(h).unwrap(), 1);
    }

    #[test]
    fn erase_components_of_absent_type_is_an_error() {
        let r = registry();
        let h = r.insert((1i32,)).unwrap();
        assert_eq!(r.erase_components::<(f32,)>(h), Err(EcrError::MissingComponent));
    }

    #[test]
    fn add_and_erase_tags_round_trip() {
        let r = registry();
        let h = r.insert((1i32,)).unwrap();
        let tag = 0xdead_beefu64;
        r.add_tags(h, &[tag]).unwrap();
        assert!(r.archetype_signature(r.resolve(h).unwrap().0 as usize).contains(tag));
        r.erase_tags(h, &[tag]).unwrap();
        assert!(!r.archetype_signature(r.resolve(h).unwrap().0 as usize).contains(tag));
        assert_eq!(r.get::<i32>(h).unwrap(), 1, "component survives a tag round trip");
    }

    #[test]
    fn dead_handle_operations_report_dead_handle() {
        let r = registry();
        let h = r.insert((1i32,)).unwrap();
        r.erase(h).unwrap();
        assert_eq!(r.get::<i32>(h), Err(EcrError::DeadHandle));
        assert_eq!(r.put(h, (2i32,)), Err(EcrError::DeadHandle));
    }

    #[test]
    fn swap_exchanges_which_entity_each_handle_names() {
        let r = registry();
        let h1 = r.insert((1i32,)).unwrap();
        let h2 = r.insert((2i32,)).unwrap();

        assert!(r.swap(h1, h2).unwrap());
        assert_eq!(r.get::<i32>(h1).unwrap(), 2, "h1 now names the row h2 used to");
        assert_eq!(r.get::<i32>(h2).unwrap(), 1);
    }

    #[test]
    fn swap_with_a_dead_handle_reports_dead_handle() {
        let r = registry();
        let h1 = r.insert((1i32,)).unwrap();
        let h2 = r.insert((2i32,)).unwrap();
        r.erase(h2).unwrap();
        assert_eq!(r.swap(h1, h2), Err(EcrError::DeadHandle));
    }

    #[test]
    fn swap_across_different_archetypes_exchanges_rows() {
        let r = registry();
        let h1 = r.insert((1i32,)).unwrap();
        let h2 = r.insert((2i32, 2.0f64)).unwrap();

        assert!(r.swap(h1, h2).unwrap());
        assert_eq!(r.get::<i32>(h1).unwrap(), 2);
        assert_eq!(r.get::<f64>(h1).unwrap(), 2.0);
        assert_eq!(r.get::<i32>(h2).unwrap(), 1);
        assert!(!r.has::<f64>(h2).unwrap());
    }

    #[test]
    fn types_reports_the_current_signature() {
        let r = registry();
        let tag = 0xfeed_faceu64;
        let h = r.insert((1i32, 2.0f32)).unwrap();
        r.add_tags(h, &[tag]).unwrap();

        let types = r.types(h).unwrap();
        assert!(types.contains(type_key::<i32>()));
        assert!(types.contains(type_key::<f32>()));
        assert!(types.contains(tag));
        assert_eq!(types.len(), 3);
    }

    #[test]
    fn has_tag_checks_a_runtime_key() {
        let r = registry();
        let tag = 0x1234u64;
        let h = r.insert((1i32,)).unwrap();
        assert!(!r.has_tag(h, tag).unwrap());
        r.add_tags(h, &[tag]).unwrap();
        assert!(r.has_tag(h, tag).unwrap());
    }

    #[test]
    fn get_mut_ref_writes_through_to_the_live_value() {
        let r = registry();
        let h = r.insert((1i32,)).unwrap();
        let r_mut = r.get_mut_ref::<i32>(h).unwrap();
        r_mut.with(|v| *v += 41).unwrap();
        assert_eq!(r.get::<i32>(h).unwrap(), 42);
    }

    #[test]
    fn clear_invalidates_every_handle() {
        let r = registry();
        let h1 = r.insert((1i32,)).unwrap();
        let h2 = r.insert((2i32,)).unwrap();
        r.clear();
        assert!(!r.exists(h1));
        assert!(!r.exists(h2));
        assert_eq!(r.len(), 0);
    }
}

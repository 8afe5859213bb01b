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

//! Views: iteration over every entity whose archetype matches a set of required component
//! types and tag filters.
//!
//! A view snapshots which archetypes match and how many rows each one has at the moment it
//! starts visiting that archetype; entities erased during the pass are deferred (see
//! [`crate::registry::push_iter_frame`]) rather than swapped immediately, so the snapshot
//! length stays valid for the whole pass, and the gaps are physically flushed once the view
//! moves past that archetype (or is dropped early).

use smallvec::SmallVec;

use crate::archetype::MAX_BUNDLE_COMPONENTS;
use crate::component::{type_key, Component};
use crate::handle::Handle;
use crate::registry::{pop_iter_frame, push_iter_frame, Registry};
use crate::safe_ref::ComponentRef;

/// What a [`View`] produces for each matching row.
///
/// Implemented for tuples of [`Ref<T>`] markers, one per required component; the view's
/// `Item` is the corresponding tuple of [`ComponentRef`]s.
pub trait Fetch {
    type Item<'r>;

    fn type_keys() -> SmallVec<[u64; MAX_BUNDLE_COMPONENTS]>;

    fn fetch<'r>(registry: &'r Registry, handle: Handle) -> Self::Item<'r>;
}

/// Marker for "fetch a [`ComponentRef<T>`]" in a [`Fetch`] tuple.
pub struct Ref<T: Component>(std::marker::PhantomData<fn() -> T>);

impl<T: Component> Fetch for Ref<T> {
    type Item<'r> = ComponentRef<'r, T>;

    fn type_keys() -> SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> {
        let mut keys = SmallVec::new();
        keys.push(type_key::<T>());
        keys
    }

    fn fetch<'r>(registry: &'r Registry, handle: Handle) -> Self::Item<'r> {
        ComponentRef::new(registry, handle)
    }
}

macro_rules! impl_fetch_tuple {
    ($($t:ident),+) => {
        impl<$($t: Fetch),+> Fetch for ($($t,)+) {
            type Item<'r> = ($($t::Item<'r>,)+);

            fn type_keys() -> SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> {
                let mut keys = SmallVec::new();
                $(keys.extend($t::type_keys());)+
                keys
            }

            fn fetch<'r>(registry: &'r Registry, handle: Handle) -> Self::Item<'r> {
                ($($t::fetch(registry, handle),)+)
            }
        }
    };
}

impl_fetch_tuple!(A);
impl_fetch_tuple!(A, B);
impl_fetch_tuple!(A, B, C);
impl_fetch_tuple!(A, B, C, D);

/// An iterator over every live entity whose archetype matches `F`'s required components and
/// the tag filters chained on with [`View::with_tag`]/[`View::without_tag`].
pub struct View<'r, F: Fetch> {
    registry: &'r Registry,
    yes_tags: SmallVec<[u64; 4]>,
    no_tags: SmallVec<[u64; 4]>,
    started: bool,
    matched: Vec<usize>,
    matched_pos: usize,
    archetype_active: bool,
    snapshot_len: usize,
    row: usize,
    _marker: std::marker::PhantomData<F>,
}

impl<'r, F: Fetch> View<'r, F> {
    pub(crate) fn new(registry: &'r Registry) -> View<'r, F> {
        View {
            registry,
            yes_tags: SmallVec::new(),
            no_tags: SmallVec::new(),
            started: false,
            matched: Vec::new(),
            matched_pos: 0,
            archetype_active: false,
            snapshot_len: 0,
            row: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Only visit entities that carry `tag`.
    pub fn with_tag(mut self, tag: u64) -> View<'r, F> {
        assert!(!self.started, "with_tag must be called before iteration begins");
        self.yes_tags.push(tag);
        self
    }

    /// Skip entities that carry `tag`.
    pub fn without_tag(mut self, tag: u64) -> View<'r, F> {
        assert!(!self.started, "without_tag must be called before iteration begins");
        self.no_tags.push(tag);
        self
    }

    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let required = F::type_keys();
        let count = self.registry.archetype_count();
        self.matched = (0..count)
            .filter(|&idx| {
                let sig = self.registry.archetype_signature(idx);
                sig.is_superset_of(&required) && sig.is_superset_of(&self.yes_tags) && sig.is_disjoint_from(&self.no_tags)
            })
            .collect();
    }

    /// Advance to the next non-empty matched archetype, pushing its iteration frame. Returns
    /// `false` once every matched archetype has been visited.
    fn begin_archetype(&mut self) -> bool {
        while self.matched_pos < self.matched.len() {
            let idx = self.matched[self.matched_pos];
            let len = self.registry.archetype_by_index(idx).lock().len();
            if len == 0 {
                self.matched_pos += 1;
                continue;
            }
            push_iter_frame(idx);
            self.archetype_active = true;
            self.snapshot_len = len;
            self.row = 0;
            return true;
        }
        false
    }

    /// Flush any gaps accumulated while visiting the current archetype and pop its frame.
    fn finish_archetype(&mut self) {
        if !self.archetype_active {
            return;
        }
        let idx = self.matched[self.matched_pos];
        let gaps = pop_iter_frame().into_gaps();
        if !gaps.is_empty() {
            let relocations = self.registry.archetype_by_index(idx).lock().flush_gaps(gaps);
            for (handle, new_row) in relocations {
                self.registry.retarget_for_flush(handle, idx, new_row);
            }
        }
        self.archetype_active = false;
        self.matched_pos += 1;
    }
}

impl<'r, F: Fetch> Iterator for View<'r, F> {
    type Item = (Handle, F::Item<'r>);

    fn next(&mut self) -> Option<Self::Item> {
        self.ensure_started();
        loop {
            if !self.archetype_active && !self.begin_archetype() {
                return None;
            }
            let idx = self.matched[self.matched_pos];
            if self.row >= self.snapshot_len {
                self.finish_archetype();
                continue;
            }
            let row = self.row;
            self.row += 1;

            let handle = self.registry.archetype_by_index(idx).lock().handle_at(row);
            if !handle.is_valid() {
                continue;
            }
            let item = F::fetch(self.registry, handle);
            return Some((handle, item));
        }
    }
}

impl<'r, F: Fetch> Drop for View<'r, F> {
    fn drop(&mut self) {
        self.finish_archetype();
    }
}

#[cfg(feature = "parallel")]
impl<'r, F: Fetch> View<'r, F> {
    /// Run `f` over every matching row, processing distinct archetypes on separate `rayon`
    /// tasks. A single archetype's rows are never split across threads: the deferred-erasure
    /// bookkeeping in [`crate::registry::push_iter_frame`] assumes one iterating thread per
    /// archetype at a time, the same restriction the sequential [`Iterator`] impl relies on.
    ///
    /// `f` runs with `&F::Item<'r>` borrowed rather than owned, since `rayon::Scope` cannot
    /// express the per-archetype frame lifetime across a `Send` boundary as cleanly as a plain
    /// loop body can; callers needing an owned value should clone out of it.
    pub fn par_for_each(mut self, f: impl Fn(Handle, &F::Item<'r>) + Sync + Send) {
        self.ensure_started();
        let registry = self.registry;
        let matched = std::mem::take(&mut self.matched);
        rayon::scope(|scope| {
            for &idx in &matched {
                let f = &f;
                scope.spawn(move |_| {
                    let len = registry.archetype_by_index(idx).lock().len();
                    if len == 0 {
                        return;
                    }
                    push_iter_frame(idx);
                    for row in 0..len {
                        let handle = registry.archetype_by_index(idx).lock().handle_at(row);
                        if !handle.is_valid() {
                            continue;
                        }
                        let item = F::fetch(registry, handle);
                        f(handle, &item);
                    }
                    let gaps = pop_iter_frame().into_gaps();
                    if !gaps.is_empty() {
                        let relocations = registry.archetype_by_index(idx).lock().flush_gaps(gaps);
                        for (handle, new_row) in relocations {
                            registry.retarget_for_flush(handle, idx, new_row);
                        }
                    }
                });
            }
        });
        self.matched_pos = matched.len();
    }
}

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

//! Safe references: handles to a single component that revalidate on every access instead of
//! borrowing archetype memory directly.
//!
//! A [`ComponentRef`] never holds a lock and never holds a raw pointer into a column. It keeps
//! only the entity's [`Handle`] and the component type it names; [`ComponentRef::value`] and
//! [`ComponentRef::exists`] re-resolve the handle through the slot map and check the entity's
//! *current* archetype on every call, so a reference taken before the entity migrated away
//! from this component type (or was erased outright) correctly reports itself as stale instead
//! of reading garbage or another entity's data.
//!
//! [`ComponentRefMut`] is the mutable counterpart: since handing out a bare `&mut T` tied to
//! `'r` would require holding the archetype lock for the reference's whole lifetime (defeating
//! the "no lock held between accesses" property above), it instead revalidates and locks only
//! for the duration of a caller-supplied closure via [`ComponentRefMut::with`].

use crate::component::{type_key, Component};
use crate::error::{EcrError, Result};
use crate::handle::Handle;
use crate::registry::Registry;

/// A revalidating reference to component `T` on a specific entity.
///
/// Cheap to keep around: it is a registry pointer, a handle and a type key, nothing else.
pub struct ComponentRef<'r, T: Component> {
    registry: &'r Registry,
    handle: Handle,
    type_key: u64,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<'r, T: Component> ComponentRef<'r, T> {
    pub(crate) fn new(registry: &'r Registry, handle: Handle) -> ComponentRef<'r, T> {
        ComponentRef { registry, handle, type_key: type_key::<T>(), _marker: std::marker::PhantomData }
    }

    /// The entity this reference was taken against.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Whether the handle is still alive *and* its current archetype still carries `T`.
    pub fn exists(&self) -> bool {
        self.registry.component_exists(self.handle, self.type_key)
    }

    /// Equivalent to [`ComponentRef::exists`]; kept as a separate name to match the
    /// "is this reference still good to dereference" phrasing callers reach for.
    pub fn is_valid(&self) -> bool {
        self.exists()
    }

    /// Read the component's current value, re-validating first.
    ///
    /// Returns [`EcrError::StaleReference`] if the entity died or migrated away from `T`
    /// since this reference was created.
    pub fn value(&self) -> Result<T>
    where
        T: Clone,
    {
        self.registry.read_component::<T>(self.handle).ok_or(EcrError::StaleReference)
    }
}

impl<'r, T: Component + std::fmt::Debug + Clone> std::fmt::Debug for ComponentRef<'r, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value() {
            Ok(v) => f.debug_tuple("ComponentRef").field(&v).finish(),
            Err(_) => write!(f, "ComponentRef(stale)"),
        }
    }
}

/// A revalidating *mutable* reference to component `T` on a specific entity.
///
/// Like [`ComponentRef`], it never holds a lock or a raw pointer between calls: the archetype
/// lock is taken only for the duration of [`ComponentRefMut::with`]'s closure, then released,
/// so callers cannot stash a `&mut T` that outlives a structural change to the entity.
pub struct ComponentRefMut<'r, T: Component> {
    registry: &'r Registry,
    handle: Handle,
    type_key: u64,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<'r, T: Component> ComponentRefMut<'r, T> {
    pub(crate) fn new(registry: &'r Registry, handle: Handle) -> ComponentRefMut<'r, T> {
        ComponentRefMut { registry, handle, type_key: type_key::<T>(), _marker: std::marker::PhantomData }
    }

    /// The entity this reference was taken against.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Whether the handle is still alive *and* its current archetype still carries `T`.
    pub fn exists(&self) -> bool {
        self.registry.component_exists(self.handle, self.type_key)
    }

    pub fn is_valid(&self) -> bool {
        self.exists()
    }

    /// Revalidate, then run `f` against the component's current value in place.
    ///
    /// Returns [`EcrError::StaleReference`] if the entity died or migrated away from `T` since
    /// this reference was created.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.registry.write_component::<T, R>(self.handle, f).ok_or(EcrError::StaleReference)
    }
}

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

//! Component identity.
//!
//! Components are plain, `'static` values attached to an entity. Each component type is
//! identified at runtime by a stable 64-bit key derived from [`std::any::TypeId`] rather
//! than the `TypeId` itself, so the key can live in the same keyspace as caller-supplied
//! tag keys (see [`crate::signature`]).

use std::any::TypeId;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Marker trait for component types.
///
/// Any `'static + Send + Sync` type qualifies; there is nothing to implement by hand.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Stable 64-bit key identifying component type `T`.
///
/// `TypeId`'s own hash is randomized per-process by `std`'s default hasher; the archetype
/// directory needs a reproducible hash so two equivalent signatures built independently
/// converge on the same key, so `TypeId` is rehashed through a fixed-seed `FxHasher`
/// instead.
pub fn type_key<T: Component>() -> u64 {
    type_key_of(TypeId::of::<T>())
}

/// Same as [`type_key`] but for a `TypeId` obtained dynamically.
pub fn type_key_of(type_id: TypeId) -> u64 {
    let mut hasher = FxHasher::default();
    type_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_key_is_deterministic_and_distinct() {
        assert_eq!(type_key::<i32>(), type_key::<i32>());
        assert_ne!(type_key::<i32>(), type_key::<f64>());
    }
}

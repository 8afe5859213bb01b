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

//! Archetype signatures: insertion-order-independent sets of component/tag keys.

use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Inline capacity before a signature spills to the heap; most entities carry a handful
/// of components and a handful of tags.
pub const INLINE_KEYS: usize = 8;

/// A sorted, deduplicated set of component and tag keys.
///
/// Two signatures built from the same keys in different orders compare and hash equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    keys: SmallVec<[u64; INLINE_KEYS]>,
}

impl Signature {
    /// Build a signature from an arbitrary iterator of keys, sorting and deduplicating.
    pub fn from_keys(keys: impl IntoIterator<Item = u64>) -> Signature {
        let mut keys: SmallVec<[u64; INLINE_KEYS]> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        Signature { keys }
    }

    /// The empty signature (no components, no tags).
    pub fn empty() -> Signature {
        Signature { keys: SmallVec::new() }
    }

    /// Number of keys in the signature.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the signature carries no keys at all.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys, in sorted order.
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    /// Whether `key` is present in the signature.
    pub fn contains(&self, key: u64) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Whether every key in `other` is present in `self` (`other` ⊆ `self`).
    pub fn is_superset_of(&self, other: &[u64]) -> bool {
        other.iter().all(|k| self.contains(*k))
    }

    /// Whether no key in `other` is present in `self` (`other` ∩ `self` = ∅).
    pub fn is_disjoint_from(&self, other: &[u64]) -> bool {
        other.iter().all(|k| !self.contains(*k))
    }

    /// A new signature with `key` added (a no-op if already present).
    pub fn with(&self, key: u64) -> Signature {
        if self.contains(key) {
            return self.clone();
        }
        let mut keys = self.keys.clone();
        keys.push(key);
        keys.sort_unstable();
        Signature { keys }
    }

    /// A new signature with every key in `removed` absent.
    pub fn without(&self, removed: &[u64]) -> Signature {
        let keys = self.keys.iter().copied().filter(|k| !removed.contains(k)).collect();
        Signature { keys }
    }

    /// A new signature with every key in `added` present (existing keys are left alone).
    pub fn with_all(&self, added: &[u64]) -> Signature {
        let mut keys = self.keys.clone();
        keys.extend_from_slice(added);
        keys.sort_unstable();
        keys.dedup();
        Signature { keys }
    }

    /// A reproducible hash of the key set, independent of insertion order.
    ///
    /// Used to key the archetype directory. Collisions are possible (it is a 64-bit hash
    /// of an unbounded set) and must be resolved by comparing the full [`Signature`], not
    /// just this hash.
    pub fn hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.keys.len().hash(&mut hasher);
        for key in &self.keys {
            key.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let a = Signature::from_keys([3, 1, 2]);
        let b = Signature::from_keys([2, 3, 1]);
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn dedups() {
        let s = Signature::from_keys([1, 1, 2]);
        assert_eq!(s.keys(), &[1, 2]);
    }

    #[test]
    fn superset_and_disjoint() {
        let s = Signature::from_keys([1, 2, 3]);
        assert!(s.is_superset_of(&[1, 2]));
        assert!(!s.is_superset_of(&[1, 4]));
        assert!(s.is_disjoint_from(&[4, 5]));
        assert!(!s.is_disjoint_from(&[2, 5]));
    }

    #[test]
    fn with_all_adds_and_dedups() {
        let s = Signature::from_keys([1, 2]);
        let added = s.with_all(&[2, 3, 4]);
        assert_eq!(added.keys(), &[1, 2, 3, 4]);
    }

    #[test]
    fn with_and_without() {
        let s = Signature::from_keys([1, 2]);
        let added = s.with(3);
        assert_eq!(added.keys(), &[1, 2, 3]);
        let removed = added.without(&[2]);
        assert_eq!(removed.keys(), &[1, 3]);
    }
}

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

//! Error taxonomy for the registry.

use std::fmt;

/// Errors the registry can report.
///
/// `DeadHandle`, `MissingComponent` and `StaleReference` are recoverable and meant to be
/// matched on by callers. `InvalidIndex` and `SignatureConflict` indicate a programmer
/// error (a precondition the caller was responsible for upholding); `OutOfCapacity` is
/// fatal for the registry instance that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcrError {
    /// The handle's version does not match the slot's current version, or its storage
    /// index does not name a live shard.
    DeadHandle,

    /// `get`/`put`/`erase` named a component type the entity's archetype does not carry.
    MissingComponent,

    /// A [`crate::safe_ref::ComponentRef`] was dereferenced after its target migrated away
    /// or was erased.
    StaleReference,

    /// A row index was out of range for the archetype it was used against.
    InvalidIndex,

    /// An archetype-shape operation was given a duplicate type or tag key.
    SignatureConflict,

    /// The slot map's index space (bounded by `index_bits`) is exhausted.
    OutOfCapacity,
}

impl fmt::Display for EcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcrError::DeadHandle => write!(f, "handle is stale or refers to a freed entity"),
            EcrError::MissingComponent => write!(f, "entity does not have the requested component"),
            EcrError::StaleReference => write!(f, "reference is no longer valid"),
            EcrError::InvalidIndex => write!(f, "row index out of range"),
            EcrError::SignatureConflict => write!(f, "duplicate type or tag key in signature"),
            EcrError::OutOfCapacity => write!(f, "slot map index space exhausted"),
        }
    }
}

impl std::error::Error for EcrError {}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EcrError>;

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

//! Read-only text snapshots and live statistics, for external inspector-style tooling.
//!
//! The registry itself never requires `Component` types to be `Serialize`; a host that wants
//! a given type to show up in a snapshot registers a serializer for it with
//! [`SnapshotRegistry::register`], mirroring how [`crate::registry::Registry::name_type`]
//! registers a display name for it. Types with no registered serializer still appear in a
//! snapshot (by type key), just with `null` values.

use std::io;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::archetype::Archetype;
use crate::component::{type_key, Component};
use crate::registry::Registry;

type ValueFn = Box<dyn Fn(&Archetype, usize) -> Value + Send + Sync>;

/// Per-type component value serializers, consulted by [`snapshot_to_text`].
#[derive(Default)]
pub struct SnapshotRegistry {
    serializers: FxHashMap<u64, ValueFn>,
}

impl SnapshotRegistry {
    pub fn new() -> SnapshotRegistry {
        SnapshotRegistry::default()
    }

    /// Register `T` so its values are emitted as JSON rather than `null` in snapshots.
    pub fn register<T: Component + Serialize>(&mut self) {
        self.serializers.insert(
            type_key::<T>(),
            Box::new(|archetype, row| archetype.get::<T>(row).map(|v| json!(v)).unwrap_or(Value::Null)),
        );
    }

    fn value_of(&self, key: u64, archetype: &Archetype, row: usize) -> Value {
        match self.serializers.get(&key) {
            Some(f) => f(archetype, row),
            None => Value::Null,
        }
    }
}

/// Serialize the whole registry to the text schema described at the module's call sites:
/// `{ entities, archetypes: [ { hash, types, maps, entities: [ { index, version, storage,
/// value, values }, … ] }, … ] }`.
///
/// `value` and `values` carry the same per-row array of component values, in column order;
/// both are emitted for compatibility with the inspector's schema. Component values for
/// types with no [`SnapshotRegistry::register`] entry are emitted as `null`.
pub fn snapshot_to_text<W: io::Write>(
    registry: &Registry,
    serializers: &SnapshotRegistry,
    writer: &mut W,
) -> io::Result<()> {
    let archetypes = registry.for_each_archetype(|signature, archetype| {
        let type_keys: Vec<u64> = archetype.column_keys().collect();
        let maps: Vec<Value> = signature
            .keys()
            .iter()
            .map(|&key| {
                let name = registry
                    .type_name(key)
                    .or_else(|| registry.tag_name(key))
                    .unwrap_or_else(|| format!("0x{key:016x}"));
                json!({ "name": name, "id": key })
            })
            .collect();
        let entities: Vec<Value> = (0..archetype.len())
            .map(|row| {
                let handle = archetype.handle_at(row);
                let values: Vec<Value> =
                    type_keys.iter().map(|&key| serializers.value_of(key, archetype, row)).collect();
                json!({
                    "index": handle.index(),
                    "version": handle.version(),
                    "storage": handle.storage(),
                    "value": values,
                    "values": values,
                })
            })
            .collect();
        json!({
            "hash": signature.hash(),
            "types": type_keys,
            "maps": maps,
            "entities": entities,
        })
    });

    let document = json!({ "entities": registry.len(), "archetypes": archetypes });
    serde_json::to_writer(writer, &document).map_err(io::Error::from)
}

/// Coarse-grained point-in-time statistics over a registry's live entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveStats {
    pub entity_count: usize,
    pub average_component_count: f64,
    pub estimated_memory_bytes: usize,
}

/// Compute [`LiveStats`] by walking every archetype once.
pub fn live_stats(registry: &Registry) -> LiveStats {
    let mut entity_count = 0usize;
    let mut weighted_component_count = 0usize;
    let mut estimated_memory_bytes = 0usize;

    registry.for_each_archetype(|signature, archetype| {
        let rows = archetype.len();
        entity_count += rows;
        weighted_component_count += rows * signature.len();
        estimated_memory_bytes += archetype.byte_size();
    });

    let average_component_count =
        if entity_count == 0 { 0.0 } else { weighted_component_count as f64 / entity_count as f64 };

    LiveStats { entity_count, average_component_count, estimated_memory_bytes }
}

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

//! An in-process entity-component registry: archetype-based storage, versioned handle
//! indirection, and a concurrency-safe iteration protocol.
//!
//! The registry groups entities into archetypes by their exact component/tag signature,
//! stores each archetype's components in dense, type-erased columns, and hands callers
//! opaque [`Handle`]s that stay valid (and detect staleness) across structural changes —
//! adding or removing a component migrates an entity's row into a different archetype without
//! invalidating its handle.
//!
//! ```
//! use entity_registry::{Ref, Registry, RegistryConfig};
//!
//! #[derive(Debug, Clone)]
//! struct Position(f32, f32);
//! #[derive(Clone)]
//! struct Velocity(f32, f32);
//!
//! let registry = Registry::new(RegistryConfig::sequential()).unwrap();
//! let entity = registry.insert((Position(0.0, 0.0), Velocity(1.0, 0.0))).unwrap();
//!
//! for (_, (pos, vel)) in registry.view::<(Ref<Position>, Ref<Velocity>)>() {
//!     let Velocity(vx, vy) = vel.value().unwrap();
//!     println!("{:?} moving at ({vx}, {vy})", pos.value().unwrap());
//! }
//!
//! registry.erase(entity).unwrap();
//! assert!(!registry.exists(entity));
//! ```

pub mod archetype;
pub mod column;
pub mod component;
pub mod config;
pub mod error;
pub mod handle;
pub mod registry;
pub mod safe_ref;
pub mod signature;
pub mod slotmap;
pub mod snapshot;
pub mod view;

pub use archetype::{Archetype, Bundle};
pub use component::Component;
pub use config::{Concurrency, RegistryConfig};
pub use error::{EcrError, Result};
pub use handle::Handle;
pub use registry::Registry;
pub use safe_ref::{ComponentRef, ComponentRefMut};
pub use signature::Signature;
pub use slotmap::SlotMap;
pub use snapshot::{live_stats, snapshot_to_text, LiveStats, SnapshotRegistry};
pub use view::{Fetch, Ref, View};

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

//! Registry configuration.

use crate::error::{EcrError, Result};
use crate::handle::VERSION_BITS;

/// Whether the registry expects a single mutator thread or several.
///
/// Both variants use the same `parking_lot` locks internally (see the crate-level docs): the
/// distinction is informational, plus it picks the default shard count. A [`Registry`] never
/// refuses concurrent access in `Sequential` mode, it just isn't tuned for it.
///
/// [`Registry`]: crate::registry::Registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Tuned for a single mutator thread: one slot-map shard, no reason to spread contention.
    #[default]
    Sequential,
    /// Tuned for several mutator threads sharing one registry.
    Parallel,
}

/// Construction-time parameters for a [`Registry`](crate::registry::Registry).
///
/// Validated by [`RegistryConfig::build`], never by panicking: a caller that wires these up
/// from, say, a config file should get a [`Result`] back, not a process abort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryConfig {
    /// `log2` of the number of elements per [`Column`](crate::column::Column) segment. Clamped
    /// to `[3, 16]` (8 to 65536 elements per segment); the column layer additionally floors
    /// this at 5 (32 elements, the documented minimum segment size).
    pub segment_bits: u32,
    pub concurrency: Concurrency,
    /// Number of slot-map shards. Must be a power of two. Defaults to 1 under
    /// [`Concurrency::Sequential`] and 16 under [`Concurrency::Parallel`].
    pub slotmap_shards: u32,
    /// Bit width of the version field in a [`Handle`](crate::handle::Handle). Recognized as a
    /// construction-time option; see [`RegistryConfig::validated`] for why it is currently
    /// accepted only at its default.
    pub version_bits: u32,
}

impl RegistryConfig {
    pub fn sequential() -> RegistryConfig {
        RegistryConfig {
            segment_bits: 8,
            concurrency: Concurrency::Sequential,
            slotmap_shards: 1,
            version_bits: VERSION_BITS,
        }
    }

    pub fn parallel() -> RegistryConfig {
        RegistryConfig {
            segment_bits: 8,
            concurrency: Concurrency::Parallel,
            slotmap_shards: 16,
            version_bits: VERSION_BITS,
        }
    }

    /// Validate this configuration, returning the fields a [`Registry`](crate::registry::Registry)
    /// actually uses (segment bits clamped into range).
    pub(crate) fn validated(mut self) -> Result<RegistryConfig> {
        if !(3..=16).contains(&self.segment_bits) {
            return Err(EcrError::SignatureConflict);
        }
        if self.slotmap_shards == 0 || !self.slotmap_shards.is_power_of_two() {
            return Err(EcrError::SignatureConflict);
        }
        if self.slotmap_shards > 256 {
            // a handle's storage field is 8 bits wide; more shards than that can't be
            // round-tripped through Handle::storage() without aliasing.
            return Err(EcrError::SignatureConflict);
        }
        if self.version_bits != VERSION_BITS {
            // Handle packs index/version/storage into one u64 at fixed 32/24/8 widths; varying
            // version_bits per instance would need every Handle to carry its own layout, which
            // the bit-packed representation has no room for. See DESIGN.md.
            return Err(EcrError::SignatureConflict);
        }
        self.segment_bits = self.segment_bits.max(5);
        Ok(self)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::sequential()
    }
}

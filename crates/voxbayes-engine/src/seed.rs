//! Per-voxel random stream derivation.
//!
//! Every voxel gets its own generator, seeded from the run's base seed and the
//! voxel's grid coordinate:
//!
//! ```text
//! seed(i, j, k) = base ^ mix(mix(mix(i) ^ j) ^ k)
//! ```
//!
//! where `mix` is the SplitMix64 finalizer. The stream a voxel consumes thus
//! depends only on `(base, i, j, k)`, never on which worker thread visits it or
//! in which order, so a run is reproducible at any degree of parallelism.

use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

/// Base seed used when none is given explicitly.
pub const DEFAULT_BASE_SEED: u64 = 0x5EED_B7D0_0000_0001;

/// Seed of a single voxel's random stream.
///
/// # Example
///
/// ```
/// use rand::Rng as _;
/// use voxbayes_engine::seed::VoxelSeed;
///
/// let a = VoxelSeed::derive(42, [3, 1, 4]);
/// let b = VoxelSeed::derive(42, [3, 1, 4]);
/// assert_eq!(a, b);
/// assert_eq!(a.rng().random::<u64>(), b.rng().random::<u64>());
///
/// assert_ne!(a, VoxelSeed::derive(42, [4, 1, 3]));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelSeed(u64);

impl VoxelSeed {
    /// Derives the seed of the voxel at `coord` from the run's base seed.
    #[must_use]
    pub const fn derive(base: u64, coord: [usize; 3]) -> Self {
        let [i, j, k] = coord;
        let hash = mix(mix(mix(i as u64) ^ j as u64) ^ k as u64);
        Self(base ^ hash)
    }

    /// Returns the raw seed value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Creates a fresh generator positioned at the start of this voxel's stream.
    #[must_use]
    pub fn rng(self) -> Pcg64Mcg {
        Pcg64Mcg::seed_from_u64(self.0)
    }
}

/// SplitMix64 finalizer.
const fn mix(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

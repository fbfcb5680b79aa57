//! Metron Foundation
//!
//! Core utilities shared across the Metron engine crates: typed
//! identifiers for model entities and stable hashing for deterministic
//! cache fingerprints.

pub mod ids;
pub mod stable_hash;

pub use ids::{AttributeId, BlockId, Path, ScenarioId};
pub use stable_hash::{
    fnv1a64, fnv1a64_f64, fnv1a64_mix, fnv1a64_str, FNV1A_OFFSET_BASIS_64, FNV1A_PRIME_64,
};

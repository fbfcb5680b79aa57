//! Stable hashing for deterministic fingerprints.
//!
//! Cache fingerprints must be a pure function of their inputs so that
//! identical (model version, scenario, resolved inputs) always hit the
//! same entry, across processes and platforms. These helpers provide a
//! stable FNV-1a 64-bit implementation.
//!
//! NOTE: FNV-1a is **not** cryptographically secure. It is used
//! strictly for stable identifiers and cache keys.

/// 64-bit FNV-1a offset basis.
pub const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf29ce484222325;
/// 64-bit FNV-1a prime.
pub const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01B3;

/// Mix bytes into an existing FNV-1a 64-bit hash state.
///
/// For each byte, XOR it into the hash and multiply by the FNV prime.
/// Use [`FNV1A_OFFSET_BASIS_64`] as the initial state.
#[inline]
pub const fn fnv1a64_mix(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0usize;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME_64);
        i += 1;
    }
    hash
}

/// Hash an arbitrary byte slice with FNV-1a 64-bit.
#[inline]
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_mix(FNV1A_OFFSET_BASIS_64, bytes)
}

/// Hash a UTF-8 string with FNV-1a 64-bit.
#[inline]
pub const fn fnv1a64_str(s: &str) -> u64 {
    fnv1a64(s.as_bytes())
}

/// Mix an `f64` into an existing hash state via its IEEE-754 bit pattern.
///
/// Bit-exact: `0.0` and `-0.0` hash differently, as do distinct NaN
/// payloads. Fingerprint inputs are resolved attribute values, which are
/// always finite by the time they are hashed.
#[inline]
pub const fn fnv1a64_f64(hash: u64, value: f64) -> u64 {
    fnv1a64_mix(hash, &value.to_bits().to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values() {
        // Empty input leaves the offset basis untouched
        assert_eq!(fnv1a64(b""), FNV1A_OFFSET_BASIS_64);

        // FNV-1a: hash = (hash XOR byte) * prime
        let expected_a = (FNV1A_OFFSET_BASIS_64 ^ 0x61).wrapping_mul(FNV1A_PRIME_64);
        assert_eq!(fnv1a64(b"a"), expected_a);
    }

    #[test]
    fn regression_values() {
        // Fixed values; any change indicates a breaking determinism change
        assert_eq!(fnv1a64(b"hello"), 11831194018420276491);
        assert_eq!(fnv1a64(b"hello world"), 8618312879776256743);
    }

    #[test]
    fn mix_is_incremental() {
        let full = fnv1a64(b"helloworld");

        let mut incremental = FNV1A_OFFSET_BASIS_64;
        incremental = fnv1a64_mix(incremental, b"hello");
        incremental = fnv1a64_mix(incremental, b"world");

        assert_eq!(full, incremental);
    }

    #[test]
    fn f64_hashing_is_bit_exact() {
        let base = FNV1A_OFFSET_BASIS_64;
        assert_eq!(fnv1a64_f64(base, 1.5), fnv1a64_f64(base, 1.5));
        assert_ne!(fnv1a64_f64(base, 1.5), fnv1a64_f64(base, 1.5000001));
        assert_ne!(fnv1a64_f64(base, 0.0), fnv1a64_f64(base, -0.0));
    }

    #[test]
    fn distinct_paths_distinct_hashes() {
        let inputs = ["a", "b", "costs", "costs.co2", "costs.co2."];
        for (i, a) in inputs.iter().enumerate() {
            for (j, b) in inputs.iter().enumerate() {
                if i != j {
                    assert_ne!(fnv1a64_str(a), fnv1a64_str(b), "collision: {a} vs {b}");
                }
            }
        }
    }
}

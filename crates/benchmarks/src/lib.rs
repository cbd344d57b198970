#![allow(unused_crate_dependencies)]
//! Benchmark utilities: deterministic workload generators shared by the
//! criterion benches.

use alloy_primitives::{keccak256, Bytes};

/// Configuration for a generated key/value workload.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadConfig {
    /// Number of generated entries.
    pub num_entries: usize,
    /// Value length in bytes.
    pub value_len: usize,
}

/// Deterministic 20-byte keys with fixed-size values, derived by hashing a
/// counter so runs are reproducible without an RNG.
pub fn generate_entries(config: &WorkloadConfig) -> Vec<(Vec<u8>, Bytes)> {
    (0..config.num_entries)
        .map(|index| {
            let seed = (index as u64).to_be_bytes();
            let key = keccak256(seed).as_slice()[..20].to_vec();
            let mut value = Vec::with_capacity(config.value_len);
            while value.len() < config.value_len {
                let chunk = keccak256([&seed[..], &(value.len() as u64).to_be_bytes()].concat());
                let take = (config.value_len - value.len()).min(32);
                value.extend_from_slice(&chunk.as_slice()[..take]);
            }
            (key, Bytes::from(value))
        })
        .collect()
}

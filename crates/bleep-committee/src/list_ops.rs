// Shared helpers: candidate hash positions and ordered key-list algebra
//
// SAFETY INVARIANTS:
// 1. All helpers preserve the relative order of the input list
// 2. Hash positions depend only on (candidate, seed, total)

use sha3::{Digest, Sha3_256};
use std::collections::BTreeSet;

use crate::keys::ValidatorKey;

/// Deterministic position of a candidate in `1..=total`.
///
/// The position is the byte-sum of SHA3-256(candidate ‖ decimal seed) taken
/// modulo `total`, with 0 folded onto 1.
pub fn calculate_candidate_position(candidate: &ValidatorKey, seed: i64, total: usize) -> usize {
    if total == 0 {
        return 1;
    }
    let mut hasher = Sha3_256::new();
    hasher.update(candidate.as_str().as_bytes());
    hasher.update(seed.to_string().as_bytes());
    let digest = hasher.finalize();
    let sum: u64 = digest.iter().map(|b| u64::from(*b)).sum();
    let pos = (sum % total as u64) as usize;
    if pos == 0 {
        1
    } else {
        pos
    }
}

/// Keys of `list` that are not in `remove`, order preserved.
pub fn remove_keys(list: &[ValidatorKey], remove: &[ValidatorKey]) -> Vec<ValidatorKey> {
    let remove: BTreeSet<&ValidatorKey> = remove.iter().collect();
    list.iter().filter(|k| !remove.contains(k)).cloned().collect()
}

/// Returns true when `a` and `b` contain the same keys in the same order.
pub fn same_keys(a: &[ValidatorKey], b: &[ValidatorKey]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Position of `key` in `list`
pub fn index_of(list: &[ValidatorKey], key: &ValidatorKey) -> Option<usize> {
    list.iter().position(|k| k == key)
}

/// Stable ascending order of shard indices by their counts.
///
/// Equal counts keep their shard-id order.
pub fn sort_shard_ids_by_count(counts: &[usize]) -> Vec<usize> {
    let mut ids: Vec<usize> = (0..counts.len()).collect();
    ids.sort_by_key(|&i| counts[i]);
    ids
}

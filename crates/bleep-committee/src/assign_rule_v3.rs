// Assign Rule V3 - Mean balancing with beacon candidate filters
//
// SAFETY INVARIANTS:
// 1. Only shards below the mean (or the first half of shards) receive candidates
// 2. Draws come from a generator seeded locally with the batch random number
// 3. Beacon filters: not in shard cycle -> enough active times -> has delegation

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

use crate::assign_rule::{AssignRuleProcessor, AssignRuleVersion, BeaconAssignEnvironment, BeaconAssignment};
use crate::keys::{ShardId, ValidatorKey};
use crate::list_ops::sort_shard_ids_by_count;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignRuleV3;

/// Shards strictly below `mean`, emptiest first, at most half the shards.
pub fn get_ordered_lower_set(mean: usize, number_of_validators: &[usize]) -> Vec<usize> {
    let half = number_of_validators.len().div_ceil(2);
    let lower: Vec<usize> = sort_shard_ids_by_count(number_of_validators)
        .into_iter()
        .filter(|&shard| number_of_validators[shard] < mean)
        .take(half)
        .collect();
    if lower.is_empty() {
        (0..half).collect()
    } else {
        lower
    }
}

/// First lower-set shard whose running cumulative diff exceeds `pos`.
pub fn assign_candidate(lower_set: &[usize], diff: &[usize], pos: usize) -> usize {
    let mut cumulative = 0;
    for (shard, weight) in lower_set.iter().zip(diff) {
        cumulative += weight;
        if pos < cumulative {
            return *shard;
        }
    }
    // pos is drawn below the total diff, so the loop always returns
    lower_set[lower_set.len() - 1]
}

impl AssignRuleProcessor for AssignRuleV3 {
    fn process(
        &self,
        candidates: &[ValidatorKey],
        number_of_validators: &[usize],
        seed: i64,
    ) -> BTreeMap<ShardId, Vec<ValidatorKey>> {
        let mut assigned: BTreeMap<ShardId, Vec<ValidatorKey>> = BTreeMap::new();
        if number_of_validators.is_empty() || candidates.is_empty() {
            return assigned;
        }

        let total: usize = number_of_validators.iter().sum();
        let mean = total.div_ceil(number_of_validators.len());
        let lower_set = get_ordered_lower_set(mean, number_of_validators);
        let diff: Vec<usize> = lower_set
            .iter()
            .map(|&shard| mean.saturating_sub(number_of_validators[shard]).max(1))
            .collect();
        let total_diff: usize = diff.iter().sum();

        let mut rng = StdRng::seed_from_u64(seed as u64);
        for candidate in candidates {
            let pos = rng.gen_range(0..total_diff);
            let shard = assign_candidate(&lower_set, &diff, pos);
            assigned
                .entry(ShardId(shard as u8))
                .or_default()
                .push(candidate.clone());
        }
        assigned
    }

    fn version(&self) -> AssignRuleVersion {
        AssignRuleVersion::V3
    }
}

impl AssignRuleV3 {
    /// Split beacon candidates into (to pending, stay waiting, should remove).
    pub fn process_beacon(&self, candidates: &[ValidatorKey], env: &BeaconAssignEnvironment<'_>) -> BeaconAssignment {
        let mut result = BeaconAssignment::default();

        let in_shard_cycle: BTreeSet<&ValidatorKey> = env
            .shard_committee
            .values()
            .chain(env.shard_substitute.values())
            .chain(env.shard_syncing.values())
            .flatten()
            .chain(env.shard_common_pool.iter())
            .collect();

        for candidate in candidates {
            if in_shard_cycle.contains(candidate) {
                result.stay_waiting.push(candidate.clone());
                continue;
            }

            match env.store.get_beacon_staker_info(candidate) {
                Ok(Some(info)) if info.active_times_in_committee >= env.required_active_times => {}
                Ok(Some(info)) => {
                    debug!(
                        "Beacon candidate {} has {} active times, needs {}",
                        candidate, info.active_times_in_committee, env.required_active_times
                    );
                    result.should_remove.push(candidate.clone());
                    continue;
                }
                Ok(None) => {
                    warn!("Beacon candidate {} has no staker record", candidate);
                    result.should_remove.push(candidate.clone());
                    continue;
                }
                Err(e) => {
                    warn!("Beacon candidate {} staker record unreadable: {}", candidate, e);
                    result.should_remove.push(candidate.clone());
                    continue;
                }
            }

            match env.delegations.get(candidate) {
                Some(delegation) if delegation.current_delegators >= 0 => result.to_pending.push(candidate.clone()),
                _ => result.stay_waiting.push(candidate.clone()),
            }
        }
        result
    }
}

// Swap Rule V3 - Percentage-bounded rotation for shard and beacon committees
//
// SAFETY INVARIANTS:
// 1. At most floor(len/3) members are slashed per round
// 2. Routine swap-out only fires for a committee already at max size
// 3. Beacon slashing never removes one third or more of total vote power
// 4. Beacon outputs keep each key's relative order from its input list

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::keys::ValidatorKey;
use crate::swap_rule::{
    build_outcome, check_fixed_prefix, slash_flexible_suffix, swap_out_front, BeaconSwapOutcome,
    BeaconSwapRequest, SwapOutcome, SwapRequest, SwapRuleProcessor, SwapRuleVersion,
};

pub const MAX_SLASH_PERCENT: usize = 3;
pub const MAX_SWAP_OUT_PERCENT: usize = 8;
pub const MAX_SWAP_IN_PERCENT: usize = 8;
pub const MAX_ASSIGN_PERCENT: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapRuleV3;

/// Maximum number of flexible members slashed in one round.
pub fn slashing_offset(len_committee: usize, number_of_fixed_validators: usize) -> usize {
    if len_committee <= number_of_fixed_validators {
        return 0;
    }
    (len_committee / MAX_SLASH_PERCENT).min(len_committee - number_of_fixed_validators)
}

/// Routine swap-out offset for a committee that was `len_before` long before slashing.
pub fn normal_swap_out_offset(
    len_before: usize,
    len_substitutes: usize,
    number_of_slashed: usize,
    number_of_fixed_validators: usize,
    max_committee_size: usize,
) -> usize {
    if len_before != max_committee_size || number_of_slashed >= len_before / MAX_SWAP_OUT_PERCENT {
        return 0;
    }
    let max_normal = (len_before / MAX_SWAP_OUT_PERCENT).min(len_before.saturating_sub(number_of_fixed_validators));
    let len_after_slash = len_before - number_of_slashed;
    max_normal
        .saturating_sub(number_of_slashed)
        .min(len_substitutes)
        .min(len_after_slash.saturating_sub(number_of_fixed_validators))
}

/// Swap-in offset once slashing and routine swap-out are done.
pub fn swap_in_offset(
    len_before: usize,
    len_after_out: usize,
    len_substitutes: usize,
    number_of_slashed: usize,
    max_committee_size: usize,
) -> usize {
    let mut offset = if number_of_slashed == 0 && len_before == max_committee_size {
        len_before / MAX_SWAP_IN_PERCENT
    } else {
        len_after_out / MAX_SWAP_IN_PERCENT
    };
    if offset == 0 && len_after_out < MAX_SWAP_IN_PERCENT {
        offset = 1;
    }
    offset
        .min(len_substitutes)
        .min(max_committee_size.saturating_sub(len_after_out))
}

impl SwapRuleProcessor for SwapRuleV3 {
    fn process(&self, request: &SwapRequest<'_>) -> Result<SwapOutcome> {
        check_fixed_prefix(request)?;
        let len_before = request.committee.len();
        let fixed = request.number_of_fixed_validators;

        let budget = slashing_offset(len_before, fixed);
        let (after_slash, slashed) = slash_flexible_suffix(request.committee, fixed, request.penalties, budget);

        let out_offset = normal_swap_out_offset(
            len_before,
            request.substitutes.len(),
            slashed.len(),
            fixed,
            request.max_committee_size,
        );
        let (after_out, normal_swapped_out) = swap_out_front(&after_slash, fixed, out_offset);

        let in_offset = swap_in_offset(
            len_before,
            after_out.len(),
            request.substitutes.len(),
            slashed.len(),
            request.max_committee_size,
        );

        Ok(build_outcome(request, after_out, in_offset, slashed, normal_swapped_out))
    }

    fn assign_offset(&self, _len_substitutes: usize, len_committee: usize, _fixed: usize, _min: usize) -> usize {
        (len_committee / MAX_ASSIGN_PERCENT).max(1)
    }

    fn version(&self) -> SwapRuleVersion {
        SwapRuleVersion::V3
    }
}

fn weight(map: &BTreeMap<ValidatorKey, u64>, key: &ValidatorKey) -> u64 {
    map.get(key).copied().unwrap_or(0)
}

impl SwapRuleV3 {
    /// Reputation-driven beacon rotation.
    pub fn process_beacon(&self, request: &BeaconSwapRequest<'_>) -> BeaconSwapOutcome {
        let committee = request.committee;
        let len = committee.len();
        let fixed = request.number_of_fixed_validators.min(len);
        let floor = request.min_committee_size.max(request.number_of_fixed_validators);
        let total_power = committee
            .iter()
            .map(|k| weight(request.reputation, k))
            .fold(0u64, u64::saturating_add);

        // slashing: weakest performance first, ties by committee position
        let mut low_performers: Vec<usize> = (fixed..len)
            .filter(|&i| weight(request.performance, &committee[i]) < request.lowest_performance)
            .collect();
        low_performers.sort_by_key(|&i| (weight(request.performance, &committee[i]), i));

        let mut slashed_idx = BTreeSet::new();
        let mut slashed_power = 0u64;
        for i in low_performers {
            if len - slashed_idx.len() <= floor {
                break;
            }
            let power = weight(request.reputation, &committee[i]);
            if slashed_power.saturating_add(power).saturating_mul(3) >= total_power {
                break;
            }
            slashed_power = slashed_power.saturating_add(power);
            slashed_idx.insert(i);
        }

        // routine swap-out: weakest members against strongest substitutes
        let max_swap_out = (len / MAX_SWAP_OUT_PERCENT).max(1).saturating_sub(slashed_idx.len());
        let mut weakest: Vec<usize> = (fixed..len).filter(|i| !slashed_idx.contains(i)).collect();
        weakest.sort_by_key(|&i| (weight(request.reputation, &committee[i]), i));
        let mut strongest: Vec<usize> = (0..request.substitutes.len()).collect();
        strongest.sort_by_key(|&i| (Reverse(weight(request.reputation, &request.substitutes[i])), i));

        let mut out_idx = BTreeSet::new();
        let mut in_idx = BTreeSet::new();
        for (&c, &s) in weakest.iter().zip(strongest.iter()).take(max_swap_out) {
            if weight(request.reputation, &request.substitutes[s]) <= weight(request.reputation, &committee[c]) {
                break;
            }
            out_idx.insert(c);
            in_idx.insert(s);
        }

        // vacancies left by slashing and unfilled seats
        let vacancy = request.max_committee_size.saturating_sub(len - slashed_idx.len());
        let fill: Vec<usize> = strongest
            .iter()
            .copied()
            .filter(|s| !in_idx.contains(s))
            .take(vacancy)
            .collect();
        in_idx.extend(fill);

        let pick = |list: &[ValidatorKey], idx: &BTreeSet<usize>| -> Vec<ValidatorKey> {
            idx.iter().map(|&i| list[i].clone()).collect()
        };
        let slashed = pick(committee, &slashed_idx);
        let swapped_out = pick(committee, &out_idx);
        let swapped_in = pick(request.substitutes, &in_idx);

        let mut new_committee: Vec<ValidatorKey> = committee
            .iter()
            .enumerate()
            .filter(|(i, _)| !slashed_idx.contains(i) && !out_idx.contains(i))
            .map(|(_, k)| k.clone())
            .collect();
        new_committee.extend_from_slice(&swapped_in);
        let new_substitutes = request
            .substitutes
            .iter()
            .enumerate()
            .filter(|(i, _)| !in_idx.contains(i))
            .map(|(_, k)| k.clone())
            .collect();

        BeaconSwapOutcome {
            new_committee,
            new_substitutes,
            swapped_in,
            swapped_out,
            slashed,
        }
    }
}

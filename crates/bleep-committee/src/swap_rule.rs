// Swap Rules - Versioned committee rotation strategies
//
// SAFETY INVARIANTS:
// 1. Rule functions are pure; identical inputs give identical outputs on every node
// 2. The fixed committee prefix is never slashed or swapped out
// 3. Every input key ends up in exactly one of: new committee, new substitutes,
//    slashed, normally swapped out
// 4. Call sites dispatch on the stored rule version, never on a hard-coded family

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CommitteeStateError, Result};
use crate::instruction::{SwapShardInstruction, SwapType};
use crate::keys::{Penalty, ShardId, ValidatorKey};
use crate::swap_rule_v2::SwapRuleV2;
use crate::swap_rule_v3::SwapRuleV3;

/// Stored swap rule version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapRuleVersion {
    V2,
    V3,
}

impl TryFrom<u8> for SwapRuleVersion {
    type Error = CommitteeStateError;

    fn try_from(version: u8) -> Result<Self> {
        match version {
            2 => Ok(SwapRuleVersion::V2),
            3 => Ok(SwapRuleVersion::V3),
            other => Err(CommitteeStateError::InvalidConfig(format!(
                "unsupported swap rule version {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SwapRuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapRuleVersion::V2 => write!(f, "swap-rule-v2"),
            SwapRuleVersion::V3 => write!(f, "swap-rule-v3"),
        }
    }
}

/// Inputs of one shard-level swap.
#[derive(Debug, Clone, Copy)]
pub struct SwapRequest<'a> {
    /// Shard whose committee rotates.
    pub shard_id: ShardId,
    /// Current committee in seat order.
    pub committee: &'a [ValidatorKey],
    /// Substitute list, front first.
    pub substitutes: &'a [ValidatorKey],
    /// Committee size below which no routine swap-out happens.
    pub min_committee_size: usize,
    /// Committee size swap-in never exceeds.
    pub max_committee_size: usize,
    /// Reason copied into the emitted instruction.
    pub swap_type: SwapType,
    /// Length of the committee prefix that is never removed.
    pub number_of_fixed_validators: usize,
    /// Members penalized in the closing epoch; presence alone marks them slashable.
    pub penalties: &'a BTreeMap<ValidatorKey, Penalty>,
}

/// Result of one shard-level swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Swap instruction a block producer would emit for this shard.
    pub instruction: SwapShardInstruction,
    pub new_committee: Vec<ValidatorKey>,
    pub new_substitutes: Vec<ValidatorKey>,
    /// Removed for a penalty; their stake is returned.
    pub slashed: Vec<ValidatorKey>,
    /// Removed by routine rotation; auto-staking keys re-enter the cycle.
    pub normal_swapped_out: Vec<ValidatorKey>,
    pub swapped_in: Vec<ValidatorKey>,
}

/// Inputs of the reputation-driven beacon swap.
#[derive(Debug, Clone, Copy)]
pub struct BeaconSwapRequest<'a> {
    pub committee: &'a [ValidatorKey],
    pub substitutes: &'a [ValidatorKey],
    pub min_committee_size: usize,
    pub max_committee_size: usize,
    pub number_of_fixed_validators: usize,
    /// Vote power per key; missing keys weigh zero.
    pub reputation: &'a BTreeMap<ValidatorKey, u64>,
    /// Epoch performance score per committee member.
    pub performance: &'a BTreeMap<ValidatorKey, u64>,
    /// Members scoring below this are slashing candidates.
    pub lowest_performance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconSwapOutcome {
    pub new_committee: Vec<ValidatorKey>,
    pub new_substitutes: Vec<ValidatorKey>,
    pub swapped_in: Vec<ValidatorKey>,
    pub swapped_out: Vec<ValidatorKey>,
    pub slashed: Vec<ValidatorKey>,
}

/// Shard-level swap strategy.
pub trait SwapRuleProcessor {
    fn process(&self, request: &SwapRequest<'_>) -> Result<SwapOutcome>;

    /// Number of candidates a shard may absorb at the next assignment.
    fn assign_offset(
        &self,
        len_substitutes: usize,
        len_committee: usize,
        number_of_fixed_validators: usize,
        min_committee_size: usize,
    ) -> usize;

    fn version(&self) -> SwapRuleVersion;
}

/// Closed set of swap strategies selected by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapRule {
    V2(SwapRuleV2),
    V3(SwapRuleV3),
}

impl SwapRule {
    pub fn from_version(version: SwapRuleVersion) -> Self {
        match version {
            SwapRuleVersion::V2 => SwapRule::V2(SwapRuleV2),
            SwapRuleVersion::V3 => SwapRule::V3(SwapRuleV3),
        }
    }

    /// Beacon swap; only rule families with a beacon variant return a value.
    pub fn process_beacon(&self, request: &BeaconSwapRequest<'_>) -> Option<BeaconSwapOutcome> {
        match self {
            SwapRule::V2(_) => None,
            SwapRule::V3(rule) => Some(rule.process_beacon(request)),
        }
    }
}

impl SwapRuleProcessor for SwapRule {
    fn process(&self, request: &SwapRequest<'_>) -> Result<SwapOutcome> {
        match self {
            SwapRule::V2(rule) => rule.process(request),
            SwapRule::V3(rule) => rule.process(request),
        }
    }

    fn assign_offset(&self, len_substitutes: usize, len_committee: usize, fixed: usize, min: usize) -> usize {
        match self {
            SwapRule::V2(rule) => rule.assign_offset(len_substitutes, len_committee, fixed, min),
            SwapRule::V3(rule) => rule.assign_offset(len_substitutes, len_committee, fixed, min),
        }
    }

    fn version(&self) -> SwapRuleVersion {
        match self {
            SwapRule::V2(rule) => rule.version(),
            SwapRule::V3(rule) => rule.version(),
        }
    }
}

/// Reject committees that are already shorter than their fixed prefix.
pub(crate) fn check_fixed_prefix(request: &SwapRequest<'_>) -> Result<()> {
    if request.committee.len() < request.number_of_fixed_validators {
        return Err(CommitteeStateError::precondition(format!(
            "shard {} committee has {} members, fewer than {} fixed validators",
            request.shard_id,
            request.committee.len(),
            request.number_of_fixed_validators
        )));
    }
    Ok(())
}

/// Slash penalized keys of the flexible suffix, in committee order, up to `budget`.
///
/// Returns (remaining committee, slashed keys).
pub(crate) fn slash_flexible_suffix(
    committee: &[ValidatorKey],
    number_of_fixed_validators: usize,
    penalties: &BTreeMap<ValidatorKey, Penalty>,
    budget: usize,
) -> (Vec<ValidatorKey>, Vec<ValidatorKey>) {
    let fixed = number_of_fixed_validators.min(committee.len());
    let mut remaining = committee[..fixed].to_vec();
    let mut slashed = Vec::new();
    for key in &committee[fixed..] {
        if slashed.len() < budget && penalties.contains_key(key) {
            slashed.push(key.clone());
        } else {
            remaining.push(key.clone());
        }
    }
    (remaining, slashed)
}

/// Remove `offset` keys from the front of the flexible suffix.
///
/// Returns (remaining committee, swapped out keys).
pub(crate) fn swap_out_front(
    committee: &[ValidatorKey],
    number_of_fixed_validators: usize,
    offset: usize,
) -> (Vec<ValidatorKey>, Vec<ValidatorKey>) {
    let fixed = number_of_fixed_validators.min(committee.len());
    let end = (fixed + offset).min(committee.len());
    let swapped_out = committee[fixed..end].to_vec();
    let mut remaining = committee[..fixed].to_vec();
    remaining.extend_from_slice(&committee[end..]);
    (remaining, swapped_out)
}

/// Fold the four stages into an outcome and its instruction.
pub(crate) fn build_outcome(
    request: &SwapRequest<'_>,
    committee_after_out: Vec<ValidatorKey>,
    swap_in_offset: usize,
    slashed: Vec<ValidatorKey>,
    normal_swapped_out: Vec<ValidatorKey>,
) -> SwapOutcome {
    let swap_in_offset = swap_in_offset.min(request.substitutes.len());
    let swapped_in = request.substitutes[..swap_in_offset].to_vec();
    let new_substitutes = request.substitutes[swap_in_offset..].to_vec();
    let mut new_committee = committee_after_out;
    new_committee.extend_from_slice(&swapped_in);

    let instruction = if swapped_in.is_empty() && slashed.is_empty() && normal_swapped_out.is_empty() {
        SwapShardInstruction::empty(request.shard_id, request.swap_type)
    } else {
        let mut out = slashed.clone();
        out.extend_from_slice(&normal_swapped_out);
        SwapShardInstruction::new(swapped_in.clone(), out, request.shard_id, request.swap_type)
    };

    SwapOutcome {
        instruction,
        new_committee,
        new_substitutes,
        slashed,
        normal_swapped_out,
        swapped_in,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::keys;

    #[test]
    fn test_version_from_config_value() {
        assert_eq!(SwapRuleVersion::try_from(2).unwrap(), SwapRuleVersion::V2);
        assert_eq!(SwapRuleVersion::try_from(3).unwrap(), SwapRuleVersion::V3);
        assert!(SwapRuleVersion::try_from(1).is_err());
        assert_eq!(SwapRule::from_version(SwapRuleVersion::V3).version(), SwapRuleVersion::V3);
    }

    #[test]
    fn test_slash_respects_fixed_prefix_and_budget() {
        let committee = keys(6);
        let mut penalties = BTreeMap::new();
        for k in &committee {
            penalties.insert(k.clone(), Penalty::default());
        }
        let (remaining, slashed) = slash_flexible_suffix(&committee, 2, &penalties, 3);
        assert_eq!(slashed, committee[2..5].to_vec());
        assert_eq!(remaining, vec![committee[0].clone(), committee[1].clone(), committee[5].clone()]);
    }

    #[test]
    fn test_swap_out_front_of_suffix() {
        let committee = keys(5);
        let (remaining, out) = swap_out_front(&committee, 2, 2);
        assert_eq!(out, committee[2..4].to_vec());
        assert_eq!(remaining, vec![committee[0].clone(), committee[1].clone(), committee[4].clone()]);
    }

    #[test]
    fn test_beacon_swap_is_v3_only() {
        let committee = keys(4);
        let empty = BTreeMap::new();
        let request = BeaconSwapRequest {
            committee: &committee,
            substitutes: &[],
            min_committee_size: 4,
            max_committee_size: 4,
            number_of_fixed_validators: 4,
            reputation: &empty,
            performance: &empty,
            lowest_performance: 0,
        };
        assert!(SwapRule::from_version(SwapRuleVersion::V2).process_beacon(&request).is_none());
        assert!(SwapRule::from_version(SwapRuleVersion::V3).process_beacon(&request).is_some());
    }
}

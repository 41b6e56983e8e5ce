// Assign Rules - Versioned candidate-to-shard distribution
//
// SAFETY INVARIANTS:
// 1. Every candidate is assigned to exactly one shard
// 2. Assignment depends only on (candidates, validator counts, seed)
// 3. Beacon filters run in fixed order; a candidate rejected by one filter
//    is never evaluated by the next

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::assign_rule_v2::AssignRuleV2;
use crate::assign_rule_v3::AssignRuleV3;
use crate::error::{CommitteeStateError, Result};
use crate::keys::{ShardId, ValidatorKey};
use crate::staker_store::StakerStore;

/// Stored assign rule version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignRuleVersion {
    V2,
    V3,
}

impl TryFrom<u8> for AssignRuleVersion {
    type Error = CommitteeStateError;

    fn try_from(version: u8) -> Result<Self> {
        match version {
            2 => Ok(AssignRuleVersion::V2),
            3 => Ok(AssignRuleVersion::V3),
            other => Err(CommitteeStateError::InvalidConfig(format!(
                "unsupported assign rule version {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AssignRuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignRuleVersion::V2 => write!(f, "assign-rule-v2"),
            AssignRuleVersion::V3 => write!(f, "assign-rule-v3"),
        }
    }
}

/// Delegation state of a beacon candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationInfo {
    pub current_delegators: i64,
}

/// Read-only view used by the beacon candidate filters.
pub struct BeaconAssignEnvironment<'a> {
    pub shard_committee: &'a BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub shard_substitute: &'a BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub shard_syncing: &'a BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub shard_common_pool: &'a [ValidatorKey],
    pub required_active_times: u64,
    pub delegations: &'a BTreeMap<ValidatorKey, DelegationInfo>,
    pub store: &'a dyn StakerStore,
}

/// Partition of beacon candidates produced by the filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeaconAssignment {
    pub to_pending: Vec<ValidatorKey>,
    pub stay_waiting: Vec<ValidatorKey>,
    pub should_remove: Vec<ValidatorKey>,
}

/// Shard-level assignment strategy.
pub trait AssignRuleProcessor {
    fn process(
        &self,
        candidates: &[ValidatorKey],
        number_of_validators: &[usize],
        seed: i64,
    ) -> BTreeMap<ShardId, Vec<ValidatorKey>>;

    fn version(&self) -> AssignRuleVersion;
}

/// Closed set of assign strategies selected by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignRule {
    V2(AssignRuleV2),
    V3(AssignRuleV3),
}

impl AssignRule {
    pub fn from_version(version: AssignRuleVersion) -> Self {
        match version {
            AssignRuleVersion::V2 => AssignRule::V2(AssignRuleV2),
            AssignRuleVersion::V3 => AssignRule::V3(AssignRuleV3),
        }
    }

    /// Whether randomly assigned candidates sync with their shard before
    /// joining its substitute list.
    pub fn uses_sync_pool(&self) -> bool {
        matches!(self, AssignRule::V3(_))
    }

    /// Beacon candidate filtering; only rule families with a beacon variant return a value.
    pub fn process_beacon(
        &self,
        candidates: &[ValidatorKey],
        env: &BeaconAssignEnvironment<'_>,
    ) -> Option<BeaconAssignment> {
        match self {
            AssignRule::V2(_) => None,
            AssignRule::V3(rule) => Some(rule.process_beacon(candidates, env)),
        }
    }
}

impl AssignRuleProcessor for AssignRule {
    fn process(
        &self,
        candidates: &[ValidatorKey],
        number_of_validators: &[usize],
        seed: i64,
    ) -> BTreeMap<ShardId, Vec<ValidatorKey>> {
        match self {
            AssignRule::V2(rule) => rule.process(candidates, number_of_validators, seed),
            AssignRule::V3(rule) => rule.process(candidates, number_of_validators, seed),
        }
    }

    fn version(&self) -> AssignRuleVersion {
        match self {
            AssignRule::V2(rule) => rule.version(),
            AssignRule::V3(rule) => rule.version(),
        }
    }
}

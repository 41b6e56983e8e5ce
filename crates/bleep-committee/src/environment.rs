// Per-batch inputs supplied by the beacon block being processed

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assign_rule::DelegationInfo;
use crate::keys::{Penalty, ValidatorKey};

/// Everything one `update_committee_state` call needs besides the state itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeStateEnv {
    pub beacon_height: u64,
    pub epoch: u64,
    /// Raw instruction tuples, processed strictly in this order.
    pub beacon_instructions: Vec<Vec<String>>,
    /// Snapshot the current-epoch candidates at the start of the batch.
    #[serde(default)]
    pub is_beacon_random_time: bool,
    /// Run beacon swap/slash and beacon candidate assignment after the instructions.
    #[serde(default)]
    pub is_beacon_change_time: bool,
    /// Seed used to re-assign swapped-out auto-staking validators.
    #[serde(default)]
    pub random_number: i64,
    #[serde(default)]
    pub penalties: BTreeMap<ValidatorKey, Penalty>,
    #[serde(default)]
    pub beacon_reputation: BTreeMap<ValidatorKey, u64>,
    #[serde(default)]
    pub beacon_performance: BTreeMap<ValidatorKey, u64>,
    #[serde(default)]
    pub delegations: BTreeMap<ValidatorKey, DelegationInfo>,
}

impl CommitteeStateEnv {
    pub fn with_instructions(beacon_instructions: Vec<Vec<String>>) -> Self {
        CommitteeStateEnv {
            beacon_instructions,
            ..Default::default()
        }
    }
}

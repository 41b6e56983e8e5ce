// BLEEP committee rotation
//
// Swap rules, assign rules and the two-phase committee state engine that
// folds beacon instructions into shard and beacon committee membership.

pub mod error;
pub mod keys;
pub mod list_ops;
pub mod config;
pub mod environment;
pub mod instruction;
pub mod committee_change;
pub mod staker_store;

pub mod swap_rule;
pub mod swap_rule_v2;
pub mod swap_rule_v3;
pub mod assign_rule;
pub mod assign_rule_v2;
pub mod assign_rule_v3;

pub mod committee_state;
pub mod state_engine;

#[cfg(test)]
mod fixtures;

pub use assign_rule::{AssignRule, AssignRuleProcessor, AssignRuleVersion, DelegationInfo};
pub use committee_change::CommitteeChange;
pub use committee_state::{CommitteeState, StateHash};
pub use config::{CommitteeConfig, CommitteeConfigFile};
pub use environment::CommitteeStateEnv;
pub use error::{CommitteeStateError, Result};
pub use instruction::Instruction;
pub use keys::{Penalty, ShardId, ValidatorKey};
pub use staker_store::{InMemoryStakerStore, StakerInfo, StakerStore, StoreError};
pub use state_engine::{BatchResult, CommitteeStateEngine};
pub use swap_rule::{SwapRule, SwapRuleProcessor, SwapRuleVersion};

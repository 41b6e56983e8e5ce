// Committee Config - Sizes, shard count and rule versions
//
// SAFETY INVARIANTS:
// 1. Parameters are fixed at genesis; every node must load identical values
// 2. Unsupported rule versions are rejected here, never at processing time
// 3. Fixed validators never exceed the minimum committee size

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::assign_rule::AssignRuleVersion;
use crate::error::{CommitteeStateError, Result};
use crate::swap_rule::SwapRuleVersion;

/// Raw, unvalidated committee parameters as found in a config source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeConfigFile {
    pub min_committee_size: usize,
    pub max_committee_size: usize,
    pub number_of_fixed_validators: usize,
    pub min_beacon_committee_size: usize,
    pub max_beacon_committee_size: usize,
    pub number_of_fixed_beacon_validators: usize,
    pub active_shards: u8,
    pub swap_rule_version: u8,
    pub assign_rule_version: u8,
    #[serde(default)]
    pub required_active_times: u64,
    #[serde(default)]
    pub lowest_performance_threshold: u64,
}

/// Validated committee configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeConfig {
    pub min_committee_size: usize,
    pub max_committee_size: usize,
    pub number_of_fixed_validators: usize,
    pub min_beacon_committee_size: usize,
    pub max_beacon_committee_size: usize,
    pub number_of_fixed_beacon_validators: usize,
    pub active_shards: u8,
    pub swap_rule_version: SwapRuleVersion,
    pub assign_rule_version: AssignRuleVersion,
    pub required_active_times: u64,
    pub lowest_performance_threshold: u64,
}

fn check_sizes(label: &str, min: usize, max: usize, fixed: usize) -> Result<()> {
    if min == 0 {
        return Err(CommitteeStateError::InvalidConfig(format!("{} min committee size must be > 0", label)));
    }
    if min > max {
        return Err(CommitteeStateError::InvalidConfig(format!(
            "{} min committee size {} exceeds max {}",
            label, min, max
        )));
    }
    if fixed > min {
        return Err(CommitteeStateError::InvalidConfig(format!(
            "{} fixed validators {} exceed min committee size {}",
            label, fixed, min
        )));
    }
    Ok(())
}

impl CommitteeConfig {
    /// Validate raw parameters.
    ///
    /// SAFETY: Rejects anything that would let a swap break the committee
    /// size bounds or dispatch to a rule family that does not exist.
    pub fn new(raw: CommitteeConfigFile) -> Result<Self> {
        check_sizes(
            "shard",
            raw.min_committee_size,
            raw.max_committee_size,
            raw.number_of_fixed_validators,
        )?;
        check_sizes(
            "beacon",
            raw.min_beacon_committee_size,
            raw.max_beacon_committee_size,
            raw.number_of_fixed_beacon_validators,
        )?;
        if raw.active_shards == 0 {
            return Err(CommitteeStateError::InvalidConfig("active shards must be > 0".to_string()));
        }

        Ok(CommitteeConfig {
            min_committee_size: raw.min_committee_size,
            max_committee_size: raw.max_committee_size,
            number_of_fixed_validators: raw.number_of_fixed_validators,
            min_beacon_committee_size: raw.min_beacon_committee_size,
            max_beacon_committee_size: raw.max_beacon_committee_size,
            number_of_fixed_beacon_validators: raw.number_of_fixed_beacon_validators,
            active_shards: raw.active_shards,
            swap_rule_version: SwapRuleVersion::try_from(raw.swap_rule_version)?,
            assign_rule_version: AssignRuleVersion::try_from(raw.assign_rule_version)?,
            required_active_times: raw.required_active_times,
            lowest_performance_threshold: raw.lowest_performance_threshold,
        })
    }

    /// Load from a file, with `BLEEP_COMMITTEE__*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw: CommitteeConfigFile = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BLEEP_COMMITTEE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CommitteeStateError::InvalidConfig(e.to_string()))?;
        Self::new(raw)
    }
}

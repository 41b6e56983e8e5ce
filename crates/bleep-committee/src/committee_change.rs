// Committee Change - Per-batch diff of every committee mutation
//
// SAFETY INVARIANTS:
// 1. A change is created empty at the start of each batch
// 2. Every key added to or removed from a committee or substitute pool is
//    recorded exactly once in the matching list

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::keys::{ShardId, ValidatorKey};

/// Diff produced by one instruction batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeChange {
    pub next_epoch_shard_candidate_added: Vec<ValidatorKey>,
    pub next_epoch_shard_candidate_removed: Vec<ValidatorKey>,
    pub current_epoch_shard_candidate_added: Vec<ValidatorKey>,
    pub current_epoch_shard_candidate_removed: Vec<ValidatorKey>,

    pub next_epoch_beacon_candidate_added: Vec<ValidatorKey>,
    pub next_epoch_beacon_candidate_removed: Vec<ValidatorKey>,

    pub shard_substitute_added: BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub shard_substitute_removed: BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub shard_committee_added: BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub shard_committee_removed: BTreeMap<ShardId, Vec<ValidatorKey>>,

    pub syncing_pool_added: BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub syncing_pool_removed: BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub finished_sync_validators: BTreeMap<ShardId, Vec<ValidatorKey>>,

    pub beacon_substitute_added: Vec<ValidatorKey>,
    pub beacon_substitute_removed: Vec<ValidatorKey>,
    pub beacon_committee_added: Vec<ValidatorKey>,
    pub beacon_committee_removed: Vec<ValidatorKey>,

    pub stop_auto_stake: Vec<ValidatorKey>,
    pub removed_staker: Vec<ValidatorKey>,
    pub slashing_committee: BTreeMap<ShardId, Vec<ValidatorKey>>,
    pub slashing_beacon: Vec<ValidatorKey>,
}

fn extend_shard(map: &mut BTreeMap<ShardId, Vec<ValidatorKey>>, shard: ShardId, keys: &[ValidatorKey]) {
    if keys.is_empty() {
        return;
    }
    map.entry(shard).or_default().extend_from_slice(keys);
}

impl CommitteeChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_next_epoch_shard_candidates(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.next_epoch_shard_candidate_added.extend_from_slice(keys);
        self
    }

    pub fn remove_next_epoch_shard_candidates(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.next_epoch_shard_candidate_removed.extend_from_slice(keys);
        self
    }

    pub fn add_current_epoch_shard_candidates(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.current_epoch_shard_candidate_added.extend_from_slice(keys);
        self
    }

    pub fn remove_current_epoch_shard_candidates(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.current_epoch_shard_candidate_removed.extend_from_slice(keys);
        self
    }

    pub fn add_next_epoch_beacon_candidates(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.next_epoch_beacon_candidate_added.extend_from_slice(keys);
        self
    }

    pub fn remove_next_epoch_beacon_candidates(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.next_epoch_beacon_candidate_removed.extend_from_slice(keys);
        self
    }

    pub fn add_shard_substitutes(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.shard_substitute_added, shard, keys);
        self
    }

    pub fn remove_shard_substitutes(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.shard_substitute_removed, shard, keys);
        self
    }

    pub fn add_shard_committee(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.shard_committee_added, shard, keys);
        self
    }

    pub fn remove_shard_committee(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.shard_committee_removed, shard, keys);
        self
    }

    pub fn add_syncing(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.syncing_pool_added, shard, keys);
        self
    }

    /// Keys that left the sync pool because they finished syncing.
    pub fn finish_syncing(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.syncing_pool_removed, shard, keys);
        extend_shard(&mut self.finished_sync_validators, shard, keys);
        self
    }

    pub fn add_beacon_substitutes(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.beacon_substitute_added.extend_from_slice(keys);
        self
    }

    pub fn remove_beacon_substitutes(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.beacon_substitute_removed.extend_from_slice(keys);
        self
    }

    pub fn add_beacon_committee(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.beacon_committee_added.extend_from_slice(keys);
        self
    }

    pub fn remove_beacon_committee(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.beacon_committee_removed.extend_from_slice(keys);
        self
    }

    pub fn add_stop_auto_stake(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.stop_auto_stake.extend_from_slice(keys);
        self
    }

    pub fn add_removed_stakers(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.removed_staker.extend_from_slice(keys);
        self
    }

    pub fn add_slashing_committee(&mut self, shard: ShardId, keys: &[ValidatorKey]) -> &mut Self {
        extend_shard(&mut self.slashing_committee, shard, keys);
        self
    }

    pub fn add_slashing_beacon(&mut self, keys: &[ValidatorKey]) -> &mut Self {
        self.slashing_beacon.extend_from_slice(keys);
        self
    }

    /// True when the batch touched nothing.
    pub fn is_empty(&self) -> bool {
        *self == CommitteeChange::default()
    }
}

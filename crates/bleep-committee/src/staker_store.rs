// Staker Store - Narrow interface to persisted stake metadata
//
// SAFETY INVARIANTS:
// 1. Reads are synchronous and never retried inside the committee core
// 2. Writes happen only on commit, never while a batch is being processed
// 3. A commit's record writes and deletions land in one store call

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::ValidatorKey;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("staker store backend failure: {0}")]
    Backend(String),

    #[error("corrupted staker record for {0}")]
    Corrupted(String),
}

/// Stake metadata persisted per validator key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerInfo {
    pub reward_receiver: String,
    pub auto_stake: bool,
    pub staking_tx_id: String,
}

/// Beacon staker record (beacon-flow only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconStakerInfo {
    pub active_times_in_committee: u64,
}

/// Storage collaborator used by the committee state engine.
#[cfg_attr(test, mockall::automock)]
pub trait StakerStore: Send + Sync {
    fn get_staker_info(&self, key: &ValidatorKey) -> Result<Option<StakerInfo>, StoreError>;

    fn store_staker_info(&self, entries: Vec<(ValidatorKey, StakerInfo)>) -> Result<(), StoreError>;

    fn get_beacon_staker_info(&self, key: &ValidatorKey) -> Result<Option<BeaconStakerInfo>, StoreError>;

    /// Apply one commit's record changes. An error means nothing was applied.
    fn apply_staker_changes(
        &self,
        writes: Vec<(ValidatorKey, StakerInfo)>,
        deletes: Vec<ValidatorKey>,
    ) -> Result<(), StoreError>;
}

/// In-process store for tests, tooling and single-node replay.
#[derive(Debug, Default)]
pub struct InMemoryStakerStore {
    stakers: DashMap<ValidatorKey, StakerInfo>,
    beacon_stakers: DashMap<ValidatorKey, BeaconStakerInfo>,
}

impl InMemoryStakerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_beacon_staker(&self, key: ValidatorKey, info: BeaconStakerInfo) {
        self.beacon_stakers.insert(key, info);
    }

    pub fn len(&self) -> usize {
        self.stakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakers.is_empty()
    }
}

impl StakerStore for InMemoryStakerStore {
    fn get_staker_info(&self, key: &ValidatorKey) -> Result<Option<StakerInfo>, StoreError> {
        Ok(self.stakers.get(key).map(|entry| entry.value().clone()))
    }

    fn store_staker_info(&self, entries: Vec<(ValidatorKey, StakerInfo)>) -> Result<(), StoreError> {
        for (key, info) in entries {
            self.stakers.insert(key, info);
        }
        Ok(())
    }

    fn get_beacon_staker_info(&self, key: &ValidatorKey) -> Result<Option<BeaconStakerInfo>, StoreError> {
        Ok(self.beacon_stakers.get(key).map(|entry| entry.value().clone()))
    }

    fn apply_staker_changes(
        &self,
        writes: Vec<(ValidatorKey, StakerInfo)>,
        deletes: Vec<ValidatorKey>,
    ) -> Result<(), StoreError> {
        for key in deletes {
            self.stakers.remove(&key);
        }
        self.store_staker_info(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_delete() {
        let store = InMemoryStakerStore::new();
        let key = ValidatorKey::new("key1");
        let info = StakerInfo {
            reward_receiver: "r1".to_string(),
            auto_stake: true,
            staking_tx_id: "tx1".to_string(),
        };
        store.store_staker_info(vec![(key.clone(), info.clone())]).unwrap();
        assert_eq!(store.get_staker_info(&key).unwrap(), Some(info.clone()));
        store.apply_staker_changes(Vec::new(), vec![key.clone()]).unwrap();
        assert_eq!(store.get_staker_info(&key).unwrap(), None);
        assert!(store.is_empty());

        let other = ValidatorKey::new("key2");
        store
            .apply_staker_changes(vec![(other.clone(), info.clone())], vec![key.clone()])
            .unwrap();
        assert_eq!(store.get_staker_info(&other).unwrap(), Some(info));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_beacon_staker_lookup() {
        let store = InMemoryStakerStore::new();
        let key = ValidatorKey::new("key1");
        assert_eq!(store.get_beacon_staker_info(&key).unwrap(), None);
        store.insert_beacon_staker(key.clone(), BeaconStakerInfo { active_times_in_committee: 4 });
        assert_eq!(store.get_beacon_staker_info(&key).unwrap().unwrap().active_times_in_committee, 4);
    }
}

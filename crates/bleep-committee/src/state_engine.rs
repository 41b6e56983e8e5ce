// Committee State Engine - Two-phase (Final / Uncommitted) instruction processor
//
// SAFETY INVARIANTS:
// 1. Exactly two snapshots exist: Final and Uncommitted
// 2. A failed batch leaves both snapshots untouched
// 3. Final is replaced by a single pointer swap, never mutated in place
// 4. Processing, commit and abort are serialized; readers never block on them
//    for longer than a pointer clone

use log::{error, info};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::committee_change::CommitteeChange;
use crate::committee_state::{BatchContext, CommitteeState, StateHash};
use crate::config::CommitteeConfig;
use crate::environment::CommitteeStateEnv;
use crate::error::{CommitteeStateError, Result};
use crate::instruction::Instruction;
use crate::keys::ValidatorKey;
use crate::staker_store::StakerStore;

/// Output of one processed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub state_hash: StateHash,
    pub committee_change: CommitteeChange,
    /// Stake-return tuples to embed in the block being built.
    pub side_effect_instructions: Vec<Vec<String>>,
}

pub struct CommitteeStateEngine {
    config: CommitteeConfig,
    store: Arc<dyn StakerStore>,
    final_state: RwLock<Arc<CommitteeState>>,
    uncommitted: RwLock<Option<Arc<CommitteeState>>>,
    processing: Mutex<()>,
}

impl CommitteeStateEngine {
    /// Create an engine from a genesis or restored state.
    pub fn new(config: CommitteeConfig, state: CommitteeState, store: Arc<dyn StakerStore>) -> Result<Self> {
        state.validate(&config)?;
        info!(
            "Committee state engine started: {} shards, {}, {}",
            config.active_shards, state.swap_rule, state.assign_rule
        );
        Ok(CommitteeStateEngine {
            config,
            store,
            final_state: RwLock::new(Arc::new(state)),
            uncommitted: RwLock::new(None),
            processing: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &CommitteeConfig {
        &self.config
    }

    pub fn final_state(&self) -> Arc<CommitteeState> {
        self.final_state.read().clone()
    }

    pub fn uncommitted_state(&self) -> Option<Arc<CommitteeState>> {
        self.uncommitted.read().clone()
    }

    /// Query against Final; never sees in-flight changes.
    pub fn is_committee_member(&self, key: &ValidatorKey) -> bool {
        let state = self.final_state();
        state.beacon_committee.contains(key) || state.shard_of_committee_member(key).is_some()
    }

    /// Process one instruction batch against Uncommitted (or a fresh copy of Final).
    ///
    /// SAFETY: All tuples are decoded before anything is applied, and the
    /// batch runs on a private clone that is only published on success.
    pub fn update_committee_state(&self, env: &CommitteeStateEnv) -> Result<BatchResult> {
        let _guard = self.processing.lock();

        let instructions = env
            .beacon_instructions
            .iter()
            .map(|tuple| Instruction::from_tuple(tuple))
            .collect::<Result<Vec<_>>>()?;

        let base = match self.uncommitted.read().clone() {
            Some(state) => state,
            None => self.final_state.read().clone(),
        };
        let mut working = (*base).clone();
        let mut ctx = BatchContext::new(&self.config, self.store.as_ref(), env);

        if let Err(e) = working.apply_batch(&instructions, &mut ctx) {
            error!("Batch at beacon height {} rejected: {}", env.beacon_height, e);
            return Err(e);
        }

        let state_hash = working.hash()?;
        let side_effect_instructions = if ctx.returns.is_empty() {
            Vec::new()
        } else {
            vec![Instruction::ReturnStake(ctx.returns).to_tuple()]
        };
        *self.uncommitted.write() = Some(Arc::new(working));

        info!(
            "Processed {} instructions at beacon height {}",
            instructions.len(),
            env.beacon_height
        );
        Ok(BatchResult {
            state_hash,
            committee_change: ctx.change,
            side_effect_instructions,
        })
    }

    /// Promote Uncommitted to Final and persist stake metadata changes.
    pub fn commit(&self) -> Result<StateHash> {
        let _guard = self.processing.lock();
        self.commit_locked(None)
    }

    /// Commit only if Uncommitted hashes to `expected`.
    pub fn commit_verified(&self, expected: &StateHash) -> Result<StateHash> {
        let _guard = self.processing.lock();
        self.commit_locked(Some(expected))
    }

    fn commit_locked(&self, expected: Option<&StateHash>) -> Result<StateHash> {
        let uncommitted = self
            .uncommitted
            .read()
            .clone()
            .ok_or(CommitteeStateError::NothingToCommit)?;
        let hash = uncommitted.hash()?;
        if let Some(expected) = expected {
            if *expected != hash {
                return Err(CommitteeStateError::HashMismatch {
                    expected: format!("{:?}", expected),
                    actual: format!("{:?}", hash),
                });
            }
        }

        let writes = uncommitted.staker_writes(self.store.as_ref())?;
        let deletes: Vec<ValidatorKey> = uncommitted.pending_store_deletes.iter().cloned().collect();
        if !writes.is_empty() || !deletes.is_empty() {
            let (written, deleted) = (writes.len(), deletes.len());
            if let Err(e) = self.store.apply_staker_changes(writes, deletes) {
                error!("Commit of {} staker writes and {} deletes failed: {}", written, deleted, e);
                return Err(e.into());
            }
        }

        let mut next = (*uncommitted).clone();
        next.pending_store_writes.clear();
        next.pending_store_deletes.clear();
        *self.final_state.write() = Arc::new(next);
        *self.uncommitted.write() = None;
        info!("Committed committee state {}", hash.shard_committee_and_validator_hash);
        Ok(hash)
    }

    /// Drop Uncommitted; Final is untouched.
    pub fn abort_uncommitted(&self) {
        let _guard = self.processing.lock();
        if self.uncommitted.write().take().is_some() {
            info!("Uncommitted committee state discarded");
        }
    }
}

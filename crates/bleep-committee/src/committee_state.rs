// Committee State - Full committee/substitute/candidate graph and batch processing
//
// SAFETY INVARIANTS:
// 1. A key sits in at most one of: committee, substitute pool, candidate pool
// 2. Instructions are applied strictly in input order to a private working copy
// 3. Every committee/substitute mutation is mirrored in the batch CommitteeChange
// 4. Stake is returned exactly once for every key that leaves the validator cycle
// 5. A syncing key joins its shard's substitute list only through a finish-sync
//    instruction for that same shard

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::{BTreeMap, BTreeSet};

use crate::assign_rule::{AssignRule, AssignRuleProcessor, AssignRuleVersion, BeaconAssignEnvironment};
use crate::committee_change::CommitteeChange;
use crate::config::CommitteeConfig;
use crate::environment::CommitteeStateEnv;
use crate::error::{CommitteeStateError, Result};
use crate::instruction::{
    ChainKind, FinishSyncInstruction, Instruction, RandomInstruction, ReturnStakeInstruction, StakeInstruction, SwapShardInstruction,
};
use crate::keys::{ShardId, ValidatorKey};
use crate::list_ops::{calculate_candidate_position, index_of, same_keys};
use crate::staker_store::{StakerInfo, StakerStore};
use crate::swap_rule::{BeaconSwapRequest, SwapRequest, SwapRule, SwapRuleProcessor, SwapRuleVersion};

/// Per-part commitment to a committee state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHash {
    pub beacon_committee_and_validator_hash: String,
    pub beacon_candidate_hash: String,
    pub shard_candidate_hash: String,
    pub shard_committee_and_validator_hash: String,
    pub shard_syncing_hash: String,
    pub auto_stake_hash: String,
}

fn hash_part<T: Serialize>(part: &T) -> Result<String> {
    let bytes = serde_json::to_vec(part).map_err(|e| CommitteeStateError::Encoding(e.to_string()))?;
    Ok(hex::encode(Sha3_256::digest(&bytes)))
}

/// Mutable scratch shared by the sub-steps of one batch.
pub(crate) struct BatchContext<'a> {
    pub config: &'a CommitteeConfig,
    pub store: &'a dyn StakerStore,
    pub env: &'a CommitteeStateEnv,
    pub change: CommitteeChange,
    pub returns: ReturnStakeInstruction,
}

impl<'a> BatchContext<'a> {
    pub fn new(config: &'a CommitteeConfig, store: &'a dyn StakerStore, env: &'a CommitteeStateEnv) -> Self {
        BatchContext {
            config,
            store,
            env,
            change: CommitteeChange::new(),
            returns: ReturnStakeInstruction::new(),
        }
    }
}

/// Committee, substitute and candidate sets plus stake metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeState {
    /// Ordered beacon committee; the first fixed-beacon-validator entries never rotate.
    pub beacon_committee: Vec<ValidatorKey>,
    /// Beacon candidates that passed the filters and wait for a committee slot.
    pub beacon_substitute: Vec<ValidatorKey>,
    /// Staked beacon candidates not yet filtered.
    pub beacon_waiting: Vec<ValidatorKey>,
    /// Ordered committee of each active shard; the fixed prefix never rotates.
    pub shard_committee: BTreeMap<ShardId, Vec<ValidatorKey>>,
    /// Ordered substitute list of each active shard, front first.
    pub shard_substitute: BTreeMap<ShardId, Vec<ValidatorKey>>,
    /// Keys assigned to a shard that are still catching up with its chain.
    #[serde(default)]
    pub shard_syncing: BTreeMap<ShardId, Vec<ValidatorKey>>,
    /// Staked, unassigned shard candidates; the first
    /// `number_of_assigned_candidates` belong to the current epoch.
    pub shard_common_pool: Vec<ValidatorKey>,
    /// Length of the current-epoch prefix of `shard_common_pool`.
    pub number_of_assigned_candidates: usize,
    /// Whether a swapped-out key re-enters the cycle instead of being refunded.
    pub auto_stake: BTreeMap<ValidatorKey, bool>,
    /// Reward payout address per key.
    pub reward_receiver: BTreeMap<ValidatorKey, String>,
    /// Staking transaction refunded when the key leaves the cycle.
    pub staking_tx: BTreeMap<ValidatorKey, String>,
    /// Swap rule used for shard and beacon rotation.
    pub swap_rule: SwapRuleVersion,
    /// Assign rule used for shard placement and beacon filtering.
    pub assign_rule: AssignRuleVersion,
    /// Keys whose store record must be rewritten on commit.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pending_store_writes: BTreeSet<ValidatorKey>,
    /// Keys whose store record must be deleted on commit.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pending_store_deletes: BTreeSet<ValidatorKey>,
}

impl CommitteeState {
    /// Genesis state with every active shard present and empty pools.
    pub fn genesis(
        config: &CommitteeConfig,
        beacon_committee: Vec<ValidatorKey>,
        shard_committee: BTreeMap<ShardId, Vec<ValidatorKey>>,
    ) -> Result<Self> {
        let mut state = CommitteeState {
            beacon_committee,
            beacon_substitute: Vec::new(),
            beacon_waiting: Vec::new(),
            shard_committee,
            shard_substitute: BTreeMap::new(),
            shard_syncing: BTreeMap::new(),
            shard_common_pool: Vec::new(),
            number_of_assigned_candidates: 0,
            auto_stake: BTreeMap::new(),
            reward_receiver: BTreeMap::new(),
            staking_tx: BTreeMap::new(),
            swap_rule: config.swap_rule_version,
            assign_rule: config.assign_rule_version,
            pending_store_writes: BTreeSet::new(),
            pending_store_deletes: BTreeSet::new(),
        };
        for shard in 0..config.active_shards {
            state.shard_committee.entry(ShardId(shard)).or_default();
            state.shard_substitute.entry(ShardId(shard)).or_default();
            state.shard_syncing.entry(ShardId(shard)).or_default();
        }
        state.validate(config)?;
        Ok(state)
    }

    /// Structural checks run on genesis and restored states.
    pub fn validate(&self, config: &CommitteeConfig) -> Result<()> {
        for shard in 0..config.active_shards {
            let shard = ShardId(shard);
            let committee = self
                .shard_committee
                .get(&shard)
                .ok_or_else(|| CommitteeStateError::precondition(format!("shard {} has no committee", shard)))?;
            if committee.len() < config.number_of_fixed_validators {
                return Err(CommitteeStateError::precondition(format!(
                    "shard {} committee has {} members, fewer than {} fixed validators",
                    shard,
                    committee.len(),
                    config.number_of_fixed_validators
                )));
            }
            if !self.shard_substitute.contains_key(&shard) {
                return Err(CommitteeStateError::precondition(format!("shard {} has no substitute pool", shard)));
            }
        }
        if let Some(shard) = self.shard_syncing.keys().find(|shard| shard.0 >= config.active_shards) {
            return Err(CommitteeStateError::precondition(format!("sync pool for inactive shard {}", shard)));
        }
        if self.number_of_assigned_candidates > self.shard_common_pool.len() {
            return Err(CommitteeStateError::precondition("assigned candidates exceed candidate pool"));
        }

        let mut seen = BTreeSet::new();
        for key in self.all_validators() {
            if !seen.insert(key) {
                return Err(CommitteeStateError::precondition(format!(
                    "validator {} appears in more than one set",
                    key
                )));
            }
        }
        Ok(())
    }

    fn all_validators(&self) -> impl Iterator<Item = &ValidatorKey> {
        self.beacon_committee
            .iter()
            .chain(self.beacon_substitute.iter())
            .chain(self.beacon_waiting.iter())
            .chain(self.shard_committee.values().flatten())
            .chain(self.shard_substitute.values().flatten())
            .chain(self.shard_syncing.values().flatten())
            .chain(self.shard_common_pool.iter())
    }

    /// True if the key is anywhere in the validator cycle.
    pub fn is_validator(&self, key: &ValidatorKey) -> bool {
        self.all_validators().any(|k| k == key)
    }

    /// Shard whose committee holds the key, if any.
    pub fn shard_of_committee_member(&self, key: &ValidatorKey) -> Option<ShardId> {
        self.shard_committee
            .iter()
            .find(|(_, committee)| committee.contains(key))
            .map(|(shard, _)| *shard)
    }

    pub fn current_epoch_candidates(&self) -> &[ValidatorKey] {
        &self.shard_common_pool[..self.number_of_assigned_candidates.min(self.shard_common_pool.len())]
    }

    pub fn next_epoch_candidates(&self) -> &[ValidatorKey] {
        &self.shard_common_pool[self.number_of_assigned_candidates.min(self.shard_common_pool.len())..]
    }

    pub fn hash(&self) -> Result<StateHash> {
        Ok(StateHash {
            beacon_committee_and_validator_hash: hash_part(&self.beacon_committee)?,
            beacon_candidate_hash: hash_part(&(&self.beacon_substitute, &self.beacon_waiting))?,
            shard_candidate_hash: hash_part(&(&self.shard_common_pool, self.number_of_assigned_candidates))?,
            shard_committee_and_validator_hash: hash_part(&(&self.shard_committee, &self.shard_substitute))?,
            shard_syncing_hash: hash_part(&self.shard_syncing)?,
            auto_stake_hash: hash_part(&(&self.auto_stake, &self.reward_receiver, &self.staking_tx))?,
        })
    }

    /// Store records to write on commit, patched over the stored values.
    pub(crate) fn staker_writes(&self, store: &dyn StakerStore) -> Result<Vec<(ValidatorKey, StakerInfo)>> {
        let mut writes = Vec::new();
        for key in self.pending_store_writes.difference(&self.pending_store_deletes) {
            let stored = store
                .get_staker_info(key)
                .map_err(|e| CommitteeStateError::lookup(key.as_str(), e.to_string()))?;
            let mut info = stored.unwrap_or(StakerInfo {
                reward_receiver: String::new(),
                auto_stake: false,
                staking_tx_id: String::new(),
            });
            if let Some(receiver) = self.reward_receiver.get(key) {
                info.reward_receiver = receiver.clone();
            }
            if let Some(flag) = self.auto_stake.get(key) {
                info.auto_stake = *flag;
            }
            if let Some(tx) = self.staking_tx.get(key) {
                info.staking_tx_id = tx.clone();
            }
            writes.push((key.clone(), info));
        }
        Ok(writes)
    }

    // ----- stake metadata -----

    fn auto_stake_of(&self, key: &ValidatorKey, store: &dyn StakerStore) -> Result<bool> {
        if let Some(flag) = self.auto_stake.get(key) {
            return Ok(*flag);
        }
        match store.get_staker_info(key) {
            Ok(Some(info)) => Ok(info.auto_stake),
            Ok(None) => Err(CommitteeStateError::lookup(key.as_str(), "no staker record")),
            Err(e) => Err(CommitteeStateError::lookup(key.as_str(), e.to_string())),
        }
    }

    fn staking_tx_of(&self, key: &ValidatorKey, store: &dyn StakerStore) -> Result<String> {
        if let Some(tx) = self.staking_tx.get(key) {
            return Ok(tx.clone());
        }
        match store.get_staker_info(key) {
            Ok(Some(info)) => Ok(info.staking_tx_id),
            Ok(None) => Err(CommitteeStateError::lookup(key.as_str(), "no staker record")),
            Err(e) => Err(CommitteeStateError::lookup(key.as_str(), e.to_string())),
        }
    }

    fn set_auto_stake(&mut self, key: &ValidatorKey, flag: bool) {
        self.auto_stake.insert(key.clone(), flag);
        self.pending_store_writes.insert(key.clone());
    }

    /// Refund a key that leaves the validator cycle and drop its metadata.
    fn return_stake(&mut self, key: &ValidatorKey, ctx: &mut BatchContext<'_>) -> Result<()> {
        let tx = self.staking_tx_of(key, ctx.store)?;
        ctx.returns.push(key.clone(), tx);
        self.auto_stake.remove(key);
        self.reward_receiver.remove(key);
        self.staking_tx.remove(key);
        self.pending_store_writes.remove(key);
        self.pending_store_deletes.insert(key.clone());
        ctx.change.add_removed_stakers(std::slice::from_ref(key));
        Ok(())
    }

    // ----- batch processing -----

    /// Apply one batch. On error the working copy must be discarded.
    pub(crate) fn apply_batch(&mut self, instructions: &[Instruction], ctx: &mut BatchContext<'_>) -> Result<()> {
        if ctx.env.is_beacon_random_time {
            self.snapshot_current_epoch_candidates(ctx);
        }

        for instruction in instructions {
            match instruction {
                Instruction::Stake(stake) => self.process_stake(stake, ctx)?,
                Instruction::Unstake(unstake) => self.process_unstake(&unstake.public_keys, ctx)?,
                Instruction::StopAutoStake(stop) => self.process_stop_auto_stake(&stop.public_keys, ctx)?,
                Instruction::SwapShard(swap) => self.process_swap_shard(swap, ctx)?,
                Instruction::Random(random) => self.process_random(random, ctx),
                Instruction::FinishSync(finish) => self.process_finish_sync(finish, ctx)?,
                Instruction::ReturnStake(_) => debug!("Return-stake instruction carries no committee change"),
            }
        }

        if ctx.env.is_beacon_change_time {
            self.process_swap_and_slash_beacon(ctx)?;
            self.process_assign_beacon(ctx)?;
        }
        Ok(())
    }

    /// Fix how many pool entries the next RANDOM instruction assigns.
    fn snapshot_current_epoch_candidates(&mut self, ctx: &mut BatchContext<'_>) {
        let rule = SwapRule::from_version(self.swap_rule);
        let capacity: usize = self
            .shard_committee
            .iter()
            .map(|(shard, committee)| {
                let substitutes = self.shard_substitute.get(shard).map_or(0, Vec::len);
                rule.assign_offset(
                    substitutes,
                    committee.len(),
                    ctx.config.number_of_fixed_validators,
                    ctx.config.min_committee_size,
                )
            })
            .sum();
        let previous = self.number_of_assigned_candidates;
        let assigned = capacity.min(self.shard_common_pool.len()).max(previous);
        let promoted = self.shard_common_pool[previous..assigned].to_vec();
        ctx.change
            .remove_next_epoch_shard_candidates(&promoted)
            .add_current_epoch_shard_candidates(&promoted);
        self.number_of_assigned_candidates = assigned;
        info!("Snapshot {} current-epoch shard candidates", assigned);
    }

    fn process_stake(&mut self, stake: &StakeInstruction, ctx: &mut BatchContext<'_>) -> Result<()> {
        for (i, key) in stake.public_keys.iter().enumerate() {
            if self.is_validator(key) {
                return Err(CommitteeStateError::precondition(format!("{} is already staked", key)));
            }
            self.reward_receiver.insert(key.clone(), stake.reward_receivers[i].clone());
            self.staking_tx.insert(key.clone(), stake.staking_tx_ids[i].clone());
            self.set_auto_stake(key, stake.auto_stake_flags[i]);
            self.pending_store_deletes.remove(key);
            match stake.chain {
                ChainKind::Shard => {
                    self.shard_common_pool.push(key.clone());
                    ctx.change.add_next_epoch_shard_candidates(std::slice::from_ref(key));
                }
                ChainKind::Beacon => {
                    self.beacon_waiting.push(key.clone());
                    ctx.change.add_next_epoch_beacon_candidates(std::slice::from_ref(key));
                }
            }
        }
        Ok(())
    }

    fn process_unstake(&mut self, keys: &[ValidatorKey], ctx: &mut BatchContext<'_>) -> Result<()> {
        for key in keys {
            let assigned = self.number_of_assigned_candidates.min(self.shard_common_pool.len());
            if let Some(idx) = index_of(&self.shard_common_pool[assigned..], key) {
                self.shard_common_pool.remove(assigned + idx);
                ctx.change.remove_next_epoch_shard_candidates(std::slice::from_ref(key));
                self.return_stake(key, ctx)?;
                continue;
            }
            if let Some(idx) = index_of(&self.beacon_waiting, key) {
                self.beacon_waiting.remove(idx);
                ctx.change.remove_next_epoch_beacon_candidates(std::slice::from_ref(key));
                self.return_stake(key, ctx)?;
                continue;
            }
            if self.is_validator(key) {
                // principal stays locked until the key is swapped out
                if self.auto_stake_of(key, ctx.store)? {
                    self.set_auto_stake(key, false);
                    ctx.change.add_stop_auto_stake(std::slice::from_ref(key));
                }
                continue;
            }
            warn!("Unstake of unknown validator {} ignored", key);
        }
        Ok(())
    }

    fn process_stop_auto_stake(&mut self, keys: &[ValidatorKey], ctx: &mut BatchContext<'_>) -> Result<()> {
        for key in keys {
            if !self.is_validator(key) {
                if self.auto_stake.remove(key).is_some() {
                    debug!("Dropped stale auto-stake flag of {}", key);
                }
                continue;
            }
            if self.auto_stake_of(key, ctx.store)? {
                self.set_auto_stake(key, false);
                ctx.change.add_stop_auto_stake(std::slice::from_ref(key));
            }
        }
        Ok(())
    }

    fn process_swap_shard(&mut self, swap: &SwapShardInstruction, ctx: &mut BatchContext<'_>) -> Result<()> {
        let shard = swap.shard_id;
        if shard.0 >= ctx.config.active_shards {
            return Err(CommitteeStateError::precondition(format!(
                "swap instruction references unknown shard {}",
                shard
            )));
        }
        let committee = self.shard_committee.get(&shard).cloned().unwrap_or_default();
        let substitutes = self.shard_substitute.get(&shard).cloned().unwrap_or_default();

        let rule = SwapRule::from_version(self.swap_rule);
        let outcome = rule.process(&SwapRequest {
            shard_id: shard,
            committee: &committee,
            substitutes: &substitutes,
            min_committee_size: ctx.config.min_committee_size,
            max_committee_size: ctx.config.max_committee_size,
            swap_type: swap.swap_type,
            number_of_fixed_validators: ctx.config.number_of_fixed_validators,
            penalties: &ctx.env.penalties,
        })?;

        if !same_keys(&outcome.instruction.in_public_keys, &swap.in_public_keys)
            || !same_keys(&outcome.instruction.out_public_keys, &swap.out_public_keys)
        {
            return Err(CommitteeStateError::precondition(format!(
                "swap instruction for shard {} does not match {} result",
                shard,
                rule.version()
            )));
        }

        self.shard_committee.insert(shard, outcome.new_committee);
        self.shard_substitute.insert(shard, outcome.new_substitutes);
        ctx.change
            .remove_shard_committee(shard, &outcome.instruction.out_public_keys)
            .remove_shard_substitutes(shard, &outcome.swapped_in)
            .add_shard_committee(shard, &outcome.swapped_in);

        let mut reassign = Vec::new();
        for key in &outcome.normal_swapped_out {
            if self.auto_stake_of(key, ctx.store)? {
                reassign.push(key.clone());
            } else {
                self.return_stake(key, ctx)?;
            }
        }
        if !reassign.is_empty() {
            self.assign_to_substitutes(&reassign, ctx.env.random_number, ctx);
        }

        for key in &outcome.slashed {
            self.return_stake(key, ctx)?;
        }
        ctx.change.add_slashing_committee(shard, &outcome.slashed);

        info!(
            "Shard {} swap: {} in, {} out, {} slashed",
            shard,
            outcome.swapped_in.len(),
            outcome.normal_swapped_out.len(),
            outcome.slashed.len()
        );
        Ok(())
    }

    fn process_random(&mut self, random: &RandomInstruction, ctx: &mut BatchContext<'_>) {
        let n = self.number_of_assigned_candidates.min(self.shard_common_pool.len());
        let candidates: Vec<ValidatorKey> = self.shard_common_pool.drain(..n).collect();
        self.number_of_assigned_candidates = 0;
        ctx.change.remove_current_epoch_shard_candidates(&candidates);

        let rule = AssignRule::from_version(self.assign_rule);
        if !rule.uses_sync_pool() {
            self.assign_to_substitutes(&candidates, random.random_number, ctx);
            return;
        }
        for (shard, keys) in self.assign_shards(&candidates, random.random_number, ctx) {
            debug!("Shard {} starts syncing {} candidates", shard, keys.len());
            ctx.change.add_syncing(shard, &keys);
            self.shard_syncing.entry(shard).or_default().extend(keys);
        }
    }

    /// Move keys that finished syncing into the shard's substitute list.
    fn process_finish_sync(&mut self, finish: &FinishSyncInstruction, ctx: &mut BatchContext<'_>) -> Result<()> {
        let shard = finish.shard_id;
        let syncing = self.shard_syncing.entry(shard).or_default();
        if let Some(key) = finish.public_keys.iter().find(|key| !syncing.contains(key)) {
            return Err(CommitteeStateError::precondition(format!(
                "{} is not syncing with shard {}",
                key, shard
            )));
        }
        syncing.retain(|key| !finish.public_keys.contains(key));
        ctx.change.finish_syncing(shard, &finish.public_keys);
        self.insert_substitutes(shard, &finish.public_keys, ctx.env.random_number, ctx);
        info!("Shard {}: {} validators finished syncing", shard, finish.public_keys.len());
        Ok(())
    }

    /// Insert each key at its seeded position in the shard's substitute list.
    fn insert_substitutes(&mut self, shard: ShardId, keys: &[ValidatorKey], seed: i64, ctx: &mut BatchContext<'_>) {
        let substitutes = self.shard_substitute.entry(shard).or_default();
        for key in keys {
            let position = if substitutes.is_empty() {
                0
            } else {
                calculate_candidate_position(key, seed, substitutes.len())
            };
            substitutes.insert(position, key.clone());
        }
        ctx.change.add_shard_substitutes(shard, keys);
    }

    /// Placement of keys over active shards by committee plus substitute size.
    fn assign_shards(
        &self,
        candidates: &[ValidatorKey],
        seed: i64,
        ctx: &BatchContext<'_>,
    ) -> BTreeMap<ShardId, Vec<ValidatorKey>> {
        let counts: Vec<usize> = (0..ctx.config.active_shards)
            .map(|shard| {
                let shard = ShardId(shard);
                self.shard_committee.get(&shard).map_or(0, Vec::len)
                    + self.shard_substitute.get(&shard).map_or(0, Vec::len)
            })
            .collect();
        AssignRule::from_version(self.assign_rule).process(candidates, &counts, seed)
    }

    /// Distribute keys over shard substitute pools with the active assign rule.
    fn assign_to_substitutes(&mut self, candidates: &[ValidatorKey], seed: i64, ctx: &mut BatchContext<'_>) {
        for (shard, keys) in self.assign_shards(candidates, seed, ctx) {
            ctx.change.add_shard_substitutes(shard, &keys);
            self.shard_substitute.entry(shard).or_default().extend(keys);
        }
    }

    fn process_swap_and_slash_beacon(&mut self, ctx: &mut BatchContext<'_>) -> Result<()> {
        let rule = SwapRule::from_version(self.swap_rule);
        let request = BeaconSwapRequest {
            committee: &self.beacon_committee,
            substitutes: &self.beacon_substitute,
            min_committee_size: ctx.config.min_beacon_committee_size,
            max_committee_size: ctx.config.max_beacon_committee_size,
            number_of_fixed_validators: ctx.config.number_of_fixed_beacon_validators,
            reputation: &ctx.env.beacon_reputation,
            performance: &ctx.env.beacon_performance,
            lowest_performance: ctx.config.lowest_performance_threshold,
        };
        let outcome = match rule.process_beacon(&request) {
            Some(outcome) => outcome,
            None => {
                info!("{} has no beacon swap, beacon committee unchanged", rule.version());
                return Ok(());
            }
        };

        self.beacon_committee = outcome.new_committee;
        self.beacon_substitute = outcome.new_substitutes;
        ctx.change
            .remove_beacon_committee(&outcome.slashed)
            .remove_beacon_committee(&outcome.swapped_out)
            .remove_beacon_substitutes(&outcome.swapped_in)
            .add_beacon_committee(&outcome.swapped_in);

        for key in &outcome.slashed {
            self.return_stake(key, ctx)?;
        }
        ctx.change.add_slashing_beacon(&outcome.slashed);

        for key in &outcome.swapped_out {
            if self.auto_stake_of(key, ctx.store)? {
                self.beacon_substitute.push(key.clone());
                ctx.change.add_beacon_substitutes(std::slice::from_ref(key));
            } else {
                self.return_stake(key, ctx)?;
            }
        }
        Ok(())
    }

    fn process_assign_beacon(&mut self, ctx: &mut BatchContext<'_>) -> Result<()> {
        let rule = AssignRule::from_version(self.assign_rule);
        if matches!(rule, AssignRule::V2(_)) {
            info!("{} has no beacon assignment, waiting list unchanged", rule.version());
            return Ok(());
        }

        let waiting = std::mem::take(&mut self.beacon_waiting);
        let mut candidates = Vec::with_capacity(waiting.len());
        for key in waiting {
            if self.auto_stake_of(&key, ctx.store)? {
                candidates.push(key);
            } else {
                ctx.change.remove_next_epoch_beacon_candidates(std::slice::from_ref(&key));
                self.return_stake(&key, ctx)?;
            }
        }

        let env = BeaconAssignEnvironment {
            shard_committee: &self.shard_committee,
            shard_substitute: &self.shard_substitute,
            shard_syncing: &self.shard_syncing,
            shard_common_pool: &self.shard_common_pool,
            required_active_times: ctx.config.required_active_times,
            delegations: &ctx.env.delegations,
            store: ctx.store,
        };
        let assignment = match rule.process_beacon(&candidates, &env) {
            Some(assignment) => assignment,
            None => {
                self.beacon_waiting = candidates;
                return Ok(());
            }
        };

        self.beacon_waiting = assignment.stay_waiting;
        ctx.change
            .remove_next_epoch_beacon_candidates(&assignment.to_pending)
            .add_beacon_substitutes(&assignment.to_pending);
        self.beacon_substitute.extend(assignment.to_pending);

        ctx.change.remove_next_epoch_beacon_candidates(&assignment.should_remove);
        for key in &assignment.should_remove {
            self.return_stake(key, ctx)?;
        }
        Ok(())
    }
}

// Beacon Instructions - Positional string-tuple wire format
//
// SAFETY INVARIANTS:
// 1. Tuples are matched positionally; field order is part of the wire contract
// 2. Decoding fully validates a tuple before any state is touched
// 3. Encoding an instruction and decoding it again yields the same instruction

use serde::{Deserialize, Serialize};

use crate::error::{CommitteeStateError, Result};
use crate::keys::{join_keys, parse_key_list, ShardId, ValidatorKey};

pub const STAKE_ACTION: &str = "stake";
pub const UNSTAKE_ACTION: &str = "unstake";
pub const STOP_AUTO_STAKE_ACTION: &str = "stopautostake";
pub const SWAP_SHARD_ACTION: &str = "swapshard";
pub const RANDOM_ACTION: &str = "random";
pub const RETURN_ACTION: &str = "returnstaking";
pub const FINISH_SYNC_ACTION: &str = "finishsync";

pub const SHARD_CHAIN: &str = "shard";
pub const BEACON_CHAIN: &str = "beacon";

/// Percentage of the stake refunded by a return instruction.
pub const FULL_RETURN_PERCENT: u32 = 100;

/// Which chain a stake targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainKind {
    Shard,
    Beacon,
}

impl ChainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Shard => SHARD_CHAIN,
            ChainKind::Beacon => BEACON_CHAIN,
        }
    }
}

/// Reason carried in a swap-shard instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapType(pub i32);

impl SwapType {
    pub const END_EPOCH: SwapType = SwapType(0);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeInstruction {
    pub public_keys: Vec<ValidatorKey>,
    pub chain: ChainKind,
    pub staking_tx_ids: Vec<String>,
    pub reward_receivers: Vec<String>,
    pub auto_stake_flags: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstakeInstruction {
    pub public_keys: Vec<ValidatorKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAutoStakeInstruction {
    pub public_keys: Vec<ValidatorKey>,
}

/// Swap of one shard committee.
///
/// An instruction with empty in and out lists is a valid no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapShardInstruction {
    pub in_public_keys: Vec<ValidatorKey>,
    pub out_public_keys: Vec<ValidatorKey>,
    pub shard_id: ShardId,
    pub swap_type: SwapType,
}

impl SwapShardInstruction {
    pub fn new(
        in_public_keys: Vec<ValidatorKey>,
        out_public_keys: Vec<ValidatorKey>,
        shard_id: ShardId,
        swap_type: SwapType,
    ) -> Self {
        SwapShardInstruction {
            in_public_keys,
            out_public_keys,
            shard_id,
            swap_type,
        }
    }

    pub fn empty(shard_id: ShardId, swap_type: SwapType) -> Self {
        Self::new(Vec::new(), Vec::new(), shard_id, swap_type)
    }

    pub fn is_empty(&self) -> bool {
        self.in_public_keys.is_empty() && self.out_public_keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomInstruction {
    pub random_number: i64,
    pub timestamp: String,
    pub block_height: String,
    pub check_point_time: String,
}

/// Keys that caught up with their shard and may leave the sync pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishSyncInstruction {
    pub shard_id: ShardId,
    pub public_keys: Vec<ValidatorKey>,
}

/// Stake refund emitted as a side effect of processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnStakeInstruction {
    pub public_keys: Vec<ValidatorKey>,
    pub staking_tx_ids: Vec<String>,
    pub percent_returns: Vec<u32>,
}

impl ReturnStakeInstruction {
    pub fn new() -> Self {
        ReturnStakeInstruction {
            public_keys: Vec::new(),
            staking_tx_ids: Vec::new(),
            percent_returns: Vec::new(),
        }
    }

    pub fn push(&mut self, key: ValidatorKey, staking_tx_id: String) {
        self.public_keys.push(key);
        self.staking_tx_ids.push(staking_tx_id);
        self.percent_returns.push(FULL_RETURN_PERCENT);
    }

    pub fn is_empty(&self) -> bool {
        self.public_keys.is_empty()
    }
}

impl Default for ReturnStakeInstruction {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded beacon instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Stake(StakeInstruction),
    Unstake(UnstakeInstruction),
    StopAutoStake(StopAutoStakeInstruction),
    SwapShard(SwapShardInstruction),
    Random(RandomInstruction),
    FinishSync(FinishSyncInstruction),
    ReturnStake(ReturnStakeInstruction),
}

fn expect_arity(tuple: &[String], action: &str, want: usize) -> Result<()> {
    if tuple.len() != want {
        return Err(CommitteeStateError::malformed(format!(
            "{} instruction needs {} fields, got {}",
            action,
            want,
            tuple.len()
        )));
    }
    Ok(())
}

fn split_csv(csv: &str) -> Vec<String> {
    if csv.is_empty() {
        return Vec::new();
    }
    csv.split(',').map(str::to_string).collect()
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CommitteeStateError::malformed(format!("invalid auto-stake flag {:?}", other))),
    }
}

impl Instruction {
    /// Decode and validate a wire tuple.
    pub fn from_tuple(tuple: &[String]) -> Result<Self> {
        let action = tuple
            .first()
            .ok_or_else(|| CommitteeStateError::malformed("empty instruction"))?;
        match action.as_str() {
            STAKE_ACTION => {
                expect_arity(tuple, STAKE_ACTION, 6)?;
                let public_keys = parse_key_list(&tuple[1])?;
                let chain = match tuple[2].as_str() {
                    SHARD_CHAIN => ChainKind::Shard,
                    BEACON_CHAIN => ChainKind::Beacon,
                    other => {
                        return Err(CommitteeStateError::malformed(format!("unknown chain kind {:?}", other)))
                    }
                };
                let staking_tx_ids = split_csv(&tuple[3]);
                let reward_receivers = split_csv(&tuple[4]);
                let auto_stake_flags = split_csv(&tuple[5])
                    .iter()
                    .map(|f| parse_bool(f))
                    .collect::<Result<Vec<_>>>()?;
                if public_keys.is_empty() {
                    return Err(CommitteeStateError::malformed("stake instruction without keys"));
                }
                let n = public_keys.len();
                if staking_tx_ids.len() != n || reward_receivers.len() != n || auto_stake_flags.len() != n {
                    return Err(CommitteeStateError::malformed(format!(
                        "stake list lengths differ: keys {}, txs {}, receivers {}, flags {}",
                        n,
                        staking_tx_ids.len(),
                        reward_receivers.len(),
                        auto_stake_flags.len()
                    )));
                }
                Ok(Instruction::Stake(StakeInstruction {
                    public_keys,
                    chain,
                    staking_tx_ids,
                    reward_receivers,
                    auto_stake_flags,
                }))
            }
            UNSTAKE_ACTION => {
                expect_arity(tuple, UNSTAKE_ACTION, 2)?;
                Ok(Instruction::Unstake(UnstakeInstruction {
                    public_keys: parse_key_list(&tuple[1])?,
                }))
            }
            STOP_AUTO_STAKE_ACTION => {
                expect_arity(tuple, STOP_AUTO_STAKE_ACTION, 2)?;
                Ok(Instruction::StopAutoStake(StopAutoStakeInstruction {
                    public_keys: parse_key_list(&tuple[1])?,
                }))
            }
            SWAP_SHARD_ACTION => {
                if tuple.len() < 5 {
                    return Err(CommitteeStateError::malformed(format!(
                        "swapshard instruction needs at least 5 fields, got {}",
                        tuple.len()
                    )));
                }
                let shard_id = tuple[3]
                    .parse::<u8>()
                    .map_err(|e| CommitteeStateError::malformed(format!("invalid shard id {:?}: {}", tuple[3], e)))?;
                let swap_type = tuple[4]
                    .parse::<i32>()
                    .map_err(|e| CommitteeStateError::malformed(format!("invalid swap type {:?}: {}", tuple[4], e)))?;
                Ok(Instruction::SwapShard(SwapShardInstruction {
                    in_public_keys: parse_key_list(&tuple[1])?,
                    out_public_keys: parse_key_list(&tuple[2])?,
                    shard_id: ShardId(shard_id),
                    swap_type: SwapType(swap_type),
                }))
            }
            RANDOM_ACTION => {
                expect_arity(tuple, RANDOM_ACTION, 5)?;
                let random_number = tuple[1]
                    .parse::<i64>()
                    .map_err(|e| CommitteeStateError::malformed(format!("invalid random nonce {:?}: {}", tuple[1], e)))?;
                Ok(Instruction::Random(RandomInstruction {
                    random_number,
                    timestamp: tuple[2].clone(),
                    block_height: tuple[3].clone(),
                    check_point_time: tuple[4].clone(),
                }))
            }
            FINISH_SYNC_ACTION => {
                expect_arity(tuple, FINISH_SYNC_ACTION, 3)?;
                let shard_id = tuple[1]
                    .parse::<u8>()
                    .map_err(|e| CommitteeStateError::malformed(format!("invalid shard id {:?}: {}", tuple[1], e)))?;
                let public_keys = parse_key_list(&tuple[2])?;
                if public_keys.is_empty() {
                    return Err(CommitteeStateError::malformed("finishsync instruction without keys"));
                }
                Ok(Instruction::FinishSync(FinishSyncInstruction {
                    shard_id: ShardId(shard_id),
                    public_keys,
                }))
            }
            RETURN_ACTION => {
                expect_arity(tuple, RETURN_ACTION, 4)?;
                let public_keys = parse_key_list(&tuple[1])?;
                let staking_tx_ids = split_csv(&tuple[2]);
                let percent_returns = split_csv(&tuple[3])
                    .iter()
                    .map(|p| {
                        p.parse::<u32>()
                            .map_err(|e| CommitteeStateError::malformed(format!("invalid return percent {:?}: {}", p, e)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                if staking_tx_ids.len() != public_keys.len() || percent_returns.len() != public_keys.len() {
                    return Err(CommitteeStateError::malformed("return staking list lengths differ"));
                }
                Ok(Instruction::ReturnStake(ReturnStakeInstruction {
                    public_keys,
                    staking_tx_ids,
                    percent_returns,
                }))
            }
            other => Err(CommitteeStateError::malformed(format!("unknown instruction action {:?}", other))),
        }
    }

    /// Encode back to the positional wire tuple.
    pub fn to_tuple(&self) -> Vec<String> {
        match self {
            Instruction::Stake(s) => vec![
                STAKE_ACTION.to_string(),
                join_keys(&s.public_keys),
                s.chain.as_str().to_string(),
                s.staking_tx_ids.join(","),
                s.reward_receivers.join(","),
                s.auto_stake_flags.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","),
            ],
            Instruction::Unstake(u) => vec![UNSTAKE_ACTION.to_string(), join_keys(&u.public_keys)],
            Instruction::StopAutoStake(s) => vec![STOP_AUTO_STAKE_ACTION.to_string(), join_keys(&s.public_keys)],
            Instruction::SwapShard(s) => vec![
                SWAP_SHARD_ACTION.to_string(),
                join_keys(&s.in_public_keys),
                join_keys(&s.out_public_keys),
                s.shard_id.0.to_string(),
                s.swap_type.0.to_string(),
            ],
            Instruction::Random(r) => vec![
                RANDOM_ACTION.to_string(),
                r.random_number.to_string(),
                r.timestamp.clone(),
                r.block_height.clone(),
                r.check_point_time.clone(),
            ],
            Instruction::FinishSync(f) => vec![
                FINISH_SYNC_ACTION.to_string(),
                f.shard_id.0.to_string(),
                join_keys(&f.public_keys),
            ],
            Instruction::ReturnStake(r) => vec![
                RETURN_ACTION.to_string(),
                join_keys(&r.public_keys),
                r.staking_tx_ids.join(","),
                r.percent_returns.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(","),
            ],
        }
    }
}

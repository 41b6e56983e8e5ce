use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bleep_committee::staker_store::BeaconStakerInfo;
use bleep_committee::{
    AssignRule, AssignRuleProcessor, AssignRuleVersion, CommitteeChange, CommitteeConfig, CommitteeState,
    CommitteeStateEngine, CommitteeStateEnv, InMemoryStakerStore, ShardId, StakerInfo, StakerStore, StateHash,
    ValidatorKey,
};

#[derive(Parser)]
#[command(name = "bleep-cli")]
#[command(about = "BLEEP committee rotation tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay instruction batches from genesis, committing after each one
    Replay {
        /// Committee config file (BLEEP_COMMITTEE__* variables override it)
        #[arg(long)]
        config: PathBuf,

        /// Genesis committees as JSON
        #[arg(long)]
        genesis: PathBuf,

        /// JSON array of per-block batch environments
        #[arg(long)]
        batches: PathBuf,

        /// Optional staker records to seed the in-memory store
        #[arg(long)]
        stakers: Option<PathBuf>,

        /// Write the final committed state here
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run an assign rule over candidates and print the shard placement
    Assign {
        /// Assign rule version (2 or 3)
        #[arg(long)]
        rule: u8,

        /// Comma separated candidate keys
        #[arg(long)]
        candidates: String,

        /// Comma separated validator counts, one per shard
        #[arg(long)]
        validators: String,

        #[arg(long, allow_hyphen_values = true)]
        seed: i64,
    },

    /// Print the per-part hash of a committee state file
    Hash {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        state: PathBuf,
    },
}

#[derive(Deserialize)]
struct GenesisFile {
    beacon_committee: Vec<ValidatorKey>,
    shard_committee: BTreeMap<ShardId, Vec<ValidatorKey>>,
}

#[derive(Deserialize, Default)]
struct StakersFile {
    #[serde(default)]
    stakers: BTreeMap<ValidatorKey, StakerInfo>,
    #[serde(default)]
    beacon_stakers: BTreeMap<ValidatorKey, BeaconStakerInfo>,
}

#[derive(Serialize)]
struct BatchReport<'a> {
    beacon_height: u64,
    epoch: u64,
    state_hash: &'a StateHash,
    committee_change: &'a CommitteeChange,
    side_effect_instructions: &'a [Vec<String>],
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn seeded_store(path: Option<&Path>) -> Result<InMemoryStakerStore> {
    let file: StakersFile = match path {
        Some(path) => read_json(path)?,
        None => StakersFile::default(),
    };
    let store = InMemoryStakerStore::new();
    store
        .store_staker_info(file.stakers.into_iter().collect())
        .context("seeding staker records")?;
    for (key, info) in file.beacon_stakers {
        store.insert_beacon_staker(key, info);
    }
    info!("Staker store seeded with {} records", store.len());
    Ok(store)
}

/// Replays every batch, writing one JSON report line per batch to `report`.
fn replay(
    config: &Path,
    genesis: &Path,
    batches: &Path,
    stakers: Option<&Path>,
    out: Option<&Path>,
    report: &mut impl Write,
) -> Result<Arc<CommitteeState>> {
    let config = CommitteeConfig::load(config).context("loading committee config")?;
    let genesis: GenesisFile = read_json(genesis)?;
    let batches: Vec<CommitteeStateEnv> = read_json(batches)?;

    let state = CommitteeState::genesis(&config, genesis.beacon_committee, genesis.shard_committee)
        .context("building genesis state")?;
    let store = Arc::new(seeded_store(stakers)?);
    let engine = CommitteeStateEngine::new(config, state, store).context("starting committee engine")?;

    for env in &batches {
        let result = engine
            .update_committee_state(env)
            .with_context(|| format!("batch at beacon height {}", env.beacon_height))?;
        let line = BatchReport {
            beacon_height: env.beacon_height,
            epoch: env.epoch,
            state_hash: &result.state_hash,
            committee_change: &result.committee_change,
            side_effect_instructions: &result.side_effect_instructions,
        };
        writeln!(report, "{}", serde_json::to_string(&line)?)?;
        engine
            .commit_verified(&result.state_hash)
            .with_context(|| format!("committing beacon height {}", env.beacon_height))?;
    }
    info!("Replayed {} batches", batches.len());

    let state = engine.final_state();
    if let Some(out) = out {
        fs::write(out, serde_json::to_string_pretty(state.as_ref())?)
            .with_context(|| format!("writing {}", out.display()))?;
        info!("Final state written to {}", out.display());
    }
    Ok(state)
}

fn assign(rule: u8, candidates: &str, validators: &str, seed: i64) -> Result<BTreeMap<ShardId, Vec<ValidatorKey>>> {
    let version = AssignRuleVersion::try_from(rule)?;
    let candidates = bleep_committee::keys::parse_key_list(candidates)?;
    let counts = validators
        .split(',')
        .filter(|c| !c.is_empty())
        .map(|c| c.trim().parse::<usize>().with_context(|| format!("invalid validator count {:?}", c)))
        .collect::<Result<Vec<_>>>()?;
    if counts.is_empty() {
        bail!("at least one shard validator count is required");
    }
    if candidates.is_empty() {
        warn!("No candidates to assign");
    }

    Ok(AssignRule::from_version(version).process(&candidates, &counts, seed))
}

fn hash(config: &Path, state: &Path) -> Result<StateHash> {
    let config = CommitteeConfig::load(config).context("loading committee config")?;
    let state: CommitteeState = read_json(state)?;
    state.validate(&config).context("state does not match config")?;
    Ok(state.hash()?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            config,
            genesis,
            batches,
            stakers,
            out,
        } => {
            let mut stdout = std::io::stdout().lock();
            replay(&config, &genesis, &batches, stakers.as_deref(), out.as_deref(), &mut stdout)?;
        }
        Commands::Assign {
            rule,
            candidates,
            validators,
            seed,
        } => {
            let assigned = assign(rule, &candidates, &validators, seed)?;
            println!("{}", serde_json::to_string_pretty(&assigned)?);
        }
        Commands::Hash { config, state } => {
            println!("{}", serde_json::to_string_pretty(&hash(&config, &state)?)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const CONFIG: &str = r#"
min_committee_size = 4
max_committee_size = 8
number_of_fixed_validators = 0
min_beacon_committee_size = 4
max_beacon_committee_size = 8
number_of_fixed_beacon_validators = 4
active_shards = 2
swap_rule_version = 3
assign_rule_version = 3
"#;

    const GENESIS: &str = r#"{
        "beacon_committee": ["b1", "b2", "b3", "b4"],
        "shard_committee": {"0": ["s1", "s2", "s3", "s4"], "1": ["t1", "t2", "t3", "t4"]}
    }"#;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_cli_parses_negative_seed() {
        let cli = Cli::try_parse_from([
            "bleep-cli",
            "assign",
            "--rule",
            "2",
            "--candidates",
            "c1",
            "--validators",
            "4,4",
            "--seed",
            "-7",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Assign { seed: -7, rule: 2, .. }));
        assert!(Cli::try_parse_from(["bleep-cli", "hash", "--config", "c.toml"]).is_err());
    }

    #[test]
    fn test_assign_places_every_candidate() {
        let assigned = assign(3, "c1,c2,c3", "4,9", 10).unwrap();
        let placed: Vec<_> = assigned.values().flatten().map(ValidatorKey::as_str).collect();
        assert_eq!(placed.len(), 3);
        // shard 0 is the only shard below the mean
        assert_eq!(assigned.keys().copied().collect::<Vec<_>>(), vec![ShardId(0)]);

        assert!(assign(1, "c1", "4", 0).is_err());
        assert!(assign(2, "c1", "", 0).is_err());
        assert!(assign(2, "c1", "4,x", 0).is_err());
    }

    #[test]
    fn test_replay_reports_each_batch_and_writes_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "committee.toml", CONFIG);
        let genesis = write(&dir, "genesis.json", GENESIS);
        let batches = write(
            &dir,
            "batches.json",
            r#"[
                {"beacon_height": 1, "epoch": 1,
                 "beacon_instructions": [["stake", "c1,c2", "shard", "tx1,tx2", "r1,r2", "true,false"]]},
                {"beacon_height": 2, "epoch": 1, "is_beacon_random_time": true, "random_number": 5,
                 "beacon_instructions": [["random", "5", "1600000000", "2", "0"]]}
            ]"#,
        );
        let out = dir.path().join("final.json");

        let mut report = Vec::new();
        let state = replay(&config, &genesis, &batches, None, Some(&out), &mut report).unwrap();

        let lines: Vec<Value> = String::from_utf8(report)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["beacon_height"], 1);
        assert_eq!(lines[0]["committee_change"]["next_epoch_shard_candidate_added"], serde_json::json!(["c1", "c2"]));
        assert_eq!(lines[1]["committee_change"]["current_epoch_shard_candidate_removed"], serde_json::json!(["c1", "c2"]));

        assert!(state.shard_common_pool.is_empty());
        assert_eq!(state.shard_syncing.values().map(Vec::len).sum::<usize>(), 2);
        let written: CommitteeState = read_json(&out).unwrap();
        assert_eq!(&written, state.as_ref());

        // the written state hashes back to what replay committed
        assert_eq!(hash(&config, &out).unwrap(), state.hash().unwrap());
    }

    #[test]
    fn test_replay_stops_at_rejected_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "committee.toml", CONFIG);
        let genesis = write(&dir, "genesis.json", GENESIS);
        let batches = write(
            &dir,
            "batches.json",
            r#"[{"beacon_height": 9, "epoch": 1, "beacon_instructions": [["swapshard", "", "", "7", "0"]]}]"#,
        );
        let mut report = Vec::new();
        let err = replay(&config, &genesis, &batches, None, None, &mut report).unwrap_err();
        assert!(format!("{:#}", err).contains("beacon height 9"));
        assert!(report.is_empty());
    }

    #[test]
    fn test_hash_rejects_state_for_other_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "committee.toml", CONFIG);
        let genesis: GenesisFile = serde_json::from_str(GENESIS).unwrap();
        let loaded = CommitteeConfig::load(&config).unwrap();
        let mut state = CommitteeState::genesis(&loaded, genesis.beacon_committee, genesis.shard_committee).unwrap();
        state.shard_committee.remove(&ShardId(1));
        let path = write(&dir, "state.json", &serde_json::to_string(&state).unwrap());
        assert!(hash(&config, &path).is_err());
    }
}

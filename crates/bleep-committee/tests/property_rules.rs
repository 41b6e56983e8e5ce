use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use bleep_committee::instruction::SwapType;
use bleep_committee::swap_rule::SwapRequest;
use bleep_committee::{
    AssignRule, AssignRuleProcessor, AssignRuleVersion, Penalty, ShardId, SwapRule, SwapRuleProcessor,
    SwapRuleVersion, ValidatorKey,
};

#[derive(Clone, Debug)]
struct SwapFixture {
    committee: Vec<ValidatorKey>,
    substitutes: Vec<ValidatorKey>,
    penalties: BTreeMap<ValidatorKey, Penalty>,
    fixed: usize,
    min: usize,
    max: usize,
}

fn arb_swap_fixture() -> impl Strategy<Value = SwapFixture> {
    (1usize..=24, 0usize..=10)
        .prop_flat_map(|(len, subs)| {
            (
                Just(len),
                Just(subs),
                0..=len.min(6),
                prop::collection::vec(any::<bool>(), len),
                1usize..=12,
                0usize..=12,
            )
        })
        .prop_map(|(len, subs, fixed, penalized, min, extra)| {
            let committee: Vec<ValidatorKey> = (0..len).map(|i| ValidatorKey::new(format!("member{}", i))).collect();
            let substitutes = (0..subs).map(|i| ValidatorKey::new(format!("sub{}", i))).collect();
            let penalties = committee
                .iter()
                .zip(penalized)
                .filter(|(_, p)| *p)
                .map(|(k, _)| (k.clone(), Penalty::default()))
                .collect();
            let min = min.max(fixed);
            SwapFixture {
                committee,
                substitutes,
                penalties,
                fixed,
                min,
                max: min + extra,
            }
        })
}

fn request(f: &SwapFixture) -> SwapRequest<'_> {
    SwapRequest {
        shard_id: ShardId(0),
        committee: &f.committee,
        substitutes: &f.substitutes,
        min_committee_size: f.min,
        max_committee_size: f.max,
        swap_type: SwapType::END_EPOCH,
        number_of_fixed_validators: f.fixed,
        penalties: &f.penalties,
    }
}

fn sorted(keys: impl IntoIterator<Item = ValidatorKey>) -> Vec<ValidatorKey> {
    let mut keys: Vec<_> = keys.into_iter().collect();
    keys.sort();
    keys
}

fn check_swap(version: SwapRuleVersion, f: &SwapFixture) -> Result<(), TestCaseError> {
    let rule = SwapRule::from_version(version);
    let outcome = rule.process(&request(f)).map_err(|e| TestCaseError::fail(e.to_string()))?;

    // every input key ends up in exactly one output list
    let before = sorted(f.committee.iter().chain(f.substitutes.iter()).cloned());
    let after = sorted(
        outcome
            .new_committee
            .iter()
            .chain(outcome.new_substitutes.iter())
            .chain(outcome.slashed.iter())
            .chain(outcome.normal_swapped_out.iter())
            .cloned(),
    );
    prop_assert_eq!(before, after);

    prop_assert_eq!(&outcome.new_committee[..f.fixed], &f.committee[..f.fixed]);
    prop_assert!(outcome.slashed.len() <= f.committee.len() / 3);
    prop_assert!(outcome.slashed.iter().all(|k| f.penalties.contains_key(k)));
    if f.committee.len() <= f.max {
        prop_assert!(outcome.new_committee.len() <= f.max);
    }

    let again = rule.process(&request(f)).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(outcome, again);
    Ok(())
}

fn check_assign(version: AssignRuleVersion, counts: &[usize], n: usize, seed: i64) -> Result<(), TestCaseError> {
    let candidates: Vec<ValidatorKey> = (0..n).map(|i| ValidatorKey::new(format!("cand{}", i))).collect();
    let rule = AssignRule::from_version(version);
    let assigned = rule.process(&candidates, counts, seed);

    let mut seen = BTreeSet::new();
    for (shard, keys) in &assigned {
        prop_assert!((shard.0 as usize) < counts.len());
        for key in keys {
            prop_assert!(seen.insert(key.clone()), "{} assigned twice", key);
        }
    }
    prop_assert_eq!(seen.len(), candidates.len());
    prop_assert_eq!(assigned, rule.process(&candidates, counts, seed));
    Ok(())
}

proptest! {
    #[test]
    fn swap_v2_conserves_keys_and_fixed_prefix(f in arb_swap_fixture()) {
        check_swap(SwapRuleVersion::V2, &f)?;
    }

    #[test]
    fn swap_v3_conserves_keys_and_fixed_prefix(f in arb_swap_fixture()) {
        check_swap(SwapRuleVersion::V3, &f)?;
    }

    #[test]
    fn assign_v2_places_every_candidate_once(
        counts in prop::collection::vec(0usize..120, 1..9),
        n in 0usize..24,
        seed in any::<i64>(),
    ) {
        check_assign(AssignRuleVersion::V2, &counts, n, seed)?;
    }

    #[test]
    fn assign_v3_places_every_candidate_once(
        counts in prop::collection::vec(0usize..120, 1..9),
        n in 0usize..24,
        seed in any::<i64>(),
    ) {
        check_assign(AssignRuleVersion::V3, &counts, n, seed)?;
    }
}

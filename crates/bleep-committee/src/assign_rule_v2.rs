// Assign Rule V2 - Hash-position balancing
//
// SAFETY INVARIANTS:
// 1. A candidate landing on the busiest virtual shard goes to the emptiest real shard
// 2. Equal validator counts rank by shard id

use std::collections::BTreeMap;

use crate::assign_rule::{AssignRuleProcessor, AssignRuleVersion};
use crate::keys::{ShardId, ValidatorKey};
use crate::list_ops::{calculate_candidate_position, sort_shard_ids_by_count};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignRuleV2;

/// Virtual shard owning hash position `pos` by cumulative validator counts.
fn virtual_shard(pos: usize, counts: &[usize]) -> usize {
    let mut shard = 0;
    let mut cumulative = counts[0];
    while pos > cumulative && shard + 1 < counts.len() {
        shard += 1;
        cumulative += counts[shard];
    }
    shard
}

impl AssignRuleProcessor for AssignRuleV2 {
    fn process(
        &self,
        candidates: &[ValidatorKey],
        number_of_validators: &[usize],
        seed: i64,
    ) -> BTreeMap<ShardId, Vec<ValidatorKey>> {
        let mut assigned: BTreeMap<ShardId, Vec<ValidatorKey>> = BTreeMap::new();
        if number_of_validators.is_empty() {
            return assigned;
        }

        let counts: Vec<usize> = if number_of_validators.iter().sum::<usize>() == 0 {
            vec![1; number_of_validators.len()]
        } else {
            number_of_validators.to_vec()
        };
        let total: usize = counts.iter().sum();

        // rank inversion table: virtual rank r maps to real rank n-1-r
        let sorted = sort_shard_ids_by_count(&counts);
        let mut rank_of = vec![0; counts.len()];
        for (rank, &shard) in sorted.iter().enumerate() {
            rank_of[shard] = rank;
        }
        let last = counts.len() - 1;

        for candidate in candidates {
            let pos = calculate_candidate_position(candidate, seed, total);
            let shard = sorted[last - rank_of[virtual_shard(pos, &counts)]];
            assigned
                .entry(ShardId(shard as u8))
                .or_default()
                .push(candidate.clone());
        }
        assigned
    }

    fn version(&self) -> AssignRuleVersion {
        AssignRuleVersion::V2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{keys, long_keys};

    #[test]
    fn test_balancing_fixture() {
        let c = long_keys();
        let got = AssignRuleV2.process(&c, &[19, 54, 20, 2, 67, 81, 80, 11], 10000);

        let mut want = BTreeMap::new();
        want.insert(ShardId(0), vec![c[2].clone(), c[4].clone()]);
        want.insert(ShardId(2), vec![c[0].clone(), c[1].clone()]);
        want.insert(ShardId(3), vec![c[3].clone(), c[6].clone()]);
        want.insert(ShardId(7), vec![c[5].clone(), c[7].clone()]);
        assert_eq!(got, want);
    }

    #[test]
    fn test_busiest_virtual_shard_goes_to_emptiest() {
        // position 173 of 334 sits in shard 5 (81 validators), shard 3 has 2
        let c = long_keys();
        let counts = [19, 54, 20, 2, 67, 81, 80, 11];
        assert_eq!(calculate_candidate_position(&c[3], 10000, 334), 173);
        assert_eq!(virtual_shard(173, &counts), 5);
        let got = AssignRuleV2.process(&c[3..4], &counts, 10000);
        assert_eq!(got.get(&ShardId(3)), Some(&vec![c[3].clone()]));
    }

    #[test]
    fn test_every_candidate_assigned_once() {
        let candidates = keys(40);
        let got = AssignRuleV2.process(&candidates, &[0, 0, 0, 0], 42);
        let total: usize = got.values().map(Vec::len).sum();
        assert_eq!(total, candidates.len());
        for candidate in &candidates {
            assert_eq!(got.values().filter(|list| list.contains(candidate)).count(), 1);
        }
    }

    #[test]
    fn test_deterministic() {
        let candidates = keys(16);
        let counts = [5, 9, 3];
        assert_eq!(
            AssignRuleV2.process(&candidates, &counts, 7),
            AssignRuleV2.process(&candidates, &counts, 7)
        );
    }
}

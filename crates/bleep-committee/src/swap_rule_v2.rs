// Swap Rule V2 - Fixed-offset rotation with slashing priority
//
// SAFETY INVARIANTS:
// 1. Slashing budget is min(len/3, len - fixed), computed once before scanning
// 2. Normal swap-out offset is sized on the input committee and removed
//    from the front of the slashing-reduced flexible suffix
// 3. Swap-in never exceeds the remaining vacancy or the substitute queue

use crate::error::Result;
use crate::swap_rule::{
    build_outcome, check_fixed_prefix, slash_flexible_suffix, swap_out_front, SwapOutcome, SwapRequest,
    SwapRuleProcessor, SwapRuleVersion,
};

/// Divisor for the routine swap-out and assignment offset.
pub const MAX_SWAP_OR_ASSIGN_PERCENT: usize = 6;

/// Divisor for the slashing budget.
pub const MAX_SLASH_PERCENT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapRuleV2;

/// Number of flexible members rotated out at the end of an epoch.
///
/// Members leave without replacement while the committee stays above
/// `min_committee_size`; the remainder is bounded by the substitute queue.
pub fn get_swap_out_offset(
    len_substitutes: usize,
    len_committee: usize,
    number_of_fixed_validators: usize,
    min_committee_size: usize,
) -> usize {
    let mut offset = len_committee / MAX_SWAP_OR_ASSIGN_PERCENT;
    if offset == 0 {
        return 0;
    }
    offset = offset.min(len_committee.saturating_sub(number_of_fixed_validators));

    let mut current = len_committee;
    let mut no_replace = 0;
    while offset > 0 && current > min_committee_size {
        current -= 1;
        offset -= 1;
        no_replace += 1;
    }

    no_replace + offset.min(len_substitutes)
}

impl SwapRuleProcessor for SwapRuleV2 {
    fn process(&self, request: &SwapRequest<'_>) -> Result<SwapOutcome> {
        check_fixed_prefix(request)?;
        let len = request.committee.len();
        let fixed = request.number_of_fixed_validators;

        let budget = (len / MAX_SLASH_PERCENT).min(len - fixed);
        let (after_slash, slashed) = slash_flexible_suffix(request.committee, fixed, request.penalties, budget);

        let offset = get_swap_out_offset(
            request.substitutes.len(),
            len,
            fixed,
            request.min_committee_size,
        );
        let (after_out, normal_swapped_out) = swap_out_front(&after_slash, fixed, offset);

        let vacancy = request.max_committee_size.saturating_sub(after_out.len());
        let swap_in_offset = vacancy.min(request.substitutes.len());

        Ok(build_outcome(request, after_out, swap_in_offset, slashed, normal_swapped_out))
    }

    fn assign_offset(&self, len_substitutes: usize, len_committee: usize, fixed: usize, min: usize) -> usize {
        let offset = get_swap_out_offset(len_substitutes, len_committee, fixed, min);
        if offset == 0 && len_committee < MAX_SWAP_OR_ASSIGN_PERCENT {
            1
        } else {
            offset
        }
    }

    fn version(&self) -> SwapRuleVersion {
        SwapRuleVersion::V2
    }
}

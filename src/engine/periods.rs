// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::DateRange;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub period_days: i64,
    pub days_already_paid: i64,
    pub days_to_pay: i64,
}

/// Days of `target` already covered by `prior` ranges, and days still owed.
///
/// Overlaps are summed per prior range without merging, so prior ranges that
/// overlap each other are subtracted twice. Pass `merge = true` to collapse
/// them first.
pub fn coverage(target: DateRange, prior: &[DateRange], merge: bool) -> Coverage {
    let merged;
    let ranges = if merge {
        merged = merge_ranges(prior);
        merged.as_slice()
    } else {
        prior
    };

    let period_days = target.days();
    let days_already_paid: i64 = ranges
        .iter()
        .map(|p| {
            let lo = target.start.max(p.start);
            let hi = target.end.min(p.end);
            ((hi - lo).num_days() + 1).max(0)
        })
        .sum();
    Coverage {
        period_days,
        days_already_paid,
        days_to_pay: (period_days - days_already_paid).max(0),
    }
}

/// Sorts and merges overlapping or adjacent ranges.
pub fn merge_ranges(ranges: &[DateRange]) -> Vec<DateRange> {
    let mut sorted: Vec<DateRange> = ranges.iter().filter(|r| r.end >= r.start).copied().collect();
    sorted.sort_by_key(|r| r.start);
    let mut out: Vec<DateRange> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match out.last_mut() {
            Some(last) if r.start <= last.end.succ_opt().unwrap_or(last.end) => {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn r(a: &str, b: &str) -> DateRange {
        DateRange::new(d(a), d(b))
    }

    #[test]
    fn no_prior_ranges_pays_whole_period() {
        let c = coverage(r("2025-03-01", "2025-03-15"), &[], false);
        assert_eq!(c.period_days, 15);
        assert_eq!(c.days_to_pay, 15);
    }

    #[test]
    fn partial_overlap_is_inclusive() {
        let c = coverage(
            r("2025-03-01", "2025-03-15"),
            &[r("2025-02-20", "2025-03-05")],
            false,
        );
        assert_eq!(c.days_already_paid, 5);
        assert_eq!(c.days_to_pay, 10);
    }

    #[test]
    fn disjoint_prior_range_counts_nothing() {
        let c = coverage(
            r("2025-03-01", "2025-03-15"),
            &[r("2025-04-01", "2025-04-15")],
            false,
        );
        assert_eq!(c.days_already_paid, 0);
    }

    #[test]
    fn overlapping_priors_double_subtract_unless_merged() {
        let target = r("2025-03-01", "2025-03-15");
        let prior = [r("2025-03-01", "2025-03-10"), r("2025-03-05", "2025-03-12")];
        let additive = coverage(target, &prior, false);
        assert_eq!(additive.days_already_paid, 18);
        assert_eq!(additive.days_to_pay, 0);

        let merged = coverage(target, &prior, true);
        assert_eq!(merged.days_already_paid, 12);
        assert_eq!(merged.days_to_pay, 3);
    }

    #[test]
    fn merge_joins_adjacent_ranges() {
        let out = merge_ranges(&[r("2025-03-16", "2025-03-31"), r("2025-03-01", "2025-03-15")]);
        assert_eq!(out, vec![r("2025-03-01", "2025-03-31")]);
    }
}

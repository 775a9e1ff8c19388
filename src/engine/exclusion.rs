// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::DateRange;
use crate::payroll::{PayrollRun, RunStatus};
use std::collections::HashMap;

/// Receipts and salary ranges already compensated by closed runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionSet {
    receipts: HashMap<i64, i64>,
    paid: HashMap<i64, Vec<DateRange>>,
}

impl ExclusionSet {
    /// Scans every Closed/Paid run. Other runs contribute nothing.
    pub fn from_runs(runs: &[PayrollRun]) -> Self {
        let mut set = Self::default();
        for run in runs {
            if !matches!(run.status, RunStatus::Closed | RunStatus::Paid) {
                continue;
            }
            let run_id = run.id.unwrap_or_default();
            for item in &run.items {
                for d in &item.details {
                    set.record_receipt(d.receipt_id, run_id);
                }
                if !item.salary.is_zero() {
                    set.record_range(item.employee_id, run.period);
                }
            }
        }
        set
    }

    pub fn record_receipt(&mut self, receipt_id: i64, run_id: i64) {
        self.receipts.entry(receipt_id).or_insert(run_id);
    }

    pub fn record_range(&mut self, employee_id: i64, range: DateRange) {
        self.paid.entry(employee_id).or_default().push(range);
    }

    pub fn contains_receipt(&self, receipt_id: i64) -> bool {
        self.receipts.contains_key(&receipt_id)
    }

    /// Run that already commissioned the receipt.
    pub fn committed_by(&self, receipt_id: i64) -> Option<i64> {
        self.receipts.get(&receipt_id).copied()
    }

    pub fn paid_ranges(&self, employee_id: i64) -> &[DateRange] {
        self.paid
            .get(&employee_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }

    /// Same content regardless of insertion order.
    pub fn normalized(mut self) -> Self {
        for ranges in self.paid.values_mut() {
            ranges.sort_by_key(|r| (r.start, r.end));
        }
        self
    }
}

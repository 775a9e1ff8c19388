// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Pure payroll computation over an in-memory snapshot.
//!
//! Nothing in here touches the store: callers load a [`Snapshot`], run
//! [`attribution::attribute`] (phase one) and then
//! [`distribution::distribute`] (phase two), and persist the result.

pub mod attribution;
pub mod distribution;
pub mod exclusion;
pub mod matcher;
pub mod periods;
pub mod rates;

use crate::models::{CompensationScheme, DateRange, Employee, Policy};
use crate::payroll::RunKind;
use crate::settings::Settings;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use exclusion::ExclusionSet;
pub use rates::RateTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    pub period: DateRange,
    pub kind: RunKind,
}

/// Everything the engine reads, captured before computation starts.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub policies: Vec<Policy>,
    pub rates: RateTable,
    pub exclusions: ExclusionSet,
    pub outstanding_loans: HashMap<i64, Decimal>,
    pub settings: Settings,
}

impl Snapshot {
    pub fn employee(&self, id: i64) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    pub fn outstanding(&self, employee_id: i64) -> Decimal {
        self.outstanding_loans
            .get(&employee_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Salary owed to `employee` for the run, with the days it covers.
    pub(crate) fn salary_for(&self, employee: &Employee, params: &RunParams) -> (Decimal, i64) {
        let cov = periods::coverage(
            params.period,
            self.exclusions.paid_ranges(employee.id),
            self.settings.merge_paid_ranges,
        );
        if params.kind == RunKind::CommissionOnly
            || employee.scheme == CompensationScheme::CommissionOnly
        {
            return (Decimal::ZERO, 0);
        }
        (employee.daily_salary * Decimal::from(cov.days_to_pay), cov.days_to_pay)
    }
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Payroll runs, their line items and lifecycle.

pub mod draft;
pub mod edits;
pub mod store;

use crate::error::{PayrollError, Result, Warning};
use crate::models::{DateRange, Profile, text_enum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use draft::{PayrollDraft, PhaseOne};
pub use edits::{DetailEdit, LineEdit, PendingEdits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    Full,
    SalaryOnly,
    CommissionOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Generated,
    Saved,
    Closed,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Direct,
    Shared,
}

/// Whose line a commission detail is booked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Agent,
    Vendor,
}

text_enum!(RunKind {
    Full => "full",
    SalaryOnly => "salary_only",
    CommissionOnly => "commission_only",
});

text_enum!(RunStatus {
    Generated => "generated",
    Saved => "saved",
    Closed => "closed",
    Paid => "paid",
});

text_enum!(Classification {
    Direct => "direct",
    Shared => "shared",
});

text_enum!(Side {
    Agent => "agent",
    Vendor => "vendor",
});

impl RunStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, RunStatus::Closed | RunStatus::Paid)
    }

    /// Forward-only lifecycle. Saving again while Saved is allowed.
    pub fn transition(self, to: RunStatus) -> Result<RunStatus> {
        use RunStatus::*;
        match (self, to) {
            (Generated, Saved) | (Saved, Saved) | (Saved, Closed) | (Closed, Paid) => Ok(to),
            (from, to) => Err(PayrollError::InvalidTransition { from, to }),
        }
    }
}

fn check_pct(pct: Decimal) -> Result<Decimal> {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(PayrollError::InvalidPercentage(pct));
    }
    Ok(pct)
}

/// `pct` percent of `amount`; zero when the product does not fit a Decimal.
fn pct_of(amount: Decimal, pct: Decimal) -> Decimal {
    amount
        .checked_mul(pct)
        .map(|v| v / Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionDetail {
    pub receipt_id: i64,
    pub receipt_number: String,
    pub policy_id: i64,
    pub policy_number: String,
    pub insurer: String,
    pub product: String,
    pub coverage_type: String,
    pub insured_item: String,
    pub premium_base: Decimal,
    pub base_pct: Decimal,
    pub classification: Classification,
    pub agent_id: i64,
    pub agent_code: Option<String>,
    pub vendor_id: Option<i64>,
    pub agent_share_pct: Decimal,
    pub vendor_share_pct: Decimal,
    pub side: Side,
    /// Amount this copy contributes to its line's commissions.
    pub booked: Decimal,
}

impl CommissionDetail {
    pub fn total_commission(&self) -> Decimal {
        pct_of(self.premium_base, self.base_pct)
    }

    pub fn agent_amount(&self) -> Decimal {
        pct_of(self.total_commission(), self.agent_share_pct)
    }

    pub fn vendor_amount(&self) -> Decimal {
        pct_of(self.total_commission(), self.vendor_share_pct)
    }

    pub fn set_base_pct(&mut self, pct: Decimal) -> Result<()> {
        self.base_pct = check_pct(pct)?;
        Ok(())
    }

    /// Sets the vendor share; the agent share becomes its complement.
    pub fn set_vendor_share(&mut self, pct: Decimal) -> Result<()> {
        let pct = check_pct(pct)?;
        if self.classification == Classification::Direct && !pct.is_zero() {
            return Err(PayrollError::InvalidPercentage(pct));
        }
        self.vendor_share_pct = pct;
        self.agent_share_pct = Decimal::ONE_HUNDRED - pct;
        Ok(())
    }

    pub fn set_agent_share(&mut self, pct: Decimal) -> Result<()> {
        let pct = check_pct(pct)?;
        self.set_vendor_share(Decimal::ONE_HUNDRED - pct)
    }

    /// Books the undivided commission on the agent line.
    pub(crate) fn book_full(&mut self) {
        self.booked = self.total_commission();
    }

    /// Books this copy's share of a distributed commission.
    pub(crate) fn book_split(&mut self) {
        self.booked = match (self.side, self.classification) {
            (Side::Agent, Classification::Direct) => self.total_commission(),
            (Side::Agent, Classification::Shared) => self.agent_amount(),
            (Side::Vendor, _) => self.vendor_amount(),
        };
    }
}

/// Editable money fields of a line item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub deductions: Option<Decimal>,
    pub loan_grant: Option<Decimal>,
    pub loan_collection: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollLineItem {
    pub employee_id: i64,
    pub employee_name: String,
    pub profile: Profile,
    pub daily_salary: Decimal,
    pub days_paid: i64,
    pub salary: Decimal,
    pub details: Vec<CommissionDetail>,
    pub deductions: Decimal,
    pub loan_grant: Decimal,
    pub loan_collection: Decimal,
    /// Portion of `loan_collection` actually applied to loans at close.
    #[serde(default)]
    pub loan_collected: Decimal,
    pub outstanding_loans: Decimal,
}

impl PayrollLineItem {
    pub fn commissions(&self) -> Decimal {
        self.details.iter().map(|d| d.booked).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.salary + self.commissions()
    }

    pub fn total_to_pay(&self) -> Decimal {
        self.subtotal() - self.deductions - self.loan_collection + self.loan_grant
    }

    /// Applies edits; warns when collection exceeds the outstanding balance.
    pub fn apply_amounts(&mut self, amounts: LineAmounts) -> Result<Option<Warning>> {
        for v in [amounts.deductions, amounts.loan_grant, amounts.loan_collection]
            .into_iter()
            .flatten()
        {
            if v < Decimal::ZERO {
                return Err(PayrollError::InvalidAmount(v));
            }
        }
        if let Some(v) = amounts.deductions {
            self.deductions = v;
        }
        if let Some(v) = amounts.loan_grant {
            self.loan_grant = v;
        }
        if let Some(v) = amounts.loan_collection {
            self.loan_collection = v;
        }
        if self.loan_collection > self.outstanding_loans {
            return Ok(Some(Warning::LoanOverpayment {
                employee_id: self.employee_id,
                requested: self.loan_collection,
                outstanding: self.outstanding_loans,
            }));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub salary: Decimal,
    pub commissions: Decimal,
    pub deductions: Decimal,
    pub loans_granted: Decimal,
    pub loans_collected: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: Option<i64>,
    pub code: String,
    pub period: DateRange,
    pub kind: RunKind,
    pub status: RunStatus,
    pub items: Vec<PayrollLineItem>,
    #[serde(default, skip_deserializing)]
    pub warnings: Vec<Warning>,
}

impl PayrollRun {
    pub fn default_code(period: DateRange) -> String {
        format!(
            "NOM-{}-{}",
            period.start.format("%Y%m%d"),
            period.end.format("%Y%m%d")
        )
    }

    /// Always the sum of the line items.
    pub fn totals(&self) -> Totals {
        self.items.iter().fold(Totals::default(), |mut t, i| {
            t.salary += i.salary;
            t.commissions += i.commissions();
            t.deductions += i.deductions;
            t.loans_granted += i.loan_grant;
            t.loans_collected += i.loan_collection;
            t.net += i.total_to_pay();
            t
        })
    }

    pub fn item(&self, employee_id: i64) -> Option<&PayrollLineItem> {
        self.items.iter().find(|i| i.employee_id == employee_id)
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.status.is_locked() {
            return Err(PayrollError::RunLocked {
                id: self.id.unwrap_or_default(),
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn set_line_amounts(
        &mut self,
        employee_id: i64,
        amounts: LineAmounts,
    ) -> Result<Option<Warning>> {
        self.ensure_editable()?;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.employee_id == employee_id)
            .ok_or(PayrollError::UnknownEmployee(employee_id))?;
        item.apply_amounts(amounts)
    }

    /// Re-splits a distributed detail on both the agent and vendor lines.
    pub fn set_vendor_share(&mut self, receipt_id: i64, pct: Decimal) -> Result<()> {
        self.ensure_editable()?;
        self.edit_copies(receipt_id, |d| d.set_vendor_share(pct))
    }

    pub fn set_base_pct(&mut self, receipt_id: i64, pct: Decimal) -> Result<()> {
        self.ensure_editable()?;
        self.edit_copies(receipt_id, |d| d.set_base_pct(pct))
    }

    fn edit_copies<F>(&mut self, receipt_id: i64, mut f: F) -> Result<()>
    where
        F: FnMut(&mut CommissionDetail) -> Result<()>,
    {
        let mut found = false;
        for item in &mut self.items {
            for d in item.details.iter_mut().filter(|d| d.receipt_id == receipt_id) {
                f(d)?;
                d.book_split();
                found = true;
            }
        }
        if !found {
            return Err(PayrollError::UnknownDetail(receipt_id));
        }
        Ok(())
    }
}

impl fmt::Display for PayrollRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.code, self.status, self.period)
    }
}

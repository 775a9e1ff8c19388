// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Employee cash advances.
//!
//! A loan's balance is always `original - payments + adjustments`, floored
//! at zero. Payments never raise the balance; adjustments may. The loan is
//! Settled exactly when the balance is zero.

pub mod store;

use crate::error::{PayrollError, Result, Warning};
use crate::models::text_enum;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    Payment,
    Adjustment,
}

text_enum!(LoanStatus {
    Active => "active",
    Settled => "settled",
});

text_enum!(MovementKind {
    Payment => "payment",
    Adjustment => "adjustment",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanMovement {
    pub id: Option<i64>,
    pub kind: MovementKind,
    /// Payments are positive and reduce the balance. Adjustments are signed.
    pub amount: Decimal,
    pub date: NaiveDate,
    pub balance_after: Decimal,
    pub note: String,
    pub reference: Option<String>,
    pub run_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Option<i64>,
    pub employee_id: i64,
    pub original_amount: Decimal,
    pub balance: Decimal,
    pub status: LoanStatus,
    pub granted_on: NaiveDate,
    pub reason: String,
    /// Caller reference of the grant, for idempotent retries.
    pub reference: Option<String>,
    /// Payroll run that granted the loan, if any.
    pub run_id: Option<i64>,
    pub movements: Vec<LoanMovement>,
}

/// Where a movement comes from; used to make retries idempotent and to
/// find payroll-driven movements on reversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementSource {
    pub reference: Option<String>,
    pub run_id: Option<i64>,
}

impl MovementSource {
    pub fn manual(reference: Option<String>) -> Self {
        Self {
            reference,
            run_id: None,
        }
    }

    pub fn payroll(run_id: i64, reference: String) -> Self {
        Self {
            reference: Some(reference),
            run_id: Some(run_id),
        }
    }
}

fn positive(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(PayrollError::InvalidAmount(amount));
    }
    Ok(amount)
}

impl Loan {
    pub fn grant(
        employee_id: i64,
        amount: Decimal,
        date: NaiveDate,
        reason: impl Into<String>,
    ) -> Result<Self> {
        let amount = positive(amount)?;
        Ok(Self {
            id: None,
            employee_id,
            original_amount: amount,
            balance: amount,
            status: LoanStatus::Active,
            granted_on: date,
            reason: reason.into(),
            reference: None,
            run_id: None,
            movements: Vec::new(),
        })
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status == LoanStatus::Settled {
            return Err(PayrollError::LoanSettled(self.id.unwrap_or_default()));
        }
        Ok(())
    }

    pub fn has_reference(&self, reference: &str) -> bool {
        self.movements
            .iter()
            .any(|m| m.reference.as_deref() == Some(reference))
    }

    fn push(
        &mut self,
        kind: MovementKind,
        amount: Decimal,
        date: NaiveDate,
        note: &str,
        src: MovementSource,
    ) {
        self.balance += match kind {
            MovementKind::Payment => -amount,
            MovementKind::Adjustment => amount,
        };
        self.status = if self.balance.is_zero() {
            LoanStatus::Settled
        } else {
            LoanStatus::Active
        };
        self.movements.push(LoanMovement {
            id: None,
            kind,
            amount,
            date,
            balance_after: self.balance,
            note: note.to_string(),
            reference: src.reference,
            run_id: src.run_id,
        });
    }

    /// Records a payment. Paying more than the balance fails unless the
    /// caller acknowledges it; the excess is then reported, not recorded.
    pub fn pay(
        &mut self,
        amount: Decimal,
        date: NaiveDate,
        note: &str,
        src: MovementSource,
        acknowledge_overpayment: bool,
    ) -> Result<Option<Warning>> {
        let amount = positive(amount)?;
        self.ensure_active()?;
        let mut warning = None;
        let applied = if amount > self.balance {
            if !acknowledge_overpayment {
                return Err(PayrollError::UnacknowledgedOverpayment {
                    employee_id: self.employee_id,
                    requested: amount,
                    outstanding: self.balance,
                });
            }
            warning = Some(Warning::LoanOverpayment {
                employee_id: self.employee_id,
                requested: amount,
                outstanding: self.balance,
            });
            self.balance
        } else {
            amount
        };
        self.push(MovementKind::Payment, applied, date, note, src);
        Ok(warning)
    }

    /// Administrative correction, signed. Cannot push the balance below zero.
    pub fn adjust(
        &mut self,
        amount: Decimal,
        date: NaiveDate,
        note: &str,
        src: MovementSource,
    ) -> Result<()> {
        if amount.is_zero() {
            return Err(PayrollError::InvalidAmount(amount));
        }
        let applied = amount.max(-self.balance);
        if applied.is_zero() {
            return Err(PayrollError::InvalidAmount(amount));
        }
        self.push(MovementKind::Adjustment, applied, date, note, src);
        Ok(())
    }

    /// Write-off: forces the balance to zero through an adjustment.
    pub fn settle(&mut self, date: NaiveDate, note: &str, src: MovementSource) -> Result<()> {
        self.ensure_active()?;
        let remaining = self.balance;
        self.push(MovementKind::Adjustment, -remaining, date, note, src);
        Ok(())
    }

    /// Balance implied by the movement history.
    pub fn expected_balance(&self) -> Decimal {
        self.movements
            .iter()
            .fold(self.original_amount, |b, m| match m.kind {
                MovementKind::Payment => b - m.amount,
                MovementKind::Adjustment => b + m.amount,
            })
    }

    /// Drops movements made by `run_id` and recomputes balances.
    /// Returns the sum of the removed payments.
    pub fn reverse_run(&mut self, run_id: i64) -> Decimal {
        let removed: Decimal = self
            .movements
            .iter()
            .filter(|m| m.run_id == Some(run_id) && m.kind == MovementKind::Payment)
            .map(|m| m.amount)
            .sum();
        self.movements.retain(|m| m.run_id != Some(run_id));
        self.replay();
        removed
    }

    fn replay(&mut self) {
        let mut balance = self.original_amount;
        for m in &mut self.movements {
            balance += match m.kind {
                MovementKind::Payment => -m.amount,
                MovementKind::Adjustment => m.amount,
            };
            m.balance_after = balance;
        }
        self.balance = balance;
        self.status = if balance.is_zero() {
            LoanStatus::Settled
        } else {
            LoanStatus::Active
        };
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loan {} for employee {}: {} of {} ({})",
            self.id.unwrap_or_default(),
            self.employee_id,
            self.balance,
            self.original_amount,
            self.status
        )
    }
}

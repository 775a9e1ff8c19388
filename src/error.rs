// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::payroll::RunStatus;

pub type Result<T, E = PayrollError> = std::result::Result<T, E>;

/// Hard failures: the operation is aborted and nothing is mutated.
#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("payroll run has no line items")]
    EmptyRun,
    #[error("cannot move payroll run from {from} to {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
    #[error("payroll run {0} not found")]
    RunNotFound(i64),
    #[error("payroll run {id} is {status} and can no longer be edited")]
    RunLocked { id: i64, status: RunStatus },
    #[error("loan {0} not found")]
    LoanNotFound(i64),
    #[error("loan {0} is already settled")]
    LoanSettled(i64),
    #[error("employee {0} is not part of this payroll")]
    UnknownEmployee(i64),
    #[error("receipt {0} has no commission detail in this payroll")]
    UnknownDetail(i64),
    #[error("invalid amount {0}: must be positive")]
    InvalidAmount(Decimal),
    #[error("invalid percentage {0}: must be between 0 and 100")]
    InvalidPercentage(Decimal),
    #[error(
        "collection of {requested} exceeds outstanding loan balance {outstanding} for employee {employee_id}; acknowledge the overpayment to proceed"
    )]
    UnacknowledgedOverpayment {
        employee_id: i64,
        requested: Decimal,
        outstanding: Decimal,
    },
    #[error("receipt {receipt_id} was already commissioned in payroll run {run_id}")]
    ReceiptAlreadyCommissioned { receipt_id: i64, run_id: i64 },
    #[error("salary for employee {employee_id} overlaps days already paid by payroll run {run_id}")]
    SalaryAlreadyPaid { employee_id: i64, run_id: i64 },
    #[error("payroll run {run_id} cannot be reversed: {reason}")]
    IrreversibleLedger { run_id: i64, reason: String },
    #[error("corrupt stored value '{value}' in {field}")]
    Corrupt { field: &'static str, value: String },
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

/// Recoverable conditions reported alongside a successful result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    UnresolvedAgent {
        receipt_id: i64,
        reference: String,
    },
    UnresolvedVendor {
        receipt_id: i64,
        reference: String,
    },
    MalformedAmount {
        receipt_id: i64,
        field: &'static str,
        raw: String,
    },
    MissingSharingAgreement {
        receipt_id: i64,
        vendor_id: i64,
        agent_code: String,
    },
    LoanOverpayment {
        employee_id: i64,
        requested: Decimal,
        outstanding: Decimal,
    },
    VendorUnavailable {
        receipt_id: i64,
        vendor_id: i64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedAgent {
                receipt_id,
                reference,
            } => write!(
                f,
                "receipt {}: agent '{}' not found, commission skipped",
                receipt_id, reference
            ),
            Warning::UnresolvedVendor {
                receipt_id,
                reference,
            } => write!(
                f,
                "receipt {}: vendor '{}' not found, booked as direct",
                receipt_id, reference
            ),
            Warning::MalformedAmount {
                receipt_id,
                field,
                raw,
            } => write!(
                f,
                "receipt {}: {} '{}' is not a number, counted as 0",
                receipt_id, field, raw
            ),
            Warning::MissingSharingAgreement {
                receipt_id,
                vendor_id,
                agent_code,
            } => write!(
                f,
                "receipt {}: vendor {} has no sharing agreement for code '{}'",
                receipt_id, vendor_id, agent_code
            ),
            Warning::LoanOverpayment {
                employee_id,
                requested,
                outstanding,
            } => write!(
                f,
                "employee {}: collection {} exceeds outstanding loans {}",
                employee_id, requested, outstanding
            ),
            Warning::VendorUnavailable {
                receipt_id,
                vendor_id,
            } => write!(
                f,
                "receipt {}: vendor {} is no longer active, commission kept by the agent",
                receipt_id, vendor_id
            ),
        }
    }
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::catalog::{load_employees, load_policies};
use crate::engine::ExclusionSet;
use crate::engine::matcher::match_employee;
use crate::loans::store::list_loans;
use crate::models::{Profile, ReceiptStatus};
use crate::payroll::store::{list_runs, load_exclusion_set};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

fn issue(kind: &'static str, detail: String) -> Issue {
    Issue { kind, detail }
}

pub fn diagnose(conn: &Connection) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    let employees = load_employees(conn)?;

    for p in load_policies(conn)? {
        for r in &p.receipts {
            if r.status == ReceiptStatus::Paid && r.payment_date.is_none() {
                issues.push(issue(
                    "paid_without_date",
                    format!("receipt {} of policy {}", r.number, p.number),
                ));
            }
            if r.agent_id.is_none()
                && match_employee(&r.agent_ref, &employees, Profile::Agent).is_none()
            {
                issues.push(issue(
                    "unresolved_agent",
                    format!("receipt {}: '{}'", r.number, r.agent_ref),
                ));
            }
        }
    }

    for e in employees
        .iter()
        .filter(|e| e.active && e.profile == Profile::Agent && e.agent_codes.is_empty())
    {
        issues.push(issue(
            "agent_without_codes",
            format!("{} {}", e.id, e.full_name()),
        ));
    }

    for loan in list_loans(conn, None, false)? {
        let expected = loan.expected_balance();
        if expected != loan.balance {
            issues.push(issue(
                "loan_balance_mismatch",
                format!(
                    "loan {}: stored {} but movements give {}",
                    loan.id.unwrap_or_default(),
                    loan.balance,
                    expected
                ),
            ));
        }
    }

    let scanned = ExclusionSet::from_runs(&list_runs(conn)?).normalized();
    let stored = load_exclusion_set(conn)?.normalized();
    if scanned != stored {
        issues.push(issue(
            "exclusion_drift",
            format!(
                "closed runs commit {} receipts, the exclusion set holds {}",
                scanned.receipt_count(),
                stored.receipt_count()
            ),
        ));
    }
    Ok(issues)
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let issues = diagnose(conn)?;
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &issues)? {
        return Ok(());
    }
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! SQLite persistence for payroll runs and their lifecycle transitions.
//!
//! Close and delete run in a single transaction together with their loan
//! ledger effects, so either everything is recorded or nothing is.

use super::{
    CommissionDetail, LineAmounts, PayrollLineItem, PayrollRun, RunStatus, Side,
};
use crate::engine::ExclusionSet;
use crate::engine::periods::coverage;
use crate::error::{PayrollError, Result, Warning};
use crate::loans::store::{
    insert_loan, list_loans, load_loan, loans_granted_by_run, loans_touched_by_run, write_loan,
};
use crate::loans::{Loan, MovementSource};
use crate::models::DateRange;
use crate::settings::Settings;
use crate::store::{date_at, decimal_at, enum_at};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct CloseOptions {
    /// Proceed when a loan collection exceeds the outstanding balance.
    pub acknowledge_overpayment: bool,
}

/// One row of `list_runs`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: i64,
    pub code: String,
    pub period: DateRange,
    pub kind: String,
    pub status: RunStatus,
    pub lines: usize,
    pub net: Decimal,
}

fn insert_items(conn: &Connection, run_id: i64, items: &[PayrollLineItem]) -> Result<()> {
    let mut item_stmt = conn.prepare_cached(
        "INSERT INTO payroll_items(run_id, employee_id, employee_name, profile, daily_salary, days_paid, salary,
            deductions, loan_grant, loan_collection, loan_collected, outstanding_loans)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
    )?;
    let mut detail_stmt = conn.prepare_cached(
        "INSERT INTO commission_details(item_id, receipt_id, receipt_number, policy_id, policy_number, insurer,
            product, coverage_type, insured_item, premium_base, base_pct, classification, agent_id, agent_code,
            vendor_id, agent_share_pct, vendor_share_pct, side, booked)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
    )?;
    for item in items {
        item_stmt.execute(params![
            run_id,
            item.employee_id,
            item.employee_name,
            item.profile.as_str(),
            item.daily_salary.to_string(),
            item.days_paid,
            item.salary.to_string(),
            item.deductions.to_string(),
            item.loan_grant.to_string(),
            item.loan_collection.to_string(),
            item.loan_collected.to_string(),
            item.outstanding_loans.to_string()
        ])?;
        let item_id = conn.last_insert_rowid();
        for d in &item.details {
            detail_stmt.execute(params![
                item_id,
                d.receipt_id,
                d.receipt_number,
                d.policy_id,
                d.policy_number,
                d.insurer,
                d.product,
                d.coverage_type,
                d.insured_item,
                d.premium_base.to_string(),
                d.base_pct.to_string(),
                d.classification.as_str(),
                d.agent_id,
                d.agent_code,
                d.vendor_id,
                d.agent_share_pct.to_string(),
                d.vendor_share_pct.to_string(),
                d.side.as_str(),
                d.booked.to_string()
            ])?;
        }
    }
    Ok(())
}

fn delete_items(conn: &Connection, run_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM commission_details WHERE item_id IN (SELECT id FROM payroll_items WHERE run_id=?1)",
        params![run_id],
    )?;
    conn.execute("DELETE FROM payroll_items WHERE run_id=?1", params![run_id])?;
    Ok(())
}

fn stored_status(conn: &Connection, id: i64) -> Result<RunStatus> {
    conn.query_row(
        "SELECT status FROM payroll_runs WHERE id=?1",
        params![id],
        |r| enum_at(r, 0),
    )
    .optional()?
    .ok_or(PayrollError::RunNotFound(id))
}

/// Persists a Generated run, or re-saves a Saved one.
pub fn save_run(conn: &mut Connection, run: &mut PayrollRun) -> Result<i64> {
    let tx = conn.transaction()?;
    let current = match run.id {
        Some(id) => stored_status(&tx, id)?,
        None => run.status,
    };
    let next = current.transition(RunStatus::Saved)?;

    let id = match run.id {
        Some(id) => {
            tx.execute(
                "UPDATE payroll_runs SET code=?1, start_date=?2, end_date=?3, kind=?4, status=?5 WHERE id=?6",
                params![
                    run.code,
                    run.period.start.to_string(),
                    run.period.end.to_string(),
                    run.kind.as_str(),
                    next.as_str(),
                    id
                ],
            )?;
            delete_items(&tx, id)?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO payroll_runs(code, start_date, end_date, kind, status) VALUES (?1,?2,?3,?4,?5)",
                params![
                    run.code,
                    run.period.start.to_string(),
                    run.period.end.to_string(),
                    run.kind.as_str(),
                    next.as_str()
                ],
            )?;
            tx.last_insert_rowid()
        }
    };
    insert_items(&tx, id, &run.items)?;
    tx.commit()?;

    run.id = Some(id);
    run.status = next;
    info!(run = id, code = %run.code, lines = run.items.len(), "payroll saved");
    Ok(id)
}

fn load_details(conn: &Connection, item_id: i64) -> Result<Vec<CommissionDetail>> {
    let mut stmt = conn.prepare_cached(
        "SELECT receipt_id, receipt_number, policy_id, policy_number, insurer, product, coverage_type,
                insured_item, premium_base, base_pct, classification, agent_id, agent_code, vendor_id,
                agent_share_pct, vendor_share_pct, side, booked
         FROM commission_details WHERE item_id=?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![item_id], |r| {
        Ok(CommissionDetail {
            receipt_id: r.get(0)?,
            receipt_number: r.get(1)?,
            policy_id: r.get(2)?,
            policy_number: r.get(3)?,
            insurer: r.get(4)?,
            product: r.get(5)?,
            coverage_type: r.get(6)?,
            insured_item: r.get(7)?,
            premium_base: decimal_at(r, 8)?,
            base_pct: decimal_at(r, 9)?,
            classification: enum_at(r, 10)?,
            agent_id: r.get(11)?,
            agent_code: r.get(12)?,
            vendor_id: r.get(13)?,
            agent_share_pct: decimal_at(r, 14)?,
            vendor_share_pct: decimal_at(r, 15)?,
            side: enum_at(r, 16)?,
            booked: decimal_at(r, 17)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_run(conn: &Connection, id: i64) -> Result<PayrollRun> {
    let mut run = conn
        .query_row(
            "SELECT id, code, start_date, end_date, kind, status FROM payroll_runs WHERE id=?1",
            params![id],
            |r| {
                Ok(PayrollRun {
                    id: Some(r.get(0)?),
                    code: r.get(1)?,
                    period: DateRange::new(date_at(r, 2)?, date_at(r, 3)?),
                    kind: enum_at(r, 4)?,
                    status: enum_at(r, 5)?,
                    items: Vec::new(),
                    warnings: Vec::new(),
                })
            },
        )
        .optional()?
        .ok_or(PayrollError::RunNotFound(id))?;

    let mut stmt = conn.prepare_cached(
        "SELECT id, employee_id, employee_name, profile, daily_salary, days_paid, salary, deductions,
                loan_grant, loan_collection, loan_collected, outstanding_loans
         FROM payroll_items WHERE run_id=?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                PayrollLineItem {
                    employee_id: r.get(1)?,
                    employee_name: r.get(2)?,
                    profile: enum_at(r, 3)?,
                    daily_salary: decimal_at(r, 4)?,
                    days_paid: r.get(5)?,
                    salary: decimal_at(r, 6)?,
                    details: Vec::new(),
                    deductions: decimal_at(r, 7)?,
                    loan_grant: decimal_at(r, 8)?,
                    loan_collection: decimal_at(r, 9)?,
                    loan_collected: decimal_at(r, 10)?,
                    outstanding_loans: decimal_at(r, 11)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (item_id, mut item) in rows {
        item.details = load_details(conn, item_id)?;
        run.items.push(item);
    }
    Ok(run)
}

pub fn list_runs(conn: &Connection) -> Result<Vec<PayrollRun>> {
    let mut stmt = conn.prepare("SELECT id FROM payroll_runs ORDER BY start_date, id")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.into_iter().map(|id| load_run(conn, id)).collect()
}

pub fn summarize(run: &PayrollRun) -> RunSummary {
    RunSummary {
        id: run.id.unwrap_or_default(),
        code: run.code.clone(),
        period: run.period,
        kind: run.kind.to_string(),
        status: run.status,
        lines: run.items.len(),
        net: run.totals().net,
    }
}

/// Edits deductions or loan fields of one line of a stored run.
pub fn update_line(
    conn: &mut Connection,
    id: i64,
    employee_id: i64,
    amounts: LineAmounts,
) -> Result<(PayrollRun, Option<Warning>)> {
    let mut run = load_run(conn, id)?;
    let warning = run.set_line_amounts(employee_id, amounts)?;
    save_run(conn, &mut run)?;
    Ok((run, warning))
}

/// Edits the base rate and/or the vendor share of one commission of a
/// stored run.
pub fn update_detail(
    conn: &mut Connection,
    id: i64,
    receipt_id: i64,
    base_pct: Option<Decimal>,
    vendor_share_pct: Option<Decimal>,
) -> Result<PayrollRun> {
    let mut run = load_run(conn, id)?;
    if let Some(pct) = base_pct {
        run.set_base_pct(receipt_id, pct)?;
    }
    if let Some(pct) = vendor_share_pct {
        run.set_vendor_share(receipt_id, pct)?;
    }
    save_run(conn, &mut run)?;
    Ok(run)
}

/// Exclusion set as committed by closed runs.
pub fn load_exclusion_set(conn: &Connection) -> Result<ExclusionSet> {
    let mut set = ExclusionSet::default();
    let mut stmt = conn.prepare("SELECT receipt_id, run_id FROM commissioned_receipts")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        set.record_receipt(r.get(0)?, r.get(1)?);
    }
    let mut stmt =
        conn.prepare("SELECT employee_id, start_date, end_date FROM paid_ranges ORDER BY id")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        set.record_range(r.get(0)?, DateRange::new(date_at(r, 1)?, date_at(r, 2)?));
    }
    Ok(set)
}

/// Fails when a line pays more days than remain unpaid after the ranges
/// committed since the run was generated.
fn check_salary_days(conn: &Connection, run: &PayrollRun, run_id: i64) -> Result<()> {
    let merge = Settings::load(conn)?.merge_paid_ranges;
    let mut stmt = conn.prepare_cached(
        "SELECT run_id, start_date, end_date FROM paid_ranges
         WHERE employee_id=?1 AND run_id<>?2 ORDER BY id",
    )?;
    for item in run.items.iter().filter(|i| i.days_paid > 0) {
        let prior = stmt
            .query_map(params![item.employee_id, run_id], |r| {
                Ok((r.get::<_, i64>(0)?, DateRange::new(date_at(r, 1)?, date_at(r, 2)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let ranges: Vec<DateRange> = prior.iter().map(|(_, r)| *r).collect();
        let cov = coverage(run.period, &ranges, merge);
        if cov.days_to_pay >= item.days_paid {
            continue;
        }
        let owner = prior
            .iter()
            .find(|(_, r)| r.start <= run.period.end && r.end >= run.period.start)
            .map(|(id, _)| *id)
            .unwrap_or_default();
        warn!(
            employee = item.employee_id,
            run = run_id,
            owner,
            days_paid = item.days_paid,
            days_left = cov.days_to_pay,
            "salary days already paid"
        );
        return Err(PayrollError::SalaryAlreadyPaid {
            employee_id: item.employee_id,
            run_id: owner,
        });
    }
    Ok(())
}

fn commit_exclusions(conn: &Connection, run: &PayrollRun, run_id: i64) -> Result<()> {
    let receipts: BTreeSet<i64> = run
        .items
        .iter()
        .flat_map(|i| i.details.iter().map(|d| d.receipt_id))
        .collect();
    for receipt_id in receipts {
        let owner: Option<i64> = conn
            .query_row(
                "SELECT run_id FROM commissioned_receipts WHERE receipt_id=?1",
                params![receipt_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(other) = owner.filter(|o| *o != run_id) {
            return Err(PayrollError::ReceiptAlreadyCommissioned {
                receipt_id,
                run_id: other,
            });
        }
        conn.execute(
            "INSERT OR IGNORE INTO commissioned_receipts(receipt_id, run_id) VALUES (?1,?2)",
            params![receipt_id, run_id],
        )?;
    }

    check_salary_days(conn, run, run_id)?;
    for item in run.items.iter().filter(|i| !i.salary.is_zero()) {
        conn.execute(
            "INSERT INTO paid_ranges(employee_id, run_id, start_date, end_date) VALUES (?1,?2,?3,?4)",
            params![
                item.employee_id,
                run_id,
                run.period.start.to_string(),
                run.period.end.to_string()
            ],
        )?;
    }

    // Later runs read these ids instead of matching the text again.
    for d in run
        .items
        .iter()
        .flat_map(|i| i.details.iter())
        .filter(|d| d.side == Side::Agent)
    {
        conn.execute(
            "UPDATE receipts SET agent_id=?1, vendor_id=?2 WHERE id=?3",
            params![d.agent_id, d.vendor_id, d.receipt_id],
        )?;
    }
    Ok(())
}

fn apply_loan_effects(
    conn: &Connection,
    run: &mut PayrollRun,
    run_id: i64,
    opts: CloseOptions,
) -> Result<Vec<Warning>> {
    let mut warnings = Vec::new();
    let date = run.period.end;
    let note = format!("payroll {}", run.code);

    for item in &mut run.items {
        if item.loan_collection > Decimal::ZERO {
            let mut loans = list_loans(conn, Some(item.employee_id), true)?;
            let outstanding: Decimal = loans.iter().map(|l| l.balance).sum();
            if item.loan_collection > outstanding {
                if !opts.acknowledge_overpayment {
                    return Err(PayrollError::UnacknowledgedOverpayment {
                        employee_id: item.employee_id,
                        requested: item.loan_collection,
                        outstanding,
                    });
                }
                warn!(employee = item.employee_id, requested = %item.loan_collection, %outstanding, "loan overpayment acknowledged");
                warnings.push(Warning::LoanOverpayment {
                    employee_id: item.employee_id,
                    requested: item.loan_collection,
                    outstanding,
                });
            }
            let applied = item.loan_collection.min(outstanding);
            let mut remaining = applied;
            for loan in loans.iter_mut() {
                if remaining.is_zero() {
                    break;
                }
                let part = remaining.min(loan.balance);
                if part.is_zero() {
                    continue;
                }
                let src = MovementSource::payroll(run_id, format!("run:{}:collect", run_id));
                loan.pay(part, date, &note, src, false)?;
                write_loan(conn, loan)?;
                remaining -= part;
            }
            item.loan_collected = applied;
            conn.execute(
                "UPDATE payroll_items SET loan_collected=?1 WHERE run_id=?2 AND employee_id=?3",
                params![applied.to_string(), run_id, item.employee_id],
            )?;
        }

        if item.loan_grant > Decimal::ZERO {
            let mut loan = Loan::grant(item.employee_id, item.loan_grant, date, note.clone())?;
            loan.run_id = Some(run_id);
            loan.reference = Some(format!("run:{}:grant:{}", run_id, item.employee_id));
            insert_loan(conn, &mut loan)?;
        }
    }
    Ok(warnings)
}

/// Locks a saved run, commits it to the exclusion set and applies its
/// loan grants and collections.
pub fn close_run(
    conn: &mut Connection,
    id: i64,
    opts: CloseOptions,
) -> Result<(PayrollRun, Vec<Warning>)> {
    let tx = conn.transaction()?;
    let mut run = load_run(&tx, id)?;
    let next = run.status.transition(RunStatus::Closed)?;
    if run.items.is_empty() {
        return Err(PayrollError::EmptyRun);
    }

    commit_exclusions(&tx, &run, id)?;
    let warnings = apply_loan_effects(&tx, &mut run, id, opts)?;
    tx.execute(
        "UPDATE payroll_runs SET status=?1, closed_at=datetime('now') WHERE id=?2",
        params![next.as_str(), id],
    )?;
    tx.commit()?;

    run.status = next;
    run.warnings = warnings.clone();
    info!(run = id, code = %run.code, "payroll closed");
    Ok((run, warnings))
}

pub fn mark_paid(conn: &Connection, id: i64) -> Result<PayrollRun> {
    let mut run = load_run(conn, id)?;
    let next = run.status.transition(RunStatus::Paid)?;
    conn.execute(
        "UPDATE payroll_runs SET status=?1, paid_at=datetime('now') WHERE id=?2",
        params![next.as_str(), id],
    )?;
    run.status = next;
    info!(run = id, code = %run.code, "payroll paid");
    Ok(run)
}

fn irreversible(run_id: i64, reason: String) -> PayrollError {
    PayrollError::IrreversibleLedger { run_id, reason }
}

fn reverse_loan_effects(conn: &Connection, run: &PayrollRun, run_id: i64) -> Result<()> {
    let granted = loans_granted_by_run(conn, run_id)?;
    let grant_lines: Vec<&PayrollLineItem> = run
        .items
        .iter()
        .filter(|i| i.loan_grant > Decimal::ZERO)
        .collect();
    if granted.len() != grant_lines.len() {
        return Err(irreversible(
            run_id,
            format!(
                "expected {} granted loans, found {}",
                grant_lines.len(),
                granted.len()
            ),
        ));
    }
    for loan in &granted {
        let line = grant_lines
            .iter()
            .find(|i| i.employee_id == loan.employee_id)
            .ok_or_else(|| {
                irreversible(
                    run_id,
                    format!("loan {} belongs to no line of this run", loan.id.unwrap_or_default()),
                )
            })?;
        if loan.original_amount != line.loan_grant {
            return Err(irreversible(
                run_id,
                format!(
                    "loan {} was granted {} but the line grants {}",
                    loan.id.unwrap_or_default(),
                    loan.original_amount,
                    line.loan_grant
                ),
            ));
        }
        if loan.movements.iter().any(|m| m.run_id != Some(run_id)) {
            return Err(irreversible(
                run_id,
                format!("loan {} has movements after it was granted", loan.id.unwrap_or_default()),
            ));
        }
    }
    let granted_ids: Vec<i64> = granted.iter().filter_map(|l| l.id).collect();

    let mut removed: HashMap<i64, Decimal> = HashMap::new();
    for loan_id in loans_touched_by_run(conn, run_id)? {
        if granted_ids.contains(&loan_id) {
            continue;
        }
        let mut loan = load_loan(conn, loan_id)?;
        let amount = loan.reverse_run(run_id);
        write_loan(conn, &mut loan)?;
        *removed.entry(loan.employee_id).or_insert(Decimal::ZERO) += amount;
    }
    for item in &run.items {
        let found = removed.remove(&item.employee_id).unwrap_or(Decimal::ZERO);
        if found != item.loan_collected {
            return Err(irreversible(
                run_id,
                format!(
                    "employee {} had {} collected but the ledger holds {}",
                    item.employee_id, item.loan_collected, found
                ),
            ));
        }
    }
    if let Some((employee_id, _)) = removed.into_iter().next() {
        return Err(irreversible(
            run_id,
            format!("ledger holds collections for employee {} outside this run", employee_id),
        ));
    }

    for id in granted_ids {
        conn.execute("DELETE FROM loan_movements WHERE loan_id=?1", params![id])?;
        conn.execute("DELETE FROM loans WHERE id=?1", params![id])?;
    }
    Ok(())
}

/// Deletes a stored run. Closed and paid runs are reversed first: their
/// loan movements are undone and their receipts and date ranges become
/// eligible again.
pub fn delete_run(conn: &mut Connection, id: i64) -> Result<PayrollRun> {
    let tx = conn.transaction()?;
    let run = load_run(&tx, id)?;
    if run.status.is_locked() {
        reverse_loan_effects(&tx, &run, id)?;
        tx.execute(
            "DELETE FROM commissioned_receipts WHERE run_id=?1",
            params![id],
        )?;
        tx.execute("DELETE FROM paid_ranges WHERE run_id=?1", params![id])?;
    }
    delete_items(&tx, id)?;
    tx.execute("DELETE FROM payroll_runs WHERE id=?1", params![id])?;
    tx.commit()?;
    info!(run = id, code = %run.code, status = %run.status, "payroll deleted");
    Ok(run)
}

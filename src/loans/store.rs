// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{Loan, LoanMovement, MovementSource};
use crate::error::{PayrollError, Result, Warning};
use crate::store::{date_at, decimal_at, enum_at};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

const LOAN_COLS: &str =
    "id, employee_id, original_amount, balance, status, granted_on, reason, reference, run_id";

fn loan_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: Some(r.get(0)?),
        employee_id: r.get(1)?,
        original_amount: decimal_at(r, 2)?,
        balance: decimal_at(r, 3)?,
        status: enum_at(r, 4)?,
        granted_on: date_at(r, 5)?,
        reason: r.get(6)?,
        reference: r.get(7)?,
        run_id: r.get(8)?,
        movements: Vec::new(),
    })
}

fn load_movements(conn: &Connection, loan_id: i64) -> Result<Vec<LoanMovement>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, kind, amount, date, balance_after, note, reference, run_id
         FROM loan_movements WHERE loan_id=?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![loan_id], |r| {
        Ok(LoanMovement {
            id: Some(r.get(0)?),
            kind: enum_at(r, 1)?,
            amount: decimal_at(r, 2)?,
            date: date_at(r, 3)?,
            balance_after: decimal_at(r, 4)?,
            note: r.get(5)?,
            reference: r.get(6)?,
            run_id: r.get(7)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_loan(conn: &Connection, id: i64) -> Result<Loan> {
    let sql = format!("SELECT {} FROM loans WHERE id=?1", LOAN_COLS);
    let mut loan = conn
        .query_row(&sql, params![id], loan_from_row)
        .optional()?
        .ok_or(PayrollError::LoanNotFound(id))?;
    loan.movements = load_movements(conn, id)?;
    Ok(loan)
}

/// Loans ordered oldest first.
pub fn list_loans(
    conn: &Connection,
    employee_id: Option<i64>,
    active_only: bool,
) -> Result<Vec<Loan>> {
    let mut sql = format!("SELECT {} FROM loans WHERE 1=1", LOAN_COLS);
    if employee_id.is_some() {
        sql.push_str(" AND employee_id=?1");
    }
    if active_only {
        sql.push_str(" AND status='active'");
    }
    sql.push_str(" ORDER BY granted_on, id");
    let mut stmt = conn.prepare(&sql)?;
    let loans = match employee_id {
        Some(e) => stmt
            .query_map(params![e], loan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], loan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    let mut out = Vec::with_capacity(loans.len());
    for mut loan in loans {
        if let Some(id) = loan.id {
            loan.movements = load_movements(conn, id)?;
        }
        out.push(loan);
    }
    Ok(out)
}

pub fn loans_granted_by_run(conn: &Connection, run_id: i64) -> Result<Vec<Loan>> {
    let sql = format!("SELECT {} FROM loans WHERE run_id=?1 ORDER BY id", LOAN_COLS);
    let mut stmt = conn.prepare(&sql)?;
    let loans = stmt
        .query_map(params![run_id], loan_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut out = Vec::with_capacity(loans.len());
    for mut loan in loans {
        if let Some(id) = loan.id {
            loan.movements = load_movements(conn, id)?;
        }
        out.push(loan);
    }
    Ok(out)
}

/// Ids of loans carrying at least one movement made by `run_id`.
pub fn loans_touched_by_run(conn: &Connection, run_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT loan_id FROM loan_movements WHERE run_id=?1 ORDER BY loan_id",
    )?;
    let ids = stmt
        .query_map(params![run_id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Sum of active balances per employee.
pub fn outstanding_by_employee(conn: &Connection) -> Result<HashMap<i64, Decimal>> {
    let mut stmt =
        conn.prepare("SELECT employee_id, balance FROM loans WHERE status='active'")?;
    let mut rows = stmt.query([])?;
    let mut out: HashMap<i64, Decimal> = HashMap::new();
    while let Some(r) = rows.next()? {
        let employee_id: i64 = r.get(0)?;
        let balance = decimal_at(r, 1)?;
        *out.entry(employee_id).or_insert(Decimal::ZERO) += balance;
    }
    Ok(out)
}

/// Writes a new loan with any movements it already carries.
pub fn insert_loan(conn: &Connection, loan: &mut Loan) -> Result<i64> {
    conn.execute(
        "INSERT INTO loans(employee_id, original_amount, balance, status, granted_on, reason, reference, run_id)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            loan.employee_id,
            loan.original_amount.to_string(),
            loan.balance.to_string(),
            loan.status.as_str(),
            loan.granted_on.to_string(),
            loan.reason,
            loan.reference,
            loan.run_id
        ],
    )?;
    let id = conn.last_insert_rowid();
    loan.id = Some(id);
    write_loan(conn, loan)?;
    Ok(id)
}

/// Persists balance, status and movement changes of a stored loan.
/// Movements no longer on the loan are deleted; new ones are inserted.
pub fn write_loan(conn: &Connection, loan: &mut Loan) -> Result<()> {
    let id = loan.id.ok_or(PayrollError::LoanNotFound(0))?;
    conn.execute(
        "UPDATE loans SET balance=?1, status=?2 WHERE id=?3",
        params![loan.balance.to_string(), loan.status.as_str(), id],
    )?;

    let kept: Vec<i64> = loan.movements.iter().filter_map(|m| m.id).collect();
    let mut stmt = conn.prepare_cached("SELECT id FROM loan_movements WHERE loan_id=?1")?;
    let existing = stmt
        .query_map(params![id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    drop(stmt);
    for gone in existing.into_iter().filter(|m| !kept.contains(m)) {
        conn.execute("DELETE FROM loan_movements WHERE id=?1", params![gone])?;
    }

    for m in &mut loan.movements {
        match m.id {
            Some(mid) => {
                conn.execute(
                    "UPDATE loan_movements SET balance_after=?1 WHERE id=?2",
                    params![m.balance_after.to_string(), mid],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO loan_movements(loan_id, kind, amount, date, balance_after, note, reference, run_id)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                    params![
                        id,
                        m.kind.as_str(),
                        m.amount.to_string(),
                        m.date.to_string(),
                        m.balance_after.to_string(),
                        m.note,
                        m.reference,
                        m.run_id
                    ],
                )?;
                m.id = Some(conn.last_insert_rowid());
            }
        }
    }
    Ok(())
}

fn find_by_reference(conn: &Connection, reference: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM loans WHERE reference=?1",
            params![reference],
            |r| r.get(0),
        )
        .optional()?)
}

/// Grants a loan. Repeating a reference returns the loan it created.
pub fn grant(
    conn: &mut Connection,
    employee_id: i64,
    amount: Decimal,
    date: NaiveDate,
    reason: &str,
    reference: Option<String>,
) -> Result<Loan> {
    if let Some(r) = reference.as_deref() {
        if let Some(existing) = find_by_reference(conn, r)? {
            info!(loan = existing, reference = r, "grant already recorded");
            return load_loan(conn, existing);
        }
    }
    let mut loan = Loan::grant(employee_id, amount, date, reason)?;
    loan.reference = reference;
    let tx = conn.transaction()?;
    insert_loan(&tx, &mut loan)?;
    tx.commit()?;
    info!(loan = ?loan.id, employee = employee_id, amount = %amount, "loan granted");
    Ok(loan)
}

/// Loads a loan, applies `op` unless `reference` was already applied,
/// and persists the result in one transaction.
fn with_loan<F>(
    conn: &mut Connection,
    loan_id: i64,
    reference: Option<&str>,
    op: F,
) -> Result<(Loan, Option<Warning>)>
where
    F: FnOnce(&mut Loan) -> Result<Option<Warning>>,
{
    let tx = conn.transaction()?;
    let mut loan = load_loan(&tx, loan_id)?;
    if let Some(r) = reference {
        if loan.has_reference(r) {
            info!(loan = loan_id, reference = r, "movement already recorded");
            return Ok((loan, None));
        }
    }
    let warning = op(&mut loan)?;
    write_loan(&tx, &mut loan)?;
    tx.commit()?;
    Ok((loan, warning))
}

pub fn pay(
    conn: &mut Connection,
    loan_id: i64,
    amount: Decimal,
    date: NaiveDate,
    note: &str,
    reference: Option<String>,
    acknowledge_overpayment: bool,
) -> Result<(Loan, Option<Warning>)> {
    let r = reference.clone();
    let out = with_loan(conn, loan_id, r.as_deref(), |loan| {
        loan.pay(
            amount,
            date,
            note,
            MovementSource::manual(reference),
            acknowledge_overpayment,
        )
    })?;
    info!(loan = loan_id, amount = %amount, balance = %out.0.balance, "loan payment");
    Ok(out)
}

pub fn adjust(
    conn: &mut Connection,
    loan_id: i64,
    amount: Decimal,
    date: NaiveDate,
    note: &str,
    reference: Option<String>,
) -> Result<Loan> {
    let r = reference.clone();
    let (loan, _) = with_loan(conn, loan_id, r.as_deref(), |loan| {
        loan.adjust(amount, date, note, MovementSource::manual(reference))
            .map(|_| None)
    })?;
    info!(loan = loan_id, amount = %amount, balance = %loan.balance, "loan adjusted");
    Ok(loan)
}

pub fn settle(
    conn: &mut Connection,
    loan_id: i64,
    date: NaiveDate,
    note: &str,
    reference: Option<String>,
) -> Result<Loan> {
    let r = reference.clone();
    let (loan, _) = with_loan(conn, loan_id, r.as_deref(), |loan| {
        loan.settle(date, note, MovementSource::manual(reference))
            .map(|_| None)
    })?;
    info!(loan = loan_id, "loan settled");
    Ok(loan)
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Employees, policies with their receipts, and the commission rate table.

use crate::engine::{RateTable, Snapshot};
use crate::error::Result;
use crate::loans::store::outstanding_by_employee;
use crate::models::{AgentCode, Employee, Policy, Receipt, SharingAgreement};
use crate::payroll::store::load_exclusion_set;
use crate::settings::Settings;
use crate::store::{decimal_at, enum_at, opt_date_at, opt_decimal_at};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::debug;

/// Inserts or replaces an employee together with its codes and agreements.
pub fn upsert_employee(conn: &Connection, e: &Employee) -> Result<()> {
    conn.execute(
        "INSERT INTO employees(id, code, first_name, last_name, second_last_name, profile, scheme, daily_salary, active)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
         ON CONFLICT(id) DO UPDATE SET code=excluded.code, first_name=excluded.first_name,
            last_name=excluded.last_name, second_last_name=excluded.second_last_name,
            profile=excluded.profile, scheme=excluded.scheme,
            daily_salary=excluded.daily_salary, active=excluded.active",
        params![
            e.id,
            e.code,
            e.first_name,
            e.last_name,
            e.second_last_name,
            e.profile.as_str(),
            e.scheme.as_str(),
            e.daily_salary.to_string(),
            e.active
        ],
    )?;
    conn.execute("DELETE FROM agent_codes WHERE employee_id=?1", params![e.id])?;
    conn.execute(
        "DELETE FROM sharing_agreements WHERE employee_id=?1",
        params![e.id],
    )?;
    for c in &e.agent_codes {
        conn.execute(
            "INSERT INTO agent_codes(employee_id, insurer, product, code, commission_pct, executive_id)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                e.id,
                c.insurer,
                c.product,
                c.code,
                c.commission_pct.map(|d| d.to_string()),
                c.executive_id
            ],
        )?;
    }
    for s in &e.sharing {
        conn.execute(
            "INSERT INTO sharing_agreements(employee_id, agent_code, vendor_share_pct) VALUES (?1,?2,?3)",
            params![e.id, s.agent_code, s.vendor_share_pct.to_string()],
        )?;
    }
    Ok(())
}

pub fn load_employees(conn: &Connection) -> Result<Vec<Employee>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, first_name, last_name, second_last_name, profile, scheme, daily_salary, active
         FROM employees ORDER BY id",
    )?;
    let mut employees = stmt
        .query_map([], |r| {
            Ok(Employee {
                id: r.get(0)?,
                code: r.get(1)?,
                first_name: r.get(2)?,
                last_name: r.get(3)?,
                second_last_name: r.get(4)?,
                profile: enum_at(r, 5)?,
                scheme: enum_at(r, 6)?,
                daily_salary: decimal_at(r, 7)?,
                active: r.get(8)?,
                agent_codes: Vec::new(),
                sharing: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut codes = conn.prepare(
        "SELECT employee_id, insurer, product, code, commission_pct, executive_id
         FROM agent_codes ORDER BY id",
    )?;
    let mut rows = codes.query([])?;
    while let Some(r) = rows.next()? {
        let employee_id: i64 = r.get(0)?;
        let code = AgentCode {
            insurer: r.get(1)?,
            product: r.get(2)?,
            code: r.get(3)?,
            commission_pct: opt_decimal_at(r, 4)?,
            executive_id: r.get(5)?,
        };
        if let Some(e) = employees.iter_mut().find(|e| e.id == employee_id) {
            e.agent_codes.push(code);
        }
    }

    let mut sharing = conn.prepare(
        "SELECT employee_id, agent_code, vendor_share_pct FROM sharing_agreements ORDER BY id",
    )?;
    let mut rows = sharing.query([])?;
    while let Some(r) = rows.next()? {
        let employee_id: i64 = r.get(0)?;
        let agreement = SharingAgreement {
            agent_code: r.get(1)?,
            vendor_share_pct: decimal_at(r, 2)?,
        };
        if let Some(e) = employees.iter_mut().find(|e| e.id == employee_id) {
            e.sharing.push(agreement);
        }
    }
    Ok(employees)
}

/// Inserts or replaces a policy and its receipts. Identities already
/// resolved on stored receipts are kept when the import carries none.
pub fn upsert_policy(conn: &Connection, p: &Policy) -> Result<()> {
    conn.execute(
        "INSERT INTO policies(id, number, insurer, product, coverage_type, insured_item)
         VALUES (?1,?2,?3,?4,?5,?6)
         ON CONFLICT(id) DO UPDATE SET number=excluded.number, insurer=excluded.insurer,
            product=excluded.product, coverage_type=excluded.coverage_type,
            insured_item=excluded.insured_item",
        params![
            p.id,
            p.number,
            p.insurer,
            p.product,
            p.coverage_type,
            p.insured_item
        ],
    )?;
    for r in &p.receipts {
        conn.execute(
            "INSERT INTO receipts(id, policy_id, number, status, payment_date, net_premium, total_premium,
                agent_ref, sub_agent_ref, agent_id, vendor_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(id) DO UPDATE SET policy_id=excluded.policy_id, number=excluded.number,
                status=excluded.status, payment_date=excluded.payment_date,
                net_premium=excluded.net_premium, total_premium=excluded.total_premium,
                agent_ref=excluded.agent_ref, sub_agent_ref=excluded.sub_agent_ref,
                agent_id=COALESCE(excluded.agent_id, receipts.agent_id),
                vendor_id=COALESCE(excluded.vendor_id, receipts.vendor_id)",
            params![
                r.id,
                p.id,
                r.number,
                r.status.as_str(),
                r.payment_date.map(|d| d.to_string()),
                r.net_premium,
                r.total_premium,
                r.agent_ref,
                r.sub_agent_ref,
                r.agent_id,
                r.vendor_id
            ],
        )?;
    }
    Ok(())
}

pub fn load_policies(conn: &Connection) -> Result<Vec<Policy>> {
    let mut stmt = conn.prepare(
        "SELECT id, number, insurer, product, coverage_type, insured_item FROM policies ORDER BY id",
    )?;
    let mut policies = stmt
        .query_map([], |r| {
            Ok(Policy {
                id: r.get(0)?,
                number: r.get(1)?,
                insurer: r.get(2)?,
                product: r.get(3)?,
                coverage_type: r.get(4)?,
                insured_item: r.get(5)?,
                receipts: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, policy_id, number, status, payment_date, net_premium, total_premium,
                agent_ref, sub_agent_ref, agent_id, vendor_id
         FROM receipts ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let receipt = Receipt {
            id: r.get(0)?,
            policy_id: r.get(1)?,
            number: r.get(2)?,
            status: enum_at(r, 3)?,
            payment_date: opt_date_at(r, 4)?,
            net_premium: r.get(5)?,
            total_premium: r.get(6)?,
            agent_ref: r.get(7)?,
            sub_agent_ref: r.get(8)?,
            agent_id: r.get(9)?,
            vendor_id: r.get(10)?,
        };
        if let Some(p) = policies.iter_mut().find(|p| p.id == receipt.policy_id) {
            p.receipts.push(receipt);
        }
    }
    Ok(policies)
}

/// Returns the product id, creating the product if needed.
pub fn ensure_product(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM products WHERE name=?1",
            params![name],
            |r| r.get(0),
        )
        .optional()?
    {
        return Ok(id);
    }
    conn.execute("INSERT INTO products(name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn set_rate(conn: &Connection, insurer: &str, product: &str, pct: Decimal) -> Result<()> {
    let product_id = ensure_product(conn, product)?;
    conn.execute(
        "INSERT INTO commission_rates(insurer, product_id, pct) VALUES (?1,?2,?3)
         ON CONFLICT(insurer, product_id) DO UPDATE SET pct=excluded.pct",
        params![insurer.trim(), product_id, pct.to_string()],
    )?;
    Ok(())
}

pub fn load_rate_table(conn: &Connection, default_pct: Decimal) -> Result<RateTable> {
    let mut table = RateTable::new(default_pct);
    let mut stmt = conn.prepare("SELECT id, name FROM products")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let name: String = r.get(1)?;
        table.add_product(id, &name);
    }
    let mut stmt = conn.prepare("SELECT insurer, product_id, pct FROM commission_rates")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let insurer: String = r.get(0)?;
        table.set_rate(&insurer, r.get(1)?, decimal_at(r, 2)?);
    }
    Ok(table)
}

impl Snapshot {
    /// Reads everything a payroll generation needs from the store.
    pub fn load(conn: &Connection) -> Result<Self> {
        let settings = Settings::load(conn)?;
        let snapshot = Snapshot {
            employees: load_employees(conn)?,
            policies: load_policies(conn)?,
            rates: load_rate_table(conn, settings.default_commission_pct)?,
            exclusions: load_exclusion_set(conn)?,
            outstanding_loans: outstanding_by_employee(conn)?,
            settings,
        };
        debug!(
            employees = snapshot.employees.len(),
            policies = snapshot.policies.len(),
            rates = snapshot.rates.len(),
            excluded = snapshot.exclusions.receipt_count(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}

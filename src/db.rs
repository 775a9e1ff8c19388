// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Agencypay", "agencypay"));

pub const DB_ENV: &str = "AGENCYPAY_DB";

/// `AGENCYPAY_DB` if set, else the platform data dir.
pub fn db_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DB_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p.trim()));
        }
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("agencypay.sqlite"))
}

pub fn open_at(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_or_init() -> Result<Connection> {
    open_at(&db_path()?)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS employees(
        id INTEGER PRIMARY KEY,
        code TEXT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        second_last_name TEXT,
        profile TEXT NOT NULL CHECK(profile IN ('agent','vendor','executive','admin')),
        scheme TEXT NOT NULL,
        daily_salary TEXT NOT NULL DEFAULT '0',
        active INTEGER NOT NULL DEFAULT 1
    );

    -- only agents carry codes
    CREATE TABLE IF NOT EXISTS agent_codes(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        insurer TEXT NOT NULL,
        product TEXT NOT NULL,
        code TEXT NOT NULL,
        commission_pct TEXT,
        executive_id INTEGER,
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE
    );

    -- only vendors carry sharing agreements
    CREATE TABLE IF NOT EXISTS sharing_agreements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        agent_code TEXT NOT NULL,
        vendor_share_pct TEXT NOT NULL,
        UNIQUE(employee_id, agent_code),
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS products(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE
    );

    CREATE TABLE IF NOT EXISTS commission_rates(
        insurer TEXT NOT NULL COLLATE NOCASE,
        product_id INTEGER NOT NULL,
        pct TEXT NOT NULL,
        PRIMARY KEY(insurer, product_id),
        FOREIGN KEY(product_id) REFERENCES products(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS policies(
        id INTEGER PRIMARY KEY,
        number TEXT NOT NULL,
        insurer TEXT NOT NULL,
        product TEXT NOT NULL,
        coverage_type TEXT NOT NULL DEFAULT '',
        insured_item TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS receipts(
        id INTEGER PRIMARY KEY,
        policy_id INTEGER NOT NULL,
        number TEXT NOT NULL,
        status TEXT NOT NULL,
        payment_date TEXT,
        net_premium TEXT,
        total_premium TEXT,
        agent_ref TEXT NOT NULL DEFAULT '',
        sub_agent_ref TEXT,
        agent_id INTEGER,
        vendor_id INTEGER,
        FOREIGN KEY(policy_id) REFERENCES policies(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_receipts_payment_date ON receipts(payment_date);

    CREATE TABLE IF NOT EXISTS payroll_runs(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        closed_at TEXT,
        paid_at TEXT
    );

    CREATE TABLE IF NOT EXISTS payroll_items(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL,
        employee_id INTEGER NOT NULL,
        employee_name TEXT NOT NULL,
        profile TEXT NOT NULL,
        daily_salary TEXT NOT NULL,
        days_paid INTEGER NOT NULL,
        salary TEXT NOT NULL,
        deductions TEXT NOT NULL DEFAULT '0',
        loan_grant TEXT NOT NULL DEFAULT '0',
        loan_collection TEXT NOT NULL DEFAULT '0',
        loan_collected TEXT NOT NULL DEFAULT '0',
        outstanding_loans TEXT NOT NULL DEFAULT '0',
        UNIQUE(run_id, employee_id),
        FOREIGN KEY(run_id) REFERENCES payroll_runs(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS commission_details(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL,
        receipt_id INTEGER NOT NULL,
        receipt_number TEXT NOT NULL,
        policy_id INTEGER NOT NULL,
        policy_number TEXT NOT NULL,
        insurer TEXT NOT NULL,
        product TEXT NOT NULL,
        coverage_type TEXT NOT NULL,
        insured_item TEXT NOT NULL,
        premium_base TEXT NOT NULL,
        base_pct TEXT NOT NULL,
        classification TEXT NOT NULL,
        agent_id INTEGER NOT NULL,
        agent_code TEXT,
        vendor_id INTEGER,
        agent_share_pct TEXT NOT NULL,
        vendor_share_pct TEXT NOT NULL,
        side TEXT NOT NULL,
        booked TEXT NOT NULL,
        FOREIGN KEY(item_id) REFERENCES payroll_items(id) ON DELETE CASCADE
    );

    -- exclusion set, written when a run closes
    CREATE TABLE IF NOT EXISTS commissioned_receipts(
        receipt_id INTEGER PRIMARY KEY,
        run_id INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS paid_ranges(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        run_id INTEGER NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_paid_ranges_employee ON paid_ranges(employee_id);

    CREATE TABLE IF NOT EXISTS loans(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        original_amount TEXT NOT NULL,
        balance TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('active','settled')),
        granted_on TEXT NOT NULL,
        reason TEXT NOT NULL DEFAULT '',
        reference TEXT UNIQUE,
        run_id INTEGER
    );

    CREATE TABLE IF NOT EXISTS loan_movements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        loan_id INTEGER NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('payment','adjustment')),
        amount TEXT NOT NULL,
        date TEXT NOT NULL,
        balance_after TEXT NOT NULL,
        note TEXT NOT NULL DEFAULT '',
        reference TEXT,
        run_id INTEGER,
        UNIQUE(loan_id, reference),
        FOREIGN KEY(loan_id) REFERENCES loans(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}

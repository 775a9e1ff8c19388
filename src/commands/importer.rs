// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::catalog::{set_rate, upsert_employee, upsert_policy};
use crate::models::{Employee, Policy, Profile};
use crate::utils::parse_decimal;
use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::info;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("employees", sub)) => import_employees(conn, required(sub, "path")?),
        Some(("policies", sub)) => import_policies(conn, required(sub, "path")?),
        Some(("rates", sub)) => import_rates(conn, required(sub, "path")?),
        _ => Ok(()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Open {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Parse {}", path))
}

fn check_employee(e: &Employee) -> Result<()> {
    if e.profile != Profile::Agent && !e.agent_codes.is_empty() {
        return Err(anyhow!(
            "Employee {} is a {} and cannot hold agent codes",
            e.id,
            e.profile
        ));
    }
    if e.profile != Profile::Vendor && !e.sharing.is_empty() {
        return Err(anyhow!(
            "Employee {} is a {} and cannot hold sharing agreements",
            e.id,
            e.profile
        ));
    }
    if e.daily_salary < Decimal::ZERO {
        return Err(anyhow!("Employee {} has a negative daily salary", e.id));
    }
    for s in &e.sharing {
        if s.vendor_share_pct < Decimal::ZERO || s.vendor_share_pct > Decimal::ONE_HUNDRED {
            return Err(anyhow!(
                "Employee {} shares {}% of {}; expected 0..100",
                e.id,
                s.vendor_share_pct,
                s.agent_code
            ));
        }
    }
    Ok(())
}

pub fn import_employees(conn: &mut Connection, path: &str) -> Result<()> {
    let employees: Vec<Employee> = read_json(path)?;
    let tx = conn.transaction()?;
    for e in &employees {
        check_employee(e)?;
        upsert_employee(&tx, e).with_context(|| format!("Store employee {}", e.id))?;
    }
    tx.commit()?;
    info!(count = employees.len(), path, "employees imported");
    println!("Imported {} employees from {}", employees.len(), path);
    Ok(())
}

pub fn import_policies(conn: &mut Connection, path: &str) -> Result<()> {
    let policies: Vec<Policy> = read_json(path)?;
    let tx = conn.transaction()?;
    let mut receipts = 0;
    for p in &policies {
        upsert_policy(&tx, p).with_context(|| format!("Store policy {}", p.number))?;
        receipts += p.receipts.len();
    }
    tx.commit()?;
    info!(policies = policies.len(), receipts, path, "policies imported");
    println!(
        "Imported {} policies ({} receipts) from {}",
        policies.len(),
        receipts,
        path
    );
    Ok(())
}

/// CSV with a header row: insurer, product, pct.
pub fn import_rates(conn: &mut Connection, path: &str) -> Result<()> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let tx = conn.transaction()?;
    let mut count = 0;
    for result in rdr.records() {
        let rec = result?;
        let insurer = rec.get(0).context("insurer missing")?.trim();
        let product = rec.get(1).context("product missing")?.trim();
        let pct_raw = rec.get(2).context("pct missing")?;
        let pct = parse_decimal(pct_raw)
            .with_context(|| format!("Invalid rate for {} / {}", insurer, product))?;
        if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(anyhow!(
                "Rate {} for {} / {} is outside 0..100",
                pct,
                insurer,
                product
            ));
        }
        set_rate(&tx, insurer, product, pct)?;
        count += 1;
    }
    tx.commit()?;
    info!(count, path, "rates imported");
    println!("Imported {} commission rates from {}", count, path);
    Ok(())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{id, required};
use crate::payroll::{PayrollRun, Side};
use crate::payroll::store::load_run;
use anyhow::{Result, bail};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("payroll", sub)) => export_payroll(conn, sub),
        _ => Ok(()),
    }
}

fn export_payroll(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = required(sub, "format")?.to_lowercase();
    let out = required(sub, "out")?;
    let run = load_run(conn, id(sub, "id")?)?;

    match fmt.as_str() {
        "csv" => write_csv(&run, out)?,
        "json" => {
            let items: Vec<_> = run
                .items
                .iter()
                .map(|i| {
                    json!({
                        "employee_id": i.employee_id,
                        "employee": i.employee_name,
                        "profile": i.profile,
                        "days_paid": i.days_paid,
                        "salary": i.salary,
                        "commissions": i.commissions(),
                        "deductions": i.deductions,
                        "loan_grant": i.loan_grant,
                        "loan_collection": i.loan_collection,
                        "total_to_pay": i.total_to_pay(),
                        "details": i.details,
                    })
                })
                .collect();
            let doc = json!({
                "code": run.code,
                "period": run.period,
                "kind": run.kind,
                "status": run.status,
                "totals": run.totals(),
                "items": items,
            });
            std::fs::write(out, serde_json::to_string_pretty(&doc)?)?;
        }
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    println!("Exported {} to {}", run.code, out);
    Ok(())
}

/// One row per commission detail; lines without details get a single row.
fn write_csv(run: &PayrollRun, out: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(out)?;
    wtr.write_record([
        "employee_id",
        "employee",
        "salary",
        "deductions",
        "loan_grant",
        "loan_collection",
        "total_to_pay",
        "receipt",
        "policy",
        "insurer",
        "product",
        "classification",
        "side",
        "premium_base",
        "base_pct",
        "share_pct",
        "amount",
    ])?;
    for i in &run.items {
        let line = [
            i.employee_id.to_string(),
            i.employee_name.clone(),
            i.salary.to_string(),
            i.deductions.to_string(),
            i.loan_grant.to_string(),
            i.loan_collection.to_string(),
            i.total_to_pay().to_string(),
        ];
        if i.details.is_empty() {
            let mut rec = line.to_vec();
            rec.extend(std::iter::repeat_n(String::new(), 10));
            wtr.write_record(&rec)?;
            continue;
        }
        for d in &i.details {
            let share = match d.side {
                Side::Agent => d.agent_share_pct,
                Side::Vendor => d.vendor_share_pct,
            };
            let mut rec = line.to_vec();
            rec.extend([
                d.receipt_number.clone(),
                d.policy_number.clone(),
                d.insurer.clone(),
                d.product.clone(),
                d.classification.to_string(),
                d.side.to_string(),
                d.premium_base.to_string(),
                d.base_pct.to_string(),
                share.to_string(),
                d.booked.to_string(),
            ]);
            wtr.write_record(&rec)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{date, decimal, id, required};
use crate::engine::{RunParams, Snapshot, attribution, distribution};
use crate::error::Warning;
use crate::models::DateRange;
use crate::payroll::store::{
    CloseOptions, close_run, delete_run, list_runs, load_run, mark_paid, save_run, summarize,
    update_detail, update_line,
};
use crate::payroll::{LineAmounts, PayrollDraft, PayrollRun, PendingEdits, RunKind};
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use anyhow::{Context, Result, anyhow, bail};
use rusqlite::Connection;
use std::fs;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("generate", sub)) => generate(conn, sub),
        Some(("distribute", sub)) => distribute(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        Some(("show", sub)) => show(conn, sub),
        Some(("edit", sub)) => edit(conn, sub),
        Some(("close", sub)) => {
            let opts = CloseOptions {
                acknowledge_overpayment: sub.get_flag("acknowledge-overpayment"),
            };
            let (run, warnings) = close_run(conn, id(sub, "id")?, opts)?;
            print_warnings(&warnings);
            println!("Closed {}", run);
            Ok(())
        }
        Some(("pay", sub)) => {
            let run = mark_paid(conn, id(sub, "id")?)?;
            println!("Marked {} as paid", run);
            Ok(())
        }
        Some(("delete", sub)) => {
            let run = delete_run(conn, id(sub, "id")?)?;
            println!("Deleted {}", run);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn print_warnings(warnings: &[Warning]) {
    for w in warnings {
        eprintln!("warning: {}", w);
    }
}

fn read_draft(path: &str) -> Result<PayrollDraft> {
    let raw = fs::read_to_string(path).with_context(|| format!("Open draft {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Parse draft {}", path))
}

fn write_draft(path: &str, draft: &PayrollDraft) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(draft)?)
        .with_context(|| format!("Write draft {}", path))
}

fn generate(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let period = DateRange::new(date(sub, "start")?, date(sub, "end")?);
    if period.end < period.start {
        bail!("Period end {} is before its start {}", period.end, period.start);
    }
    let kind: RunKind = required(sub, "kind")?.parse().map_err(|e: String| anyhow!(e))?;
    let out = required(sub, "out")?;

    let snapshot = Snapshot::load(conn)?;
    let phase_one = attribution::attribute(&snapshot, RunParams { period, kind });
    print_warnings(&phase_one.warnings);
    let rows = phase_one
        .items
        .iter()
        .map(|i| {
            vec![
                i.employee_id.to_string(),
                i.employee_name.clone(),
                i.days_paid.to_string(),
                fmt_money(&i.salary),
                i.details.len().to_string(),
                fmt_money(&i.commissions()),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Id", "Agent", "Days", "Salary", "Receipts", "Commissions"],
            rows
        )
    );
    write_draft(out, &PayrollDraft::PhaseOne(phase_one))?;
    println!("Wrote phase-one draft to {}", out);
    Ok(())
}

fn distribute(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let phase_one = match read_draft(required(sub, "draft")?)? {
        PayrollDraft::PhaseOne(d) => d,
        other => bail!(
            "Draft is already in {}; generate a new one to redistribute",
            other.phase_name()
        ),
    };
    let edits: PendingEdits = match sub.get_one::<String>("edits") {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("Open edits {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("Parse edits {}", path))?
        }
        None => PendingEdits::default(),
    };

    let snapshot = Snapshot::load(conn)?;
    let mut run = distribution::distribute(phase_one, &edits, &snapshot)?;
    print_warnings(&run.warnings);
    print_run(&run);

    if let Some(out) = sub.get_one::<String>("out") {
        write_draft(out, &PayrollDraft::PhaseTwo(run.clone()))?;
        println!("Wrote phase-two draft to {}", out);
    }
    if sub.get_flag("save") {
        let id = save_run(conn, &mut run)?;
        println!("Saved {} as run {}", run.code, id);
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data: Vec<_> = list_runs(conn)?.iter().map(summarize).collect();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|s| {
                vec![
                    s.id.to_string(),
                    s.code.clone(),
                    s.period.to_string(),
                    s.kind.clone(),
                    s.status.to_string(),
                    s.lines.to_string(),
                    fmt_money(&s.net),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Code", "Period", "Kind", "Status", "Lines", "Net"],
                rows
            )
        );
    }
    Ok(())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let run = load_run(conn, id(sub, "id")?)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &run)? {
        print_run(&run);
    }
    Ok(())
}

fn print_run(run: &PayrollRun) {
    println!("{}", run);
    let rows = run
        .items
        .iter()
        .map(|i| {
            vec![
                i.employee_id.to_string(),
                i.employee_name.clone(),
                i.profile.to_string(),
                fmt_money(&i.salary),
                fmt_money(&i.commissions()),
                fmt_money(&i.deductions),
                fmt_money(&i.loan_grant),
                fmt_money(&i.loan_collection),
                fmt_money(&i.outstanding_loans),
                fmt_money(&i.total_to_pay()),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Id",
                "Employee",
                "Profile",
                "Salary",
                "Commissions",
                "Deductions",
                "Loan",
                "Collect",
                "Owed",
                "Total"
            ],
            rows
        )
    );
    let t = run.totals();
    println!(
        "salary {}  commissions {}  deductions {}  loans {} / -{}  net {}",
        fmt_money(&t.salary),
        fmt_money(&t.commissions),
        fmt_money(&t.deductions),
        fmt_money(&t.loans_granted),
        fmt_money(&t.loans_collected),
        fmt_money(&t.net)
    );
}

fn edit(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let run_id = id(sub, "id")?;
    let mut touched = false;

    if let Some(employee_id) = sub.get_one::<i64>("employee").copied() {
        let amounts = LineAmounts {
            deductions: decimal(sub, "deductions")?,
            loan_grant: decimal(sub, "loan-grant")?,
            loan_collection: decimal(sub, "loan-collection")?,
        };
        let (_, warning) = update_line(conn, run_id, employee_id, amounts)?;
        if let Some(w) = warning {
            print_warnings(&[w]);
        }
        touched = true;
    }
    if let Some(receipt_id) = sub.get_one::<i64>("receipt").copied() {
        update_detail(
            conn,
            run_id,
            receipt_id,
            decimal(sub, "base-pct")?,
            decimal(sub, "vendor-pct")?,
        )?;
        touched = true;
    }
    if !touched {
        bail!("Nothing to edit: pass --employee or --receipt");
    }
    print_run(&load_run(conn, run_id)?);
    Ok(())
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{date, decimal, id, required};
use crate::loans::store::{adjust, grant, list_loans, load_loan, pay, settle};
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn amount(sub: &clap::ArgMatches) -> Result<Decimal> {
    decimal(sub, "amount")?.context("--amount is required")
}

fn reference(sub: &clap::ArgMatches) -> Option<String> {
    sub.get_one::<String>("ref").cloned()
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("grant", sub)) => {
            let loan = grant(
                conn,
                id(sub, "employee")?,
                amount(sub)?,
                date(sub, "date")?,
                required(sub, "reason")?,
                reference(sub),
            )?;
            println!("Granted {}", loan);
        }
        Some(("pay", sub)) => {
            let (loan, warning) = pay(
                conn,
                id(sub, "id")?,
                amount(sub)?,
                date(sub, "date")?,
                required(sub, "note")?,
                reference(sub),
                sub.get_flag("acknowledge-overpayment"),
            )?;
            if let Some(w) = warning {
                eprintln!("warning: {}", w);
            }
            println!("Recorded payment on {}", loan);
        }
        Some(("adjust", sub)) => {
            let loan = adjust(
                conn,
                id(sub, "id")?,
                amount(sub)?,
                date(sub, "date")?,
                required(sub, "note")?,
                reference(sub),
            )?;
            println!("Adjusted {}", loan);
        }
        Some(("settle", sub)) => {
            let loan = settle(
                conn,
                id(sub, "id")?,
                date(sub, "date")?,
                required(sub, "note")?,
                reference(sub),
            )?;
            println!("Settled {}", loan);
        }
        Some(("list", sub)) => {
            let loans = list_loans(
                conn,
                sub.get_one::<i64>("employee").copied(),
                sub.get_flag("active"),
            )?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &loans)? {
                let rows = loans
                    .iter()
                    .map(|l| {
                        vec![
                            l.id.unwrap_or_default().to_string(),
                            l.employee_id.to_string(),
                            l.granted_on.to_string(),
                            fmt_money(&l.original_amount),
                            fmt_money(&l.balance),
                            l.status.to_string(),
                            l.reason.clone(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Id", "Employee", "Granted", "Amount", "Balance", "Status", "Reason"],
                        rows
                    )
                );
            }
        }
        Some(("show", sub)) => {
            let loan = load_loan(conn, id(sub, "id")?)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &loan)? {
                println!("{}", loan);
                let rows = loan
                    .movements
                    .iter()
                    .map(|mv| {
                        vec![
                            mv.date.to_string(),
                            mv.kind.to_string(),
                            fmt_money(&mv.amount),
                            fmt_money(&mv.balance_after),
                            mv.note.clone(),
                            mv.run_id.map(|r| r.to_string()).unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Date", "Kind", "Amount", "Balance", "Note", "Run"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

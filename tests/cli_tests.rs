// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use agencypay::catalog::{load_employees, load_policies, load_rate_table, upsert_policy};
use agencypay::commands::{config, doctor, exporter, importer, payroll};
use agencypay::db::init_schema;
use agencypay::payroll::store::{list_runs, load_run};
use agencypay::payroll::{PayrollDraft, RunStatus};
use agencypay::settings::{Settings, get_setting};
use agencypay::{cli, models::Profile};
use common::*;
use rusqlite::Connection;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn empty_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}

fn run_payroll(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["agencypay", "payroll"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("payroll", m)) => payroll::handle(conn, m),
        _ => panic!("no payroll subcommand"),
    }
}

#[test]
fn config_set_validates_and_persists() {
    let conn = empty_conn();
    let matches =
        cli::build_cli().get_matches_from(["agencypay", "config", "set", "tax_divisor", "1.08"]);
    if let Some(("config", m)) = matches.subcommand() {
        config::handle(&conn, m).unwrap();
    } else {
        panic!("no config subcommand");
    }
    assert_eq!(
        get_setting(&conn, "tax_divisor").unwrap().as_deref(),
        Some("1.08")
    );
    assert_eq!(Settings::load(&conn).unwrap().tax_divisor, dec("1.08"));

    let matches = cli::build_cli().get_matches_from([
        "agencypay",
        "config",
        "set",
        "default_commission_pct",
        "140",
    ]);
    if let Some(("config", m)) = matches.subcommand() {
        assert!(config::handle(&conn, m).is_err());
    }
    assert!(Settings::validate("merge_paid_ranges", "maybe").is_err());
    assert_eq!(
        Settings::validate("merge_paid_ranges", "YES").unwrap(),
        "true"
    );
}

#[test]
fn import_employees_policies_and_rates_from_files() {
    let mut conn = empty_conn();
    let dir = tempdir().unwrap();

    let employees = dir.path().join("employees.json");
    fs::write(
        &employees,
        serde_json::to_string(&json!([
            {
                "id": 1, "first_name": "Ana", "last_name": "Lopez", "profile": "Agent",
                "scheme": "Mixed", "daily_salary": "500", "active": true,
                "agent_codes": [{"insurer": "GNP", "product": "Autos", "code": "A01"}]
            },
            {
                "id": 2, "first_name": "Victor", "last_name": "Ruiz", "profile": "Vendor",
                "scheme": "Mixed", "daily_salary": "300", "active": true,
                "sharing": [{"agent_code": "A01", "vendor_share_pct": "40"}]
            }
        ]))
        .unwrap(),
    )
    .unwrap();
    let policies = dir.path().join("policies.json");
    fs::write(
        &policies,
        serde_json::to_string(&json!([{
            "id": 10, "number": "POL-10", "insurer": "GNP", "product": "Autos",
            "receipts": [{
                "id": 100, "policy_id": 10, "number": "R-100", "status": "Paid",
                "payment_date": "2025-01-05", "net_premium": "10,000.00",
                "agent_ref": "A01 - Ana Lopez", "sub_agent_ref": "Victor Ruiz"
            }]
        }]))
        .unwrap(),
    )
    .unwrap();
    let rates = dir.path().join("rates.csv");
    fs::write(&rates, "insurer,product,pct\nGNP,Autos,12\nAXA,Vida,8\n").unwrap();

    for (what, path) in [
        ("employees", &employees),
        ("policies", &policies),
        ("rates", &rates),
    ] {
        let p = path.to_string_lossy().to_string();
        let matches = cli::build_cli().get_matches_from(["agencypay", "import", what, &p]);
        if let Some(("import", m)) = matches.subcommand() {
            importer::handle(&mut conn, m).unwrap();
        } else {
            panic!("no import subcommand");
        }
    }

    let roster = load_employees(&conn).unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].agent_codes[0].code, "A01");
    assert_eq!(roster[1].profile, Profile::Vendor);
    assert_eq!(roster[1].sharing[0].vendor_share_pct, dec("40"));
    assert_eq!(load_policies(&conn).unwrap()[0].receipts.len(), 1);
    let table = load_rate_table(&conn, dec("10")).unwrap();
    assert_eq!(table.resolve("gnp", "AUTOS"), dec("12"));
    assert_eq!(table.resolve("GNP", "Vida"), dec("10"));
}

#[test]
fn import_rejects_codes_on_non_agents() {
    let mut conn = empty_conn();
    let dir = tempdir().unwrap();
    let path = dir.path().join("employees.json");
    fs::write(
        &path,
        serde_json::to_string(&json!([{
            "id": 3, "first_name": "Alma", "last_name": "Diaz", "profile": "Admin",
            "scheme": "SalaryOnly", "daily_salary": "400", "active": true,
            "agent_codes": [{"insurer": "GNP", "product": "Autos", "code": "X1"}]
        }]))
        .unwrap(),
    )
    .unwrap();
    assert!(importer::import_employees(&mut conn, &path.to_string_lossy()).is_err());
    assert!(load_employees(&conn).unwrap().is_empty());
}

#[test]
fn generate_distribute_and_export_through_the_cli() {
    let mut conn = seeded_conn();
    let dir = tempdir().unwrap();
    let draft = dir.path().join("draft.json").to_string_lossy().to_string();
    let edits = dir.path().join("edits.json");
    fs::write(
        &edits,
        r#"{"details": [{"receipt_id": 100, "vendor_share_pct": "25"}]}"#,
    )
    .unwrap();
    let edits = edits.to_string_lossy().to_string();

    run_payroll(
        &mut conn,
        &["generate", "--start", "2025-01-01", "--end", "2025-01-15", "--out", &draft],
    )
    .unwrap();
    let parsed: PayrollDraft = serde_json::from_str(&fs::read_to_string(&draft).unwrap()).unwrap();
    assert_eq!(parsed.phase_name(), "phase_one");

    run_payroll(
        &mut conn,
        &["distribute", "--draft", &draft, "--edits", &edits, "--save"],
    )
    .unwrap();
    let runs = list_runs(&conn).unwrap();
    assert_eq!(runs.len(), 1);
    let id = runs[0].id.unwrap();
    assert_eq!(runs[0].status, RunStatus::Saved);
    assert_eq!(runs[0].item(AGENT).unwrap().commissions(), dec("750"));

    let id_arg = id.to_string();
    run_payroll(&mut conn, &["close", &id_arg]).unwrap();
    assert_eq!(load_run(&conn, id).unwrap().status, RunStatus::Closed);

    let out = dir.path().join("run.json").to_string_lossy().to_string();
    let matches = cli::build_cli().get_matches_from([
        "agencypay", "export", "payroll", &id_arg, "--format", "json", "--out", &out,
    ]);
    if let Some(("export", m)) = matches.subcommand() {
        exporter::handle(&conn, m).unwrap();
    } else {
        panic!("no export subcommand");
    }
    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["status"], "Closed");
    assert_eq!(doc["items"].as_array().unwrap().len(), 3);

    let csv_out = dir.path().join("run.csv").to_string_lossy().to_string();
    let matches = cli::build_cli().get_matches_from([
        "agencypay", "export", "payroll", &id_arg, "--out", &csv_out,
    ]);
    if let Some(("export", m)) = matches.subcommand() {
        exporter::handle(&conn, m).unwrap();
    }
    let mut rdr = csv::Reader::from_path(&csv_out).unwrap();
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    // agent and vendor rows per detail, one row for the admin
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][7], "R-100");
}

#[test]
fn distribute_refuses_a_phase_two_draft() {
    let mut conn = seeded_conn();
    let dir = tempdir().unwrap();
    let one = dir.path().join("one.json").to_string_lossy().to_string();
    let two = dir.path().join("two.json").to_string_lossy().to_string();
    run_payroll(
        &mut conn,
        &["generate", "--start", "2025-01-01", "--end", "2025-01-15", "--out", &one],
    )
    .unwrap();
    run_payroll(&mut conn, &["distribute", "--draft", &one, "--out", &two]).unwrap();
    assert!(run_payroll(&mut conn, &["distribute", "--draft", &two]).is_err());
    assert!(list_runs(&conn).unwrap().is_empty());
}

#[test]
fn doctor_reports_data_problems() {
    let conn = seeded_conn();
    assert!(doctor::diagnose(&conn).unwrap().is_empty());

    let mut orphan = policy(11, vec![receipt(200, 11, "2025-01-07", "100", "Q7 - Quentin")]);
    orphan.receipts[0].payment_date = None;
    upsert_policy(&conn, &orphan).unwrap();
    conn.execute("DELETE FROM agent_codes WHERE employee_id=?1", [AGENT])
        .unwrap();

    let kinds: Vec<&str> = doctor::diagnose(&conn)
        .unwrap()
        .iter()
        .map(|i| i.kind)
        .collect();
    assert!(kinds.contains(&"paid_without_date"));
    assert!(kinds.contains(&"unresolved_agent"));
    assert!(kinds.contains(&"agent_without_codes"));
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

use agencypay::catalog::{set_rate, upsert_employee, upsert_policy};
use agencypay::db::init_schema;
use agencypay::engine::{RateTable, RunParams, Snapshot};
use agencypay::models::{
    AgentCode, CompensationScheme, DateRange, Employee, Policy, Profile, Receipt, ReceiptStatus,
    SharingAgreement,
};
use agencypay::payroll::RunKind;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

pub const AGENT: i64 = 1;
pub const VENDOR: i64 = 2;
pub const ADMIN: i64 = 3;

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn january() -> RunParams {
    RunParams {
        period: DateRange::new(d("2025-01-01"), d("2025-01-15")),
        kind: RunKind::Full,
    }
}

pub fn employee(id: i64, first: &str, last: &str, profile: Profile, daily: &str) -> Employee {
    Employee {
        id,
        code: None,
        first_name: first.into(),
        last_name: last.into(),
        second_last_name: None,
        profile,
        scheme: CompensationScheme::Mixed,
        daily_salary: dec(daily),
        active: true,
        agent_codes: Vec::new(),
        sharing: Vec::new(),
    }
}

/// Agent Ana Lopez (code A01 for GNP/Autos), vendor Victor Ruiz sharing 40%
/// of A01, and an admin.
pub fn roster() -> Vec<Employee> {
    let mut agent = employee(AGENT, "Ana", "Lopez", Profile::Agent, "500");
    agent.agent_codes.push(AgentCode {
        insurer: "GNP".into(),
        product: "Autos".into(),
        code: "A01".into(),
        commission_pct: None,
        executive_id: None,
    });
    let mut vendor = employee(VENDOR, "Victor", "Ruiz", Profile::Vendor, "300");
    vendor.sharing.push(SharingAgreement {
        agent_code: "A01".into(),
        vendor_share_pct: dec("40"),
    });
    let mut admin = employee(ADMIN, "Alma", "Diaz", Profile::Admin, "400");
    admin.scheme = CompensationScheme::SalaryOnly;
    vec![agent, vendor, admin]
}

pub fn receipt(id: i64, policy_id: i64, date: &str, net: &str, agent_ref: &str) -> Receipt {
    Receipt {
        id,
        policy_id,
        number: format!("R-{}", id),
        status: ReceiptStatus::Paid,
        payment_date: Some(d(date)),
        net_premium: Some(net.into()),
        total_premium: None,
        agent_ref: agent_ref.into(),
        sub_agent_ref: None,
        agent_id: None,
        vendor_id: None,
    }
}

pub fn policy(id: i64, receipts: Vec<Receipt>) -> Policy {
    Policy {
        id,
        number: format!("POL-{}", id),
        insurer: "GNP".into(),
        product: "Autos".into(),
        coverage_type: "Amplia".into(),
        insured_item: "Sedan 2020".into(),
        receipts,
    }
}

pub fn rates() -> RateTable {
    let mut t = RateTable::default();
    t.add_product(1, "Autos");
    t.set_rate("GNP", 1, dec("10"));
    t
}

/// One direct receipt of $10,000 net paid on 2025-01-05.
pub fn direct_snapshot() -> Snapshot {
    Snapshot {
        employees: roster(),
        policies: vec![policy(
            10,
            vec![receipt(100, 10, "2025-01-05", "10000", "A01 - Ana Lopez")],
        )],
        rates: rates(),
        ..Snapshot::default()
    }
}

/// Same receipt sold through the vendor.
pub fn shared_snapshot() -> Snapshot {
    let mut s = direct_snapshot();
    s.policies[0].receipts[0].sub_agent_ref = Some("Victor Ruiz".into());
    s
}

/// In-memory store holding the shared scenario.
pub fn seeded_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    for e in roster() {
        upsert_employee(&conn, &e).unwrap();
    }
    let snap = shared_snapshot();
    for p in &snap.policies {
        upsert_policy(&conn, p).unwrap();
    }
    set_rate(&conn, "GNP", "Autos", dec("10")).unwrap();
    conn
}

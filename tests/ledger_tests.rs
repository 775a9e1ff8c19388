// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use agencypay::engine::{ExclusionSet, RunParams, Snapshot, attribution, distribution};
use agencypay::loans::LoanStatus;
use agencypay::loans::store::{grant, list_loans, pay};
use agencypay::models::DateRange;
use agencypay::payroll::store::{
    CloseOptions, close_run, delete_run, list_runs, load_exclusion_set, load_run, mark_paid,
    save_run, update_detail, update_line,
};
use agencypay::payroll::{LineAmounts, PayrollRun, PendingEdits, RunKind, RunStatus};
use agencypay::{PayrollError, Warning};
use common::*;
use rusqlite::Connection;

fn saved_run(conn: &mut Connection, params: RunParams) -> PayrollRun {
    let snap = Snapshot::load(conn).unwrap();
    let p1 = attribution::attribute(&snap, params);
    let mut run = distribution::distribute(p1, &PendingEdits::default(), &snap).unwrap();
    save_run(conn, &mut run).unwrap();
    run
}

fn collect(amount: &str) -> LineAmounts {
    LineAmounts {
        loan_collection: Some(dec(amount)),
        ..LineAmounts::default()
    }
}

fn ack() -> CloseOptions {
    CloseOptions {
        acknowledge_overpayment: true,
    }
}

#[test]
fn saved_run_round_trips_through_store() {
    let mut conn = seeded_conn();
    let run = saved_run(&mut conn, january());
    let id = run.id.unwrap();
    assert_eq!(run.status, RunStatus::Saved);

    let loaded = load_run(&conn, id).unwrap();
    assert_eq!(loaded.code, "NOM-20250101-20250115");
    assert_eq!(loaded.items.len(), 3);
    assert_eq!(loaded.totals(), run.totals());
    assert_eq!(loaded.item(VENDOR).unwrap().commissions(), dec("400"));
}

#[test]
fn close_commits_receipts_and_ranges_for_later_runs() {
    let mut conn = seeded_conn();
    let id = saved_run(&mut conn, january()).id.unwrap();
    let (run, warnings) = close_run(&mut conn, id, CloseOptions::default()).unwrap();
    assert_eq!(run.status, RunStatus::Closed);
    assert!(warnings.is_empty());

    let snap = Snapshot::load(&conn).unwrap();
    assert_eq!(snap.exclusions.committed_by(100), Some(id));
    let receipt = &snap.policies[0].receipts[0];
    assert_eq!(receipt.agent_id, Some(AGENT));
    assert_eq!(receipt.vendor_id, Some(VENDOR));

    let month = RunParams {
        period: DateRange::new(d("2025-01-01"), d("2025-01-31")),
        kind: RunKind::Full,
    };
    let next = attribution::attribute(&snap, month);
    assert_eq!(next.receipt_count(), 0);
    assert_eq!(next.items[0].days_paid, 16);
    assert_eq!(next.items[0].salary, dec("8000"));
}

#[test]
fn persisted_exclusions_match_a_scan_of_closed_runs() {
    let mut conn = seeded_conn();
    let id = saved_run(&mut conn, january()).id.unwrap();
    close_run(&mut conn, id, CloseOptions::default()).unwrap();

    let scanned = ExclusionSet::from_runs(&list_runs(&conn).unwrap()).normalized();
    let stored = load_exclusion_set(&conn).unwrap().normalized();
    assert_eq!(scanned, stored);
    assert_eq!(stored.receipt_count(), 1);
}

#[test]
fn lifecycle_is_forward_only() {
    let mut conn = seeded_conn();
    let id = saved_run(&mut conn, january()).id.unwrap();

    let err = mark_paid(&conn, id).unwrap_err();
    assert!(matches!(
        err,
        PayrollError::InvalidTransition {
            from: RunStatus::Saved,
            to: RunStatus::Paid
        }
    ));

    close_run(&mut conn, id, CloseOptions::default()).unwrap();
    let err = close_run(&mut conn, id, CloseOptions::default()).unwrap_err();
    assert!(matches!(err, PayrollError::InvalidTransition { .. }));

    let err = update_line(&mut conn, id, AGENT, collect("1")).unwrap_err();
    assert!(matches!(
        err,
        PayrollError::RunLocked {
            status: RunStatus::Closed,
            ..
        }
    ));

    assert_eq!(mark_paid(&conn, id).unwrap().status, RunStatus::Paid);
    assert!(mark_paid(&conn, id).is_err());
}

#[test]
fn closing_an_empty_run_is_rejected() {
    let mut conn = seeded_conn();
    let period = january().period;
    let mut run = PayrollRun {
        id: None,
        code: PayrollRun::default_code(period),
        period,
        kind: RunKind::Full,
        status: RunStatus::Generated,
        items: Vec::new(),
        warnings: Vec::new(),
    };
    let id = save_run(&mut conn, &mut run).unwrap();
    let err = close_run(&mut conn, id, CloseOptions::default()).unwrap_err();
    assert!(matches!(err, PayrollError::EmptyRun));
    assert_eq!(load_run(&conn, id).unwrap().status, RunStatus::Saved);
}

#[test]
fn second_overlapping_run_cannot_commit_the_same_receipt() {
    let mut conn = seeded_conn();
    let first = saved_run(&mut conn, january()).id.unwrap();
    let second = saved_run(&mut conn, january()).id.unwrap();

    close_run(&mut conn, first, CloseOptions::default()).unwrap();
    let err = close_run(&mut conn, second, CloseOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PayrollError::ReceiptAlreadyCommissioned {
            receipt_id: 100,
            run_id
        } if run_id == first
    ));

    assert_eq!(load_run(&conn, second).unwrap().status, RunStatus::Saved);
    let set = load_exclusion_set(&conn).unwrap();
    assert_eq!(set.paid_ranges(AGENT).len(), 1);
}

#[test]
fn overlapping_salary_runs_cannot_both_close() {
    let mut conn = seeded_conn();
    let salary_only = RunParams {
        kind: RunKind::SalaryOnly,
        ..january()
    };
    let first = saved_run(&mut conn, salary_only);
    let second = saved_run(&mut conn, salary_only);
    assert_eq!(second.item(AGENT).unwrap().days_paid, 15);
    let (first, second) = (first.id.unwrap(), second.id.unwrap());

    close_run(&mut conn, first, CloseOptions::default()).unwrap();
    let err = close_run(&mut conn, second, CloseOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PayrollError::SalaryAlreadyPaid {
            employee_id: AGENT,
            run_id
        } if run_id == first
    ));

    assert_eq!(load_run(&conn, second).unwrap().status, RunStatus::Saved);
    let set = load_exclusion_set(&conn).unwrap();
    assert_eq!(set.paid_ranges(AGENT).len(), 1);
    assert_eq!(set.paid_ranges(ADMIN).len(), 1);
}

#[test]
fn run_generated_after_a_close_pays_only_the_remaining_days() {
    let mut conn = seeded_conn();
    let first = saved_run(&mut conn, january()).id.unwrap();
    close_run(&mut conn, first, CloseOptions::default()).unwrap();

    let month = RunParams {
        period: DateRange::new(d("2025-01-01"), d("2025-01-31")),
        kind: RunKind::SalaryOnly,
    };
    let next = saved_run(&mut conn, month);
    assert_eq!(next.item(AGENT).unwrap().days_paid, 16);
    let (closed, _) = close_run(&mut conn, next.id.unwrap(), CloseOptions::default()).unwrap();
    assert_eq!(closed.status, RunStatus::Closed);
    assert_eq!(load_exclusion_set(&conn).unwrap().paid_ranges(AGENT).len(), 2);
}

#[test]
fn split_edit_on_saved_run_updates_both_lines() {
    let mut conn = seeded_conn();
    let id = saved_run(&mut conn, january()).id.unwrap();
    update_detail(&mut conn, id, 100, None, Some(dec("50"))).unwrap();

    let run = load_run(&conn, id).unwrap();
    assert_eq!(run.item(AGENT).unwrap().commissions(), dec("500"));
    assert_eq!(run.item(VENDOR).unwrap().commissions(), dec("500"));

    let err = update_detail(&mut conn, id, 999, Some(dec("5")), None).unwrap_err();
    assert!(matches!(err, PayrollError::UnknownDetail(999)));
}

#[test]
fn close_collects_loans_oldest_first() {
    let mut conn = seeded_conn();
    grant(&mut conn, AGENT, dec("1000"), d("2024-12-01"), "car", None).unwrap();
    grant(&mut conn, AGENT, dec("500"), d("2024-12-15"), "rent", None).unwrap();

    let run = saved_run(&mut conn, january());
    let id = run.id.unwrap();
    assert_eq!(run.item(AGENT).unwrap().outstanding_loans, dec("1500"));
    let (_, warning) = update_line(&mut conn, id, AGENT, collect("1200")).unwrap();
    assert!(warning.is_none());

    let (closed, _) = close_run(&mut conn, id, CloseOptions::default()).unwrap();
    assert_eq!(closed.item(AGENT).unwrap().loan_collected, dec("1200"));

    let loans = list_loans(&conn, Some(AGENT), false).unwrap();
    assert_eq!(loans[0].balance, dec("0"));
    assert_eq!(loans[0].status, LoanStatus::Settled);
    assert_eq!(loans[1].balance, dec("300"));
    assert_eq!(loans[1].movements[0].run_id, Some(id));
}

#[test]
fn unacknowledged_overpayment_aborts_close_without_side_effects() {
    let mut conn = seeded_conn();
    grant(&mut conn, AGENT, dec("1500"), d("2024-12-01"), "car", None).unwrap();
    let id = saved_run(&mut conn, january()).id.unwrap();
    let (_, warning) = update_line(&mut conn, id, AGENT, collect("2000")).unwrap();
    assert!(matches!(warning, Some(Warning::LoanOverpayment { .. })));

    let err = close_run(&mut conn, id, CloseOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PayrollError::UnacknowledgedOverpayment {
            employee_id: AGENT,
            ..
        }
    ));
    assert_eq!(load_run(&conn, id).unwrap().status, RunStatus::Saved);
    assert_eq!(load_exclusion_set(&conn).unwrap().receipt_count(), 0);
    assert_eq!(
        list_loans(&conn, Some(AGENT), false).unwrap()[0].balance,
        dec("1500")
    );

    let (run, warnings) = close_run(&mut conn, id, ack()).unwrap();
    assert_eq!(run.status, RunStatus::Closed);
    assert_eq!(
        warnings,
        vec![Warning::LoanOverpayment {
            employee_id: AGENT,
            requested: dec("2000"),
            outstanding: dec("1500"),
        }]
    );
    assert_eq!(run.item(AGENT).unwrap().loan_collected, dec("1500"));
    let loans = list_loans(&conn, Some(AGENT), false).unwrap();
    assert_eq!(loans[0].status, LoanStatus::Settled);
}

#[test]
fn close_then_delete_restores_ledger_and_eligibility() {
    let mut conn = seeded_conn();
    grant(&mut conn, AGENT, dec("1000"), d("2024-12-01"), "car", None).unwrap();
    let loans_before = list_loans(&conn, None, false).unwrap();
    let exclusions_before = load_exclusion_set(&conn).unwrap().normalized();

    let id = saved_run(&mut conn, january()).id.unwrap();
    update_line(&mut conn, id, AGENT, collect("400")).unwrap();
    update_line(
        &mut conn,
        id,
        ADMIN,
        LineAmounts {
            loan_grant: Some(dec("2000")),
            ..LineAmounts::default()
        },
    )
    .unwrap();
    close_run(&mut conn, id, CloseOptions::default()).unwrap();
    mark_paid(&conn, id).unwrap();

    let admin_loans = list_loans(&conn, Some(ADMIN), false).unwrap();
    assert_eq!(admin_loans.len(), 1);
    assert_eq!(admin_loans[0].run_id, Some(id));
    assert_eq!(
        list_loans(&conn, Some(AGENT), false).unwrap()[0].balance,
        dec("600")
    );

    let deleted = delete_run(&mut conn, id).unwrap();
    assert_eq!(deleted.status, RunStatus::Paid);
    assert!(matches!(
        load_run(&conn, id).unwrap_err(),
        PayrollError::RunNotFound(_)
    ));

    assert_eq!(list_loans(&conn, None, false).unwrap(), loans_before);
    assert_eq!(
        load_exclusion_set(&conn).unwrap().normalized(),
        exclusions_before
    );
    let snap = Snapshot::load(&conn).unwrap();
    assert_eq!(attribution::attribute(&snap, january()).receipt_count(), 1);
}

#[test]
fn delete_refuses_when_a_granted_loan_moved_afterwards() {
    let mut conn = seeded_conn();
    let id = saved_run(&mut conn, january()).id.unwrap();
    update_line(
        &mut conn,
        id,
        ADMIN,
        LineAmounts {
            loan_grant: Some(dec("2000")),
            ..LineAmounts::default()
        },
    )
    .unwrap();
    close_run(&mut conn, id, CloseOptions::default()).unwrap();

    let loan_id = list_loans(&conn, Some(ADMIN), false).unwrap()[0].id.unwrap();
    pay(&mut conn, loan_id, dec("100"), d("2025-01-20"), "cash", None, false).unwrap();

    let err = delete_run(&mut conn, id).unwrap_err();
    assert!(matches!(err, PayrollError::IrreversibleLedger { run_id, .. } if run_id == id));
    assert_eq!(load_run(&conn, id).unwrap().status, RunStatus::Closed);
    assert_eq!(load_exclusion_set(&conn).unwrap().committed_by(100), Some(id));
}

#[test]
fn deleting_a_saved_run_has_no_ledger_effects() {
    let mut conn = seeded_conn();
    grant(&mut conn, AGENT, dec("1000"), d("2024-12-01"), "car", None).unwrap();
    let id = saved_run(&mut conn, january()).id.unwrap();
    update_line(&mut conn, id, AGENT, collect("400")).unwrap();

    delete_run(&mut conn, id).unwrap();
    assert!(list_runs(&conn).unwrap().is_empty());
    assert_eq!(
        list_loans(&conn, Some(AGENT), false).unwrap()[0].balance,
        dec("1000")
    );
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use agencypay::loans::store::{adjust, grant, list_loans, load_loan, outstanding_by_employee, pay, settle};
use agencypay::loans::{Loan, LoanStatus, MovementKind, MovementSource};
use agencypay::{PayrollError, Warning};
use common::*;
use rust_decimal::Decimal;

fn manual() -> MovementSource {
    MovementSource::default()
}

#[test]
fn payments_only_lower_the_balance_until_settled() {
    let mut loan = Loan::grant(AGENT, dec("900"), d("2025-01-01"), "advance").unwrap();
    let mut last = loan.balance;
    for day in ["2025-01-10", "2025-01-20", "2025-01-30"] {
        loan.pay(dec("300"), d(day), "", manual(), false).unwrap();
        assert!(loan.balance <= last);
        last = loan.balance;
    }
    assert_eq!(loan.balance, Decimal::ZERO);
    assert_eq!(loan.status, LoanStatus::Settled);
    assert_eq!(loan.expected_balance(), loan.balance);

    let err = loan
        .pay(dec("1"), d("2025-02-01"), "", manual(), false)
        .unwrap_err();
    assert!(matches!(err, PayrollError::LoanSettled(_)));
}

#[test]
fn grant_requires_a_positive_amount() {
    assert!(matches!(
        Loan::grant(AGENT, Decimal::ZERO, d("2025-01-01"), ""),
        Err(PayrollError::InvalidAmount(_))
    ));
}

#[test]
fn overpayment_needs_acknowledgement() {
    let mut loan = Loan::grant(AGENT, dec("100"), d("2025-01-01"), "").unwrap();
    let err = loan
        .pay(dec("150"), d("2025-01-02"), "", manual(), false)
        .unwrap_err();
    assert!(matches!(err, PayrollError::UnacknowledgedOverpayment { .. }));
    assert!(loan.movements.is_empty());

    let warning = loan
        .pay(dec("150"), d("2025-01-02"), "", manual(), true)
        .unwrap();
    assert_eq!(
        warning,
        Some(Warning::LoanOverpayment {
            employee_id: AGENT,
            requested: dec("150"),
            outstanding: dec("100"),
        })
    );
    assert_eq!(loan.movements[0].amount, dec("100"));
    assert_eq!(loan.status, LoanStatus::Settled);
}

#[test]
fn adjustments_are_signed_and_floored_at_zero() {
    let mut loan = Loan::grant(AGENT, dec("100"), d("2025-01-01"), "").unwrap();
    loan.adjust(dec("50"), d("2025-01-02"), "interest", manual())
        .unwrap();
    assert_eq!(loan.balance, dec("150"));

    loan.adjust(dec("-500"), d("2025-01-03"), "correction", manual())
        .unwrap();
    assert_eq!(loan.balance, Decimal::ZERO);
    assert_eq!(loan.movements[1].amount, dec("-150"));
    assert_eq!(loan.status, LoanStatus::Settled);
    assert!(loan.adjust(Decimal::ZERO, d("2025-01-04"), "", manual()).is_err());
}

#[test]
fn settle_is_recorded_as_a_write_off_adjustment() {
    let mut loan = Loan::grant(AGENT, dec("400"), d("2025-01-01"), "").unwrap();
    loan.pay(dec("100"), d("2025-01-05"), "", manual(), false)
        .unwrap();
    loan.settle(d("2025-01-06"), "write-off", manual()).unwrap();

    let last = loan.movements.last().unwrap();
    assert_eq!(last.kind, MovementKind::Adjustment);
    assert_eq!(last.amount, dec("-300"));
    assert_eq!(loan.expected_balance(), Decimal::ZERO);
    assert!(loan.settle(d("2025-01-07"), "", manual()).is_err());
}

#[test]
fn reversing_a_run_replays_remaining_movements() {
    let mut loan = Loan::grant(AGENT, dec("1000"), d("2025-01-01"), "").unwrap();
    loan.pay(dec("200"), d("2025-01-05"), "", manual(), false)
        .unwrap();
    loan.pay(
        dec("300"),
        d("2025-01-15"),
        "",
        MovementSource::payroll(9, "run:9:collect".into()),
        false,
    )
    .unwrap();
    loan.pay(dec("100"), d("2025-01-20"), "", manual(), false)
        .unwrap();

    assert_eq!(loan.reverse_run(9), dec("300"));
    assert_eq!(loan.balance, dec("700"));
    assert_eq!(loan.movements.len(), 2);
    assert_eq!(loan.movements[1].balance_after, dec("700"));
}

#[test]
fn stored_movements_are_idempotent_by_reference() {
    let mut conn = seeded_conn();
    let loan = grant(
        &mut conn,
        AGENT,
        dec("1000"),
        d("2025-01-01"),
        "car",
        Some("grant-1".into()),
    )
    .unwrap();
    let again = grant(
        &mut conn,
        AGENT,
        dec("1000"),
        d("2025-01-01"),
        "car",
        Some("grant-1".into()),
    )
    .unwrap();
    assert_eq!(loan.id, again.id);
    assert_eq!(list_loans(&conn, Some(AGENT), false).unwrap().len(), 1);

    let id = loan.id.unwrap();
    for _ in 0..2 {
        pay(
            &mut conn,
            id,
            dec("250"),
            d("2025-01-10"),
            "cash",
            Some("pay-1".into()),
            false,
        )
        .unwrap();
    }
    let stored = load_loan(&conn, id).unwrap();
    assert_eq!(stored.balance, dec("750"));
    assert_eq!(stored.movements.len(), 1);
    assert_eq!(
        outstanding_by_employee(&conn).unwrap().get(&AGENT),
        Some(&dec("750"))
    );
}

#[test]
fn stored_adjust_and_settle_persist_balances() {
    let mut conn = seeded_conn();
    let id = grant(&mut conn, VENDOR, dec("500"), d("2025-01-01"), "", None)
        .unwrap()
        .id
        .unwrap();
    adjust(&mut conn, id, dec("-50"), d("2025-01-02"), "fee waived", None).unwrap();
    let loan = settle(&mut conn, id, d("2025-01-03"), "write-off", None).unwrap();
    assert_eq!(loan.status, LoanStatus::Settled);

    let stored = load_loan(&conn, id).unwrap();
    assert_eq!(stored.balance, Decimal::ZERO);
    assert_eq!(stored.movements.len(), 2);
    assert_eq!(stored.expected_balance(), stored.balance);
    assert!(list_loans(&conn, Some(VENDOR), true).unwrap().is_empty());

    assert!(matches!(
        load_loan(&conn, 404).unwrap_err(),
        PayrollError::LoanNotFound(404)
    ));
}

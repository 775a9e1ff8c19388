// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::matcher::{match_employee, split_reference};
use super::{RunParams, Snapshot};
use crate::error::Warning;
use crate::models::{Employee, Policy, Profile, Receipt};
use crate::payroll::{
    Classification, CommissionDetail, PayrollLineItem, PhaseOne, RunKind, Side,
};
use crate::utils::parse_money;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Phase one: books every eligible receipt's full commission on its agent.
///
/// Receipts whose agent cannot be resolved are skipped and reported in the
/// draft's warnings; they are never booked to anyone.
pub fn attribute(snapshot: &Snapshot, params: RunParams) -> PhaseOne {
    let mut warnings = Vec::new();
    let mut items: Vec<PayrollLineItem> = snapshot
        .employees
        .iter()
        .filter(|e| e.active && e.profile == Profile::Agent)
        .map(|e| line_for(snapshot, e, &params))
        .collect();

    let (mut booked, mut excluded, mut skipped) = (0usize, 0usize, 0usize);
    if params.kind != RunKind::SalaryOnly {
        for policy in &snapshot.policies {
            for receipt in &policy.receipts {
                if !receipt.is_eligible_in(params.period.start, params.period.end) {
                    continue;
                }
                if snapshot.exclusions.contains_receipt(receipt.id) {
                    excluded += 1;
                    continue;
                }
                let Some(agent) = resolve_agent(snapshot, receipt) else {
                    debug!(receipt = receipt.id, reference = %receipt.agent_ref, "agent unresolved");
                    warnings.push(Warning::UnresolvedAgent {
                        receipt_id: receipt.id,
                        reference: receipt.agent_ref.clone(),
                    });
                    skipped += 1;
                    continue;
                };
                let detail = detail_for(snapshot, policy, receipt, agent, &mut warnings);
                if let Some(item) = items.iter_mut().find(|i| i.employee_id == agent.id) {
                    item.details.push(detail);
                    booked += 1;
                }
            }
        }
    }

    info!(
        period = %params.period,
        kind = %params.kind,
        agents = items.len(),
        booked,
        excluded,
        skipped,
        "phase one attribution done"
    );
    PhaseOne {
        params,
        items,
        warnings,
    }
}

pub(crate) fn line_for(snapshot: &Snapshot, e: &Employee, params: &RunParams) -> PayrollLineItem {
    let (salary, days_paid) = snapshot.salary_for(e, params);
    PayrollLineItem {
        employee_id: e.id,
        employee_name: e.full_name(),
        profile: e.profile,
        daily_salary: e.daily_salary,
        days_paid,
        salary,
        details: Vec::new(),
        deductions: Decimal::ZERO,
        loan_grant: Decimal::ZERO,
        loan_collection: Decimal::ZERO,
        loan_collected: Decimal::ZERO,
        outstanding_loans: snapshot.outstanding(e.id),
    }
}

fn active_by_id(snapshot: &Snapshot, id: Option<i64>, profile: Profile) -> Option<&Employee> {
    id.and_then(|id| snapshot.employee(id))
        .filter(|e| e.active && e.profile == profile)
}

/// Prefers the identity stored by an earlier close over re-matching text.
fn resolve_agent<'a>(snapshot: &'a Snapshot, receipt: &Receipt) -> Option<&'a Employee> {
    active_by_id(snapshot, receipt.agent_id, Profile::Agent)
        .or_else(|| match_employee(&receipt.agent_ref, &snapshot.employees, Profile::Agent))
}

fn resolve_vendor<'a>(
    snapshot: &'a Snapshot,
    receipt: &Receipt,
    warnings: &mut Vec<Warning>,
) -> Option<&'a Employee> {
    if let Some(v) = active_by_id(snapshot, receipt.vendor_id, Profile::Vendor) {
        return Some(v);
    }
    let reference = receipt
        .sub_agent_ref
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let found = match_employee(reference, &snapshot.employees, Profile::Vendor);
    if found.is_none() {
        warnings.push(Warning::UnresolvedVendor {
            receipt_id: receipt.id,
            reference: reference.to_string(),
        });
    }
    found
}

/// Code the receipt was sold under: the one named in the reference when the
/// agent holds it, else the agent's code for the insurer/product.
fn agent_code(agent: &Employee, receipt: &Receipt, policy: &Policy) -> Option<String> {
    let (named, _) = split_reference(&receipt.agent_ref);
    named
        .and_then(|n| {
            agent
                .agent_codes
                .iter()
                .find(|c| c.code.trim().eq_ignore_ascii_case(n))
        })
        .or_else(|| agent.code_for(&policy.insurer, &policy.product))
        .map(|c| c.code.trim().to_string())
}

fn base_pct(snapshot: &Snapshot, agent: &Employee, policy: &Policy) -> Decimal {
    let custom = agent
        .agent_codes
        .iter()
        .find(|c| {
            c.insurer.trim().eq_ignore_ascii_case(policy.insurer.trim())
                && c.product.trim().eq_ignore_ascii_case(policy.product.trim())
        })
        .and_then(|c| c.commission_pct);
    custom.unwrap_or_else(|| snapshot.rates.resolve(&policy.insurer, &policy.product))
}

/// Net premium, or the tax-inclusive total divided by `tax_divisor`.
/// Unusable amounts count as zero and are reported.
pub fn premium_base(receipt: &Receipt, tax_divisor: Decimal, warnings: &mut Vec<Warning>) -> Decimal {
    let present = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let mut malformed = |field: &'static str, raw: String| {
        warnings.push(Warning::MalformedAmount {
            receipt_id: receipt.id,
            field,
            raw,
        });
        Decimal::ZERO
    };

    if let Some(raw) = present(&receipt.net_premium) {
        return parse_money(&raw)
            .and_then(within_bounds)
            .unwrap_or_else(|| malformed("net_premium", raw));
    }
    match present(&receipt.total_premium) {
        Some(raw) => {
            let net = parse_money(&raw).and_then(|total| {
                if tax_divisor.is_zero() {
                    Some(total)
                } else {
                    total.checked_div(tax_divisor)
                }
            });
            net.and_then(within_bounds)
                .unwrap_or_else(|| malformed("total_premium", raw))
        }
        None => malformed("premium", String::new()),
    }
}

/// Premiums large enough to overflow commission arithmetic or run totals
/// are unusable.
fn within_bounds(v: Decimal) -> Option<Decimal> {
    let limit = Decimal::MAX / Decimal::from(1_000_000u32);
    (v.abs() <= limit).then_some(v)
}

fn detail_for(
    snapshot: &Snapshot,
    policy: &Policy,
    receipt: &Receipt,
    agent: &Employee,
    warnings: &mut Vec<Warning>,
) -> CommissionDetail {
    let premium = premium_base(receipt, snapshot.settings.tax_divisor, warnings);
    let code = agent_code(agent, receipt, policy);

    let (classification, vendor_id, vendor_share) = match resolve_vendor(snapshot, receipt, warnings)
    {
        Some(vendor) => {
            let share = code
                .as_deref()
                .and_then(|c| vendor.sharing_for(c))
                .map(|s| s.vendor_share_pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED));
            if share.is_none() {
                warnings.push(Warning::MissingSharingAgreement {
                    receipt_id: receipt.id,
                    vendor_id: vendor.id,
                    agent_code: code.clone().unwrap_or_default(),
                });
            }
            (
                Classification::Shared,
                Some(vendor.id),
                share.unwrap_or(Decimal::ZERO),
            )
        }
        None => (Classification::Direct, None, Decimal::ZERO),
    };

    let mut detail = CommissionDetail {
        receipt_id: receipt.id,
        receipt_number: receipt.number.clone(),
        policy_id: policy.id,
        policy_number: policy.number.clone(),
        insurer: policy.insurer.clone(),
        product: policy.product.clone(),
        coverage_type: policy.coverage_type.clone(),
        insured_item: policy.insured_item.clone(),
        premium_base: premium,
        base_pct: base_pct(snapshot, agent, policy),
        classification,
        agent_id: agent.id,
        agent_code: code,
        vendor_id,
        agent_share_pct: Decimal::ONE_HUNDRED - vendor_share,
        vendor_share_pct: vendor_share,
        side: Side::Agent,
        booked: Decimal::ZERO,
    };
    detail.book_full();
    detail
}

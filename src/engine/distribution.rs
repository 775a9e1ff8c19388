// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::Snapshot;
use super::attribution::line_for;
use crate::error::{Result, Warning};
use crate::models::Profile;
use crate::payroll::{
    Classification, CommissionDetail, PayrollRun, PendingEdits, PhaseOne, RunStatus, Side,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Phase two: splits shared commissions and adds every other active employee.
///
/// Detail edits are applied before splitting and line edits after all lines
/// exist. The phase-one draft is consumed.
pub fn distribute(
    mut draft: PhaseOne,
    edits: &PendingEdits,
    snapshot: &Snapshot,
) -> Result<PayrollRun> {
    edits.apply_to_details(&mut draft)?;
    let params = draft.params;

    let mut vendor_copies: BTreeMap<i64, Vec<CommissionDetail>> = BTreeMap::new();
    for item in &mut draft.items {
        for detail in &mut item.details {
            if let (Classification::Shared, Some(vendor_id)) =
                (detail.classification, detail.vendor_id)
            {
                let mut copy = detail.clone();
                copy.side = Side::Vendor;
                copy.book_split();
                vendor_copies.entry(vendor_id).or_default().push(copy);
            }
            detail.book_split();
        }
    }

    let mut items = draft.items;
    for e in snapshot
        .employees
        .iter()
        .filter(|e| e.active && e.profile != Profile::Agent)
    {
        let mut line = line_for(snapshot, e, &params);
        if e.profile == Profile::Vendor {
            line.details = vendor_copies.remove(&e.id).unwrap_or_default();
        }
        items.push(line);
    }

    // Vendors gone since phase one: their share stays with the agent.
    let mut warnings = draft.warnings;
    for (vendor_id, copies) in vendor_copies {
        for copy in copies {
            warn!(
                receipt = copy.receipt_id,
                vendor = vendor_id,
                "vendor unavailable, share reverted"
            );
            for d in items
                .iter_mut()
                .flat_map(|i| i.details.iter_mut())
                .filter(|d| d.receipt_id == copy.receipt_id && d.side == Side::Agent)
            {
                d.classification = Classification::Direct;
                d.vendor_id = None;
                d.vendor_share_pct = Decimal::ZERO;
                d.agent_share_pct = Decimal::ONE_HUNDRED;
                d.book_split();
            }
            warnings.push(Warning::VendorUnavailable {
                receipt_id: copy.receipt_id,
                vendor_id,
            });
        }
    }

    let mut run = PayrollRun {
        id: None,
        code: PayrollRun::default_code(params.period),
        period: params.period,
        kind: params.kind,
        status: RunStatus::Generated,
        items,
        warnings,
    };
    let line_warnings = edits.apply_to_lines(&mut run)?;
    run.warnings.extend(line_warnings);

    let totals = run.totals();
    info!(
        code = %run.code,
        lines = run.items.len(),
        commissions = %totals.commissions,
        net = %totals.net,
        "phase two distribution done"
    );
    Ok(run)
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{LineAmounts, PayrollRun, PhaseOne};
use crate::error::{PayrollError, Result, Warning};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailEdit {
    pub receipt_id: i64,
    #[serde(default)]
    pub base_pct: Option<Decimal>,
    #[serde(default)]
    pub agent_share_pct: Option<Decimal>,
    /// Wins over `agent_share_pct` when both are given.
    #[serde(default)]
    pub vendor_share_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineEdit {
    pub employee_id: i64,
    #[serde(flatten)]
    pub amounts: LineAmounts,
}

/// Operator changes collected while reviewing a phase-one draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingEdits {
    #[serde(default)]
    pub details: Vec<DetailEdit>,
    #[serde(default)]
    pub lines: Vec<LineEdit>,
}

impl PendingEdits {
    pub fn is_empty(&self) -> bool {
        self.details.is_empty() && self.lines.is_empty()
    }

    pub(crate) fn apply_to_details(&self, draft: &mut PhaseOne) -> Result<()> {
        for edit in &self.details {
            let detail = draft
                .items
                .iter_mut()
                .flat_map(|i| i.details.iter_mut())
                .find(|d| d.receipt_id == edit.receipt_id)
                .ok_or(PayrollError::UnknownDetail(edit.receipt_id))?;
            if let Some(pct) = edit.base_pct {
                detail.set_base_pct(pct)?;
            }
            if let Some(pct) = edit.vendor_share_pct {
                detail.set_vendor_share(pct)?;
            } else if let Some(pct) = edit.agent_share_pct {
                detail.set_agent_share(pct)?;
            }
            detail.book_full();
        }
        Ok(())
    }

    pub(crate) fn apply_to_lines(&self, run: &mut PayrollRun) -> Result<Vec<Warning>> {
        let mut warnings = Vec::new();
        for edit in &self.lines {
            if let Some(w) = run.set_line_amounts(edit.employee_id, edit.amounts)? {
                warnings.push(w);
            }
        }
        Ok(warnings)
    }
}

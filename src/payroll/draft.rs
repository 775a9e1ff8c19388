// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{PayrollLineItem, PayrollRun};
use crate::engine::RunParams;
use crate::error::Warning;
use serde::{Deserialize, Serialize};

/// Phase-one output: agent lines carrying undivided commissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOne {
    pub params: RunParams,
    pub items: Vec<PayrollLineItem>,
    #[serde(default, skip_deserializing)]
    pub warnings: Vec<Warning>,
}

impl PhaseOne {
    pub fn receipt_count(&self) -> usize {
        self.items.iter().map(|i| i.details.len()).sum()
    }
}

/// A run being prepared. There is no edge back from `PhaseTwo`:
/// going back means discarding the draft and generating again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "draft", rename_all = "snake_case")]
pub enum PayrollDraft {
    PhaseOne(PhaseOne),
    PhaseTwo(PayrollRun),
}

impl PayrollDraft {
    pub fn phase_name(&self) -> &'static str {
        match self {
            PayrollDraft::PhaseOne(_) => "phase_one",
            PayrollDraft::PhaseTwo(_) => "phase_two",
        }
    }
}

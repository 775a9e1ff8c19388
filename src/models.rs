// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profile {
    Agent,
    Vendor,
    Executive,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompensationScheme {
    SalaryOnly,
    CommissionOnly,
    Mixed,
}

/// One insurer-issued code held by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCode {
    pub insurer: String,
    pub product: String,
    pub code: String,
    /// Overrides the insurer/product table rate when present.
    #[serde(default)]
    pub commission_pct: Option<Decimal>,
    #[serde(default)]
    pub executive_id: Option<i64>,
}

/// A vendor's agreement to sell under an agent's code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingAgreement {
    pub agent_code: String,
    pub vendor_share_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    /// Internal employee number, also accepted as the code part of a
    /// "code - name" reference.
    #[serde(default)]
    pub code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub second_last_name: Option<String>,
    pub profile: Profile,
    pub scheme: CompensationScheme,
    pub daily_salary: Decimal,
    pub active: bool,
    #[serde(default)]
    pub agent_codes: Vec<AgentCode>,
    #[serde(default)]
    pub sharing: Vec<SharingAgreement>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.first_name.trim(), self.last_name.trim()];
        if let Some(s) = self.second_last_name.as_deref() {
            parts.push(s.trim());
        }
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Code this agent uses for the given insurer/product, if any.
    pub fn code_for(&self, insurer: &str, product: &str) -> Option<&AgentCode> {
        self.agent_codes
            .iter()
            .find(|c| {
                c.insurer.eq_ignore_ascii_case(insurer.trim())
                    && c.product.eq_ignore_ascii_case(product.trim())
            })
            .or_else(|| {
                self.agent_codes
                    .iter()
                    .find(|c| c.insurer.eq_ignore_ascii_case(insurer.trim()))
            })
    }

    pub fn sharing_for(&self, agent_code: &str) -> Option<&SharingAgreement> {
        self.sharing
            .iter()
            .find(|s| s.agent_code.trim().eq_ignore_ascii_case(agent_code.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Paid,
    Pending,
    Cancelled,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub policy_id: i64,
    pub number: String,
    pub status: ReceiptStatus,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Raw amounts as captured; parsed leniently at attribution time.
    #[serde(default)]
    pub net_premium: Option<String>,
    #[serde(default)]
    pub total_premium: Option<String>,
    #[serde(default)]
    pub agent_ref: String,
    #[serde(default)]
    pub sub_agent_ref: Option<String>,
    /// Identities resolved by an earlier closed run.
    #[serde(default)]
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
}

impl Receipt {
    pub fn is_eligible_in(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.status == ReceiptStatus::Paid
            && self
                .payment_date
                .map(|d| d >= start && d <= end)
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub number: String,
    pub insurer: String,
    pub product: String,
    #[serde(default)]
    pub coverage_type: String,
    #[serde(default)]
    pub insured_item: String,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("Unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }
    };
}

text_enum!(Profile {
    Agent => "agent",
    Vendor => "vendor",
    Executive => "executive",
    Admin => "admin",
});

text_enum!(CompensationScheme {
    SalaryOnly => "salary_only",
    CommissionOnly => "commission_only",
    Mixed => "mixed",
});

text_enum!(ReceiptStatus {
    Paid => "paid",
    Pending => "pending",
    Cancelled => "cancelled",
    Overdue => "overdue",
});

pub(crate) use text_enum;

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{PayrollError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub const KEYS: [&str; 3] = ["default_commission_pct", "tax_divisor", "merge_paid_ranges"];

/// Tunables stored in the `settings` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Rate used when an insurer/product pair has no configured commission.
    pub default_commission_pct: Decimal,
    /// Divides a tax-inclusive total to estimate the net premium.
    pub tax_divisor: Decimal,
    /// Merge prior paid ranges before subtracting them from a new period.
    pub merge_paid_ranges: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_commission_pct: Decimal::TEN,
            tax_divisor: Decimal::new(116, 2),
            merge_paid_ranges: false,
        }
    }
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn decimal_setting(conn: &Connection, key: &'static str, default: Decimal) -> Result<Decimal> {
    match get_setting(conn, key)? {
        Some(v) => v.trim().parse::<Decimal>().map_err(|_| PayrollError::Corrupt {
            field: key,
            value: v,
        }),
        None => Ok(default),
    }
}

impl Settings {
    pub fn load(conn: &Connection) -> Result<Self> {
        let d = Settings::default();
        let merge = match get_setting(conn, "merge_paid_ranges")? {
            Some(v) => parse_flag(&v).ok_or(PayrollError::Corrupt {
                field: "merge_paid_ranges",
                value: v,
            })?,
            None => d.merge_paid_ranges,
        };
        Ok(Self {
            default_commission_pct: decimal_setting(
                conn,
                "default_commission_pct",
                d.default_commission_pct,
            )?,
            tax_divisor: decimal_setting(conn, "tax_divisor", d.tax_divisor)?,
            merge_paid_ranges: merge,
        })
    }

    /// Validates and normalizes a value before it is stored.
    pub fn validate(key: &str, value: &str) -> std::result::Result<String, String> {
        let value = value.trim();
        match key {
            "default_commission_pct" => {
                let d = value
                    .parse::<Decimal>()
                    .map_err(|_| format!("Invalid decimal '{}'", value))?;
                if d < Decimal::ZERO || d > Decimal::ONE_HUNDRED {
                    return Err(format!("{} must be between 0 and 100", key));
                }
                Ok(d.to_string())
            }
            "tax_divisor" => {
                let d = value
                    .parse::<Decimal>()
                    .map_err(|_| format!("Invalid decimal '{}'", value))?;
                if d <= Decimal::ZERO {
                    return Err(format!("{} must be positive", key));
                }
                Ok(d.to_string())
            }
            "merge_paid_ranges" => parse_flag(value)
                .map(|b| b.to_string())
                .ok_or_else(|| format!("Invalid flag '{}', expected true|false", value)),
            other => Err(format!("Unknown setting '{}'", other)),
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

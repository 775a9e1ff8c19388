// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod config;
pub mod doctor;
pub mod exporter;
pub mod importer;
pub mod loans;
pub mod payroll;

use crate::utils::{parse_date, parse_decimal};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub(crate) fn required<'a>(m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.as_str())
        .with_context(|| format!("--{} is required", name))
}

pub(crate) fn id(m: &clap::ArgMatches, name: &str) -> Result<i64> {
    m.get_one::<i64>(name)
        .copied()
        .with_context(|| format!("{} is required", name))
}

pub(crate) fn date(m: &clap::ArgMatches, name: &str) -> Result<NaiveDate> {
    parse_date(required(m, name)?)
}

pub(crate) fn decimal(m: &clap::ArgMatches, name: &str) -> Result<Option<Decimal>> {
    m.get_one::<String>(name)
        .map(|s| parse_decimal(s))
        .transpose()
}

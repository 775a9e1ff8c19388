// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::settings::{KEYS, Settings, get_setting, set_setting};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let settings = Settings::load(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &settings)? {
                let rows = vec![
                    vec![
                        "default_commission_pct".to_string(),
                        settings.default_commission_pct.to_string(),
                    ],
                    vec!["tax_divisor".to_string(), settings.tax_divisor.to_string()],
                    vec![
                        "merge_paid_ranges".to_string(),
                        settings.merge_paid_ranges.to_string(),
                    ],
                ];
                println!("{}", pretty_table(&["Key", "Value"], rows));
            }
        }
        Some(("get", sub)) => {
            let key = required(sub, "key")?;
            if !KEYS.contains(&key) {
                return Err(anyhow!("Unknown setting '{}'", key));
            }
            match get_setting(conn, key)? {
                Some(v) => println!("{}", v),
                None => println!("{} (default)", default_value(key)),
            }
        }
        Some(("set", sub)) => {
            let key = required(sub, "key")?;
            let value = Settings::validate(key, required(sub, "value")?).map_err(|e| anyhow!(e))?;
            set_setting(conn, key, &value)?;
            println!("Set {} = {}", key, value);
        }
        _ => {}
    }
    Ok(())
}

fn default_value(key: &str) -> String {
    let d = Settings::default();
    match key {
        "default_commission_pct" => d.default_commission_pct.to_string(),
        "tax_divisor" => d.tax_divisor.to_string(),
        _ => d.merge_paid_ranges.to_string(),
    }
}

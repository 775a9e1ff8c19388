// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use std::collections::HashMap;

pub const DEFAULT_COMMISSION_PCT: Decimal = Decimal::TEN;

/// Insurer + product -> base commission percentage.
///
/// Product names resolve to catalog ids by exact, case-insensitive match.
/// Anything unresolved falls back to `default_pct` instead of failing.
#[derive(Debug, Clone)]
pub struct RateTable {
    products: HashMap<String, i64>,
    rates: HashMap<(String, i64), Decimal>,
    default_pct: Decimal,
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new(DEFAULT_COMMISSION_PCT)
    }
}

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

impl RateTable {
    pub fn new(default_pct: Decimal) -> Self {
        Self {
            products: HashMap::new(),
            rates: HashMap::new(),
            default_pct,
        }
    }

    pub fn default_pct(&self) -> Decimal {
        self.default_pct
    }

    pub fn add_product(&mut self, id: i64, name: &str) {
        self.products.insert(key(name), id);
    }

    pub fn set_rate(&mut self, insurer: &str, product_id: i64, pct: Decimal) {
        self.rates.insert((key(insurer), product_id), pct);
    }

    pub fn product_id(&self, product: &str) -> Option<i64> {
        self.products.get(&key(product)).copied()
    }

    pub fn resolve(&self, insurer: &str, product: &str) -> Decimal {
        self.product_id(product)
            .and_then(|pid| self.rates.get(&(key(insurer), pid)).copied())
            .unwrap_or(self.default_pct)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{Employee, Profile};

/// Splits a "<code> - <name>" reference on the first separator.
/// A reference without a separator is treated as a plain name.
pub fn split_reference(reference: &str) -> (Option<&str>, &str) {
    match reference.split_once(" - ") {
        Some((code, name)) if !code.trim().is_empty() => (Some(code.trim()), name.trim()),
        Some((_, name)) => (None, name.trim()),
        None => (None, reference.trim()),
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Only policy codes count; the internal employee number never matches.
fn has_code(e: &Employee, code: &str) -> bool {
    e.agent_codes
        .iter()
        .any(|c| c.code.trim().eq_ignore_ascii_case(code))
}

/// Resolves a human-entered reference to an active employee of `profile`.
///
/// Code match wins; otherwise the first employee whose lower-cased full
/// name contains, or is contained in, the referenced name.
pub fn match_employee<'a>(
    reference: &str,
    roster: &'a [Employee],
    profile: Profile,
) -> Option<&'a Employee> {
    let candidates = || roster.iter().filter(|e| e.active && e.profile == profile);
    let (code, name) = split_reference(reference);

    if let Some(code) = code {
        if let Some(e) = candidates().find(|e| has_code(e, code)) {
            return Some(e);
        }
    }

    let wanted = normalize(name);
    if wanted.is_empty() {
        return None;
    }
    candidates().find(|e| {
        let full = normalize(&e.full_name());
        !full.is_empty() && (full.contains(&wanted) || wanted.contains(&full))
    })
}

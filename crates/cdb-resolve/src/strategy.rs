//! Resolution strategies (SPEC_FULL.md §4.4 step 7). `majority` is the only
//! implemented variant; anything else is a typed, recoverable error rather
//! than a panic, since the strategy name may come from an untrusted caller.

use std::collections::HashMap;

use cdb_models::{AnnotationValue, Error, Result};

use crate::matrix::UserEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    Majority,
}

impl ResolutionStrategy {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "majority" => Ok(Self::Majority),
            other => Err(Error::Unimplemented(other.to_string())),
        }
    }

    /// Picks the resolved value for one cell's user entries, or `None` when
    /// there are no entries to resolve from.
    pub fn resolve_cell(&self, entries: &[UserEntry]) -> Option<AnnotationValue> {
        match self {
            Self::Majority => majority(entries),
        }
    }
}

fn majority(entries: &[UserEntry]) -> Option<AnnotationValue> {
    let first = entries.first()?;
    if matches!(first.value, AnnotationValue::MultiInt(_)) {
        return Some(multi_majority(entries));
    }

    let mut counts: HashMap<(u8, String), (usize, AnnotationValue)> = HashMap::new();
    for entry in entries {
        let key = entry.value.sort_key();
        counts.entry(key).or_insert_with(|| (0, entry.value.clone())).0 += 1;
    }

    let mut counted: Vec<(usize, AnnotationValue)> = counts.into_values().collect();
    // Highest vote count first; ties broken by value ascending (spec.md §4.4 step 7).
    counted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.sort_key().cmp(&b.1.sort_key())));
    counted.into_iter().next().map(|(_, v)| v)
}

/// Symmetric per-choice majority: a choice is included in the resolved set
/// iff more than half the user entries selected it.
fn multi_majority(entries: &[UserEntry]) -> AnnotationValue {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut n = 0usize;
    for entry in entries {
        if let AnnotationValue::MultiInt(ref choices) = entry.value {
            n += 1;
            for &choice in choices {
                *counts.entry(choice).or_insert(0) += 1;
            }
        }
    }
    let mut selected: Vec<i64> = counts.into_iter().filter(|(_, c)| *c * 2 > n).map(|(choice, _)| choice).collect();
    selected.sort_unstable();
    AnnotationValue::MultiInt(selected)
}

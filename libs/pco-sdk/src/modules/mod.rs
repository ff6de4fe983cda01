//! Planning Center products, one resource per module.
//!
//! Each module declares its domain model, a marker type implementing
//! [`Schema`](pco_query::Schema) and [`Resource`](crate::Resource) with typed
//! field references, and domain filters/aggregates on its fluent context.
//! Aggregates here fetch the whole filtered set and reduce it in memory, so
//! they suit bounded result sets only.

pub mod calendar;
pub mod check_ins;
pub mod giving;
pub mod groups;
pub mod people;
pub mod publishing;
pub mod registrations;
pub mod services;
pub mod webhooks;

use std::collections::BTreeMap;

use pco_query::QueryError;

/// Occurrences of each key, ordered by key.
#[must_use]
pub(crate) fn tally<K: Ord>(keys: impl IntoIterator<Item = K>) -> BTreeMap<K, u64> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

pub(crate) fn require_id(param: &'static str, id: &str) -> Result<(), QueryError> {
    if id.trim().is_empty() {
        return Err(QueryError::invalid(param, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

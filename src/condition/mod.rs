//! ConditionBuilder - Condition sets to native predicates
//!
//! TigerStyle: Pure functions only. Nothing here touches a live backend, so
//! every predicate shape is unit-testable.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Conditions (field → value, AND)              │
//! └─────────────────────────────────────────────────────────────┘
//!      │                 │                  │                 │
//!      ▼                 ▼                  ▼                 ▼
//! ┌──────────┐    ┌─────────────┐    ┌────────────┐    ┌────────────┐
//! │   sql    │    │ expression  │    │  document  │    │ in-memory  │
//! │ WHERE ?  │    │ #n = :v     │    │ filter doc │    │  matches   │
//! │ (MySQL)  │    │ (DynamoDB)  │    │ (MongoDB)  │    │ (Sim/scan) │
//! └──────────┘    └─────────────┘    └────────────┘    └────────────┘
//! ```

pub mod expression;
pub mod sql;

#[cfg(feature = "mongodb")]
pub mod document;

use std::cmp::Ordering;

use serde_json::Value;

use crate::record::{Conditions, Record, SortSpec};

// =============================================================================
// Value Comparison
// =============================================================================

/// Rank used to order values of different JSON types.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Equality with numeric coercion (`15 == 15.0`).
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
///
/// A missing field sorts as null.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(xs), Value::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys) {
                let ord = compare_values(Some(x), Some(y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Value::Object(xs), Value::Object(ys)) => xs.len().cmp(&ys.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// =============================================================================
// In-Memory Predicates
// =============================================================================

/// Whether `record` satisfies every predicate in `conditions`.
///
/// A null expected value matches a null or missing field.
#[must_use]
pub fn matches(record: &Record, conditions: &Conditions) -> bool {
    conditions.iter().all(|(field, expected)| match record.get(field) {
        Some(actual) => values_equal(actual, expected),
        None => expected.is_null(),
    })
}

/// Text used for substring search; only scalars are searchable.
fn searchable_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether any of `fields` contains `query`, ignoring case.
#[must_use]
pub fn search_matches(record: &Record, query: &str, fields: &[&str]) -> bool {
    let needle = query.to_lowercase();
    fields.iter().any(|field| {
        record
            .get(*field)
            .and_then(searchable_text)
            .is_some_and(|text| text.contains(&needle))
    })
}

/// Stable multi-key sort; earlier keys take precedence.
pub fn sort_records(records: &mut [Record], sort: &SortSpec) {
    if sort.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for (field, direction) in sort.iter() {
            let ord = compare_values(a.get(field), b.get(field));
            let ord = match direction {
                crate::record::SortDirection::Asc => ord,
                crate::record::SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Skip `offset` records and keep at most `limit`.
#[must_use]
pub fn paginate(records: Vec<Record>, offset: u64, limit: u64) -> Vec<Record> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    records.into_iter().skip(offset).take(limit).collect()
}

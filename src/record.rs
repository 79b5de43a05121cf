//! Record - Open-schema rows, condition sets, sort specs
//!
//! TigerStyle: Explicit types at the contract boundary, no raw maps passed
//! where a condition set is meant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::constants::{ID_FIELD, LIST_LIMIT_DEFAULT, LIST_OFFSET_DEFAULT};
use crate::error::{StoreError, StoreResult};

/// An open mapping of field name to value. Field order is preserved.
pub type Record = Map<String, Value>;

/// Convert a JSON object into a [`Record`].
///
/// # Errors
/// Returns `Validation` if `value` is not an object.
pub fn to_record(value: Value) -> StoreResult<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::validation(format!(
            "record must be an object, got {other}"
        ))),
    }
}

/// Reject empty records and records with empty field names.
pub(crate) fn validate_record(record: &Record, op: &str) -> StoreResult<()> {
    if record.is_empty() {
        return Err(StoreError::validation(format!("{op}: record cannot be empty")));
    }
    if record.keys().any(String::is_empty) {
        return Err(StoreError::validation(format!(
            "{op}: field names cannot be empty"
        )));
    }
    Ok(())
}

/// Reject an empty batch and batches whose items do not share one field set.
///
/// Returns the field list of the first record, which every other record
/// carries (in any order).
pub(crate) fn validate_batch<'a>(records: &'a [Record], op: &str) -> StoreResult<Vec<&'a str>> {
    let Some(first) = records.first() else {
        return Err(StoreError::validation(format!("{op}: records cannot be empty")));
    };
    for record in records {
        validate_record(record, op)?;
    }

    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    for (index, record) in records.iter().enumerate().skip(1) {
        let same_shape =
            record.len() == columns.len() && columns.iter().all(|c| record.contains_key(*c));
        if !same_shape {
            return Err(StoreError::validation(format!(
                "{op}: record {index} has a different field set than record 0"
            )));
        }
    }
    Ok(columns)
}

// =============================================================================
// Record Id
// =============================================================================

/// Identifier returned by `create`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Auto-increment key
    Numeric(u64),
    /// String key (ObjectId hex, UUID, supplied id)
    Text(String),
}

impl RecordId {
    /// Derive an id from a supplied field value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self::Numeric),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Identifier supplied in a record's `id` field; `None` when absent.
    ///
    /// # Errors
    /// Returns `Validation` if `id` is present but is neither a non-negative
    /// integer nor a non-empty string.
    pub fn supplied(record: &Record) -> StoreResult<Option<Self>> {
        match record.get(ID_FIELD) {
            None => Ok(None),
            Some(value) => Self::from_value(value).map(Some).ok_or_else(|| {
                StoreError::validation(format!(
                    "{ID_FIELD} must be a non-negative integer or a non-empty string, got {value}"
                ))
            }),
        }
    }

    /// JSON form of this id.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Numeric(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self::Numeric(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Equality filter: every entry must match (implicit AND), in the given order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(Record);

impl Conditions {
    /// An empty condition set ("no filter").
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Whether no predicate is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Expected value for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Predicates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Underlying field map.
    #[must_use]
    pub fn as_record(&self) -> &Record {
        &self.0
    }

    /// Consume into the underlying field map.
    #[must_use]
    pub fn into_record(self) -> Record {
        self.0
    }

    /// Check field names; an empty set is allowed (list/count filters).
    ///
    /// # Errors
    /// Returns `Validation` if any field name is empty.
    pub fn validate(&self) -> StoreResult<()> {
        if self.0.keys().any(String::is_empty) {
            return Err(StoreError::validation("condition field names cannot be empty"));
        }
        Ok(())
    }

    /// Check field names and require at least one predicate.
    ///
    /// Used by operations that would otherwise touch the whole table.
    ///
    /// # Errors
    /// Returns `Validation` if the set is empty or a field name is empty.
    pub fn validate_required(&self, op: &str) -> StoreResult<()> {
        if self.0.is_empty() {
            return Err(StoreError::validation(format!(
                "{op}: conditions cannot be empty"
            )));
        }
        self.validate()
    }
}

impl From<Record> for Conditions {
    fn from(record: Record) -> Self {
        Self(record)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// Sorting and Paging
// =============================================================================

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// MongoDB sort value.
    #[must_use]
    pub fn as_signum(&self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(Self::Asc),
            "desc" | "descending" | "-1" => Ok(Self::Desc),
            other => Err(StoreError::validation(format!(
                "unknown sort direction: {other}"
            ))),
        }
    }
}

/// Ordered sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec(Vec<(String, SortDirection)>);

impl SortSpec {
    /// No ordering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending key.
    #[must_use]
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Asc)
    }

    /// Append a descending key.
    #[must_use]
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Desc)
    }

    /// Append a key with an explicit direction.
    #[must_use]
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.0.push((field.into(), direction));
        self
    }

    /// Whether no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.0.iter().map(|(field, dir)| (field.as_str(), *dir))
    }
}

/// Sort and page parameters for `get_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Sort keys
    pub sort: SortSpec,
    /// Maximum records returned
    pub limit: u64,
    /// Records skipped before the first returned one
    pub offset: u64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            sort: SortSpec::new(),
            limit: LIST_LIMIT_DEFAULT,
            offset: LIST_OFFSET_DEFAULT,
        }
    }
}

impl ListOptions {
    /// Default options (limit 10, offset 0, unsorted).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sort keys.
    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the page offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

// =============================================================================
// Numeric Helpers
// =============================================================================

/// Add `delta` to a field's current value; a missing or null field counts as 0.
///
/// Integer arithmetic is kept when both sides are integers and the sum fits.
///
/// # Errors
/// Returns `Validation` if the current value is not a number.
pub(crate) fn add_delta(field: &str, current: Option<&Value>, delta: &Number) -> StoreResult<Value> {
    let base = match current {
        None | Some(Value::Null) => return Ok(Value::Number(delta.clone())),
        Some(Value::Number(n)) => n,
        Some(other) => {
            return Err(StoreError::validation(format!(
                "field '{field}' is not numeric: {other}"
            )))
        }
    };

    if let (Some(a), Some(b)) = (base.as_i64(), delta.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Value::from(sum));
        }
    }

    let sum = base.as_f64().unwrap_or(0.0) + delta.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| StoreError::validation(format!("field '{field}' overflowed")))
}

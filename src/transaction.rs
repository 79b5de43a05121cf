//! TransactionCoordinator - Ordered actions as one atomic unit
//!
//! TigerStyle: Validate everything before anything is begun, then drive an
//! explicit state machine.
//!
//! ```text
//!            ┌──────────── any action fails ─────────────┐
//!            │                                            ▼
//! START ──▶ EXECUTING(0) ──▶ ... ──▶ EXECUTING(n-1) ──▶ COMMITTED
//!                                                   └─▶ ROLLED_BACK
//! ```
//!
//! Each backend supplies a [`TransactionScope`]: a begun native transaction
//! (SQL transaction, MongoDB session, DynamoDB write set, cloned sim table).
//! The coordinator never retries an individual action; a failed unit is
//! rolled back once and the error surfaces to the caller.

use async_trait::async_trait;
use serde_json::{Number, Value};

use crate::error::{StoreError, StoreResult};
use crate::record::{validate_record, Conditions, Record};

// =============================================================================
// Actions
// =============================================================================

/// One step of a transaction.
///
/// Increments carry a field → delta mapping; the single-field form of
/// [`StorageDriver::increment`](crate::StorageDriver::increment) is the
/// one-entry case.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    /// Insert one record
    Create {
        /// Record to insert
        data: Record,
    },
    /// Partial overwrite of matching records
    Update {
        /// Fields to overwrite
        data: Record,
        /// Which records
        condition: Conditions,
    },
    /// Remove matching records
    Delete {
        /// Which records
        condition: Conditions,
    },
    /// Add deltas to numeric fields of matching records
    Increment {
        /// Field → amount; a missing field counts as 0
        deltas: Vec<(String, Number)>,
        /// Which records
        condition: Conditions,
    },
}

impl TransactionAction {
    /// Tag used in the untyped form.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Increment { .. } => "increment",
        }
    }

    /// Single-field increment.
    #[must_use]
    pub fn increment(field: impl Into<String>, amount: impl Into<Number>, condition: Conditions) -> Self {
        Self::Increment {
            deltas: vec![(field.into(), amount.into())],
            condition,
        }
    }

    /// Check payload invariants: create needs data; update and increment need
    /// data and condition; delete needs condition.
    ///
    /// # Errors
    /// Returns `Validation` when a required part is missing or malformed.
    pub fn validate(&self) -> StoreResult<()> {
        match self {
            Self::Create { data } => validate_record(data, "transaction create"),
            Self::Update { data, condition } => {
                validate_record(data, "transaction update")?;
                condition.validate_required("transaction update")
            }
            Self::Delete { condition } => condition.validate_required("transaction delete"),
            Self::Increment { deltas, condition } => {
                if deltas.is_empty() {
                    return Err(StoreError::validation(
                        "transaction increment: deltas cannot be empty",
                    ));
                }
                if deltas.iter().any(|(field, _)| field.is_empty()) {
                    return Err(StoreError::validation(
                        "transaction increment: field names cannot be empty",
                    ));
                }
                condition.validate_required("transaction increment")
            }
        }
    }

    /// Parse the untyped form:
    /// `{"method": "create"|"update"|"delete"|"increment", "data": {..}, "condition": {..}}`.
    ///
    /// Increments take `data` as a field → delta mapping, or the legacy
    /// `"field"` + `"amount"` pair.
    ///
    /// # Errors
    /// Returns `InvalidAction` for a missing or unknown method and
    /// `Validation` for malformed payloads.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(StoreError::invalid_action(format!("action must be an object: {value}")));
        };
        let method = object
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::invalid_action("action is missing 'method'"))?;

        let data = || -> StoreResult<Record> {
            match object.get("data") {
                Some(Value::Object(map)) => Ok(map.clone()),
                Some(other) => Err(StoreError::validation(format!(
                    "{method}: 'data' must be an object, got {other}"
                ))),
                None => Err(StoreError::validation(format!("{method}: 'data' is required"))),
            }
        };
        let condition = || -> StoreResult<Conditions> {
            match object.get("condition") {
                Some(Value::Object(map)) => Ok(Conditions::from(map.clone())),
                Some(other) => Err(StoreError::validation(format!(
                    "{method}: 'condition' must be an object, got {other}"
                ))),
                None => Err(StoreError::validation(format!(
                    "{method}: 'condition' is required"
                ))),
            }
        };

        let action = match method {
            "create" => Self::Create { data: data()? },
            "update" => Self::Update {
                data: data()?,
                condition: condition()?,
            },
            "delete" => Self::Delete {
                condition: condition()?,
            },
            "increment" => Self::Increment {
                deltas: parse_deltas(object)?,
                condition: condition()?,
            },
            other => {
                return Err(StoreError::invalid_action(format!(
                    "unknown action method '{other}'"
                )))
            }
        };
        action.validate()?;
        Ok(action)
    }

    /// Parse every action, failing on the first bad one.
    ///
    /// # Errors
    /// See [`TransactionAction::from_value`].
    pub fn parse_all(values: &[Value]) -> StoreResult<Vec<Self>> {
        values.iter().map(Self::from_value).collect()
    }
}

fn parse_deltas(object: &Record) -> StoreResult<Vec<(String, Number)>> {
    if let (Some(field), Some(amount)) = (object.get("field"), object.get("amount")) {
        let field = field
            .as_str()
            .ok_or_else(|| StoreError::validation("increment: 'field' must be a string"))?;
        let Value::Number(amount) = amount else {
            return Err(StoreError::validation("increment: 'amount' must be a number"));
        };
        return Ok(vec![(field.to_string(), amount.clone())]);
    }

    match object.get("data") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(field, amount)| match amount {
                Value::Number(n) => Ok((field.clone(), n.clone())),
                other => Err(StoreError::validation(format!(
                    "increment: delta for '{field}' must be a number, got {other}"
                ))),
            })
            .collect(),
        _ => Err(StoreError::validation(
            "increment: 'data' (field → delta) or 'field' + 'amount' is required",
        )),
    }
}

/// Validate a whole action list before anything is begun.
///
/// # Errors
/// Returns `Validation` for an empty list or the first invalid action.
pub fn validate_actions(actions: &[TransactionAction]) -> StoreResult<()> {
    if actions.is_empty() {
        return Err(StoreError::validation("transaction: actions cannot be empty"));
    }
    for action in actions {
        action.validate()?;
    }
    Ok(())
}

// =============================================================================
// Scope
// =============================================================================

/// A begun native transaction owned by one backend.
#[async_trait]
pub trait TransactionScope: Send + Sized {
    /// Execute one action inside the transaction.
    async fn apply(&mut self, action: &TransactionAction) -> StoreResult<()>;

    /// Make every applied action visible at once.
    async fn commit(self) -> StoreResult<()>;

    /// Discard every applied action.
    async fn rollback(self) -> StoreResult<()>;
}

// =============================================================================
// Coordinator
// =============================================================================

/// Coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Nothing executed yet
    Start,
    /// Executing the action at this index
    Executing(usize),
    /// All actions visible
    Committed,
    /// No action visible
    RolledBack,
}

/// Drives a [`TransactionScope`] through the action list.
#[derive(Debug)]
pub struct TransactionCoordinator<'a> {
    table: &'a str,
    state: TransactionState,
}

impl<'a> TransactionCoordinator<'a> {
    /// Create a coordinator for one table.
    #[must_use]
    pub fn new(table: &'a str) -> Self {
        Self {
            table,
            state: TransactionState::Start,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Apply every action in order, then commit; roll back on the first
    /// failure and surface that failure.
    ///
    /// # Errors
    /// Returns the failing action's error (or the commit error). A rollback
    /// failure is logged and the original error is still returned.
    pub async fn run<S: TransactionScope>(
        &mut self,
        mut scope: S,
        actions: &[TransactionAction],
    ) -> StoreResult<bool> {
        assert_eq!(self.state, TransactionState::Start, "coordinator is single-use");

        for (index, action) in actions.iter().enumerate() {
            self.state = TransactionState::Executing(index);
            tracing::debug!(
                table = self.table,
                index,
                method = action.method(),
                "transaction action"
            );

            if let Err(e) = scope.apply(action).await {
                tracing::error!(
                    table = self.table,
                    index,
                    method = action.method(),
                    error = %e,
                    "transaction action failed, rolling back"
                );
                if let Err(rollback_err) = scope.rollback().await {
                    tracing::error!(table = self.table, error = %rollback_err, "rollback failed");
                }
                self.state = TransactionState::RolledBack;
                return Err(e);
            }
        }

        // A failed commit leaves nothing applied on every backend
        if let Err(e) = scope.commit().await {
            tracing::error!(table = self.table, error = %e, "transaction commit failed");
            self.state = TransactionState::RolledBack;
            return Err(e);
        }

        self.state = TransactionState::Committed;
        tracing::debug!(table = self.table, actions = actions.len(), "transaction committed");
        Ok(true)
    }
}

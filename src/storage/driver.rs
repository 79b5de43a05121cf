//! StorageDriver - The uniform contract
//!
//! TigerStyle: One trait, every operation, every backend. Backends whose
//! native idiom makes an operation awkward still implement it (a key-value
//! store emulates substring search with a filtered scan).

use async_trait::async_trait;
use serde_json::{Number, Value};

use crate::constants::SOFT_DELETE_FIELD_DEFAULT;
use crate::error::StoreResult;
use crate::record::{Conditions, ListOptions, Record, RecordId};
use crate::transaction::TransactionAction;

/// CRUD, query, and transaction operations over one table or collection.
///
/// Return conventions: `Ok(None)` / `Ok(false)` / `Ok(0)` mean nothing
/// matched; `Err` always means the operation failed.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Backend name (`"mysql"`, `"dynamodb"`, `"mongodb"`, `"sim"`).
    fn backend(&self) -> &'static str;

    /// Table or collection this driver is bound to.
    fn table(&self) -> &str;

    /// Insert one record and return its generated or supplied identifier.
    ///
    /// # Errors
    /// `Validation` if the record is empty.
    async fn create(&self, record: &Record) -> StoreResult<RecordId>;

    /// Insert many records in one request; returns how many were written.
    ///
    /// Atomicity follows the backend's own batch semantics.
    ///
    /// # Errors
    /// `Validation` if `records` is empty or items have different field sets.
    async fn bulk_insert(&self, records: &[Record]) -> StoreResult<usize>;

    /// First record matching every condition.
    ///
    /// # Errors
    /// `Validation` if `conditions` is empty.
    async fn get(&self, conditions: &Conditions) -> StoreResult<Option<Record>>;

    /// Matching records, sorted and paged. Empty conditions match everything.
    async fn get_all(&self, conditions: &Conditions, options: &ListOptions) -> StoreResult<Vec<Record>>;

    /// Overwrite `data` fields on every matching record; true iff at least one
    /// record was modified.
    ///
    /// # Errors
    /// `Validation` if `data` or `conditions` is empty.
    async fn update(&self, data: &Record, conditions: &Conditions) -> StoreResult<bool>;

    /// Atomically add `amount` to `field` on matching records, treating a
    /// missing field as zero; true iff at least one record changed.
    ///
    /// # Errors
    /// `Validation` if `field` or `conditions` is empty.
    async fn increment(&self, field: &str, amount: Number, conditions: &Conditions) -> StoreResult<bool>;

    /// Remove matching records; true iff at least one was removed.
    ///
    /// # Errors
    /// `Validation` if `conditions` is empty.
    async fn delete(&self, conditions: &Conditions) -> StoreResult<bool>;

    /// Flag matching records with `{deleted_field: true}` (default
    /// `isDeleted`) instead of removing them.
    ///
    /// # Errors
    /// `Validation` if `conditions` is empty.
    async fn soft_delete(&self, conditions: &Conditions, deleted_field: Option<&str>) -> StoreResult<bool> {
        let mut data = Record::new();
        data.insert(
            deleted_field.unwrap_or(SOFT_DELETE_FIELD_DEFAULT).to_string(),
            Value::Bool(true),
        );
        self.update(&data, conditions).await
    }

    /// Number of matching records. Empty conditions count everything.
    async fn count(&self, conditions: &Conditions) -> StoreResult<u64>;

    /// Whether any record matches.
    async fn exists(&self, conditions: &Conditions) -> StoreResult<bool> {
        Ok(self.count(conditions).await? > 0)
    }

    /// Records where any of `fields` contains `query` as a substring.
    ///
    /// # Errors
    /// `Validation` if `fields` is empty.
    async fn search(&self, query: &str, fields: &[&str]) -> StoreResult<Vec<Record>>;

    /// Run `actions` in order as one atomic unit. Any failure leaves the
    /// table unchanged and surfaces the error.
    ///
    /// # Errors
    /// `Validation` for malformed actions; otherwise the failing action's error.
    async fn transaction(&self, actions: &[TransactionAction]) -> StoreResult<bool>;

    /// Parse untyped actions (`{"method": .., "data": .., "condition": ..}`)
    /// and run them as one transaction.
    ///
    /// # Errors
    /// `InvalidAction` for an unknown method, before anything is begun.
    async fn transaction_json(&self, actions: &[Value]) -> StoreResult<bool> {
        let actions = TransactionAction::parse_all(actions)?;
        self.transaction(&actions).await
    }
}

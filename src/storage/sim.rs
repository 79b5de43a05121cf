//! SimDriver - In-memory storage for deterministic testing
//!
//! TigerStyle: Same contract as production, relational semantics (auto-increment
//! `id`, changed-row counts, retry on transient faults), plus seeded fault
//! injection so retry and rollback paths run in ordinary unit tests.
//!
//! Transactions hold the table's write lock for their whole lifetime and work
//! on a copy that is swapped in on commit.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Number, Value};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::condition::{self, values_equal};
use crate::constants::ID_FIELD;
use crate::dst::{FaultInjector, FaultPoint};
use crate::error::{StoreError, StoreResult};
use crate::record::{add_delta, validate_batch, validate_record, Conditions, ListOptions, Record, RecordId};
use crate::retry::RetryPolicy;
use crate::transaction::{validate_actions, TransactionAction, TransactionCoordinator, TransactionScope};

use super::driver::StorageDriver;

// =============================================================================
// SimTable
// =============================================================================

#[derive(Debug, Clone, Default)]
struct SimTable {
    rows: Vec<Record>,
    next_id: u64,
}

impl SimTable {
    fn insert(&mut self, record: &Record) -> StoreResult<RecordId> {
        let mut row = record.clone();

        let id = match RecordId::supplied(&row)? {
            Some(id) => {
                let id_value = id.to_value();
                let duplicate = self
                    .rows
                    .iter()
                    .any(|r| r.get(ID_FIELD).is_some_and(|v| values_equal(v, &id_value)));
                if duplicate {
                    return Err(StoreError::backend(format!("duplicate entry '{id}' for key 'id'")));
                }
                if let RecordId::Numeric(n) = id {
                    self.next_id = self.next_id.max(n);
                }
                id
            }
            None => {
                self.next_id += 1;
                row.insert(ID_FIELD.to_string(), Value::from(self.next_id));
                RecordId::Numeric(self.next_id)
            }
        };

        self.rows.push(row);
        Ok(id)
    }

    /// Returns the number of rows whose contents changed.
    fn update(&mut self, data: &Record, conditions: &Conditions) -> usize {
        let mut changed = 0;
        for row in self.rows.iter_mut().filter(|r| condition::matches(r, conditions)) {
            let differs = data
                .iter()
                .any(|(k, v)| row.get(k).map_or(true, |current| !values_equal(current, v)));
            if differs {
                for (k, v) in data {
                    row.insert(k.clone(), v.clone());
                }
                changed += 1;
            }
        }
        changed
    }

    /// All-or-nothing: every new value is computed before any row is touched.
    fn increment(&mut self, deltas: &[(String, Number)], conditions: &Conditions) -> StoreResult<usize> {
        let mut pending = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            if !condition::matches(row, conditions) {
                continue;
            }
            let mut values = Vec::with_capacity(deltas.len());
            for (field, amount) in deltas {
                values.push((field.clone(), add_delta(field, row.get(field), amount)?));
            }
            pending.push((index, values));
        }

        let mut changed = 0;
        for (index, values) in pending {
            let row = &mut self.rows[index];
            let differs = values
                .iter()
                .any(|(k, v)| row.get(k).map_or(true, |current| !values_equal(current, v)));
            for (k, v) in values {
                row.insert(k, v);
            }
            if differs {
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn delete(&mut self, conditions: &Conditions) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !condition::matches(r, conditions));
        before - self.rows.len()
    }

    fn apply(&mut self, action: &TransactionAction) -> StoreResult<()> {
        match action {
            TransactionAction::Create { data } => self.insert(data).map(|_| ()),
            TransactionAction::Update { data, condition } => {
                self.update(data, condition);
                Ok(())
            }
            TransactionAction::Delete { condition } => {
                self.delete(condition);
                Ok(())
            }
            TransactionAction::Increment { deltas, condition } => {
                self.increment(deltas, condition).map(|_| ())
            }
        }
    }
}

// =============================================================================
// SimDriver
// =============================================================================

/// In-memory driver. Clones share the same table.
#[derive(Debug, Clone)]
pub struct SimDriver {
    table: String,
    state: Arc<RwLock<SimTable>>,
    faults: Arc<FaultInjector>,
    retry: RetryPolicy,
}

impl SimDriver {
    /// Create an empty table with no faults and the default retry policy.
    ///
    /// # Panics
    /// Panics if `table` is empty.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        assert!(!table.is_empty(), "table name cannot be empty");
        Self {
            table,
            state: Arc::new(RwLock::new(SimTable::default())),
            faults: Arc::new(FaultInjector::default()),
            retry: RetryPolicy::default(),
        }
    }

    /// Inject faults from the given injector.
    #[must_use]
    pub fn with_faults(mut self, faults: FaultInjector) -> Self {
        self.faults = Arc::new(faults);
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Faults fired so far.
    #[must_use]
    pub fn faults_triggered(&self) -> u64 {
        self.faults.triggered_total()
    }
}

#[async_trait]
impl StorageDriver for SimDriver {
    fn backend(&self) -> &'static str {
        "sim"
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        validate_record(record, "create")?;

        self.retry
            .run("create", || async {
                self.faults.check(FaultPoint::Write)?;
                self.state.write().await.insert(record)
            })
            .await
    }

    async fn bulk_insert(&self, records: &[Record]) -> StoreResult<usize> {
        validate_batch(records, "bulk_insert")?;

        self.retry
            .run("bulk_insert", || async {
                self.faults.check(FaultPoint::Write)?;
                let mut state = self.state.write().await;
                let mut working = state.clone();
                for record in records {
                    working.insert(record)?;
                }
                *state = working;
                Ok(records.len())
            })
            .await
    }

    async fn get(&self, conditions: &Conditions) -> StoreResult<Option<Record>> {
        conditions.validate_required("get")?;

        self.retry
            .run("get", || async {
                self.faults.check(FaultPoint::Read)?;
                let state = self.state.read().await;
                Ok(state
                    .rows
                    .iter()
                    .find(|r| condition::matches(r, conditions))
                    .cloned())
            })
            .await
    }

    async fn get_all(&self, conditions: &Conditions, options: &ListOptions) -> StoreResult<Vec<Record>> {
        conditions.validate()?;
        self.faults.check(FaultPoint::Read)?;

        let mut rows: Vec<Record> = {
            let state = self.state.read().await;
            state
                .rows
                .iter()
                .filter(|r| condition::matches(r, conditions))
                .cloned()
                .collect()
        };
        condition::sort_records(&mut rows, &options.sort);
        Ok(condition::paginate(rows, options.offset, options.limit))
    }

    async fn update(&self, data: &Record, conditions: &Conditions) -> StoreResult<bool> {
        validate_record(data, "update")?;
        conditions.validate_required("update")?;

        self.retry
            .run("update", || async {
                self.faults.check(FaultPoint::Write)?;
                Ok(self.state.write().await.update(data, conditions) > 0)
            })
            .await
    }

    async fn increment(&self, field: &str, amount: Number, conditions: &Conditions) -> StoreResult<bool> {
        if field.is_empty() {
            return Err(StoreError::validation("increment: field cannot be empty"));
        }
        conditions.validate_required("increment")?;
        self.faults.check(FaultPoint::Write)?;

        let deltas = [(field.to_string(), amount)];
        Ok(self.state.write().await.increment(&deltas, conditions)? > 0)
    }

    async fn delete(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate_required("delete")?;
        self.faults.check(FaultPoint::Write)?;

        Ok(self.state.write().await.delete(conditions) > 0)
    }

    async fn count(&self, conditions: &Conditions) -> StoreResult<u64> {
        conditions.validate()?;
        self.faults.check(FaultPoint::Read)?;

        let state = self.state.read().await;
        let count = state
            .rows
            .iter()
            .filter(|r| condition::matches(r, conditions))
            .count();
        Ok(count as u64)
    }

    async fn search(&self, query: &str, fields: &[&str]) -> StoreResult<Vec<Record>> {
        if fields.is_empty() {
            return Err(StoreError::validation("search: fields cannot be empty"));
        }
        self.faults.check(FaultPoint::Read)?;

        let state = self.state.read().await;
        Ok(state
            .rows
            .iter()
            .filter(|r| condition::search_matches(r, query, fields))
            .cloned()
            .collect())
    }

    async fn transaction(&self, actions: &[TransactionAction]) -> StoreResult<bool> {
        validate_actions(actions)?;

        let guard = self.state.clone().write_owned().await;
        let working = (*guard).clone();
        let scope = SimScope {
            guard,
            working,
            faults: self.faults.clone(),
        };
        TransactionCoordinator::new(&self.table).run(scope, actions).await
    }
}

// =============================================================================
// Transaction Scope
// =============================================================================

struct SimScope {
    guard: OwnedRwLockWriteGuard<SimTable>,
    working: SimTable,
    faults: Arc<FaultInjector>,
}

#[async_trait]
impl TransactionScope for SimScope {
    async fn apply(&mut self, action: &TransactionAction) -> StoreResult<()> {
        self.faults.check(FaultPoint::Write)?;
        self.working.apply(action)
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.faults.check(FaultPoint::Commit)?;
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::{FaultConfig, FaultType};
    use crate::record::{to_record, SortSpec};
    use serde_json::json;

    fn rec(value: Value) -> Record {
        to_record(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let driver = SimDriver::new("t");

        let a = driver.create(&rec(json!({"name": "a"}))).await.unwrap();
        let b = driver.create(&rec(json!({"name": "b"}))).await.unwrap();
        assert_eq!(a, RecordId::Numeric(1));
        assert_eq!(b, RecordId::Numeric(2));

        let got = driver.get(&Conditions::new().eq("id", 2)).await.unwrap().unwrap();
        assert_eq!(got["name"], json!("b"));
    }

    #[tokio::test]
    async fn test_supplied_id_and_duplicate() {
        let driver = SimDriver::new("t");

        let id = driver.create(&rec(json!({"id": "k1", "v": 1}))).await.unwrap();
        assert_eq!(id, RecordId::Text("k1".to_string()));

        let result = driver.create(&rec(json!({"id": "k1", "v": 2}))).await;
        assert!(matches!(result, Err(StoreError::Backend { .. })));
    }

    #[tokio::test]
    async fn test_unusable_supplied_id_rejected() {
        let driver = SimDriver::new("t");

        for id in [json!(-1), json!(null), json!("")] {
            let result = driver.create(&rec(json!({"id": id, "v": 1}))).await;
            assert!(matches!(result, Err(StoreError::Validation(_))), "{id}");
        }
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_insert_is_all_or_nothing() {
        let driver = SimDriver::new("t");
        driver.create(&rec(json!({"id": 2, "x": 0}))).await.unwrap();

        let batch = vec![rec(json!({"id": 1, "x": 1})), rec(json!({"id": 2, "x": 2}))];
        assert!(driver.bulk_insert(&batch).await.is_err());
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 1);

        let batch = vec![rec(json!({"x": 1})), rec(json!({"x": 2}))];
        assert_eq!(driver.bulk_insert(&batch).await.unwrap(), 2);
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_reports_changed_rows_only() {
        let driver = SimDriver::new("t");
        driver.create(&rec(json!({"name": "a", "n": 1}))).await.unwrap();

        let data = rec(json!({"n": 2}));
        let cond = Conditions::new().eq("name", "a");
        assert!(driver.update(&data, &cond).await.unwrap());
        assert!(!driver.update(&data, &cond).await.unwrap());
        assert!(!driver
            .update(&data, &Conditions::new().eq("name", "zzz"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_increment_non_numeric_leaves_state() {
        let driver = SimDriver::new("t");
        driver.create(&rec(json!({"g": 1, "n": 1}))).await.unwrap();
        driver.create(&rec(json!({"g": 1, "n": "x"}))).await.unwrap();

        let result = driver.increment("n", 5.into(), &Conditions::new().eq("g", 1)).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        let first = driver.get(&Conditions::new().eq("id", 1)).await.unwrap().unwrap();
        assert_eq!(first["n"], json!(1));
    }

    #[tokio::test]
    async fn test_get_all_sort_and_page() {
        let driver = SimDriver::new("t");
        for i in 0..5 {
            driver.create(&rec(json!({ "i": i, "even": i % 2 == 0 }))).await.unwrap();
        }

        let options = ListOptions::new()
            .with_sort(SortSpec::new().desc("i"))
            .with_limit(2)
            .with_offset(1);
        let page = driver.get_all(&Conditions::new(), &options).await.unwrap();
        let values: Vec<Value> = page.iter().map(|r| r["i"].clone()).collect();
        assert_eq!(values, vec![json!(3), json!(2)]);

        let evens = driver
            .get_all(&Conditions::new().eq("even", true), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(evens.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_transient_faults() {
        let faults = FaultInjector::new(7).with_fault(FaultConfig::times(FaultType::TransientWrite, 2));
        let driver = SimDriver::new("t").with_faults(faults);

        let id = driver.create(&rec(json!({"name": "a"}))).await.unwrap();
        assert_eq!(id, RecordId::Numeric(1));
        assert_eq!(driver.faults_triggered(), 2);
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_gives_up_after_three_attempts() {
        let faults = FaultInjector::new(7).with_fault(FaultConfig::times(FaultType::TransientRead, 3));
        let driver = SimDriver::new("t").with_faults(faults);

        let result = driver.get(&Conditions::new().eq("id", 1)).await;
        assert!(matches!(result, Err(StoreError::TransientBackend { .. })));
        assert_eq!(driver.faults_triggered(), 3);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_commit_failure() {
        let faults = FaultInjector::new(7).with_fault(FaultConfig::times(FaultType::CommitFailure, 1));
        let driver = SimDriver::new("t").with_faults(faults);

        let actions = vec![TransactionAction::Create {
            data: rec(json!({"x": 1})),
        }];
        assert!(driver.transaction(&actions).await.is_err());
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 0);

        assert!(driver.transaction(&actions).await.unwrap());
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_table() {
        let a = SimDriver::new("t");
        let b = a.clone();
        a.create(&rec(json!({"x": 1}))).await.unwrap();
        assert!(b.exists(&Conditions::new().eq("x", 1)).await.unwrap());
    }
}

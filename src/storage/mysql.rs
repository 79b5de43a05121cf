//! MySqlDriver - Relational backend
//!
//! TigerStyle: Every statement is built by `condition::sql` with positional
//! parameters; this module only binds, executes, and decodes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MySqlDriver                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::MySqlPool (process-wide, lazy, max 10)          │
//! │  Retry: create, bulk_insert, get, update                     │
//! │  Transaction: pool.begin() → statements on one connection    │
//! │  Rows: decoded by column type into JSON records              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Pool lifecycle
//!
//! [`MySqlDriver::new`] shares one pool per process, created lazily on first
//! use from the first configuration seen; later configurations are ignored.
//! Use [`MySqlDriver::with_pool`] to manage pools explicitly.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use serde_json::{Number, Value};
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions,
    MySqlRow,
};
use sqlx::query::Query;
use sqlx::{Column, Row, Transaction, TypeInfo, ValueRef};

use crate::condition::sql::{self, SqlStatement};
use crate::config::MySqlConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{validate_batch, validate_record, Conditions, ListOptions, Record, RecordId};
use crate::retry::RetryPolicy;
use crate::transaction::{validate_actions, TransactionAction, TransactionCoordinator, TransactionScope};

use super::driver::StorageDriver;

/// MySQL error numbers worth retrying: lock wait timeout, deadlock,
/// server gone away, lost connection.
const MYSQL_TRANSIENT_ERROR_CODES: [u16; 4] = [1205, 1213, 2006, 2013];

static SHARED_POOL: OnceCell<MySqlPool> = OnceCell::new();

/// Process-wide pool, created on first call without connecting.
#[must_use]
pub fn shared_pool(config: &MySqlConfig) -> MySqlPool {
    SHARED_POOL
        .get_or_init(|| {
            tracing::info!(
                host = %config.host,
                port = config.port,
                database = %config.database,
                pool_size = config.pool_size,
                "creating mysql pool"
            );
            let options = MySqlConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.database);
            MySqlPoolOptions::new()
                .max_connections(config.pool_size)
                .connect_lazy_with(options)
        })
        .clone()
}

// =============================================================================
// Error Classification
// =============================================================================

/// Map a sqlx error onto the store's error channel.
#[must_use]
pub fn classify_sqlx_error(context: &str, error: sqlx::Error) -> StoreError {
    let transient = match &error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|e| MYSQL_TRANSIENT_ERROR_CODES.contains(&e.number())),
        _ => false,
    };
    if transient {
        StoreError::transient_from(context.to_string(), error)
    } else {
        StoreError::backend_from(context.to_string(), error)
    }
}

// =============================================================================
// Binding & Decoding
// =============================================================================

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

fn bind_value<'q>(query: MySqlQuery<'q>, value: &Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

fn build_query(statement: &SqlStatement) -> MySqlQuery<'_> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), bind_value)
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::from(row.try_get::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "BIT" | "YEAR" => Value::from(row.try_get::<u64, _>(index)?),
        "FLOAT" => float_value(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => float_value(row.try_get::<f64, _>(index)?),
        // Sent as text on the wire.
        "DECIMAL" => {
            let text = row.try_get_unchecked::<String, _>(index)?;
            serde_json::from_str::<Number>(&text).map_or(Value::String(text), Value::Number)
        }
        "JSON" => row.try_get::<sqlx::types::Json<Value>, _>(index)?.0,
        "DATETIME" => {
            let naive = row.try_get::<NaiveDateTime, _>(index)?;
            Value::String(Utc.from_utc_datetime(&naive).to_rfc3339())
        }
        "TIMESTAMP" => Value::String(row.try_get::<chrono::DateTime<Utc>, _>(index)?.to_rfc3339()),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::String(BASE64.encode(row.try_get::<Vec<u8>, _>(index)?))
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

/// Decode a row into a record, keeping column order.
///
/// # Errors
/// Returns `Backend` if a column cannot be decoded.
pub fn row_to_record(row: &MySqlRow) -> StoreResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())
            .map_err(|e| classify_sqlx_error(&format!("decode column '{}'", column.name()), e))?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn statement_for(table: &str, action: &TransactionAction) -> StoreResult<SqlStatement> {
    match action {
        TransactionAction::Create { data } => {
            let columns: Vec<&str> = data.keys().map(String::as_str).collect();
            sql::insert(table, &columns, &[data])
        }
        TransactionAction::Update { data, condition } => sql::update(table, data, condition),
        TransactionAction::Delete { condition } => sql::delete(table, condition),
        TransactionAction::Increment { deltas, condition } => sql::increment(table, deltas, condition),
    }
}

// =============================================================================
// MySqlDriver
// =============================================================================

/// MySQL implementation of [`StorageDriver`].
#[derive(Debug, Clone)]
pub struct MySqlDriver {
    pool: MySqlPool,
    table: String,
    retry: RetryPolicy,
}

impl MySqlDriver {
    /// Driver on the process-wide pool. No connection is made until the
    /// first operation.
    ///
    /// # Errors
    /// Returns `Validation` if `table` is not a legal identifier.
    pub fn new(config: &MySqlConfig, table: &str) -> StoreResult<Self> {
        Self::with_pool(shared_pool(config), table)
    }

    /// Driver on a caller-managed pool.
    ///
    /// # Errors
    /// Returns `Validation` if `table` is not a legal identifier.
    pub fn with_pool(pool: MySqlPool, table: &str) -> StoreResult<Self> {
        sql::quote_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Underlying pool.
    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn execute(&self, op: &str, statement: &SqlStatement) -> StoreResult<u64> {
        tracing::debug!(backend = "mysql", table = %self.table, op, sql = %statement.sql);
        let result = build_query(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(&format!("{op} on {}", self.table), e))?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, op: &str, statement: &SqlStatement) -> StoreResult<Vec<Record>> {
        tracing::debug!(backend = "mysql", table = %self.table, op, sql = %statement.sql);
        let rows = build_query(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(&format!("{op} on {}", self.table), e))?;
        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl StorageDriver for MySqlDriver {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        validate_record(record, "create")?;
        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        let statement = sql::insert(&self.table, &columns, &[record])?;

        let insert_id = self
            .retry
            .run("create", || async {
                tracing::debug!(backend = "mysql", table = %self.table, sql = %statement.sql);
                let result = build_query(&statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| classify_sqlx_error(&format!("create on {}", self.table), e))?;
                Ok(result.last_insert_id())
            })
            .await?;

        if insert_id > 0 {
            return Ok(RecordId::Numeric(insert_id));
        }
        Ok(record
            .get(crate::constants::ID_FIELD)
            .and_then(RecordId::from_value)
            .unwrap_or(RecordId::Numeric(insert_id)))
    }

    async fn bulk_insert(&self, records: &[Record]) -> StoreResult<usize> {
        let columns = validate_batch(records, "bulk_insert")?;
        let rows: Vec<&Record> = records.iter().collect();
        let statement = sql::insert(&self.table, &columns, &rows)?;

        let affected = self
            .retry
            .run("bulk_insert", || self.execute("bulk_insert", &statement))
            .await?;
        Ok(usize::try_from(affected).unwrap_or(usize::MAX))
    }

    async fn get(&self, conditions: &Conditions) -> StoreResult<Option<Record>> {
        conditions.validate_required("get")?;
        let statement = sql::select_one(&self.table, conditions)?;

        let rows = self
            .retry
            .run("get", || self.fetch_all("get", &statement))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_all(&self, conditions: &Conditions, options: &ListOptions) -> StoreResult<Vec<Record>> {
        conditions.validate()?;
        let statement = sql::select(&self.table, conditions, options)?;
        self.fetch_all("get_all", &statement).await
    }

    async fn update(&self, data: &Record, conditions: &Conditions) -> StoreResult<bool> {
        validate_record(data, "update")?;
        conditions.validate_required("update")?;
        let statement = sql::update(&self.table, data, conditions)?;

        let affected = self
            .retry
            .run("update", || self.execute("update", &statement))
            .await?;
        Ok(affected > 0)
    }

    async fn increment(&self, field: &str, amount: Number, conditions: &Conditions) -> StoreResult<bool> {
        if field.is_empty() {
            return Err(StoreError::validation("increment: field cannot be empty"));
        }
        conditions.validate_required("increment")?;
        let statement = sql::increment(&self.table, &[(field.to_string(), amount)], conditions)?;
        Ok(self.execute("increment", &statement).await? > 0)
    }

    async fn delete(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate_required("delete")?;
        let statement = sql::delete(&self.table, conditions)?;
        Ok(self.execute("delete", &statement).await? > 0)
    }

    async fn count(&self, conditions: &Conditions) -> StoreResult<u64> {
        conditions.validate()?;
        let statement = sql::count(&self.table, conditions)?;
        tracing::debug!(backend = "mysql", table = %self.table, sql = %statement.sql);

        let row = build_query(&statement)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(&format!("count on {}", self.table), e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| classify_sqlx_error("decode count", e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn exists(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate()?;
        let statement = sql::exists(&self.table, conditions)?;
        tracing::debug!(backend = "mysql", table = %self.table, sql = %statement.sql);

        let row = build_query(&statement)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(&format!("exists on {}", self.table), e))?;
        Ok(row.is_some())
    }

    async fn search(&self, query: &str, fields: &[&str]) -> StoreResult<Vec<Record>> {
        let statement = sql::search(&self.table, query, fields)?;
        self.fetch_all("search", &statement).await
    }

    async fn transaction(&self, actions: &[TransactionAction]) -> StoreResult<bool> {
        validate_actions(actions)?;

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify_sqlx_error(&format!("begin on {}", self.table), e))?;
        let scope = MySqlScope {
            tx,
            table: self.table.clone(),
        };
        TransactionCoordinator::new(&self.table).run(scope, actions).await
    }
}

// =============================================================================
// Transaction Scope
// =============================================================================

struct MySqlScope {
    tx: Transaction<'static, MySql>,
    table: String,
}

#[async_trait]
impl TransactionScope for MySqlScope {
    async fn apply(&mut self, action: &TransactionAction) -> StoreResult<()> {
        let statement = statement_for(&self.table, action)?;
        tracing::debug!(backend = "mysql", table = %self.table, method = action.method(), sql = %statement.sql);
        build_query(&statement)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| classify_sqlx_error(&format!("{} on {}", action.method(), self.table), e))?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| classify_sqlx_error("commit", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| classify_sqlx_error("rollback", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::to_record;
    use serde_json::json;

    #[test]
    fn test_classify_transient_errors() {
        let err = classify_sqlx_error("get", sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(classify_sqlx_error("get", sqlx::Error::Io(io)).is_retryable());

        let err = classify_sqlx_error("get", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[test]
    fn test_transaction_statements() {
        let data = to_record(json!({"name": "a", "balance": 1})).unwrap();
        let create = statement_for("accounts", &TransactionAction::Create { data }).unwrap();
        assert_eq!(
            create.sql,
            "INSERT INTO `accounts` (`name`, `balance`) VALUES (?, ?)"
        );

        let inc = TransactionAction::increment("balance", 5, Conditions::new().eq("id", 1));
        let statement = statement_for("accounts", &inc).unwrap();
        assert!(statement.sql.starts_with("UPDATE `accounts` SET"));
        assert_eq!(statement.params, vec![json!(5), json!(1)]);
    }

    #[tokio::test]
    async fn test_illegal_table_rejected_without_connecting() {
        let pool = MySqlPoolOptions::new().connect_lazy_with(MySqlConnectOptions::new());
        let result = MySqlDriver::with_pool(pool, "accounts; DROP TABLE x");
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    // =========================================================================
    // Live tests (require TEST_MYSQL_URL)
    // =========================================================================

    fn test_db_url() -> Option<String> {
        std::env::var("TEST_MYSQL_URL").ok()
    }

    macro_rules! require_db {
        () => {
            match test_db_url() {
                Some(url) => url,
                None => {
                    eprintln!("Skipping test: TEST_MYSQL_URL not set");
                    return;
                }
            }
        };
    }

    async fn fresh_driver(url: &str, table: &str) -> MySqlDriver {
        let pool = MySqlPool::connect(url).await.unwrap();
        sqlx::query(&format!("DROP TABLE IF EXISTS `{table}`"))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(&format!(
            "CREATE TABLE `{table}` (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                name VARCHAR(64),
                balance BIGINT,
                joined YEAR,
                isDeleted BOOLEAN DEFAULT FALSE
            )"
        ))
        .execute(&pool)
        .await
        .unwrap();
        MySqlDriver::with_pool(pool, table).unwrap()
    }

    #[tokio::test]
    async fn test_mysql_crud() {
        let url = require_db!();
        let driver = fresh_driver(&url, "omnistore_crud").await;

        let id = driver
            .create(&to_record(json!({"name": "alice", "balance": 10, "joined": 2024})).unwrap())
            .await
            .unwrap();
        let by_id = Conditions::new().eq("id", id.to_value());

        let got = driver.get(&by_id).await.unwrap().unwrap();
        assert_eq!(got["name"], json!("alice"));
        assert_eq!(got["joined"], json!(2024));
        assert_eq!(got["isDeleted"], json!(false));

        assert!(driver.increment("balance", 5.into(), &by_id).await.unwrap());
        let got = driver.get(&by_id).await.unwrap().unwrap();
        assert_eq!(got["balance"], json!(15));

        let rename = to_record(json!({"name": "alicia"})).unwrap();
        assert!(driver.update(&rename, &by_id).await.unwrap());
        assert!(!driver.update(&rename, &by_id).await.unwrap());

        assert!(driver.soft_delete(&by_id, None).await.unwrap());
        assert!(!driver.soft_delete(&by_id, None).await.unwrap());
        assert!(driver.delete(&by_id).await.unwrap());
        assert!(driver.get(&by_id).await.unwrap().is_none());
        assert!(!driver.delete(&by_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mysql_transaction_rolls_back() {
        let url = require_db!();
        let driver = fresh_driver(&url, "omnistore_tx").await;

        let actions = vec![
            TransactionAction::Create {
                data: to_record(json!({"name": "a", "balance": 1})).unwrap(),
            },
            TransactionAction::Create {
                data: to_record(json!({"no_such_column": 1})).unwrap(),
            },
        ];
        assert!(driver.transaction(&actions).await.is_err());
        assert_eq!(driver.count(&Conditions::new()).await.unwrap(), 0);
    }
}

//! DynamoDriver - Wide-column backend
//!
//! TigerStyle: Key lookups when the conditions are exactly the primary key,
//! filtered scans otherwise. Every write that follows a scan is guarded by
//! the same filter, so a record changed concurrently is skipped instead of
//! clobbered.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DynamoDriver                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Client: aws_sdk_dynamodb::Client (process-wide, lazy)       │
//! │  Key schema: DescribeTable once per driver                   │
//! │  Reads: GetItem (exact key) | Scan + FilterExpression        │
//! │  Writes: conditional Put/Update/DeleteItem, BatchWriteItem   │
//! │  Transaction: WriteSet → one TransactWriteItems              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Search uses `contains()` and is case-sensitive; sorting and paging for
//! `get_all` happen after the scan.

pub mod attribute;
pub mod write_set;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    Delete, KeyType, Put, PutRequest, ReturnValue, TransactWriteItem, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use serde_json::{Number, Value};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::condition::{self, expression, expression::Expression};
use crate::config::DynamoConfig;
use crate::constants::{
    DYNAMODB_BATCH_RESUBMIT_COUNT_MAX, DYNAMODB_BATCH_RESUBMIT_DELAY_MS,
    DYNAMODB_BATCH_WRITE_ITEMS_MAX, DYNAMODB_TRANSACT_ITEMS_MAX, ID_FIELD,
};
use crate::error::{StoreError, StoreResult};
use crate::record::{
    add_delta, validate_batch, validate_record, Conditions, ListOptions, Record, RecordId,
};
use crate::retry::RetryPolicy;
use crate::transaction::{validate_actions, TransactionAction, TransactionCoordinator, TransactionScope};

use self::attribute::{from_item, to_attribute_map, to_item, Item};
use self::write_set::{WriteOp, WriteSet};
use super::driver::StorageDriver;

/// Service error codes worth retrying.
const DYNAMODB_TRANSIENT_ERROR_CODES: [&str; 6] = [
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
    "TransactionConflictException",
];

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

static SHARED_CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Process-wide client, built from the ambient AWS configuration on first
/// call. Later configurations are ignored.
pub async fn shared_client(config: &DynamoConfig) -> Client {
    SHARED_CLIENT
        .get_or_init(|| async {
            tracing::info!(
                region = ?config.region,
                endpoint_url = ?config.endpoint_url,
                "creating dynamodb client"
            );
            let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
            if let Some(region) = &config.region {
                loader = loader.region(Region::new(region.clone()));
            }
            if let Some(endpoint_url) = &config.endpoint_url {
                loader = loader.endpoint_url(endpoint_url);
            }
            Client::new(&loader.load().await)
        })
        .await
        .clone()
}

// =============================================================================
// Error Classification
// =============================================================================

/// Map an SDK error onto the store's error channel.
pub fn classify_sdk_error<E, R>(context: &str, error: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let transient = match &error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => true,
        SdkError::ServiceError(service) => service
            .err()
            .code()
            .is_some_and(|code| DYNAMODB_TRANSIENT_ERROR_CODES.contains(&code)),
        _ => false,
    };
    let message = format!("{context}: {}", DisplayErrorContext(&error));
    if transient {
        StoreError::transient_from(message, error)
    } else {
        StoreError::backend_from(message, error)
    }
}

fn is_conditional_check_failed<E: ProvideErrorMetadata, R>(error: &SdkError<E, R>) -> bool {
    error
        .as_service_error()
        .and_then(|e| e.code())
        == Some(CONDITIONAL_CHECK_FAILED)
}

fn build_error(error: aws_sdk_dynamodb::error::BuildError) -> StoreError {
    StoreError::backend_from("build dynamodb request", error)
}

// =============================================================================
// Helpers
// =============================================================================

/// Key record when `conditions` name exactly the key attributes.
fn exact_key(conditions: &Conditions, key_attributes: &[String]) -> Option<Record> {
    if conditions.len() != key_attributes.len() {
        return None;
    }
    key_attributes
        .iter()
        .map(|attribute| match conditions.get(attribute) {
            Some(value) if !value.is_null() => Some((attribute.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

fn key_record(record: &Record, key_attributes: &[String]) -> Option<Record> {
    key_attributes
        .iter()
        .map(|attribute| record.get(attribute).map(|v| (attribute.clone(), v.clone())))
        .collect()
}

/// The record with a UUID v4 `id` added when none was supplied, and that id.
fn with_generated_id(record: &Record) -> StoreResult<(Record, RecordId)> {
    let mut item = record.clone();
    let id = match RecordId::supplied(record)? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            item.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            RecordId::Text(id)
        }
    };
    Ok((item, id))
}

fn placeholder_names(expr: &Expression) -> Option<std::collections::HashMap<String, String>> {
    (!expr.names.is_empty()).then(|| expr.names.clone().into_iter().collect())
}

fn placeholder_values(expr: &Expression) -> Option<Item> {
    (!expr.values.is_empty()).then(|| to_attribute_map(&expr.values))
}

/// `filter AND attribute_exists(keys)`: guard for writes to resolved keys.
fn write_guard(conditions: &Conditions, key_attributes: &[String]) -> StoreResult<Expression> {
    let exists = expression::key_exists(key_attributes);
    Ok(match expression::filter(conditions)? {
        Some(filter) => expression::and(exists, filter),
        None => exists,
    })
}

/// `attribute_exists(keys) AND` equality on every attribute of `expected`:
/// the item must still be exactly the copy a transaction read.
fn unchanged_guard(expected: &Record, key_attributes: &[String]) -> StoreResult<Expression> {
    write_guard(&Conditions::from(expected.clone()), key_attributes)
}

// =============================================================================
// Table Handle
// =============================================================================

/// Client plus table name; shared by the driver and its transaction scopes.
#[derive(Debug, Clone)]
struct TableHandle {
    client: Client,
    table: String,
}

impl TableHandle {
    async fn get_item(&self, key: &Record) -> StoreResult<Option<Record>> {
        tracing::debug!(backend = "dynamodb", table = %self.table, "get_item");
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(to_item(key)))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("get_item on {}", self.table), e))?;
        Ok(output.item.map(from_item))
    }

    /// Scan every page, stopping early once `limit` items are collected.
    async fn scan(&self, filter: Option<&Expression>, limit: Option<usize>) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;
        let mut pages = 0_u32;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take());
            if let Some(expr) = filter {
                request = request
                    .filter_expression(&expr.text)
                    .set_expression_attribute_names(placeholder_names(expr))
                    .set_expression_attribute_values(placeholder_values(expr));
            }

            let output = request
                .send()
                .await
                .map_err(|e| classify_sdk_error(&format!("scan on {}", self.table), e))?;
            pages += 1;
            records.extend(output.items.unwrap_or_default().into_iter().map(from_item));

            if limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        tracing::debug!(backend = "dynamodb", table = %self.table, pages, items = records.len(), "scan");
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Records currently matching `conditions`.
    async fn load(
        &self,
        conditions: &Conditions,
        key_attributes: &[String],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        match exact_key(conditions, key_attributes) {
            Some(key) => Ok(self.get_item(&key).await?.into_iter().collect()),
            None => {
                let filter = expression::filter(conditions)?;
                self.scan(filter.as_ref(), limit).await
            }
        }
    }

    /// Keys of matching records, for guarded single-item writes.
    async fn target_keys(&self, conditions: &Conditions, key_attributes: &[String]) -> StoreResult<Vec<Record>> {
        if let Some(key) = exact_key(conditions, key_attributes) {
            return Ok(vec![key]);
        }
        let filter = expression::filter(conditions)?;
        Ok(self
            .scan(filter.as_ref(), None)
            .await?
            .iter()
            .filter_map(|record| key_record(record, key_attributes))
            .collect())
    }
}

// =============================================================================
// DynamoDriver
// =============================================================================

/// DynamoDB implementation of [`StorageDriver`].
#[derive(Debug, Clone)]
pub struct DynamoDriver {
    handle: TableHandle,
    key_schema: Arc<OnceCell<Vec<String>>>,
    retry: RetryPolicy,
}

impl DynamoDriver {
    /// Driver on the process-wide client.
    ///
    /// # Errors
    /// Returns `Validation` if `table` is empty.
    pub async fn new(config: &DynamoConfig, table: &str) -> StoreResult<Self> {
        Self::with_client(shared_client(config).await, table)
    }

    /// Driver on a caller-managed client.
    ///
    /// # Errors
    /// Returns `Validation` if `table` is empty.
    pub fn with_client(client: Client, table: &str) -> StoreResult<Self> {
        if table.is_empty() {
            return Err(StoreError::validation("table name cannot be empty"));
        }
        Ok(Self {
            handle: TableHandle {
                client,
                table: table.to_string(),
            },
            key_schema: Arc::new(OnceCell::new()),
            retry: RetryPolicy::no_retry(),
        })
    }

    /// Retry create, bulk_insert, get, and update on transient errors.
    /// Off by default; transient errors otherwise surface on first failure.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Primary key attribute names, partition key first.
    ///
    /// # Errors
    /// Returns the DescribeTable failure.
    pub async fn key_attributes(&self) -> StoreResult<&[String]> {
        let keys = self
            .key_schema
            .get_or_try_init(|| async {
                let output = self
                    .handle
                    .client
                    .describe_table()
                    .table_name(&self.handle.table)
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error(&format!("describe_table {}", self.handle.table), e))?;

                let mut schema: Vec<(bool, String)> = output
                    .table
                    .and_then(|t| t.key_schema)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|k| (k.key_type != KeyType::Hash, k.attribute_name))
                    .collect();
                schema.sort_by_key(|(is_range, _)| *is_range);

                if schema.is_empty() {
                    return Err(StoreError::backend(format!(
                        "table {} reports no key schema",
                        self.handle.table
                    )));
                }
                let keys: Vec<String> = schema.into_iter().map(|(_, name)| name).collect();
                tracing::info!(backend = "dynamodb", table = %self.handle.table, ?keys, "key schema loaded");
                Ok(keys)
            })
            .await?;
        Ok(keys.as_slice())
    }

    async fn put_item(&self, item: &Record) -> StoreResult<()> {
        tracing::debug!(backend = "dynamodb", table = %self.handle.table, "put_item");
        self.handle
            .client
            .put_item()
            .table_name(&self.handle.table)
            .set_item(Some(to_item(item)))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("put_item on {}", self.handle.table), e))?;
        Ok(())
    }

    async fn write_batch(&self, items: &[Record]) -> StoreResult<usize> {
        for chunk in items.chunks(DYNAMODB_BATCH_WRITE_ITEMS_MAX) {
            let mut pending = chunk
                .iter()
                .map(|item| {
                    let put = PutRequest::builder()
                        .set_item(Some(to_item(item)))
                        .build()
                        .map_err(build_error)?;
                    Ok(WriteRequest::builder().put_request(put).build())
                })
                .collect::<StoreResult<Vec<_>>>()?;

            let mut resubmits = 0_u32;
            loop {
                let output = self
                    .handle
                    .client
                    .batch_write_item()
                    .request_items(&self.handle.table, pending)
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error(&format!("batch_write_item on {}", self.handle.table), e))?;

                let unprocessed = output
                    .unprocessed_items
                    .and_then(|mut items| items.remove(&self.handle.table))
                    .unwrap_or_default();
                if unprocessed.is_empty() {
                    break;
                }

                resubmits += 1;
                if resubmits > DYNAMODB_BATCH_RESUBMIT_COUNT_MAX {
                    return Err(StoreError::transient(format!(
                        "batch_write_item on {}: {} items still unprocessed after {} resubmits",
                        self.handle.table,
                        unprocessed.len(),
                        DYNAMODB_BATCH_RESUBMIT_COUNT_MAX
                    )));
                }
                tracing::warn!(
                    backend = "dynamodb",
                    table = %self.handle.table,
                    unprocessed = unprocessed.len(),
                    resubmits,
                    "resubmitting unprocessed batch items"
                );
                tokio::time::sleep(Duration::from_millis(
                    DYNAMODB_BATCH_RESUBMIT_DELAY_MS * u64::from(resubmits),
                ))
                .await;
                pending = unprocessed;
            }
        }
        Ok(items.len())
    }

    /// Guarded `UpdateItem` on every target; returns how many items changed.
    async fn update_targets(
        &self,
        op: &str,
        update: &Expression,
        conditions: &Conditions,
        changed_fields: Option<&Record>,
    ) -> StoreResult<usize> {
        let key_attributes = self.key_attributes().await?;
        let targets = self.handle.target_keys(conditions, key_attributes).await?;
        let guard = write_guard(conditions, key_attributes)?;

        let mut expr = update.clone();
        expr.absorb_placeholders(guard.clone());

        let mut changed = 0;
        for key in targets {
            let result = self
                .handle
                .client
                .update_item()
                .table_name(&self.handle.table)
                .set_key(Some(to_item(&key)))
                .update_expression(&update.text)
                .condition_expression(&guard.text)
                .set_expression_attribute_names(placeholder_names(&expr))
                .set_expression_attribute_values(placeholder_values(&expr))
                .return_values(ReturnValue::UpdatedOld)
                .send()
                .await;

            match result {
                Ok(output) => {
                    let old = from_item(output.attributes.unwrap_or_default());
                    let differs = changed_fields.map_or(true, |data| {
                        data.iter().any(|(k, v)| {
                            old.get(k)
                                .map_or(true, |current| !condition::values_equal(current, v))
                        })
                    });
                    if differs {
                        changed += 1;
                    }
                }
                Err(e) if is_conditional_check_failed(&e) => {
                    tracing::debug!(backend = "dynamodb", table = %self.handle.table, op, "target no longer matches");
                }
                Err(e) => {
                    return Err(classify_sdk_error(&format!("{op} on {}", self.handle.table), e));
                }
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl StorageDriver for DynamoDriver {
    fn backend(&self) -> &'static str {
        "dynamodb"
    }

    fn table(&self) -> &str {
        &self.handle.table
    }

    async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        validate_record(record, "create")?;
        let (item, id) = with_generated_id(record)?;

        self.retry.run("create", || self.put_item(&item)).await?;
        Ok(id)
    }

    async fn bulk_insert(&self, records: &[Record]) -> StoreResult<usize> {
        validate_batch(records, "bulk_insert")?;
        let items = records
            .iter()
            .map(|record| with_generated_id(record).map(|(item, _)| item))
            .collect::<StoreResult<Vec<_>>>()?;

        self.retry
            .run("bulk_insert", || self.write_batch(&items))
            .await
    }

    async fn get(&self, conditions: &Conditions) -> StoreResult<Option<Record>> {
        conditions.validate_required("get")?;

        self.retry
            .run("get", || async {
                let key_attributes = self.key_attributes().await?;
                let records = self.handle.load(conditions, key_attributes, Some(1)).await?;
                Ok(records.into_iter().next())
            })
            .await
    }

    async fn get_all(&self, conditions: &Conditions, options: &ListOptions) -> StoreResult<Vec<Record>> {
        conditions.validate()?;
        let filter = expression::filter(conditions)?;

        let mut records = self.handle.scan(filter.as_ref(), None).await?;
        condition::sort_records(&mut records, &options.sort);
        Ok(condition::paginate(records, options.offset, options.limit))
    }

    async fn update(&self, data: &Record, conditions: &Conditions) -> StoreResult<bool> {
        validate_record(data, "update")?;
        conditions.validate_required("update")?;

        let key_attributes = self.key_attributes().await?;
        if let Some(field) = key_attributes.iter().find(|k| data.contains_key(*k)) {
            return Err(StoreError::validation(format!(
                "update: key attribute '{field}' cannot be modified"
            )));
        }
        let set = expression::set(data)?;

        let changed = self
            .retry
            .run("update", || self.update_targets("update", &set, conditions, Some(data)))
            .await?;
        Ok(changed > 0)
    }

    async fn increment(&self, field: &str, amount: Number, conditions: &Conditions) -> StoreResult<bool> {
        if field.is_empty() {
            return Err(StoreError::validation("increment: field cannot be empty"));
        }
        conditions.validate_required("increment")?;

        let inc = expression::increment(&[(field.to_string(), amount)])?;
        Ok(self.update_targets("increment", &inc, conditions, None).await? > 0)
    }

    async fn delete(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate_required("delete")?;

        let key_attributes = self.key_attributes().await?;
        let targets = self.handle.target_keys(conditions, key_attributes).await?;
        let guard = write_guard(conditions, key_attributes)?;

        let mut deleted = 0;
        for key in targets {
            let result = self
                .handle
                .client
                .delete_item()
                .table_name(&self.handle.table)
                .set_key(Some(to_item(&key)))
                .condition_expression(&guard.text)
                .set_expression_attribute_names(placeholder_names(&guard))
                .set_expression_attribute_values(placeholder_values(&guard))
                .send()
                .await;

            match result {
                Ok(_) => deleted += 1,
                Err(e) if is_conditional_check_failed(&e) => {}
                Err(e) => {
                    return Err(classify_sdk_error(&format!("delete_item on {}", self.handle.table), e));
                }
            }
        }
        Ok(deleted > 0)
    }

    async fn count(&self, conditions: &Conditions) -> StoreResult<u64> {
        conditions.validate()?;
        let filter = expression::filter(conditions)?;
        Ok(self.handle.scan(filter.as_ref(), None).await?.len() as u64)
    }

    async fn exists(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate()?;
        if conditions.is_empty() {
            return Ok(!self.handle.scan(None, Some(1)).await?.is_empty());
        }
        let key_attributes = self.key_attributes().await?;
        Ok(!self.handle.load(conditions, key_attributes, Some(1)).await?.is_empty())
    }

    async fn search(&self, query: &str, fields: &[&str]) -> StoreResult<Vec<Record>> {
        let filter = expression::search(query, fields)?;
        self.handle.scan(Some(&filter), None).await
    }

    async fn transaction(&self, actions: &[TransactionAction]) -> StoreResult<bool> {
        validate_actions(actions)?;

        let key_attributes = self.key_attributes().await?.to_vec();
        let scope = DynamoScope {
            handle: self.handle.clone(),
            write_set: WriteSet::new(key_attributes.clone()),
            key_attributes,
        };
        TransactionCoordinator::new(&self.handle.table).run(scope, actions).await
    }
}

// =============================================================================
// Transaction Scope
// =============================================================================

struct DynamoScope {
    handle: TableHandle,
    key_attributes: Vec<String>,
    write_set: WriteSet,
}

impl DynamoScope {
    async fn resolve(&self, conditions: &Conditions) -> StoreResult<Vec<(Record, bool)>> {
        let loaded = self.handle.load(conditions, &self.key_attributes, None).await?;
        Ok(self.write_set.resolve(loaded, conditions))
    }

    fn transact_item(&self, op: WriteOp) -> StoreResult<TransactWriteItem> {
        let item = match op {
            WriteOp::Put { item, expected } => {
                let mut put = Put::builder()
                    .table_name(&self.handle.table)
                    .set_item(Some(to_item(&item)));
                if let Some(expected) = expected {
                    let guard = unchanged_guard(&expected, &self.key_attributes)?;
                    put = put
                        .condition_expression(&guard.text)
                        .set_expression_attribute_names(placeholder_names(&guard))
                        .set_expression_attribute_values(placeholder_values(&guard));
                }
                TransactWriteItem::builder()
                    .put(put.build().map_err(build_error)?)
                    .build()
            }
            WriteOp::Delete { key, expected } => {
                let guard = unchanged_guard(&expected, &self.key_attributes)?;
                let delete = Delete::builder()
                    .table_name(&self.handle.table)
                    .set_key(Some(to_item(&key)))
                    .condition_expression(&guard.text)
                    .set_expression_attribute_names(placeholder_names(&guard))
                    .set_expression_attribute_values(placeholder_values(&guard))
                    .build()
                    .map_err(build_error)?;
                TransactWriteItem::builder().delete(delete).build()
            }
        };
        Ok(item)
    }
}

#[async_trait]
impl TransactionScope for DynamoScope {
    async fn apply(&mut self, action: &TransactionAction) -> StoreResult<()> {
        match action {
            TransactionAction::Create { data } => {
                let (item, _) = with_generated_id(data)?;
                self.write_set.stage_put(item)
            }
            TransactionAction::Update { data, condition } => {
                for (record, existed) in self.resolve(condition).await? {
                    let mut image = record.clone();
                    for (field, value) in data {
                        image.insert(field.clone(), value.clone());
                    }
                    self.write_set.stage_image(&record, image, existed)?;
                }
                Ok(())
            }
            TransactionAction::Delete { condition } => {
                for (record, existed) in self.resolve(condition).await? {
                    self.write_set.stage_delete(&record, existed)?;
                }
                Ok(())
            }
            TransactionAction::Increment { deltas, condition } => {
                for (record, existed) in self.resolve(condition).await? {
                    let mut image = record.clone();
                    for (field, amount) in deltas {
                        let next = add_delta(field, image.get(field), amount)?;
                        image.insert(field.clone(), next);
                    }
                    self.write_set.stage_image(&record, image, existed)?;
                }
                Ok(())
            }
        }
    }

    async fn commit(self) -> StoreResult<()> {
        let ops = self.write_set.ops();
        if ops.is_empty() {
            return Ok(());
        }
        if ops.len() > DYNAMODB_TRANSACT_ITEMS_MAX {
            return Err(StoreError::validation(format!(
                "transaction touches {} items, limit is {DYNAMODB_TRANSACT_ITEMS_MAX}",
                ops.len()
            )));
        }

        let items = ops
            .into_iter()
            .map(|op| self.transact_item(op))
            .collect::<StoreResult<Vec<_>>>()?;
        tracing::debug!(backend = "dynamodb", table = %self.handle.table, items = items.len(), "transact_write_items");

        self.handle
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("transact_write_items on {}", self.handle.table), e))?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        // Nothing was sent; dropping the write set discards it.
        Ok(())
    }
}

//! MongoDriver - Document backend
//!
//! TigerStyle: Condition sets are already equality filters, so every
//! operation is one native call. Transactions run on a client session that
//! is aborted on the first failure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MongoDriver                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Client: mongodb::Client (process-wide, lazy)                │
//! │  Collection: Collection<Document> per driver                 │
//! │  Retry: opt-in (create, bulk_insert, get, update)            │
//! │  Transaction: ClientSession + *_with_session calls           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transactions require a replica set or sharded cluster.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::error::{ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR};
use mongodb::options::FindOptions;
use mongodb::{Client, ClientSession, Collection};
use serde_json::Number;
use tokio::sync::OnceCell;

use crate::condition::document;
use crate::config::MongoConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{validate_batch, validate_record, Conditions, ListOptions, Record, RecordId};
use crate::retry::RetryPolicy;
use crate::transaction::{validate_actions, TransactionAction, TransactionCoordinator, TransactionScope};

use super::driver::StorageDriver;

static SHARED_CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Process-wide client, parsed from the first configuration seen. The driver
/// connects lazily on first operation.
///
/// # Errors
/// Returns `Configuration` for an unparseable URI.
pub async fn shared_client(config: &MongoConfig) -> StoreResult<Client> {
    SHARED_CLIENT
        .get_or_try_init(|| async {
            tracing::info!(database = %config.database, "creating mongodb client");
            Client::with_uri_str(&config.uri)
                .await
                .map_err(|e| StoreError::configuration(format!("invalid MONGODB_URI: {e}")))
        })
        .await
        .cloned()
}

// =============================================================================
// Error Classification
// =============================================================================

/// Map a driver error onto the store's error channel.
#[must_use]
pub fn classify_mongo_error(context: &str, error: mongodb::error::Error) -> StoreError {
    let transient = error.contains_label(TRANSIENT_TRANSACTION_ERROR)
        || error.contains_label(RETRYABLE_WRITE_ERROR)
        || matches!(
            *error.kind,
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
        );
    if transient {
        StoreError::transient_from(context.to_string(), error)
    } else {
        StoreError::backend_from(context.to_string(), error)
    }
}

fn inserted_id(id: Bson) -> RecordId {
    let value = document::bson_to_value(id);
    RecordId::from_value(&value).unwrap_or_else(|| RecordId::Text(value.to_string()))
}

/// Find options for a listing; `None` when the page is empty. A zero
/// limit means "no limit" to the server.
fn find_options(options: &ListOptions) -> Option<FindOptions> {
    if options.limit == 0 {
        return None;
    }
    let mut find = FindOptions::default();
    if !options.sort.is_empty() {
        find.sort = Some(document::sort(&options.sort));
    }
    find.skip = Some(options.offset);
    find.limit = Some(i64::try_from(options.limit).unwrap_or(i64::MAX));
    Some(find)
}

// =============================================================================
// MongoDriver
// =============================================================================

/// MongoDB implementation of [`StorageDriver`].
#[derive(Debug, Clone)]
pub struct MongoDriver {
    client: Client,
    collection: Collection<Document>,
    table: String,
    retry: RetryPolicy,
}

impl MongoDriver {
    /// Driver on the process-wide client.
    ///
    /// # Errors
    /// Returns `Configuration` for an unparseable URI and `Validation` for an
    /// empty collection name.
    pub async fn new(config: &MongoConfig, table: &str) -> StoreResult<Self> {
        let client = shared_client(config).await?;
        Self::with_client(client, &config.database, table)
    }

    /// Driver on a caller-managed client.
    ///
    /// # Errors
    /// Returns `Validation` for an empty database or collection name.
    pub fn with_client(client: Client, database: &str, table: &str) -> StoreResult<Self> {
        if database.is_empty() || table.is_empty() {
            return Err(StoreError::validation("database and collection names cannot be empty"));
        }
        let collection = client.database(database).collection::<Document>(table);
        Ok(Self {
            client,
            collection,
            table: table.to_string(),
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

    fn context(&self, op: &str) -> String {
        format!("{op} on {}", self.table)
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Record>> {
        let cursor = self
            .collection
            .find(filter, options)
            .await
            .map_err(|e| classify_mongo_error(&self.context("find"), e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| classify_mongo_error(&self.context("find"), e))?;
        Ok(documents.into_iter().map(document::document_to_record).collect())
    }
}

#[async_trait]
impl StorageDriver for MongoDriver {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        validate_record(record, "create")?;
        let doc = document::record_to_document(record)?;

        self.retry
            .run("create", || async {
                tracing::debug!(backend = "mongodb", table = %self.table, "insert_one");
                let result = self
                    .collection
                    .insert_one(doc.clone(), None)
                    .await
                    .map_err(|e| classify_mongo_error(&self.context("create"), e))?;
                Ok(inserted_id(result.inserted_id))
            })
            .await
    }

    async fn bulk_insert(&self, records: &[Record]) -> StoreResult<usize> {
        validate_batch(records, "bulk_insert")?;
        let docs = records
            .iter()
            .map(document::record_to_document)
            .collect::<StoreResult<Vec<_>>>()?;

        self.retry
            .run("bulk_insert", || async {
                tracing::debug!(backend = "mongodb", table = %self.table, count = docs.len(), "insert_many");
                let result = self
                    .collection
                    .insert_many(docs.clone(), None)
                    .await
                    .map_err(|e| classify_mongo_error(&self.context("bulk_insert"), e))?;
                Ok(result.inserted_ids.len())
            })
            .await
    }

    async fn get(&self, conditions: &Conditions) -> StoreResult<Option<Record>> {
        conditions.validate_required("get")?;
        let filter = document::filter(conditions)?;

        self.retry
            .run("get", || async {
                let found = self
                    .collection
                    .find_one(filter.clone(), None)
                    .await
                    .map_err(|e| classify_mongo_error(&self.context("get"), e))?;
                Ok(found.map(document::document_to_record))
            })
            .await
    }

    async fn get_all(&self, conditions: &Conditions, options: &ListOptions) -> StoreResult<Vec<Record>> {
        conditions.validate()?;
        let filter = document::filter(conditions)?;

        let Some(find_options) = find_options(options) else {
            return Ok(Vec::new());
        };
        self.find(filter, find_options).await
    }

    async fn update(&self, data: &Record, conditions: &Conditions) -> StoreResult<bool> {
        validate_record(data, "update")?;
        conditions.validate_required("update")?;
        let filter = document::filter(conditions)?;
        let update = document::set(data)?;

        self.retry
            .run("update", || async {
                let result = self
                    .collection
                    .update_many(filter.clone(), update.clone(), None)
                    .await
                    .map_err(|e| classify_mongo_error(&self.context("update"), e))?;
                Ok(result.modified_count > 0)
            })
            .await
    }

    async fn increment(&self, field: &str, amount: Number, conditions: &Conditions) -> StoreResult<bool> {
        if field.is_empty() {
            return Err(StoreError::validation("increment: field cannot be empty"));
        }
        conditions.validate_required("increment")?;
        let filter = document::filter(conditions)?;
        let update = document::inc(&[(field.to_string(), amount)])?;

        let result = self
            .collection
            .update_many(filter, update, None)
            .await
            .map_err(|e| classify_mongo_error(&self.context("increment"), e))?;
        Ok(result.modified_count > 0)
    }

    async fn delete(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate_required("delete")?;
        let filter = document::filter(conditions)?;

        let result = self
            .collection
            .delete_many(filter, None)
            .await
            .map_err(|e| classify_mongo_error(&self.context("delete"), e))?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, conditions: &Conditions) -> StoreResult<u64> {
        conditions.validate()?;
        let filter = document::filter(conditions)?;

        self.collection
            .count_documents(filter, None)
            .await
            .map_err(|e| classify_mongo_error(&self.context("count"), e))
    }

    async fn exists(&self, conditions: &Conditions) -> StoreResult<bool> {
        conditions.validate()?;
        let filter = document::filter(conditions)?;

        let found = self
            .collection
            .find_one(filter, None)
            .await
            .map_err(|e| classify_mongo_error(&self.context("exists"), e))?;
        Ok(found.is_some())
    }

    async fn search(&self, query: &str, fields: &[&str]) -> StoreResult<Vec<Record>> {
        let filter = document::search(query, fields)?;
        self.find(filter, FindOptions::default()).await
    }

    async fn transaction(&self, actions: &[TransactionAction]) -> StoreResult<bool> {
        validate_actions(actions)?;

        let mut session = self
            .client
            .start_session(None)
            .await
            .map_err(|e| classify_mongo_error(&self.context("start_session"), e))?;
        session
            .start_transaction(None)
            .await
            .map_err(|e| classify_mongo_error(&self.context("start_transaction"), e))?;

        let scope = MongoScope {
            session,
            collection: self.collection.clone(),
            table: self.table.clone(),
        };
        TransactionCoordinator::new(&self.table).run(scope, actions).await
    }
}

// =============================================================================
// Transaction Scope
// =============================================================================

struct MongoScope {
    session: ClientSession,
    collection: Collection<Document>,
    table: String,
}

#[async_trait]
impl TransactionScope for MongoScope {
    async fn apply(&mut self, action: &TransactionAction) -> StoreResult<()> {
        let context = format!("{} on {}", action.method(), self.table);
        let result = match action {
            TransactionAction::Create { data } => self
                .collection
                .insert_one_with_session(document::record_to_document(data)?, None, &mut self.session)
                .await
                .map(|_| ()),
            TransactionAction::Update { data, condition } => self
                .collection
                .update_many_with_session(
                    document::filter(condition)?,
                    document::set(data)?,
                    None,
                    &mut self.session,
                )
                .await
                .map(|_| ()),
            TransactionAction::Delete { condition } => self
                .collection
                .delete_many_with_session(document::filter(condition)?, None, &mut self.session)
                .await
                .map(|_| ()),
            TransactionAction::Increment { deltas, condition } => self
                .collection
                .update_many_with_session(
                    document::filter(condition)?,
                    document::inc(deltas)?,
                    None,
                    &mut self.session,
                )
                .await
                .map(|_| ()),
        };
        result.map_err(|e| classify_mongo_error(&context, e))
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.session
            .commit_transaction()
            .await
            .map_err(|e| classify_mongo_error("commit_transaction", e))
    }

    async fn rollback(mut self) -> StoreResult<()> {
        self.session
            .abort_transaction()
            .await
            .map_err(|e| classify_mongo_error("abort_transaction", e))
    }
}

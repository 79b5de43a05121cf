//! Constants - TigerStyle limits and defaults
//!
//! Every limit carries its unit in the name (`_MS`, `_COUNT_MAX`, `_BYTES_MAX`).

// =============================================================================
// Listing
// =============================================================================

/// Default page size for `get_all`.
pub const LIST_LIMIT_DEFAULT: u64 = 10;

/// Default page offset for `get_all`.
pub const LIST_OFFSET_DEFAULT: u64 = 0;

// =============================================================================
// Soft Delete
// =============================================================================

/// Boolean field written by `soft_delete` when no field is given.
pub const SOFT_DELETE_FIELD_DEFAULT: &str = "isDeleted";

// =============================================================================
// Retry
// =============================================================================

/// Total attempts (first try included) made by the retry policy.
pub const RETRY_ATTEMPTS_MAX: u32 = 3;

/// Base delay; attempt `k` waits `k * RETRY_BASE_DELAY_MS` before retrying.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

// =============================================================================
// Relational
// =============================================================================

/// Connections held by the shared MySQL pool.
pub const MYSQL_POOL_CONNECTIONS_MAX: u32 = 10;

/// Default MySQL port.
pub const MYSQL_PORT_DEFAULT: u16 = 3306;

/// MySQL identifier length limit.
pub const SQL_IDENTIFIER_BYTES_MAX: usize = 64;

// =============================================================================
// Wide-column
// =============================================================================

/// Items accepted by a single DynamoDB `TransactWriteItems` call.
pub const DYNAMODB_TRANSACT_ITEMS_MAX: usize = 100;

/// Items accepted by a single DynamoDB `BatchWriteItem` call.
pub const DYNAMODB_BATCH_WRITE_ITEMS_MAX: usize = 25;

/// Resubmissions of unprocessed batch items before giving up.
pub const DYNAMODB_BATCH_RESUBMIT_COUNT_MAX: u32 = 5;

/// Base delay before resubmitting unprocessed batch items; grows linearly.
pub const DYNAMODB_BATCH_RESUBMIT_DELAY_MS: u64 = 100;

// =============================================================================
// Identifiers
// =============================================================================

/// Field that carries a generated or supplied identifier.
pub const ID_FIELD: &str = "id";

/// MongoDB primary key field.
pub const MONGO_ID_FIELD: &str = "_id";

//! Omnistore - One storage contract, many engines
//!
//! TigerStyle data access layer: create/read/update/delete, filtered listing,
//! counting, existence checks, text search, and multi-step transactions
//! behind a single async trait, implemented for relational, wide-column, and
//! document engines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ServiceFactory  ("mysql" | "dynamodb" | "mongodb", table)   │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Box<dyn StorageDriver>                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  condition    │ Conditions → SQL / expressions / documents   │
//! │  retry        │ bounded linear backoff (relational)          │
//! │  transaction  │ ordered actions, commit or roll back         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MySqlDriver  │  DynamoDriver  │  MongoDriver  │  SimDriver  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use omnistore::{Conditions, SimDriver, StorageDriver};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let driver = SimDriver::new("accounts");
//! let record = omnistore::to_record(json!({"name": "alice", "balance": 100})).unwrap();
//! let id = driver.create(&record).await.unwrap();
//!
//! let by_id = Conditions::new().eq("id", id.to_value());
//! driver.increment("balance", 50.into(), &by_id).await.unwrap();
//! let row = driver.get(&by_id).await.unwrap().unwrap();
//! assert_eq!(row["balance"], json!(150));
//! # });
//! ```
//!
//! Production drivers come from the factory:
//!
//! ```rust,ignore
//! let factory = omnistore::ServiceFactory::from_env();
//! let users = factory.get_instance("mysql", "users").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod condition;
pub mod config;
pub mod constants;
pub mod dst;
pub mod error;
pub mod factory;
pub mod record;
pub mod retry;
pub mod storage;
pub mod transaction;

// Re-export common types
pub use config::{DynamoConfig, MongoConfig, MySqlConfig, Settings};
pub use error::{StoreError, StoreResult};
pub use factory::{BackendKind, ServiceFactory};
pub use record::{to_record, Conditions, ListOptions, Record, RecordId, SortDirection, SortSpec};
pub use retry::RetryPolicy;
pub use storage::{SimDriver, StorageDriver};
pub use transaction::{TransactionAction, TransactionCoordinator, TransactionScope, TransactionState};

#[cfg(feature = "dynamodb")]
pub use storage::DynamoDriver;
#[cfg(feature = "mongodb")]
pub use storage::MongoDriver;
#[cfg(feature = "mysql")]
pub use storage::MySqlDriver;

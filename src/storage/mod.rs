//! Storage - Driver Trait and Implementations
//!
//! TigerStyle: One contract, one driver per engine family, plus an in-memory
//! simulation that honors the same contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageDriver Trait                       │
//! └─────────────────────────────────────────────────────────────┘
//!        ↑                ↑                 ↑               ↑
//!        │                │                 │               │
//! ┌──────┴──────┐ ┌───────┴──────┐ ┌────────┴─────┐ ┌───────┴─────┐
//! │ MySqlDriver │ │ DynamoDriver │ │ MongoDriver  │ │  SimDriver  │
//! │ (relational)│ │(wide-column) │ │  (document)  │ │  (testing)  │
//! └─────────────┘ └──────────────┘ └──────────────┘ └─────────────┘
//! ```
//!
//! Each production driver sits behind its cargo feature (`mysql`,
//! `dynamodb`, `mongodb`); `SimDriver` is always available.

mod driver;
mod sim;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "mysql")]
pub mod mysql;

pub use driver::StorageDriver;
pub use sim::SimDriver;

#[cfg(feature = "dynamodb")]
pub use self::dynamodb::DynamoDriver;
#[cfg(feature = "mongodb")]
pub use self::mongo::MongoDriver;
#[cfg(feature = "mysql")]
pub use self::mysql::MySqlDriver;

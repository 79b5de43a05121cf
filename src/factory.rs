//! ServiceFactory - The one place a backend is chosen
//!
//! TigerStyle: Backend names are parsed into a closed enum before anything
//! else happens; unknown names and missing settings fail as `Configuration`
//! without touching the network.

use std::fmt;
use std::str::FromStr;

use crate::config::Settings;
use crate::error::{StoreError, StoreResult};
use crate::storage::StorageDriver;

/// Supported engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Relational (MySQL)
    MySql,
    /// Wide-column (DynamoDB)
    DynamoDb,
    /// Document (MongoDB)
    MongoDb,
}

impl BackendKind {
    /// Every kind, in declaration order.
    pub const ALL: [BackendKind; 3] = [Self::MySql, Self::DynamoDb, Self::MongoDb];

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::DynamoDb => "dynamodb",
            Self::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                StoreError::configuration(format!(
                    "unknown backend '{name}' (expected mysql, dynamodb, or mongodb)"
                ))
            })
    }
}

/// Builds drivers from [`Settings`]. Drivers are not cached; each call
/// returns a fresh driver on the backend's shared pool or client.
#[derive(Debug, Clone, Default)]
pub struct ServiceFactory {
    settings: Settings,
}

impl ServiceFactory {
    /// Factory over explicit settings.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Factory over [`Settings::from_env`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Settings::from_env())
    }

    /// Settings drivers are built from.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Driver for a backend named at runtime (`"mysql"`, `"dynamodb"`,
    /// `"mongodb"`, any case) bound to `table`.
    ///
    /// # Errors
    /// `Configuration` for an unknown name, missing settings, or a backend
    /// compiled out; `Validation` for an illegal table name.
    pub async fn get_instance(&self, kind: &str, table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        let kind: BackendKind = kind.parse()?;
        self.get(kind, table).await
    }

    /// Driver for a parsed backend kind.
    ///
    /// # Errors
    /// Same as [`ServiceFactory::get_instance`].
    pub async fn get(&self, kind: BackendKind, table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        if table.is_empty() {
            return Err(StoreError::validation("table name cannot be empty"));
        }
        tracing::debug!(backend = %kind, table, "creating driver");

        match kind {
            BackendKind::MySql => self.mysql(table),
            BackendKind::DynamoDb => self.dynamodb(table).await,
            BackendKind::MongoDb => self.mongodb(table).await,
        }
    }

    #[cfg(feature = "mysql")]
    fn mysql(&self, table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        let config = self.settings.mysql_config()?;
        Ok(Box::new(crate::storage::MySqlDriver::new(config, table)?))
    }

    #[cfg(not(feature = "mysql"))]
    fn mysql(&self, _table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        Err(not_compiled(BackendKind::MySql))
    }

    #[cfg(feature = "dynamodb")]
    async fn dynamodb(&self, table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        let driver = crate::storage::DynamoDriver::new(&self.settings.dynamodb, table).await?;
        Ok(Box::new(driver))
    }

    #[cfg(not(feature = "dynamodb"))]
    async fn dynamodb(&self, _table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        Err(not_compiled(BackendKind::DynamoDb))
    }

    #[cfg(feature = "mongodb")]
    async fn mongodb(&self, table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        let config = self.settings.mongodb_config()?;
        Ok(Box::new(crate::storage::MongoDriver::new(config, table).await?))
    }

    #[cfg(not(feature = "mongodb"))]
    async fn mongodb(&self, _table: &str) -> StoreResult<Box<dyn StorageDriver>> {
        Err(not_compiled(BackendKind::MongoDb))
    }
}

#[cfg(not(all(feature = "mysql", feature = "dynamodb", feature = "mongodb")))]
fn not_compiled(kind: BackendKind) -> StoreError {
    StoreError::configuration(format!(
        "backend '{kind}' is not compiled in; enable the `{kind}` feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_backend_kind() {
        assert_eq!("mysql".parse::<BackendKind>().unwrap(), BackendKind::MySql);
        assert_eq!(" DynamoDB ".parse::<BackendKind>().unwrap(), BackendKind::DynamoDb);
        assert_eq!("MongoDB".parse::<BackendKind>().unwrap(), BackendKind::MongoDb);
        assert_err!("postgres".parse::<BackendKind>());
        assert_err!("".parse::<BackendKind>());

        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[tokio::test]
    async fn test_unknown_backend_is_configuration_error() {
        let factory = ServiceFactory::default();
        let result = factory.get_instance("postgres", "t").await;
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_settings_fail_before_connecting() {
        let factory = ServiceFactory::new(Settings::default());
        let result = factory.get_instance("mysql", "accounts").await;
        assert!(matches!(result, Err(StoreError::Configuration(_))));

        let result = factory.get_instance("mongodb", "accounts").await;
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[cfg(feature = "mysql")]
    #[tokio::test]
    async fn test_malformed_settings_report_their_cause() {
        let settings = Settings::from_lookup(|name| match name {
            "MYSQL_HOST" | "MYSQL_USER" | "MYSQL_PASSWORD" | "MYSQL_DATABASE" => Some("x".to_string()),
            "MYSQL_PORT" => Some("33o6".to_string()),
            _ => None,
        });
        let factory = ServiceFactory::new(settings);

        let Err(err) = factory.get_instance("mysql", "accounts").await else {
            panic!("malformed MYSQL_PORT accepted");
        };
        assert!(matches!(err, StoreError::Configuration(_)));
        assert!(err.to_string().contains("MYSQL_PORT"), "{err}");
    }

    #[tokio::test]
    async fn test_empty_table_rejected() {
        let factory = ServiceFactory::default();
        let result = factory.get_instance("mysql", "").await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[cfg(feature = "mysql")]
    #[tokio::test]
    async fn test_mysql_driver_is_lazy() {
        use crate::config::MySqlConfig;

        let settings = Settings::default()
            .with_mysql(MySqlConfig::new("127.0.0.1", "nobody", "nothing", "none").with_port(1));
        let factory = ServiceFactory::new(settings);

        let driver = assert_ok!(factory.get_instance("MySQL", "accounts").await);
        assert_eq!(driver.backend(), "mysql");
        assert_eq!(driver.table(), "accounts");
    }
}

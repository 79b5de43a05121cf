//! Settings - Connection configuration for every backend
//!
//! TigerStyle: Read once at construction, validated before any connection is
//! attempted. A missing required variable is a `Configuration` error, never a
//! late connect failure.
//!
//! | Backend  | Required                                              | Optional                          |
//! |----------|-------------------------------------------------------|-----------------------------------|
//! | MySQL    | MYSQL_HOST, MYSQL_USER, MYSQL_PASSWORD, MYSQL_DATABASE | MYSQL_PORT, MYSQL_POOL_SIZE       |
//! | MongoDB  | MONGODB_URI, MONGODB_DATABASE                          |                                   |
//! | DynamoDB | (ambient AWS credentials)                              | DYNAMODB_ENDPOINT_URL, AWS_REGION |

use std::fmt;

use crate::constants::{MYSQL_POOL_CONNECTIONS_MAX, MYSQL_PORT_DEFAULT};
use crate::error::{StoreError, StoreResult};

/// Look up a variable; `None` for unset or blank.
fn lookup_var<L>(lookup: &L, name: &str) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn require_vars<L>(lookup: &L, names: &[&str]) -> StoreResult<Vec<String>>
where
    L: Fn(&str) -> Option<String>,
{
    let mut values = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match lookup_var(lookup, name) {
            Some(value) => values.push(value),
            None => missing.push(*name),
        }
    }
    if !missing.is_empty() {
        return Err(StoreError::configuration(format!(
            "missing required environment variables: {}",
            missing.join(", ")
        )));
    }
    Ok(values)
}

fn parse_var<L, T>(lookup: &L, name: &str, default: T) -> StoreResult<T>
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup_var(lookup, name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| StoreError::configuration(format!("{name}: cannot parse '{raw}'"))),
        None => Ok(default),
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

// =============================================================================
// MySQL
// =============================================================================

/// MySQL connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    /// Server host name
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Login password (redacted in `Debug`)
    pub password: String,
    /// Default schema
    pub database: String,
    /// Pool size bound
    pub pool_size: u32,
}

impl MySqlConfig {
    /// Settings with default port and pool size.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: MYSQL_PORT_DEFAULT,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            pool_size: MYSQL_POOL_CONNECTIONS_MAX,
        }
    }

    /// Read from `MYSQL_*` environment variables.
    ///
    /// # Errors
    /// `Configuration` naming every missing required variable, or an
    /// unparseable port or pool size.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Read from an arbitrary variable source.
    ///
    /// # Errors
    /// Same as [`MySqlConfig::from_env`].
    pub fn from_lookup<L>(lookup: L) -> StoreResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let required = require_vars(
            &lookup,
            &["MYSQL_HOST", "MYSQL_USER", "MYSQL_PASSWORD", "MYSQL_DATABASE"],
        )?;
        let [host, user, password, database]: [String; 4] = required
            .try_into()
            .map_err(|_| StoreError::configuration("MySQL settings incomplete"))?;

        let pool_size = parse_var(&lookup, "MYSQL_POOL_SIZE", MYSQL_POOL_CONNECTIONS_MAX)?;
        if pool_size == 0 {
            return Err(StoreError::configuration("MYSQL_POOL_SIZE must be positive"));
        }

        Ok(Self {
            host,
            port: parse_var(&lookup, "MYSQL_PORT", MYSQL_PORT_DEFAULT)?,
            user,
            password,
            database,
            pool_size,
        })
    }

    /// Override the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the pool size.
    ///
    /// # Panics
    /// Panics if `pool_size` is zero.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        assert!(pool_size > 0, "pool_size must be positive");
        self.pool_size = pool_size;
        self
    }
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

// =============================================================================
// MongoDB
// =============================================================================

/// MongoDB connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection string (`mongodb://` or `mongodb+srv://`)
    pub uri: String,
    /// Database holding the collections
    pub database: String,
}

impl MongoConfig {
    /// Settings for one database on `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }

    /// Read from `MONGODB_URI` and `MONGODB_DATABASE`.
    ///
    /// # Errors
    /// `Configuration` naming every missing variable.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Read from an arbitrary variable source.
    ///
    /// # Errors
    /// Same as [`MongoConfig::from_env`].
    pub fn from_lookup<L>(lookup: L) -> StoreResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let required = require_vars(&lookup, &["MONGODB_URI", "MONGODB_DATABASE"])?;
        let [uri, database]: [String; 2] = required
            .try_into()
            .map_err(|_| StoreError::configuration("MongoDB settings incomplete"))?;
        Ok(Self { uri, database })
    }
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The URI usually embeds credentials.
        f.debug_struct("MongoConfig")
            .field("uri", &"***")
            .field("database", &self.database)
            .finish()
    }
}

// =============================================================================
// DynamoDB
// =============================================================================

/// DynamoDB overrides on top of the ambient AWS configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamoConfig {
    /// Custom endpoint, e.g. `http://localhost:8000` for DynamoDB Local
    pub endpoint_url: Option<String>,
    /// Region override
    pub region: Option<String>,
}

impl DynamoConfig {
    /// Read `DYNAMODB_ENDPOINT_URL` and `AWS_REGION`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Read the same variables from an arbitrary source.
    #[must_use]
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        Self {
            endpoint_url: lookup_var(&lookup, "DYNAMODB_ENDPOINT_URL"),
            region: lookup_var(&lookup, "AWS_REGION"),
        }
    }

    /// Send requests to a custom endpoint.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Override the ambient region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Configuration for all backends. Unset backends stay `None` and fail with
/// `Configuration` only when requested, carrying the reason they could not
/// be read.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Relational backend
    pub mysql: Option<MySqlConfig>,
    /// Document backend
    pub mongodb: Option<MongoConfig>,
    /// Wide-column backend overrides
    pub dynamodb: DynamoConfig,
    mysql_error: Option<String>,
    mongodb_error: Option<String>,
}

impl Settings {
    /// Load `.env` (if present) and read every backend's variables.
    ///
    /// Backends with missing or malformed variables are left unset; the
    /// cause is reported by [`Settings::mysql_config`] or
    /// [`Settings::mongodb_config`].
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(env_lookup)
    }

    /// Read every backend's variables from an arbitrary source.
    #[must_use]
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let (mysql, mysql_error) = split_config("mysql", MySqlConfig::from_lookup(&lookup));
        let (mongodb, mongodb_error) = split_config("mongodb", MongoConfig::from_lookup(&lookup));
        Self {
            mysql,
            mongodb,
            dynamodb: DynamoConfig::from_lookup(&lookup),
            mysql_error,
            mongodb_error,
        }
    }

    /// MySQL settings.
    ///
    /// # Errors
    /// `Configuration` with the reason they could not be read, or naming the
    /// required variables when nothing was read.
    pub fn mysql_config(&self) -> StoreResult<&MySqlConfig> {
        self.mysql.as_ref().ok_or_else(|| {
            unavailable(
                "mysql",
                self.mysql_error.as_deref(),
                "set MYSQL_HOST, MYSQL_USER, MYSQL_PASSWORD, MYSQL_DATABASE",
            )
        })
    }

    /// MongoDB settings.
    ///
    /// # Errors
    /// Same as [`Settings::mysql_config`].
    pub fn mongodb_config(&self) -> StoreResult<&MongoConfig> {
        self.mongodb.as_ref().ok_or_else(|| {
            unavailable(
                "mongodb",
                self.mongodb_error.as_deref(),
                "set MONGODB_URI, MONGODB_DATABASE",
            )
        })
    }

    /// Use explicit MySQL settings.
    #[must_use]
    pub fn with_mysql(mut self, config: MySqlConfig) -> Self {
        self.mysql = Some(config);
        self.mysql_error = None;
        self
    }

    /// Use explicit MongoDB settings.
    #[must_use]
    pub fn with_mongodb(mut self, config: MongoConfig) -> Self {
        self.mongodb = Some(config);
        self.mongodb_error = None;
        self
    }

    /// Use explicit DynamoDB overrides.
    #[must_use]
    pub fn with_dynamodb(mut self, config: DynamoConfig) -> Self {
        self.dynamodb = config;
        self
    }
}

fn split_config<T>(backend: &str, result: StoreResult<T>) -> (Option<T>, Option<String>) {
    match result {
        Ok(config) => (Some(config), None),
        Err(e) => {
            tracing::debug!(backend, error = %e, "settings unavailable");
            (None, Some(e.to_string()))
        }
    }
}

fn unavailable(backend: &str, cause: Option<&str>, hint: &str) -> StoreError {
    match cause {
        Some(cause) => StoreError::configuration(format!("{backend} settings unavailable: {cause}")),
        None => StoreError::configuration(format!("{backend} settings missing: {hint}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_mysql_defaults() {
        let config = MySqlConfig::from_lookup(vars(&[
            ("MYSQL_HOST", "db"),
            ("MYSQL_USER", "app"),
            ("MYSQL_PASSWORD", "secret"),
            ("MYSQL_DATABASE", "main"),
        ]))
        .unwrap();

        assert_eq!(config.host, "db");
        assert_eq!(config.port, 3306);
        assert_eq!(config.pool_size, 10);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_mysql_missing_names_every_variable() {
        let err = MySqlConfig::from_lookup(vars(&[("MYSQL_HOST", "db"), ("MYSQL_USER", " ")]))
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, StoreError::Configuration(_)));
        assert!(message.contains("MYSQL_USER"));
        assert!(message.contains("MYSQL_PASSWORD"));
        assert!(message.contains("MYSQL_DATABASE"));
        assert!(!message.contains("MYSQL_HOST"));
    }

    #[test]
    fn test_mysql_bad_port() {
        let err = MySqlConfig::from_lookup(vars(&[
            ("MYSQL_HOST", "db"),
            ("MYSQL_USER", "app"),
            ("MYSQL_PASSWORD", "pw"),
            ("MYSQL_DATABASE", "main"),
            ("MYSQL_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_mongo_requires_both() {
        assert!(MongoConfig::from_lookup(vars(&[("MONGODB_URI", "mongodb://h")])).is_err());
        let config = MongoConfig::from_lookup(vars(&[
            ("MONGODB_URI", "mongodb://h"),
            ("MONGODB_DATABASE", "app"),
        ]))
        .unwrap();
        assert_eq!(config.database, "app");
    }

    #[test]
    fn test_settings_leave_missing_backends_unset() {
        let settings = Settings::from_lookup(vars(&[
            ("DYNAMODB_ENDPOINT_URL", "http://localhost:8000"),
            ("MONGODB_URI", "mongodb://h"),
            ("MONGODB_DATABASE", "app"),
        ]));
        assert!(settings.mysql.is_none());
        assert!(settings.mongodb.is_some());
        assert_eq!(
            settings.dynamodb.endpoint_url.as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(settings.dynamodb.region, None);
    }

    #[test]
    fn test_settings_keep_malformed_value_cause() {
        let settings = Settings::from_lookup(vars(&[
            ("MYSQL_HOST", "db"),
            ("MYSQL_USER", "app"),
            ("MYSQL_PASSWORD", "pw"),
            ("MYSQL_DATABASE", "main"),
            ("MYSQL_PORT", "33o6"),
        ]));
        assert!(settings.mysql.is_none());

        let message = settings.mysql_config().unwrap_err().to_string();
        assert!(message.contains("MYSQL_PORT"), "{message}");
        assert!(message.contains("33o6"), "{message}");

        let message = settings.mongodb_config().unwrap_err().to_string();
        assert!(message.contains("MONGODB_URI"), "{message}");
    }

    #[test]
    fn test_explicit_config_replaces_lookup_failure() {
        let settings = Settings::from_lookup(vars(&[("MYSQL_PORT", "x")]))
            .with_mysql(MySqlConfig::new("db", "app", "pw", "main"));
        assert_eq!(settings.mysql_config().unwrap().host, "db");

        let message = Settings::default().mysql_config().unwrap_err().to_string();
        assert!(message.contains("settings missing"), "{message}");
    }
}

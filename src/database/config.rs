//! Connection settings

use std::fmt;

use serde::{Deserialize, Serialize};

use super::DatabaseError;

pub const ENV_HOST: &str = "POSTGRES_HOST";
pub const ENV_PORT: &str = "POSTGRES_PORT";
pub const ENV_DATABASE: &str = "POSTGRES_DATABASE";
pub const ENV_USERNAME: &str = "POSTGRES_USERNAME";
pub const ENV_PASSWORD: &str = "POSTGRES_PASSWORD";

/// PostgreSQL connection settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: None,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the `POSTGRES_*` environment variables.
    ///
    /// Unset variables keep their default value.
    pub fn from_env() -> Result<Self, DatabaseError> {
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Override fields with values returned by `lookup`
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DatabaseError> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| DatabaseError::InvalidConfig(format!("{} must be a port number, got '{}'", ENV_PORT, port)))?;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = database;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
        Ok(self)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Convert to a `tokio_postgres` configuration
    #[cfg(feature = "postgres-backend")]
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.username)
            .application_name("tabload");
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_merge_env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [(ENV_HOST, "db.internal"), (ENV_PORT, "6543"), (ENV_PASSWORD, "secret")]
            .into_iter()
            .collect();
        let config = ConnectionConfig::default()
            .merge_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.database, "postgres");
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_port() {
        let result = ConnectionConfig::default().merge_env(|k| (k == ENV_PORT).then(|| "abc".to_string()));
        assert!(matches!(result, Err(DatabaseError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new().with_password("hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: ConnectionConfig = serde_json::from_str(r#"{"host":"pg","database":"warehouse"}"#).unwrap();
        assert_eq!(config.host, "pg");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "warehouse");
    }
}

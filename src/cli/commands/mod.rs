//! CLI command implementations

pub mod constraints;
pub mod ddl;
pub mod normalize;
pub mod upload;

use std::io::Read;
use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::database::ConnectionConfig;

/// Load input from a file, or stdin for `-`
pub(crate) fn load_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| CliError::InvalidArgument(format!("Failed to read stdin: {}", e)))?;
        Ok(content)
    } else {
        let path = PathBuf::from(input);
        std::fs::read_to_string(&path).map_err(|e| CliError::FileReadError(path, e.to_string()))
    }
}

/// Connection flags shared by commands that talk to PostgreSQL
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Database host
    #[arg(long, env = "POSTGRES_HOST")]
    pub host: Option<String>,

    /// Database port
    #[arg(long, env = "POSTGRES_PORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(long = "dbname", env = "POSTGRES_DATABASE")]
    pub database: Option<String>,

    /// Database user
    #[arg(long, env = "POSTGRES_USERNAME")]
    pub username: Option<String>,

    /// Database password
    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    /// Overlay the flags (or their environment variables) on `base`
    pub fn apply(&self, mut base: ConnectionConfig) -> ConnectionConfig {
        if let Some(host) = &self.host {
            base = base.with_host(host.clone());
        }
        if let Some(port) = self.port {
            base = base.with_port(port);
        }
        if let Some(database) = &self.database {
            base = base.with_database(database.clone());
        }
        if let Some(username) = &self.username {
            base = base.with_username(username.clone());
        }
        if let Some(password) = &self.password {
            base = base.with_password(password.clone());
        }
        base
    }
}

//! Daemon Configuration
//!
//! The configuration is a TOML file loaded once at startup and shared
//! read-only afterwards. Every section and field has a default, so an empty
//! file (or no file at all) describes a daemon listening on
//! `127.0.0.1:10028` with a Redis cache and no backend enabled.
//!
//! ```toml
//! [server]
//! listen_address = "0.0.0.0"
//! listen_port = 10028
//!
//! [cache]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 10
//!
//! [mysql]
//! enabled = true
//! host = "db.example.com"
//! user = "postfix"
//! password = "secret"
//! database = "mail"
//! query = "SELECT destination FROM aliases WHERE address = '%s'"
//! ```

use crate::backend::BackendKind;
use crate::lookup::template::DEFAULT_MAX_QUERY_LENGTH;
use crate::protocol::response::{
    ResponseFormat, DEFAULT_ERROR_MESSAGE, DEFAULT_STATUS_ERROR, DEFAULT_STATUS_OK,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The default port the daemon listens on
pub const DEFAULT_PORT: u16 = 10028;

/// The default address the daemon binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default number of cache connections
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default directory search timeout in seconds
pub const DEFAULT_LDAP_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has fields of the wrong type
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is syntactically fine but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration record.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub protocol: ProtocolConfig,
    pub log: LogConfig,
    pub cache: CacheConfig,
    pub mysql: SqlConfig,
    pub postgres: SqlConfig,
    pub ldap: LdapConfig,
}

/// Listening socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_HOST.to_string(),
            listen_port: DEFAULT_PORT,
        }
    }
}

/// Wire tokens and limits.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    pub status_ok: String,
    pub status_error: String,
    pub error_message: String,
    /// Upper bound for a rendered query or filter, in bytes
    pub max_query_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            status_ok: DEFAULT_STATUS_OK.to_string(),
            status_error: DEFAULT_STATUS_ERROR.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
        }
    }
}

impl ProtocolConfig {
    pub fn response_format(&self) -> ResponseFormat {
        ResponseFormat {
            status_ok: self.status_ok.clone(),
            status_error: self.status_error.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Logging.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Cache store.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// `redis://host:port[/db]` or `memory://`
    pub url: String,
    /// Number of connections opened at startup
    pub pool_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// A relational backend (MySQL or PostgreSQL).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SqlConfig {
    pub enabled: bool,
    pub host: String,
    /// `None` selects the driver's default port
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Query template; the first column of the first row is the result
    pub query: String,
}

/// The directory backend.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LdapConfig {
    pub enabled: bool,
    pub uri: String,
    pub bind_dn: String,
    pub bind_password: String,
    /// Search base
    pub base: String,
    /// Search filter template
    pub filter: String,
    /// The attribute whose first value is returned
    pub result_attribute: String,
    /// Server-side search time limit
    pub timeout_secs: u64,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "ldap://localhost:389".to_string(),
            bind_dn: String::new(),
            bind_password: String::new(),
            base: String::new(),
            filter: String::new(),
            result_attribute: String::new(),
            timeout_secs: DEFAULT_LDAP_TIMEOUT_SECS,
        }
    }
}

impl LdapConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "cache.pool_size must be at least 1".to_string(),
            ));
        }
        if self.protocol.max_query_length == 0 {
            return Err(ConfigError::Invalid(
                "protocol.max_query_length must be at least 1".to_string(),
            ));
        }
        for (name, token) in [
            ("protocol.status_ok", &self.protocol.status_ok),
            ("protocol.status_error", &self.protocol.status_error),
        ] {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a single non-empty token, got {token:?}"
                )));
            }
        }
        if self.protocol.error_message.contains(['\r', '\n']) {
            return Err(ConfigError::Invalid(
                "protocol.error_message must fit on one line".to_string(),
            ));
        }
        if self.ldap.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ldap.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.ldap.enabled && self.ldap.result_attribute.is_empty() {
            return Err(ConfigError::Invalid(
                "ldap.result_attribute is required when ldap is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.listen_address, self.server.listen_port)
    }

    /// Whether the given backend is switched on.
    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Mysql => self.mysql.enabled,
            BackendKind::Ldap => self.ldap.enabled,
            BackendKind::Postgres => self.postgres.enabled,
        }
    }

    /// The query or filter template configured for the given backend.
    pub fn template(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Mysql => &self.mysql.query,
            BackendKind::Ldap => &self.ldap.filter,
            BackendKind::Postgres => &self.postgres.query,
        }
    }
}

//! Systems of Record
//!
//! On a cache miss the lookup handler asks exactly one backend for the key.
//! Three kinds are supported and they are interchangeable behind the
//! [`Backend`] trait:
//!
//! ```text
//!            ┌──────────────────────┐
//!            │    LookupHandler     │
//!            └──────────┬───────────┘
//!                       │ query(rendered template)
//!                       ▼
//!            ┌──────────────────────┐
//!            │   dyn Backend        │
//!            └──────────┬───────────┘
//!         ┌─────────────┼──────────────┐
//!         ▼             ▼              ▼
//!   ┌──────────┐  ┌──────────┐  ┌────────────┐
//!   │  MySQL   │  │   LDAP   │  │ PostgreSQL │
//!   └──────────┘  └──────────┘  └────────────┘
//! ```
//!
//! Which backend is used is decided once at startup by [`BackendSelector`]:
//! the first enabled kind in [`BackendKind::PRIORITY`] wins. The decision
//! does not depend on the request.

pub mod ldap;
pub mod mysql;
pub mod postgres;

use crate::config::Config;
use crate::lookup::template::Escape;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use ldap::LdapBackend;
pub use mysql::MysqlBackend;
pub use postgres::PostgresBackend;

/// The kinds of system of record the daemon can front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Mysql,
    Ldap,
    Postgres,
}

impl BackendKind {
    /// Selection order when more than one backend is enabled.
    pub const PRIORITY: [BackendKind; 3] =
        [BackendKind::Mysql, BackendKind::Ldap, BackendKind::Postgres];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Mysql => "mysql",
            BackendKind::Ldap => "ldap",
            BackendKind::Postgres => "postgres",
        }
    }

    /// How keys are quoted inside this backend's query or filter.
    pub fn escape(&self) -> Escape {
        match self {
            BackendKind::Mysql => Escape::MysqlString,
            BackendKind::Ldap => Escape::LdapFilter,
            BackendKind::Postgres => Escape::PostgresString,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors reported by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not establish or restore the session
    #[error("{kind} connection failed: {message}")]
    Connect { kind: BackendKind, message: String },

    /// The query or search itself failed
    #[error("{kind} query failed: {message}")]
    Query { kind: BackendKind, message: String },

    /// The backend answered with something that cannot be sent to the client
    #[error("{kind} returned an unusable value: {message}")]
    InvalidValue { kind: BackendKind, message: String },
}

impl BackendError {
    pub fn connect(kind: BackendKind, err: impl fmt::Display) -> Self {
        BackendError::Connect {
            kind,
            message: err.to_string(),
        }
    }

    pub fn query(kind: BackendKind, err: impl fmt::Display) -> Self {
        BackendError::Query {
            kind,
            message: err.to_string(),
        }
    }
}

/// The outcome of one backend query.
#[derive(Debug)]
pub enum BackendResult {
    /// The first value of the first match
    Found(String),
    /// The query ran cleanly and matched nothing
    NotFound,
    /// Transport or protocol error against the system of record
    Failure(BackendError),
}

impl BackendResult {
    /// Wraps a raw driver result.
    ///
    /// Values that contain a line break are turned into failures: the value
    /// must fit on a single response line.
    pub fn from_value(kind: BackendKind, value: Option<String>) -> Self {
        match value {
            Some(value) if value.contains(['\r', '\n']) => {
                BackendResult::Failure(BackendError::InvalidValue {
                    kind,
                    message: "value contains a line break".to_string(),
                })
            }
            Some(value) => BackendResult::Found(value),
            None => BackendResult::NotFound,
        }
    }

    /// Takes the first column of the first row of a result set.
    ///
    /// Later rows are never inspected. An empty result set or a NULL first
    /// column is `NotFound`; a column that cannot be read as text is a
    /// failure.
    pub fn from_rows<E: fmt::Display>(
        kind: BackendKind,
        rows: impl IntoIterator<Item = Result<Option<String>, E>>,
    ) -> Self {
        match rows.into_iter().next() {
            Some(Ok(value)) => Self::from_value(kind, value),
            Some(Err(err)) => BackendResult::Failure(BackendError::query(kind, err)),
            None => BackendResult::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, BackendResult::Found(_))
    }
}

/// A system of record that can answer one rendered query.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which kind of backend this is (used for logging and template choice).
    fn kind(&self) -> BackendKind;

    /// Checks the session before a query, reconnecting if it is unhealthy.
    ///
    /// An error here fails the current request; the query is not attempted.
    async fn ensure_healthy(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Runs a rendered query or filter and returns the first value.
    async fn query(&self, query: &str) -> BackendResult;
}

/// Picks the backend to consult on a cache miss.
pub struct BackendSelector;

impl BackendSelector {
    /// Returns the first enabled backend in priority order.
    pub fn select(config: &Config) -> Option<BackendKind> {
        BackendKind::PRIORITY
            .into_iter()
            .find(|kind| config.is_enabled(*kind))
    }

    /// Selects and connects the configured backend.
    ///
    /// Returns `Ok(None)` when no backend is enabled; every miss is then
    /// answered with the failure response.
    pub async fn connect(config: &Config) -> Result<Option<Arc<dyn Backend>>, BackendError> {
        let backend: Arc<dyn Backend> = match Self::select(config) {
            Some(BackendKind::Mysql) => Arc::new(MysqlBackend::connect(&config.mysql).await?),
            Some(BackendKind::Ldap) => Arc::new(LdapBackend::connect(&config.ldap).await?),
            Some(BackendKind::Postgres) => {
                Arc::new(PostgresBackend::connect(&config.postgres).await?)
            }
            None => return Ok(None),
        };
        Ok(Some(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(mysql: bool, ldap: bool, postgres: bool) -> Config {
        let mut config = Config::default();
        config.mysql.enabled = mysql;
        config.ldap.enabled = ldap;
        config.postgres.enabled = postgres;
        config
    }

    #[test]
    fn test_select_none() {
        assert_eq!(BackendSelector::select(&config_with(false, false, false)), None);
    }

    #[test]
    fn test_select_single() {
        assert_eq!(
            BackendSelector::select(&config_with(false, false, true)),
            Some(BackendKind::Postgres)
        );
        assert_eq!(
            BackendSelector::select(&config_with(false, true, false)),
            Some(BackendKind::Ldap)
        );
    }

    #[test]
    fn test_select_priority() {
        assert_eq!(
            BackendSelector::select(&config_with(true, true, true)),
            Some(BackendKind::Mysql)
        );
        assert_eq!(
            BackendSelector::select(&config_with(false, true, true)),
            Some(BackendKind::Ldap)
        );
        assert_eq!(
            BackendSelector::select(&config_with(true, false, true)),
            Some(BackendKind::Mysql)
        );
    }

    #[tokio::test]
    async fn test_connect_none_enabled() {
        let backend = BackendSelector::connect(&Config::default()).await.unwrap();
        assert!(backend.is_none());
    }

    #[test]
    fn test_from_value() {
        assert!(BackendResult::from_value(BackendKind::Mysql, Some("x".into())).is_found());
        assert!(matches!(
            BackendResult::from_value(BackendKind::Mysql, None),
            BackendResult::NotFound
        ));
        assert!(matches!(
            BackendResult::from_value(BackendKind::Ldap, Some("a\nb".into())),
            BackendResult::Failure(BackendError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_rows_takes_first_row() {
        let rows: Vec<Result<Option<String>, String>> = vec![
            Ok(Some("first@example.com".to_string())),
            Ok(Some("second@example.com".to_string())),
        ];
        match BackendResult::from_rows(BackendKind::Postgres, rows) {
            BackendResult::Found(value) => assert_eq!(value, "first@example.com"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_from_rows_later_rows_not_read() {
        let rows = vec![
            Ok(Some("first".to_string())),
            Err("unreadable column".to_string()),
        ];
        assert!(BackendResult::from_rows(BackendKind::Mysql, rows).is_found());
    }

    #[test]
    fn test_from_rows_empty_and_null() {
        let empty: Vec<Result<Option<String>, String>> = Vec::new();
        assert!(matches!(
            BackendResult::from_rows(BackendKind::Postgres, empty),
            BackendResult::NotFound
        ));

        let null: Vec<Result<Option<String>, String>> = vec![Ok(None), Ok(Some("x".into()))];
        assert!(matches!(
            BackendResult::from_rows(BackendKind::Postgres, null),
            BackendResult::NotFound
        ));
    }

    #[test]
    fn test_from_rows_unreadable_column() {
        let rows: Vec<Result<Option<String>, String>> = vec![Err("int4 is not text".into())];
        assert!(matches!(
            BackendResult::from_rows(BackendKind::Postgres, rows),
            BackendResult::Failure(BackendError::Query {
                kind: BackendKind::Postgres,
                ..
            })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::query(BackendKind::Postgres, "relation does not exist");
        assert_eq!(
            err.to_string(),
            "postgres query failed: relation does not exist"
        );
    }
}

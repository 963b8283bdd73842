//! MySQL Backend
//!
//! Keeps one long-lived session. Before every query the session is pinged;
//! if the ping fails a fresh connection replaces it. The query itself is
//! never retried, so a request that hits a dead server fails once and the
//! next request runs on the new session.

use super::{Backend, BackendError, BackendKind, BackendResult};
use crate::config::SqlConfig;
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Row};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const KIND: BackendKind = BackendKind::Mysql;

pub struct MysqlBackend {
    opts: Opts,
    session: Mutex<Conn>,
}

impl MysqlBackend {
    /// Opens the session described by `config`.
    pub async fn connect(config: &SqlConfig) -> Result<Self, BackendError> {
        let opts = Opts::from(build_opts(config));
        let conn = Conn::new(opts.clone())
            .await
            .map_err(|err| BackendError::connect(KIND, err))?;

        debug!(host = %config.host, database = %config.database, "MySQL session established");

        Ok(Self {
            opts,
            session: Mutex::new(conn),
        })
    }
}

fn build_opts(config: &SqlConfig) -> OptsBuilder {
    let host = if config.host.is_empty() {
        "localhost"
    } else {
        config.host.as_str()
    };

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(host)
        .user(Some(config.user.clone()))
        .pass(Some(config.password.clone()))
        .db_name(Some(config.database.clone()));
    if let Some(port) = config.port {
        builder = builder.tcp_port(port);
    }
    builder
}

#[async_trait]
impl Backend for MysqlBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn ensure_healthy(&self) -> Result<(), BackendError> {
        let mut conn = self.session.lock().await;
        if let Err(err) = conn.ping().await {
            warn!(error = %err, "MySQL ping failed, reconnecting");
            *conn = Conn::new(self.opts.clone())
                .await
                .map_err(|err| BackendError::connect(KIND, err))?;
        }
        Ok(())
    }

    async fn query(&self, query: &str) -> BackendResult {
        let mut conn = self.session.lock().await;

        let row: Option<Row> = match conn.query_first(query).await {
            Ok(row) => row,
            Err(err) => return BackendResult::Failure(BackendError::query(KIND, err)),
        };

        BackendResult::from_rows(
            KIND,
            row.map(|row| match row.get_opt::<Option<String>, usize>(0) {
                Some(Ok(value)) => Ok(value),
                Some(Err(err)) => Err(format!("{err:?}")),
                None => Ok(None),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_opts() {
        let config = SqlConfig {
            enabled: true,
            host: "db.example.com".to_string(),
            port: Some(3307),
            user: "postfix".to_string(),
            password: "secret".to_string(),
            database: "mail".to_string(),
            query: String::new(),
        };
        let opts = Opts::from(build_opts(&config));
        assert_eq!(opts.ip_or_hostname(), "db.example.com");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.user(), Some("postfix"));
        assert_eq!(opts.db_name(), Some("mail"));
    }

    #[test]
    fn test_empty_host_defaults_to_localhost() {
        let opts = Opts::from(build_opts(&SqlConfig::default()));
        assert_eq!(opts.ip_or_hostname(), "localhost");
        assert_eq!(opts.tcp_port(), 3306);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = SqlConfig {
            host: "127.0.0.1".to_string(),
            port: Some(1),
            ..SqlConfig::default()
        };
        let err = MysqlBackend::connect(&config).await.err().unwrap();
        assert!(matches!(
            err,
            BackendError::Connect {
                kind: BackendKind::Mysql,
                ..
            }
        ));
    }
}

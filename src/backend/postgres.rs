//! PostgreSQL Backend
//!
//! One long-lived client. The tokio-postgres connection future is driven by
//! its own task; when it ends the client reports `is_closed()` and the next
//! health check opens a replacement.

use super::{Backend, BackendError, BackendKind, BackendResult};
use crate::config::SqlConfig;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, warn};

const KIND: BackendKind = BackendKind::Postgres;

pub struct PostgresBackend {
    config: Config,
    session: Mutex<Client>,
}

impl PostgresBackend {
    /// Opens the session described by `config`.
    pub async fn connect(config: &SqlConfig) -> Result<Self, BackendError> {
        let pg_config = build_config(config);
        let client = open(&pg_config).await?;

        debug!(host = %config.host, database = %config.database, "PostgreSQL session established");

        Ok(Self {
            config: pg_config,
            session: Mutex::new(client),
        })
    }
}

fn build_config(config: &SqlConfig) -> Config {
    let host = if config.host.is_empty() {
        "localhost"
    } else {
        config.host.as_str()
    };

    let mut pg_config = Config::new();
    pg_config
        .host(host)
        .user(&config.user)
        .password(&config.password)
        .dbname(&config.database);
    if let Some(port) = config.port {
        pg_config.port(port);
    }
    pg_config
}

async fn open(config: &Config) -> Result<Client, BackendError> {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .map_err(|err| BackendError::connect(KIND, err))?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            warn!(error = %err, "PostgreSQL connection closed");
        }
    });

    Ok(client)
}

#[async_trait]
impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn ensure_healthy(&self) -> Result<(), BackendError> {
        let mut client = self.session.lock().await;
        if client.is_closed() {
            warn!("PostgreSQL session closed, reconnecting");
            *client = open(&self.config).await?;
        }
        Ok(())
    }

    async fn query(&self, query: &str) -> BackendResult {
        let client = self.session.lock().await;

        // A query may match several rows; only the first one is used
        let rows = match client.query(query, &[]).await {
            Ok(rows) => rows,
            Err(err) => return BackendResult::Failure(BackendError::query(KIND, err)),
        };

        BackendResult::from_rows(
            KIND,
            rows.iter().map(|row| row.try_get::<_, Option<String>>(0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::config::Host;

    #[test]
    fn test_build_config() {
        let config = SqlConfig {
            enabled: true,
            host: "pg.example.com".to_string(),
            port: Some(5433),
            user: "postfix".to_string(),
            password: "secret".to_string(),
            database: "mail".to_string(),
            query: String::new(),
        };
        let pg = build_config(&config);
        assert_eq!(pg.get_hosts(), &[Host::Tcp("pg.example.com".to_string())]);
        assert_eq!(pg.get_ports(), &[5433]);
        assert_eq!(pg.get_user(), Some("postfix"));
        assert_eq!(pg.get_dbname(), Some("mail"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = SqlConfig {
            host: "127.0.0.1".to_string(),
            port: Some(1),
            ..SqlConfig::default()
        };
        let err = PostgresBackend::connect(&config).await.err().unwrap();
        assert!(matches!(
            err,
            BackendError::Connect {
                kind: BackendKind::Postgres,
                ..
            }
        ));
    }
}

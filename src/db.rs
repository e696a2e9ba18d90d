//! Connection provider: one database connection per request.
//!
//! No pooling and no retry. [`Database::connect`] makes a single attempt and
//! returns a [`Connection`] guard; dropping the guard closes the connection,
//! so every exit path of a handler releases it.

use std::ops::Deref;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::PgConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("{0} no está configurado")]
    MissingCredential(&'static str),

    #[error("{0}")]
    Connect(#[from] tokio_postgres::Error),
}

/// Opens connections from a fixed [`PgConfig`].
#[derive(Clone, Debug)]
pub struct Database {
    config: PgConfig,
}

impl Database {
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    fn pg_config(&self) -> Result<tokio_postgres::Config, ConnectionError> {
        let user = self.config.user.as_deref()
            .ok_or(ConnectionError::MissingCredential("PG_USER"))?;
        let password = self.config.password.as_deref()
            .ok_or(ConnectionError::MissingCredential("PG_PASSWORD"))?;

        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.database)
            .user(user)
            .password(password)
            .application_name("criminalidad");
        Ok(pg)
    }

    /// Opens a fresh connection.
    pub async fn connect(&self) -> Result<Connection, ConnectionError> {
        let (client, connection) = self.pg_config()?.connect(NoTls).await?;
        debug!(target_db = %self.config, "connection opened");
        Ok(Connection::start(client, connection))
    }

    /// Opens a connection, asks the server for its version, and closes it.
    pub async fn server_version(&self) -> Result<String, ConnectionError> {
        let conn = self.connect().await?;
        let row = conn.query_one("SELECT version()", &[]).await?;
        Ok(row.try_get(0)?)
    }
}

/// An open connection, scoped to one request.
///
/// Derefs to [`Client`]. Dropping it drops the client; the background driver
/// task then sends `Terminate`, closes the socket and exits on its own.
pub struct Connection {
    client: Client,
}

impl Connection {
    fn start<S, T>(client: Client, connection: tokio_postgres::Connection<S, T>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("postgres connection error: {e}");
            }
        });
        Self { client }
    }
}

impl Deref for Connection {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

/// A provider whose every connect attempt is refused.
#[cfg(test)]
pub(crate) fn unreachable_db() -> Database {
    Database::new(PgConfig {
        host: "127.0.0.1".into(),
        // port 1 (tcpmux) never runs Postgres
        port: 1,
        database: "criminalidad_espana".into(),
        user: Some("nobody".into()),
        password: Some("nothing".into()),
    })
}

//! MySQL implementation of the backend connector.
//!
//! Uses plain `MySqlConnection`s rather than a pool: each worker owns one
//! connection and rebuilds it itself after a reconnect-class failure.

use async_trait::async_trait;
use rand::Rng;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError};
use sqlx::Connection;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::backend::{Backend, OperationKind};
use crate::errors::BackendError;

const INSERT_ORDER_SQL: &str =
    "INSERT INTO orders (customer_id, amount, status) VALUES (?, ?, 'NEW')";

// Only the oldest unpaid row is targeted so concurrent workers contend on a
// single candidate instead of a sorted range.
const UPDATE_OLDEST_UNPAID_SQL: &str =
    "UPDATE orders SET status = 'PAID' WHERE status <> 'PAID' ORDER BY id ASC LIMIT 1";

const READ_RECENT_ORDERS_SQL: &str = "SELECT o.id, o.amount, c.name \
     FROM orders o JOIN customers c ON c.id = o.customer_id \
     ORDER BY o.id DESC LIMIT 50";

const PROBE_SQL: &str = "SELECT 1";

/// Connection parameters, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3307,
            user: "appuser".to_string(),
            password: "app123".to_string(),
            database: "appdb".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Backend connector for the `orders`/`customers` schema.
pub struct MySqlBackend {
    config: DbConfig,
    options: MySqlConnectOptions,
}

impl MySqlBackend {
    pub fn new(config: DbConfig) -> Self {
        let options = config.connect_options();
        Self { config, options }
    }
}

#[async_trait]
impl Backend for MySqlBackend {
    type Conn = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, BackendError> {
        match timeout(
            self.config.connect_timeout,
            MySqlConnection::connect_with(&self.options),
        )
        .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(BackendError::Connect(e.to_string())),
            Err(_) => Err(BackendError::Connect(format!(
                "no connection to {}:{} within {:?}",
                self.config.host, self.config.port, self.config.connect_timeout
            ))),
        }
    }

    async fn execute(
        &self,
        conn: &mut MySqlConnection,
        kind: OperationKind,
    ) -> Result<(), BackendError> {
        match kind {
            OperationKind::Insert => {
                let (customer_id, amount) = {
                    let mut rng = rand::thread_rng();
                    let customer_id: i64 = rng.gen_range(1..=3);
                    let amount: f64 = (rng.gen_range(5.0..200.0_f64) * 100.0).round() / 100.0;
                    (customer_id, amount)
                };
                sqlx::query(INSERT_ORDER_SQL)
                    .bind(customer_id)
                    .bind(amount)
                    .execute(&mut *conn)
                    .await?;
            }
            OperationKind::Update => {
                sqlx::query(UPDATE_OLDEST_UNPAID_SQL)
                    .execute(&mut *conn)
                    .await?;
            }
            OperationKind::Read => {
                let rows = sqlx::query(READ_RECENT_ORDERS_SQL)
                    .fetch_all(&mut *conn)
                    .await?;
                debug!(rows = rows.len(), "Read query drained");
            }
            OperationKind::Probe => {
                sqlx::query(PROBE_SQL).fetch_one(&mut *conn).await?;
            }
        }
        Ok(())
    }

    async fn close(&self, conn: MySqlConnection) {
        // Teardown errors are discarded: the connection is gone either way.
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Ignored error while closing connection");
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let number = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| e.number());
                BackendError::Database {
                    number,
                    sqlstate: db_err.code().map(|c| c.into_owned()),
                    message: db_err.message().to_string(),
                }
            }
            sqlx::Error::Io(e) => BackendError::Transport(e.to_string()),
            sqlx::Error::Tls(e) => BackendError::Transport(e.to_string()),
            sqlx::Error::Protocol(msg) => BackendError::Transport(msg),
            e @ (sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => BackendError::Transport(e.to_string()),
            other => BackendError::Other(other.to_string()),
        }
    }
}

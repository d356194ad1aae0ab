//! SQL Server provider built on tiberius.
//!
//! tiberius is async; the import engine is strictly sequential and blocking,
//! so every call is driven to completion with `Handle::block_on`. The handle
//! must belong to a multi-threaded runtime so its workers drive the socket.

use super::{BatchSink, ConnectionProvider, ConnectionTarget, ExecError, MASTER_DB};
use crate::config::ConnectionConfig;
use anyhow::Context;
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type SqlClient = Client<Compat<TcpStream>>;

/// One open client plus the runtime that drives it
struct Session {
    client: SqlClient,
    runtime: Handle,
}

impl Session {
    fn connect(runtime: &Handle, settings: &ConnectionConfig, database: &str) -> anyhow::Result<Self> {
        let client = runtime
            .block_on(connect(settings, database))
            .with_context(|| {
                format!(
                    "failed to connect to {}:{} (database {})",
                    settings.host, settings.port, database
                )
            })?;
        tracing::debug!(host = %settings.host, port = settings.port, database, "connected");
        Ok(Self {
            client,
            runtime: runtime.clone(),
        })
    }
}

impl BatchSink for Session {
    fn execute_batch(&mut self, sql: &str) -> Result<(), ExecError> {
        let client = &mut self.client;
        self.runtime
            .block_on(run_batch(client, sql))
            .map_err(exec_error)
    }
}

async fn connect(settings: &ConnectionConfig, database: &str) -> anyhow::Result<SqlClient> {
    let mut config = Config::new();
    config.host(&settings.host);
    config.port(settings.port);
    config.database(database);
    config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
    if settings.trust_cert {
        config.trust_cert();
    }

    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;

    let client = Client::connect(config, tcp.compat_write()).await?;
    Ok(client)
}

/// Send one batch and drain every result set so server errors raised by later
/// statements in the batch are surfaced.
async fn run_batch(client: &mut SqlClient, sql: &str) -> tiberius::Result<()> {
    let mut stream = client.simple_query(sql).await?;
    while stream.try_next().await?.is_some() {}
    Ok(())
}

fn exec_error(err: tiberius::error::Error) -> ExecError {
    match err {
        tiberius::error::Error::Server(token) => ExecError::server(token.code(), token.message()),
        other => ExecError::Driver(other.to_string()),
    }
}

/// Master connection plus one transaction on the database being built
pub struct MssqlProvider {
    runtime: Handle,
    settings: ConnectionConfig,
    database: String,
    master: Option<Session>,
    target: Option<Session>,
}

impl MssqlProvider {
    /// Connections are opened lazily; the target database may not exist yet.
    pub fn new(runtime: Handle, settings: ConnectionConfig, database: impl Into<String>) -> Self {
        Self {
            runtime,
            settings,
            database: database.into(),
            master: None,
            target: None,
        }
    }

    fn run_control(&mut self, sql: &str) -> anyhow::Result<()> {
        if let Some(session) = self.target.as_mut() {
            session
                .execute_batch(sql)
                .with_context(|| format!("{} failed on {}", sql, self.database))?;
        }
        Ok(())
    }
}

impl ConnectionProvider for MssqlProvider {
    fn handle(&mut self, target: ConnectionTarget) -> anyhow::Result<&mut dyn BatchSink> {
        match target {
            ConnectionTarget::Master => {
                if self.master.is_none() {
                    self.master = Some(Session::connect(&self.runtime, &self.settings, MASTER_DB)?);
                }
                match self.master.as_mut() {
                    Some(session) => Ok(session),
                    None => anyhow::bail!("master connection unavailable"),
                }
            }
            ConnectionTarget::TargetTransaction => {
                if self.target.is_none() {
                    let mut session =
                        Session::connect(&self.runtime, &self.settings, &self.database)?;
                    session
                        .execute_batch("BEGIN TRANSACTION")
                        .with_context(|| format!("failed to open transaction on {}", self.database))?;
                    tracing::debug!(database = %self.database, "transaction opened");
                    self.target = Some(session);
                }
                match self.target.as_mut() {
                    Some(session) => Ok(session),
                    None => anyhow::bail!("target transaction unavailable"),
                }
            }
        }
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.run_control("COMMIT TRANSACTION")?;
        if self.target.is_some() {
            tracing::debug!(database = %self.database, "transaction committed");
        }
        self.target = None;
        Ok(())
    }

    fn rollback(&mut self) -> anyhow::Result<()> {
        self.run_control("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")?;
        if self.target.is_some() {
            tracing::debug!(database = %self.database, "transaction rolled back");
        }
        self.target = None;
        Ok(())
    }

    fn close(&mut self) {
        self.target = None;
        self.master = None;
    }
}

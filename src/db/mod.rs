//! Connection and transaction providers.
//!
//! The import engine never opens, commits or closes anything itself. It asks a
//! [`ConnectionProvider`] for the handle that matches a [`ConnectionTarget`]
//! and sends batches through it. The caller that owns the provider decides
//! whether the target transaction is committed or rolled back.

mod dry_run;
mod mssql;

#[allow(unused_imports)]
pub use dry_run::{DryRunProvider, RecordedBatch};
pub use mssql::MssqlProvider;

/// Name of the SQL Server system database.
pub const MASTER_DB: &str = "master";

/// Which connection a batch is executed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionTarget {
    /// Autocommit connection to the `master` database
    Master,
    /// The single open transaction on the database being built
    TargetTransaction,
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionTarget::Master => write!(f, "master"),
            ConnectionTarget::TargetTransaction => write!(f, "target transaction"),
        }
    }
}

/// Failure of a single batch execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// Error raised by the server while executing the batch
    #[error("{message}")]
    Server { code: u32, message: String },

    /// Transport, protocol or client-side failure
    #[error("driver error: {0}")]
    Driver(String),
}

impl ExecError {
    pub fn server(code: u32, message: impl Into<String>) -> Self {
        ExecError::Server {
            code,
            message: message.into(),
        }
    }
}

/// Something a batch of SQL can be sent to
pub trait BatchSink {
    /// Execute one batch and drain all of its results.
    fn execute_batch(&mut self, sql: &str) -> Result<(), ExecError>;
}

/// Hands out execution handles and owns the transaction lifecycle.
pub trait ConnectionProvider {
    /// Handle for `target`, connecting (and for the target database, opening
    /// the transaction) on first use.
    fn handle(&mut self, target: ConnectionTarget) -> anyhow::Result<&mut dyn BatchSink>;

    /// Commit the target transaction if one is open.
    fn commit(&mut self) -> anyhow::Result<()>;

    /// Roll back the target transaction if one is open.
    fn rollback(&mut self) -> anyhow::Result<()>;

    /// Release every connection.
    fn close(&mut self);
}

//! Sequential script execution.
//!
//! Each script is split into batches which are sent one at a time, in order,
//! through the handle the provider returns for the policy's target. The
//! executor never begins, commits or rolls back a transaction: on a fatal
//! error it reports the failing batch and returns, leaving cleanup to the
//! owner of the provider.

pub mod classify;

use crate::artifacts::Script;
use crate::cancel::CancelToken;
use crate::config::BatchSize;
use crate::db::{ConnectionProvider, ConnectionTarget, ExecError};
use crate::splitter::{split, SplitStrategy};
use serde::Serialize;

pub use classify::is_ignorable;

/// Where a group of scripts runs and how it is split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    pub target: ConnectionTarget,
    pub strategy: SplitStrategy,
}

impl ExecutionPolicy {
    /// `GO`-separated DDL scripts
    pub fn structural(target: ConnectionTarget) -> Self {
        Self {
            target,
            strategy: SplitStrategy::Structural,
        }
    }

    /// Bulk insert dumps re-chunked into `size` rows per batch
    pub fn data_dump(target: ConnectionTarget, size: BatchSize) -> Self {
        Self {
            target,
            strategy: SplitStrategy::SlidingWindow(size),
        }
    }
}

/// Counters for one `execute` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub scripts: usize,
    pub batches: usize,
    pub ignored_errors: usize,
}

impl std::ops::AddAssign for ExecutionStats {
    fn add_assign(&mut self, other: Self) {
        self.scripts += other.scripts;
        self.batches += other.batches;
        self.ignored_errors += other.ignored_errors;
    }
}

/// Reasons `execute` stops early
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("error executing batch [{index}/{total}] in {script}")]
    BatchFailed {
        script: String,
        /// 1-based
        index: usize,
        total: usize,
        batch: String,
        #[source]
        source: ExecError,
    },

    #[error("cancelled before batch [{index}/{total}] in {script}")]
    Cancelled {
        script: String,
        index: usize,
        total: usize,
    },
}

pub struct ScriptExecutor<'a> {
    cancel: CancelToken,
    progress_fn: Option<Box<dyn Fn(u64) + 'a>>,
}

impl<'a> ScriptExecutor<'a> {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            progress_fn: None,
        }
    }

    /// Called after every executed batch with the running batch count.
    pub fn with_progress<F: Fn(u64) + 'a>(mut self, f: F) -> Self {
        self.progress_fn = Some(Box::new(f));
        self
    }

    /// Run `scripts` in order under `policy`.
    ///
    /// An empty script list is not an error: optional artifact categories
    /// (a project without stored procedures, say) just log a warning.
    pub fn execute(
        &self,
        scripts: &[Script],
        policy: ExecutionPolicy,
        provider: &mut dyn ConnectionProvider,
    ) -> anyhow::Result<ExecutionStats> {
        let mut stats = ExecutionStats::default();

        if scripts.is_empty() {
            tracing::warn!("no scripts to execute");
            return Ok(stats);
        }

        for script in scripts {
            let batches = split(&script.sql, policy.strategy);
            let total = batches.len();
            tracing::debug!(
                script = %script.name,
                batches = total,
                connection = %policy.target,
                strategy = %policy.strategy,
                "executing script"
            );

            let sink = provider.handle(policy.target)?;

            for (i, batch) in batches.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    return Err(ExecutorError::Cancelled {
                        script: script.name.clone(),
                        index: i + 1,
                        total,
                    }
                    .into());
                }

                if let Err(err) = sink.execute_batch(batch) {
                    if !is_ignorable(&err) {
                        tracing::error!(
                            script = %script.name,
                            "error executing batch [{}/{}]: {}",
                            i + 1,
                            total,
                            err
                        );
                        tracing::error!("batch sql: {}", batch);
                        return Err(ExecutorError::BatchFailed {
                            script: script.name.clone(),
                            index: i + 1,
                            total,
                            batch: batch.clone(),
                            source: err,
                        }
                        .into());
                    }
                    tracing::debug!(script = %script.name, batch = i + 1, "ignored: {}", err);
                    stats.ignored_errors += 1;
                }

                stats.batches += 1;
                if let Some(ref cb) = self.progress_fn {
                    cb(stats.batches as u64);
                }
            }

            stats.scripts += 1;
        }

        Ok(stats)
    }
}

//! Provider that records batches instead of sending them to a server.

use super::{BatchSink, ConnectionProvider, ConnectionTarget, ExecError};

/// A batch captured by [`DryRunProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    pub target: ConnectionTarget,
    pub sql: String,
    /// False when the batch was answered with a primed failure
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct Recorder {
    target: Option<ConnectionTarget>,
    log: Vec<RecordedBatch>,
    failures: Vec<(String, ExecError)>,
}

impl BatchSink for Recorder {
    fn execute_batch(&mut self, sql: &str) -> Result<(), ExecError> {
        let target = self.target.unwrap_or(ConnectionTarget::Master);
        let failure = self
            .failures
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, err)| err.clone());

        self.log.push(RecordedBatch {
            target,
            sql: sql.to_string(),
            succeeded: failure.is_none(),
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Records every batch per target.
///
/// Used by `--dry-run` to preview an import and by tests to observe exactly
/// what the engine submits. Failures can be primed with [`fail_on`].
///
/// [`fail_on`]: DryRunProvider::fail_on
#[derive(Debug, Default)]
pub struct DryRunProvider {
    recorder: Recorder,
    transaction_open: bool,
    commits: usize,
    rollbacks: usize,
    closed: bool,
}

impl DryRunProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any batch containing `needle` with `error`.
    pub fn fail_on(mut self, needle: impl Into<String>, error: ExecError) -> Self {
        self.recorder.failures.push((needle.into(), error));
        self
    }

    /// All submitted batches, in submission order.
    pub fn batches(&self) -> &[RecordedBatch] {
        &self.recorder.log
    }

    /// Batches submitted to `target`.
    pub fn batches_for(&self, target: ConnectionTarget) -> Vec<&RecordedBatch> {
        self.recorder
            .log
            .iter()
            .filter(|b| b.target == target)
            .collect()
    }

    pub fn transaction_open(&self) -> bool {
        self.transaction_open
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ConnectionProvider for DryRunProvider {
    fn handle(&mut self, target: ConnectionTarget) -> anyhow::Result<&mut dyn BatchSink> {
        if self.closed {
            anyhow::bail!("provider is closed");
        }
        if target == ConnectionTarget::TargetTransaction {
            self.transaction_open = true;
        }
        self.recorder.target = Some(target);
        Ok(&mut self.recorder)
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        if self.transaction_open {
            self.transaction_open = false;
            self.commits += 1;
        }
        Ok(())
    }

    fn rollback(&mut self) -> anyhow::Result<()> {
        if self.transaction_open {
            self.transaction_open = false;
            self.rollbacks += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_targets_and_transaction() {
        let mut provider = DryRunProvider::new();
        provider
            .handle(ConnectionTarget::Master)
            .unwrap()
            .execute_batch("CREATE DATABASE x")
            .unwrap();
        assert!(!provider.transaction_open());

        provider
            .handle(ConnectionTarget::TargetTransaction)
            .unwrap()
            .execute_batch("CREATE SCHEMA s")
            .unwrap();
        assert!(provider.transaction_open());

        assert_eq!(provider.batches_for(ConnectionTarget::Master).len(), 1);
        assert_eq!(
            provider.batches_for(ConnectionTarget::TargetTransaction)[0].sql,
            "CREATE SCHEMA s"
        );

        provider.commit().unwrap();
        assert_eq!(provider.commits(), 1);
        assert!(!provider.transaction_open());
    }

    #[test]
    fn test_primed_failure() {
        let mut provider =
            DryRunProvider::new().fail_on("DROP VIEW", ExecError::server(3701, "nope"));
        let sink = provider.handle(ConnectionTarget::TargetTransaction).unwrap();
        assert!(sink.execute_batch("SELECT 1").is_ok());
        assert_eq!(
            sink.execute_batch("DROP VIEW v"),
            Err(ExecError::server(3701, "nope"))
        );
        assert!(!provider.batches()[1].succeeded);
    }

    #[test]
    fn test_closed_provider_refuses_handles() {
        let mut provider = DryRunProvider::new();
        provider.close();
        assert!(provider.handle(ConnectionTarget::Master).is_err());
    }
}

use crate::config::BatchSize;
use crate::db::ConnectionTarget;
use crate::executor::ExecutionPolicy;
use serde::Serialize;

/// One step of the import, listed in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Databases,
    Schemas,
    Users,
    Logins,
    Tables,
    TableData,
    Views,
    StoredProcedures,
}

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        StageKind::Databases,
        StageKind::Schemas,
        StageKind::Users,
        StageKind::Logins,
        StageKind::Tables,
        StageKind::TableData,
        StageKind::Views,
        StageKind::StoredProcedures,
    ];

    /// Database and login creation cannot run inside a user transaction, so
    /// they go to master.
    pub fn target(self) -> ConnectionTarget {
        match self {
            StageKind::Databases | StageKind::Logins => ConnectionTarget::Master,
            _ => ConnectionTarget::TargetTransaction,
        }
    }

    pub fn policy(self, batch_size: BatchSize) -> ExecutionPolicy {
        match self {
            StageKind::TableData => ExecutionPolicy::data_dump(self.target(), batch_size),
            _ => ExecutionPolicy::structural(self.target()),
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Databases => write!(f, "databases"),
            StageKind::Schemas => write!(f, "schemas"),
            StageKind::Users => write!(f, "users"),
            StageKind::Logins => write!(f, "logins"),
            StageKind::Tables => write!(f, "table structures"),
            StageKind::TableData => write!(f, "table data"),
            StageKind::Views => write!(f, "views"),
            StageKind::StoredProcedures => write!(f, "stored procedures"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::SplitStrategy;

    #[test]
    fn test_only_table_data_uses_sliding_window() {
        let size = BatchSize::DEFAULT;
        for kind in StageKind::ALL {
            let policy = kind.policy(size);
            if kind == StageKind::TableData {
                assert_eq!(policy.strategy, SplitStrategy::SlidingWindow(size));
            } else {
                assert_eq!(policy.strategy, SplitStrategy::Structural);
            }
        }
    }

    #[test]
    fn test_master_stages() {
        let master: Vec<_> = StageKind::ALL
            .into_iter()
            .filter(|k| k.target() == ConnectionTarget::Master)
            .collect();
        assert_eq!(master, vec![StageKind::Databases, StageKind::Logins]);
    }
}

//! Drop job run before every import.
//!
//! Removes the configured database (and with it its users and schemas) and the
//! configured server logins, so the import always starts from nothing.

use crate::artifacts::Script;
use crate::cancel::CancelToken;
use crate::config::DatabaseSpec;
use crate::db::{ConnectionProvider, ConnectionTarget};
use crate::executor::{ExecutionPolicy, ExecutionStats, ScriptExecutor};

/// Quote an identifier for use inside `[...]`.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quote a value as an `N'...'` literal.
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Scripts that drop `db` and its logins if they exist.
pub fn clean_scripts(db: &DatabaseSpec) -> Vec<Script> {
    let mut scripts = Vec::with_capacity(1 + db.logins.len());

    scripts.push(Script::new(
        format!("drop database {}", db.name),
        format!(
            "IF DB_ID({lit}) IS NOT NULL\nBEGIN\n    ALTER DATABASE {ident} SET SINGLE_USER WITH ROLLBACK IMMEDIATE;\n    DROP DATABASE {ident};\nEND",
            lit = quote_literal(&db.name),
            ident = quote_ident(&db.name),
        ),
    ));

    for login in &db.logins {
        scripts.push(Script::new(
            format!("drop login {}", login.name),
            format!(
                "IF EXISTS (SELECT name FROM sys.server_principals WHERE name = {})\n    DROP LOGIN {}",
                quote_literal(&login.name),
                quote_ident(&login.name),
            ),
        ));
    }

    scripts
}

/// Drop `db` and its logins on the master connection.
pub fn clean(
    db: &DatabaseSpec,
    provider: &mut dyn ConnectionProvider,
    cancel: CancelToken,
) -> anyhow::Result<ExecutionStats> {
    tracing::info!(database = %db.name, "-- Cleaning --");
    let stats = ScriptExecutor::new(cancel).execute(
        &clean_scripts(db),
        ExecutionPolicy::structural(ConnectionTarget::Master),
        provider,
    )?;
    tracing::info!(database = %db.name, "clean complete");
    Ok(stats)
}

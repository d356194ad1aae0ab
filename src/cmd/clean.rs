use super::runtime;
use crate::cancel::CancelToken;
use crate::clean;
use crate::config::AppConfig;
use crate::db::{ConnectionProvider, DryRunProvider, MssqlProvider};
use anyhow::Context;

pub fn run(config: AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    let runtime = runtime::build(&cancel)?;

    for db in &config.import.databases {
        let mut provider: Box<dyn ConnectionProvider> = if dry_run {
            Box::new(DryRunProvider::new())
        } else {
            Box::new(MssqlProvider::new(
                runtime.handle().clone(),
                config.connection.clone(),
                db.name.clone(),
            ))
        };

        let result = clean::clean(db, provider.as_mut(), cancel.clone());
        provider.close();
        let stats = result.with_context(|| format!("clean of {} failed", db.name))?;

        println!(
            "Cleaned {}: {} scripts, {} batches{}",
            db.name,
            stats.scripts,
            stats.batches,
            if dry_run { " [dry run]" } else { "" }
        );
    }

    Ok(())
}

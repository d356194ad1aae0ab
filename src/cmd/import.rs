use super::runtime;
use crate::cancel::CancelToken;
use crate::clean;
use crate::config::{AppConfig, DatabaseSpec};
use crate::db::{ConnectionProvider, DryRunProvider, MssqlProvider};
use crate::pipeline::{ImportPipeline, ImportReport};
use anyhow::Context;
use std::time::Instant;

pub fn run(
    config: AppConfig,
    run_clean: bool,
    dry_run: bool,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let cancel = CancelToken::new();
    let runtime = runtime::build(&cancel)?;

    let pipeline = ImportPipeline::new(config.import.schema_dir.clone(), config.batch_size())
        .with_cancel(cancel.clone())
        .with_progress(progress && !json);

    if !json {
        eprintln!(
            "Importing {} database(s) from {} (batch size {}){}",
            config.import.databases.len(),
            config.import.schema_dir.display(),
            pipeline.batch_size(),
            if dry_run { " [dry run]" } else { "" }
        );
        eprintln!();
    }

    let mut reports = Vec::with_capacity(config.import.databases.len());
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

        let report = process_db(db, provider.as_mut(), &pipeline, run_clean, &cancel)
            .with_context(|| format!("import of {} failed", db.name))?;

        if !json {
            print_report(&report);
        }
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        eprintln!(
            "Import complete in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

/// Clean and import one database, committing the target transaction on
/// success and rolling it back on failure. Connections are always closed.
pub(crate) fn process_db(
    db: &DatabaseSpec,
    provider: &mut dyn ConnectionProvider,
    pipeline: &ImportPipeline,
    run_clean: bool,
    cancel: &CancelToken,
) -> anyhow::Result<ImportReport> {
    let result = clean_and_import(db, provider, pipeline, run_clean, cancel)
        .and_then(|report| provider.commit().map(|_| report).context("failed to commit transaction"));

    if result.is_err() {
        if let Err(e) = provider.rollback() {
            tracing::error!("failed to rollback transaction: {:#}", e);
        }
    }
    provider.close();

    result
}

fn clean_and_import(
    db: &DatabaseSpec,
    provider: &mut dyn ConnectionProvider,
    pipeline: &ImportPipeline,
    run_clean: bool,
    cancel: &CancelToken,
) -> anyhow::Result<ImportReport> {
    if run_clean {
        clean::clean(db, provider, cancel.clone())?;
    }
    pipeline.run(db, provider)
}

fn print_report(report: &ImportReport) {
    println!("Database: {}", report.database);
    for stage in &report.stages {
        println!(
            "  {:<20} {:>5} scripts {:>8} batches {:>4} ignored  {:>8.2}s",
            stage.stage.to_string(),
            stage.stats.scripts,
            stage.stats.batches,
            stage.stats.ignored_errors,
            stage.elapsed_secs
        );
    }
    let totals = report.totals();
    println!(
        "  {} scripts, {} batches in {:.2}s (batch size {})",
        totals.scripts, totals.batches, report.elapsed_secs, report.batch_size
    );
    println!();
}

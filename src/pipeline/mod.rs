//! The import pipeline.
//!
//! Builds one database from a schema project in a fixed order: databases,
//! schemas, users, logins, tables, table data, views, stored procedures. Later
//! stages assume the objects of earlier ones exist, so the first failure ends
//! the run. Databases and logins are created on the autocommit master
//! connection; everything else shares the single target transaction, which the
//! caller commits or rolls back once `run` returns.

mod stage;

pub use stage::StageKind;

use crate::artifacts::{
    discover_scripts, read_template, render_template, replace_use_database_name, Script,
    ScriptKind, CREATE_DATABASE_TEMPLATE, CREATE_LOGIN_TEMPLATE, CREATE_SCHEMA_TEMPLATE,
    CREATE_USER_TEMPLATE, MANUAL_SETUP_DIR, STORED_PROCS_DIR, VIEWS_DIR,
};
use crate::cancel::CancelToken;
use crate::config::{BatchSize, DatabaseSpec};
use crate::db::ConnectionProvider;
use crate::executor::{ExecutionStats, ScriptExecutor};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outcome of one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: StageKind,
    #[serde(flatten)]
    pub stats: ExecutionStats,
    pub elapsed_secs: f64,
}

/// Outcome of a full import of one database
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub database: String,
    pub batch_size: usize,
    pub stages: Vec<StageReport>,
    pub elapsed_secs: f64,
}

impl ImportReport {
    pub fn stage(&self, kind: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == kind)
    }

    /// Totals across all stages
    pub fn totals(&self) -> ExecutionStats {
        let mut totals = ExecutionStats::default();
        for stage in &self.stages {
            totals += stage.stats;
        }
        totals
    }
}

pub struct ImportPipeline {
    schema_dir: PathBuf,
    batch_size: BatchSize,
    cancel: CancelToken,
    progress: bool,
}

impl ImportPipeline {
    pub fn new(schema_dir: PathBuf, batch_size: BatchSize) -> Self {
        Self {
            schema_dir,
            batch_size,
            cancel: CancelToken::new(),
            progress: false,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Draw a progress spinner while table data is imported
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    /// Run every stage against `db`.
    ///
    /// Nothing is committed or rolled back here; on error the caller must roll
    /// back `provider`.
    pub fn run(
        &self,
        db: &DatabaseSpec,
        provider: &mut dyn ConnectionProvider,
    ) -> anyhow::Result<ImportReport> {
        let start = Instant::now();
        let mut stages = Vec::with_capacity(StageKind::ALL.len());

        tracing::info!(database = %db.name, batch_size = %self.batch_size, "importing");

        for kind in StageKind::ALL {
            if self.cancel.is_cancelled() {
                anyhow::bail!("import of {} cancelled before {} stage", db.name, kind);
            }

            let report = self.run_stage(kind, db, provider).map_err(|e| {
                tracing::error!(stage = %kind, database = %db.name, "stage failed: {:#}", e);
                e.context(format!("{} stage failed", kind))
            })?;
            stages.push(report);
        }

        Ok(ImportReport {
            database: db.name.clone(),
            batch_size: self.batch_size.get(),
            stages,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn run_stage(
        &self,
        kind: StageKind,
        db: &DatabaseSpec,
        provider: &mut dyn ConnectionProvider,
    ) -> anyhow::Result<StageReport> {
        tracing::info!("-- Importing {} --", kind);
        if kind == StageKind::TableData {
            tracing::info!("this may take several minutes");
        }

        let start = Instant::now();
        let scripts = self.gather_scripts(kind, db)?;
        let policy = kind.policy(self.batch_size);

        let stats = if self.progress && kind == StageKind::TableData {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} batches {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            let pb_clone = pb.clone();
            let executor = ScriptExecutor::new(self.cancel.clone())
                .with_progress(move |batches| pb_clone.set_position(batches));
            let result = executor.execute(&scripts, policy, provider);
            pb.finish_and_clear();
            result?
        } else {
            ScriptExecutor::new(self.cancel.clone()).execute(&scripts, policy, provider)?
        };

        let elapsed = start.elapsed();
        if kind == StageKind::TableData {
            tracing::info!(
                "{} successfully imported in {:.2} seconds; batch size {}",
                kind,
                elapsed.as_secs_f64(),
                self.batch_size
            );
        } else {
            tracing::info!("{} successfully imported", kind);
        }

        Ok(StageReport {
            stage: kind,
            stats,
            elapsed_secs: elapsed.as_secs_f64(),
        })
    }

    /// Render or discover the scripts of one stage.
    pub fn gather_scripts(&self, kind: StageKind, db: &DatabaseSpec) -> anyhow::Result<Vec<Script>> {
        let manual_setup = self.schema_dir.join(MANUAL_SETUP_DIR);

        match kind {
            StageKind::Databases => {
                let template = read_template(&self.schema_dir, CREATE_DATABASE_TEMPLATE)?;
                Ok(vec![Script::new(
                    ScriptKind::CreateDatabase.file_name(&db.name),
                    render_template(&template, &[db.name.as_str()])?,
                )])
            }
            StageKind::Schemas => self.render_each(
                CREATE_SCHEMA_TEMPLATE,
                ScriptKind::CreateSchema,
                db.schemas.iter().map(|s| (s.as_str(), vec![s.as_str(), db.name.as_str()])),
            ),
            StageKind::Users => self.render_each(
                CREATE_USER_TEMPLATE,
                ScriptKind::CreateUser,
                db.users.iter().map(|u| {
                    (
                        u.name.as_str(),
                        vec![u.name.as_str(), u.schema.as_str(), db.name.as_str()],
                    )
                }),
            ),
            StageKind::Logins => self.render_each(
                CREATE_LOGIN_TEMPLATE,
                ScriptKind::CreateLogin,
                db.logins.iter().map(|l| {
                    (
                        l.name.as_str(),
                        vec![l.name.as_str(), db.name.as_str(), l.password.as_str()],
                    )
                }),
            ),
            StageKind::Tables => {
                let mut scripts =
                    discover_scripts(&manual_setup, &ScriptKind::CreateTable.pattern())?;
                for script in &mut scripts {
                    script.sql = replace_use_database_name(&script.sql, &db.name);
                }
                Ok(scripts)
            }
            StageKind::TableData => {
                discover_scripts(&manual_setup, &ScriptKind::InsertData.pattern())
            }
            StageKind::Views => self.discover_with_extra(
                &manual_setup,
                VIEWS_DIR,
                &ScriptKind::CreateView.pattern(),
            ),
            StageKind::StoredProcedures => self.discover_with_extra(
                &manual_setup,
                STORED_PROCS_DIR,
                &ScriptKind::CreateStoredProc.pattern(),
            ),
        }
    }

    /// Scripts from `ManualSetup/`, then from the category's own directory
    /// when the project has one.
    fn discover_with_extra(
        &self,
        manual_setup: &Path,
        extra_dir: &str,
        pattern: &str,
    ) -> anyhow::Result<Vec<Script>> {
        let mut scripts = discover_scripts(manual_setup, pattern)?;
        let extra = self.schema_dir.join(extra_dir);
        if extra.is_dir() {
            scripts.extend(discover_scripts(&extra, pattern)?);
        }
        Ok(scripts)
    }

    /// One rendered script per item; the template is only read if there are items.
    fn render_each<'a, I>(
        &self,
        template_name: &str,
        kind: ScriptKind,
        items: I,
    ) -> anyhow::Result<Vec<Script>>
    where
        I: Iterator<Item = (&'a str, Vec<&'a str>)>,
    {
        let mut items = items.peekable();
        if items.peek().is_none() {
            return Ok(Vec::new());
        }

        let template = read_template(&self.schema_dir, template_name)?;
        items
            .map(|(qualifier, args)| -> anyhow::Result<Script> {
                Ok(Script::new(
                    kind.file_name(qualifier),
                    render_template(&template, &args)?,
                ))
            })
            .collect()
    }
}

mod clean;
mod import;
mod runtime;

use crate::config::{AppConfig, Overrides, DEFAULT_CONFIG_FILE};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "schema-import")]
#[command(version)]
#[command(about = "Build a SQL Server database from a schema project", long_about = None)]
pub struct Cli {
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drop and rebuild every configured database from the schema project
    Import {
        /// Path to the config file, inclusive of the filename
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Schema project directory override
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Rows per INSERT batch when importing table data. Valid range 2-999;
        /// invalid values fall back to 16
        #[arg(short, long, allow_negative_numbers = true)]
        batch_size: Option<i64>,

        /// Database connection user override
        #[arg(long)]
        dbuser: Option<String>,

        /// Database connection password override
        #[arg(long)]
        dbpass: Option<String>,

        /// Skip dropping the databases and logins before importing
        #[arg(long)]
        no_clean: bool,

        /// Record batches instead of sending them to a server
        #[arg(long)]
        dry_run: bool,

        /// Show progress while importing table data
        #[arg(short, long)]
        progress: bool,

        /// Print the import report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop the configured databases and logins
    Clean {
        /// Path to the config file, inclusive of the filename
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Database connection user override
        #[arg(long)]
        dbuser: Option<String>,

        /// Database connection password override
        #[arg(long)]
        dbpass: Option<String>,

        /// Record batches instead of sending them to a server
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import {
            config,
            schema,
            batch_size,
            dbuser,
            dbpass,
            no_clean,
            dry_run,
            progress,
            json,
        } => {
            let config = load_config(
                &config,
                Overrides {
                    db_user: dbuser,
                    db_pass: dbpass,
                    schema_dir: schema,
                    batch_size,
                },
            )?;
            import::run(config, !no_clean, dry_run, progress, json)
        }
        Commands::Clean {
            config,
            dbuser,
            dbpass,
            dry_run,
        } => {
            let config = load_config(
                &config,
                Overrides {
                    db_user: dbuser,
                    db_pass: dbpass,
                    ..Default::default()
                },
            )?;
            clean::run(config, dry_run)
        }
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "schema-import",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

fn load_config(path: &Path, overrides: Overrides) -> anyhow::Result<AppConfig> {
    tracing::info!(path = %path.display(), "loading config");
    let mut config = AppConfig::load(path)?;
    config.apply_overrides(overrides);
    if config.import.databases.is_empty() {
        anyhow::bail!("no databases configured in {}", path.display());
    }
    Ok(config)
}

//! YAML configuration for the import and clean commands.
//!
//! The configuration is loaded once at startup, patched with command-line
//! overrides and then passed by reference to the jobs that need it.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "schema-import.yaml";

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// Number of dump rows sent per INSERT batch.
///
/// Benchmarked against a full game database import: widths between 8 and 16
/// are fastest, single-digit widths are up to 5x slower and widths above 32
/// are up to 10x slower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchSize(usize);

impl BatchSize {
    pub const MIN: usize = 2;
    pub const MAX: usize = 999;
    pub const DEFAULT: BatchSize = BatchSize(16);

    /// Create a batch size, rejecting values outside `[MIN, MAX]`.
    pub fn new(size: usize) -> anyhow::Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&size) {
            anyhow::bail!(
                "batch size {} out of range, valid values are {}-{}",
                size,
                Self::MIN,
                Self::MAX
            );
        }
        Ok(BatchSize(size))
    }

    /// Validate a configured value, falling back to [`BatchSize::DEFAULT`].
    pub fn resolve(size: i64) -> Self {
        match usize::try_from(size).map_err(anyhow::Error::from).and_then(Self::new) {
            Ok(size) => size,
            Err(_) => {
                tracing::warn!(
                    requested = size,
                    default = Self::DEFAULT.0,
                    "batch size must be between {} and {}, using default",
                    Self::MIN,
                    Self::MAX
                );
                Self::DEFAULT
            }
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for BatchSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Accept self-signed server certificates (local/dev servers)
    pub trust_cert: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: "sa".to_string(),
            password: String::new(),
            trust_cert: false,
        }
    }
}

/// Database user created inside the target database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    /// Default schema for the user
    pub schema: String,
}

/// Server login mapped to the target database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// One database to build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSpec {
    pub name: String,
    pub schemas: Vec<String>,
    pub users: Vec<UserConfig>,
    pub logins: Vec<LoginConfig>,
}

/// Import settings as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Root of the schema project (contains Templates/ and ManualSetup/)
    pub schema_dir: PathBuf,
    /// Rows per INSERT batch; validated with [`BatchSize::resolve`]
    pub batch_size: i64,
    pub databases: Vec<DatabaseSpec>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from("OpenKO-db"),
            batch_size: BatchSize::DEFAULT.get() as i64,
            databases: Vec::new(),
        }
    }
}

/// Complete YAML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub import: ImportConfig,
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_user: Option<String>,
    pub db_pass: Option<String>,
    pub schema_dir: Option<PathBuf>,
    pub batch_size: Option<i64>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides. Empty strings are treated as unset.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(user) = overrides.db_user.filter(|u| !u.is_empty()) {
            self.connection.user = user;
        }
        if let Some(pass) = overrides.db_pass.filter(|p| !p.is_empty()) {
            self.connection.password = pass;
        }
        if let Some(dir) = overrides.schema_dir {
            self.import.schema_dir = dir;
        }
        if let Some(size) = overrides.batch_size {
            self.import.batch_size = size;
        }
    }

    /// Validated batch size for the run
    pub fn batch_size(&self) -> BatchSize {
        BatchSize::resolve(self.import.batch_size)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for db in &self.import.databases {
            if db.name.trim().is_empty() {
                anyhow::bail!("database entry without a name");
            }
        }
        Ok(())
    }
}

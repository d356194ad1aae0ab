//! Schema project layout and script loading.
//!
//! A schema project holds `Templates/` (parameterized DDL rendered per run) and
//! `ManualSetup/`, `Views/`, `StoredProcedures/` with pre-rendered scripts
//! named `<step>_<Action>_<qualifier>.sql`. The step prefix only orders the
//! files for humans; the import pipeline fixes the execution order itself.

pub mod rewrite;
pub mod template;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

pub use rewrite::replace_use_database_name;
pub use template::render_template;

pub const TEMPLATES_DIR: &str = "Templates";
pub const MANUAL_SETUP_DIR: &str = "ManualSetup";
pub const VIEWS_DIR: &str = "Views";
pub const STORED_PROCS_DIR: &str = "StoredProcedures";

pub const CREATE_DATABASE_TEMPLATE: &str = "CreateDatabase.sqltemplate";
pub const CREATE_SCHEMA_TEMPLATE: &str = "CreateSchema.sqltemplate";
pub const CREATE_USER_TEMPLATE: &str = "CreateUser.sqltemplate";
pub const CREATE_LOGIN_TEMPLATE: &str = "CreateLogin.sqltemplate";

/// Script file kinds, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    CreateDatabase,
    CreateSchema,
    CreateUser,
    CreateLogin,
    CreateTable,
    InsertData,
    CreateView,
    CreateStoredProc,
}

impl ScriptKind {
    /// Step tag used as the file name prefix
    pub fn step(self) -> u8 {
        match self {
            ScriptKind::CreateDatabase => 1,
            ScriptKind::CreateSchema => 2,
            ScriptKind::CreateUser => 3,
            ScriptKind::CreateLogin => 4,
            ScriptKind::CreateTable => 5,
            ScriptKind::InsertData => 6,
            ScriptKind::CreateView => 7,
            ScriptKind::CreateStoredProc => 8,
        }
    }

    fn action(self) -> &'static str {
        match self {
            ScriptKind::CreateDatabase => "CreateDatabase",
            ScriptKind::CreateSchema => "CreateSchema",
            ScriptKind::CreateUser => "CreateUser",
            ScriptKind::CreateLogin => "CreateLogin",
            ScriptKind::CreateTable => "CreateTable",
            ScriptKind::InsertData => "InsertData",
            ScriptKind::CreateView => "CreateView",
            ScriptKind::CreateStoredProc => "CreateStoredProc",
        }
    }

    /// `<step>_<Action>_<qualifier>.sql`
    pub fn file_name(self, qualifier: &str) -> String {
        format!("{}_{}_{}.sql", self.step(), self.action(), qualifier)
    }

    /// Glob matching every file of this kind
    pub fn pattern(self) -> String {
        self.file_name("*")
    }
}

/// A SQL script and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Source file path, or a synthesized file name for rendered templates
    pub name: String,
    pub sql: String,
}

impl Script {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Load every file in `dir` matching the glob `pattern`, sorted by path.
///
/// A missing directory or a malformed pattern is an error; no matches is not.
pub fn discover_scripts(dir: &Path, pattern: &str) -> anyhow::Result<Vec<Script>> {
    if !dir.is_dir() {
        anyhow::bail!("directory {} does not exist", dir.display());
    }

    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let full_pattern = Path::new(&escaped_dir).join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(&pattern_str)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern_str, e))?
    {
        let path = entry
            .map_err(|e| anyhow::anyhow!("error reading path for pattern '{}': {}", pattern_str, e))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    files
        .into_iter()
        .map(|path| -> anyhow::Result<Script> {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            Ok(Script::new(path.display().to_string(), decode_script(&bytes)))
        })
        .collect()
}

/// Script text from raw file bytes.
///
/// UTF-16 exports (with a BOM) are transcoded, a UTF-8 BOM is dropped, and
/// anything else that is not valid UTF-8 is passed through lossily.
pub fn decode_script(bytes: &[u8]) -> String {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Read a template from `<schema_dir>/Templates/<name>`.
pub fn read_template(schema_dir: &Path, name: &str) -> anyhow::Result<String> {
    let path = schema_dir.join(TEMPLATES_DIR).join(name);
    fs::read_to_string(&path).with_context(|| format!("failed to read template {}", path.display()))
}

//! `USE` directive rewriting.
//!
//! Table scripts are exported against a placeholder database and start with
//! `USE [SomeDb]`. Before running them the directive is pointed at the database
//! being built.

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading whitespace, `USE`, then a bracketed or bare database name.
/// Anchored at the start of the script only.
static USE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\A\s*USE\s+(\[)?([^\]\s;]+)(\])?").unwrap());

/// Replace a leading `USE [db]` / `USE db` with `new_db`, keeping the bracket
/// style. Scripts without a leading `USE` are returned unchanged.
pub fn replace_use_database_name(sql: &str, new_db: &str) -> String {
    USE_DIRECTIVE
        .replace(sql, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                format!("USE [{}]", new_db)
            } else {
                format!("USE {}", new_db)
            }
        })
        .into_owned()
}

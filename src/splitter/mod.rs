//! Batch splitting for SQL Server scripts.
//!
//! Two strategies turn one script into the ordered batches sent to the server:
//!
//! - **Structural**: scripts exported by management tools separate batches with
//!   a `GO` line. `GO` is not T-SQL, so it is cut out client side.
//! - **Sliding window**: bulk insert dumps are one `INSERT ... VALUES` header
//!   followed by one comma-terminated row per line, with no separators so the
//!   files stay diff-friendly. They are re-chunked into `header + W rows`
//!   statements, where `W` is the configured [`BatchSize`].

use crate::config::BatchSize;

/// Client-side batch terminator recognised by SSMS and sqlcmd.
pub const BATCH_TERMINATOR: &str = "GO";

/// How a script is cut into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Split on `GO` separator lines.
    Structural,
    /// Re-chunk a bulk dump into windows of `BatchSize` rows.
    SlidingWindow(BatchSize),
}

impl std::fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitStrategy::Structural => write!(f, "structural"),
            SplitStrategy::SlidingWindow(size) => write!(f, "sliding window ({} rows)", size),
        }
    }
}

/// Split `sql` into executable batches using `strategy`.
pub fn split(sql: &str, strategy: SplitStrategy) -> Vec<String> {
    match strategy {
        SplitStrategy::Structural => split_batches(sql),
        SplitStrategy::SlidingWindow(size) => split_data_dump(sql, size.get()),
    }
}

/// Returns true if `line` is a batch separator line.
pub fn is_batch_terminator(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(BATCH_TERMINATOR)
}

/// Split a script on `GO` lines.
///
/// Segments are trimmed and empty segments are dropped, so the result never
/// contains blank or separator-only batches.
pub fn split_batches(sql: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        if is_batch_terminator(line) {
            segments.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    segments.push(current);

    segments
        .into_iter()
        .map(|segment| segment.trim().to_string())
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Re-chunk a bulk insert dump into batches of at most `window` rows.
///
/// Line 0 is the statement header and is repeated verbatim at the top of every
/// batch, even when blank, so a malformed dump reaches the server and fails
/// there instead of being skipped. Trailing blank lines are end-of-file
/// padding. The last row of each batch loses its trailing comma so every batch
/// is a complete statement.
pub fn split_data_dump(sql: &str, window: usize) -> Vec<String> {
    let window = window.max(1);
    let mut lines = sql.split('\n');
    let header = lines.next().unwrap_or_default();

    let mut rows: Vec<&str> = lines.collect();
    while rows.last().is_some_and(|row| row.trim().is_empty()) {
        rows.pop();
    }

    rows.chunks(window)
        .map(|chunk| {
            let mut batch = String::with_capacity(
                header.len() + chunk.iter().map(|row| row.len() + 1).sum::<usize>() + 1,
            );
            batch.push_str(header);
            batch.push('\n');
            batch.push_str(&chunk.join("\n"));
            strip_row_terminator(&mut batch);
            batch
        })
        .collect()
}

/// Remove trailing whitespace and one trailing `,` from the batch's last row.
fn strip_row_terminator(batch: &mut String) {
    let keep = batch.trim_end().len();
    batch.truncate(keep);
    if batch.ends_with(',') {
        batch.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_batch_terminator() {
        assert!(is_batch_terminator("GO"));
        assert!(is_batch_terminator("  go  "));
        assert!(is_batch_terminator("Go\r"));
        assert!(!is_batch_terminator("GO;"));
        assert!(!is_batch_terminator("GOTO label"));
        assert!(!is_batch_terminator("SELECT 'GO'"));
    }

    #[test]
    fn test_split_batches_keeps_go_inside_text() {
        let sql = "SELECT 'GO' AS word;\nGO\nEXEC dbo.GoHome;\n";
        let batches = split_batches(sql);
        assert_eq!(batches, vec!["SELECT 'GO' AS word;", "EXEC dbo.GoHome;"]);
    }

    #[test]
    fn test_split_batches_drops_consecutive_separators() {
        let sql = "GO\nGO\nSELECT 1;\nGO\n\nGO\nSELECT 2;";
        assert_eq!(split_batches(sql), vec!["SELECT 1;", "SELECT 2;"]);
    }

    #[test]
    fn test_strip_row_terminator() {
        let mut batch = "INSERT INTO t VALUES\n(1),  \r".to_string();
        strip_row_terminator(&mut batch);
        assert_eq!(batch, "INSERT INTO t VALUES\n(1)");

        let mut batch = "INSERT INTO t VALUES\n(1)".to_string();
        strip_row_terminator(&mut batch);
        assert_eq!(batch, "INSERT INTO t VALUES\n(1)");
    }

    #[test]
    fn test_split_data_dump_empty_script() {
        assert!(split_data_dump("", 16).is_empty());
        assert!(split_data_dump("\n\n", 16).is_empty());
    }
}

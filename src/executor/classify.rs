//! Classification of batch failures.
//!
//! Views and procedures are recreated with `DROP` then `CREATE`. On a freshly
//! built database the `DROP` has nothing to drop and the server reports one of
//! the messages below. Those failures are harmless; everything else is fatal.

use crate::db::ExecError;

/// Exact server message prefixes of harmless drop failures.
pub const IGNORABLE_PREFIXES: &[&str] = &["Cannot drop the view", "Cannot drop the procedure"];

/// Returns true if `err` can be skipped without affecting the import.
pub fn is_ignorable(err: &ExecError) -> bool {
    match err {
        ExecError::Server { message, .. } => IGNORABLE_PREFIXES
            .iter()
            .any(|prefix| starts_with_ignore_ascii_case(message, prefix)),
        ExecError::Driver(_) => false,
    }
}

fn starts_with_ignore_ascii_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_view_and_procedure_are_ignorable() {
        assert!(is_ignorable(&ExecError::server(
            3701,
            "Cannot drop the view 'dbo.USERDATA_VIEW', because it does not exist or you do not have permission."
        )));
        assert!(is_ignorable(&ExecError::server(
            3701,
            "Cannot drop the procedure 'ACCOUNT_LOGIN', because it does not exist or you do not have permission."
        )));
        assert!(is_ignorable(&ExecError::server(3701, "cannot drop the view X")));
    }

    #[test]
    fn test_other_errors_are_fatal() {
        assert!(!is_ignorable(&ExecError::server(3701, "cannot drop the table X")));
        assert!(!is_ignorable(&ExecError::server(
            102,
            "Incorrect syntax near 'Cannot drop the view'."
        )));
        assert!(!is_ignorable(&ExecError::server(0, "Cannot drop")));
        assert!(!is_ignorable(&ExecError::Driver(
            "Cannot drop the view v".to_string()
        )));
    }
}

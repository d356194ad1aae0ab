use schema_import::artifacts::Script;
use schema_import::cancel::CancelToken;
use schema_import::config::BatchSize;
use schema_import::db::{ConnectionTarget, DryRunProvider, ExecError};
use schema_import::executor::{ExecutionPolicy, ExecutorError, ScriptExecutor};
use std::cell::Cell;

fn view_script() -> Script {
    Script::new(
        "ManualSetup/7_CreateView_USERDATA.sql",
        "DROP VIEW [dbo].[USERDATA_VIEW]\nGO\nCREATE VIEW [dbo].[USERDATA_VIEW] AS SELECT 1 AS x\nGO\n",
    )
}

#[test]
fn test_empty_script_list_is_success() {
    let mut provider = DryRunProvider::new();
    let stats = ScriptExecutor::new(CancelToken::new())
        .execute(
            &[],
            ExecutionPolicy::structural(ConnectionTarget::TargetTransaction),
            &mut provider,
        )
        .unwrap();

    assert_eq!(stats.scripts, 0);
    assert_eq!(stats.batches, 0);
    assert!(provider.batches().is_empty());
    assert!(!provider.transaction_open());
}

#[test]
fn test_batches_run_in_order_on_target() {
    let scripts = vec![
        Script::new("a.sql", "CREATE TABLE a (id INT)\nGO\nCREATE INDEX ix_a ON a (id)"),
        Script::new("b.sql", "CREATE TABLE b (id INT)"),
    ];
    let mut provider = DryRunProvider::new();
    let stats = ScriptExecutor::new(CancelToken::new())
        .execute(
            &scripts,
            ExecutionPolicy::structural(ConnectionTarget::TargetTransaction),
            &mut provider,
        )
        .unwrap();

    assert_eq!(stats.scripts, 2);
    assert_eq!(stats.batches, 3);
    let sql: Vec<_> = provider.batches().iter().map(|b| b.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            "CREATE TABLE a (id INT)",
            "CREATE INDEX ix_a ON a (id)",
            "CREATE TABLE b (id INT)"
        ]
    );
    assert!(provider
        .batches()
        .iter()
        .all(|b| b.target == ConnectionTarget::TargetTransaction));
}

#[test]
fn test_master_policy_uses_master() {
    let mut provider = DryRunProvider::new();
    ScriptExecutor::new(CancelToken::new())
        .execute(
            &[Script::new("1_CreateDatabase_game.sql", "CREATE DATABASE [game]")],
            ExecutionPolicy::structural(ConnectionTarget::Master),
            &mut provider,
        )
        .unwrap();

    assert_eq!(provider.batches_for(ConnectionTarget::Master).len(), 1);
    assert!(!provider.transaction_open());
}

#[test]
fn test_ignorable_error_continues() {
    let mut provider = DryRunProvider::new().fail_on(
        "DROP VIEW",
        ExecError::server(
            3701,
            "Cannot drop the view 'dbo.USERDATA_VIEW', because it does not exist or you do not have permission.",
        ),
    );
    let stats = ScriptExecutor::new(CancelToken::new())
        .execute(
            &[view_script()],
            ExecutionPolicy::structural(ConnectionTarget::TargetTransaction),
            &mut provider,
        )
        .unwrap();

    assert_eq!(stats.batches, 2);
    assert_eq!(stats.ignored_errors, 1);
    assert!(provider.batches()[1].sql.starts_with("CREATE VIEW"));
}

#[test]
fn test_fatal_error_stops_everything() {
    let scripts = vec![
        Script::new("a.sql", "SELECT 1\nGO\nCREATE TABLE broken (\nGO\nSELECT 3"),
        Script::new("b.sql", "SELECT 4"),
    ];
    let mut provider = DryRunProvider::new()
        .fail_on("broken", ExecError::server(102, "Incorrect syntax near '('."));

    let err = ScriptExecutor::new(CancelToken::new())
        .execute(
            &scripts,
            ExecutionPolicy::structural(ConnectionTarget::TargetTransaction),
            &mut provider,
        )
        .unwrap_err();

    match err.downcast_ref::<ExecutorError>() {
        Some(ExecutorError::BatchFailed {
            script,
            index,
            total,
            batch,
            source,
        }) => {
            assert_eq!(script, "a.sql");
            assert_eq!(*index, 2);
            assert_eq!(*total, 3);
            assert_eq!(batch, "CREATE TABLE broken (");
            assert_eq!(source, &ExecError::server(102, "Incorrect syntax near '('."));
        }
        other => panic!("expected BatchFailed, got {:?}", other),
    }
    assert!(err.to_string().contains("[2/3] in a.sql"));

    // nothing after the failing batch was submitted
    assert_eq!(provider.batches().len(), 2);
    // the executor leaves the transaction to its owner
    assert!(provider.transaction_open());
    assert_eq!(provider.rollbacks(), 0);
}

#[test]
fn test_driver_error_is_fatal_even_with_drop_message() {
    let mut provider = DryRunProvider::new().fail_on(
        "DROP VIEW",
        ExecError::Driver("Cannot drop the view: connection reset".to_string()),
    );
    let result = ScriptExecutor::new(CancelToken::new()).execute(
        &[view_script()],
        ExecutionPolicy::structural(ConnectionTarget::TargetTransaction),
        &mut provider,
    );
    assert!(result.is_err());
    assert_eq!(provider.batches().len(), 1);
}

#[test]
fn test_cancelled_before_first_batch() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut provider = DryRunProvider::new();

    let err = ScriptExecutor::new(cancel)
        .execute(
            &[view_script()],
            ExecutionPolicy::structural(ConnectionTarget::TargetTransaction),
            &mut provider,
        )
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ExecutorError>(),
        Some(ExecutorError::Cancelled { index: 1, total: 2, .. })
    ));
    assert!(provider.batches().is_empty());
}

#[test]
fn test_data_dump_policy_and_progress() {
    let rows: Vec<String> = (0..50).map(|i| format!("({}),", i)).collect();
    let sql = format!("INSERT INTO t (id) VALUES\n{}\n", rows.join("\n"));
    let seen = Cell::new(0u64);
    let mut provider = DryRunProvider::new();

    let stats = ScriptExecutor::new(CancelToken::new())
        .with_progress(|n| seen.set(n))
        .execute(
            &[Script::new("6_InsertData_t.sql", sql)],
            ExecutionPolicy::data_dump(
                ConnectionTarget::TargetTransaction,
                BatchSize::new(16).unwrap(),
            ),
            &mut provider,
        )
        .unwrap();

    assert_eq!(stats.batches, 4);
    assert_eq!(seen.get(), 4);
    assert!(provider.batches().iter().all(|b| !b.sql.ends_with(',')));
    assert!(provider.batches()[3].sql.ends_with("(49)"));
}

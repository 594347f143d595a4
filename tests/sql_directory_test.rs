//! Integration tests for SQL file migrations

use std::fs;
use std::path::Path;
use tidemark::executor::RecordingExecutor;
use tidemark::migration::{LeaseState, LedgerStore, MemoryLedger, Migrator, SqlDirectory};

fn shipped_migrations() -> SqlDirectory {
    SqlDirectory::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
}

#[test]
fn test_shipped_migrations_run_and_revert() {
    let executor = RecordingExecutor::new();
    let ledger = MemoryLedger::new();
    let migrator = Migrator::new(executor.clone(), ledger.clone(), shipped_migrations());

    let report = migrator.run(true).unwrap();
    assert!(report.succeeded);
    assert_eq!(
        report.completed_names(),
        vec!["Migration1000_create_accounts", "Migration1001_add_account_parent"]
    );

    let statements = executor.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS accounts"));
    assert!(statements[1].contains("idx_accounts_parent_id"));

    let record = ledger.get("Migration1000_create_accounts").unwrap().unwrap();
    assert_eq!(record.notes.as_deref(), Some("Chart of accounts"));
    assert!(record.is_completed());

    let reverted = migrator.revert("all", true).unwrap();
    assert_eq!(
        reverted.completed_names(),
        vec!["Migration1001_add_account_parent", "Migration1000_create_accounts"]
    );
    assert!(ledger.all().unwrap().is_empty());
}

#[test]
fn test_missing_down_file_blocks_revert() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Migration1000_init.up.sql"), "CREATE TABLE a (id INT);").unwrap();

    let executor = RecordingExecutor::new();
    let migrator = Migrator::new(executor.clone(), MemoryLedger::new(), SqlDirectory::new(dir.path()));
    migrator.run(true).unwrap();

    let report = migrator.revert("last", false).unwrap();
    assert!(!report.succeeded);
    assert!(report.completed.is_empty());
    assert_eq!(executor.statements().len(), 1);

    let status = migrator.status().unwrap();
    assert_eq!(status.count(LeaseState::Done), 1);
}

#[test]
fn test_unreadable_directory_is_discovery_error() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RecordingExecutor::new();
    let migrator = Migrator::new(
        executor.clone(),
        MemoryLedger::new(),
        SqlDirectory::new(dir.path().join("missing")),
    );

    let err = migrator.run(false).unwrap_err();
    assert!(err.to_string().contains("migrations directory not found"));
    assert!(executor.statements().is_empty());
}

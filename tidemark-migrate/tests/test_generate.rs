//! Tests for migration file scaffolding

use std::fs;
use tidemark::migration::file::discover_migration_files;
use tidemark::migration::{MigrationSource, SqlDirectory};
use tidemark_migrate::generate::{generate_migration, next_number, FIRST_NUMBER};

#[test]
fn test_next_number_empty() {
    assert_eq!(next_number(Vec::<&str>::new()), FIRST_NUMBER);
}

#[test]
fn test_next_number_uses_numeric_maximum() {
    let names = ["Migration999_a", "Migration1000_b", "Migration0002_c", "seed_data"];
    assert_eq!(next_number(names), 1001);
}

#[test]
fn test_generate_creates_pair() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");

    let generated = generate_migration(&migrations, "create_users").unwrap();
    assert_eq!(generated.name, "Migration1000_create_users");
    assert!(generated.up_path.exists());
    assert!(generated.down_path.exists());

    let up = fs::read_to_string(&generated.up_path).unwrap();
    assert!(up.starts_with("-- create_users"));

    let files = discover_migration_files(&migrations).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "Migration1000_create_users");
    assert_eq!(files[0].down_path.as_ref(), Some(&generated.down_path));
}

#[test]
fn test_generate_numbers_after_existing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Migration1041_add_index.up.sql"), "SELECT 1;").unwrap();

    let generated = generate_migration(dir.path(), "add_orders").unwrap();
    assert_eq!(generated.name, "Migration1042_add_orders");

    let next = generate_migration(dir.path(), "add_invoices").unwrap();
    assert_eq!(next.name, "Migration1043_add_invoices");
}

#[test]
fn test_generate_rejects_bad_name() {
    let dir = tempfile::tempdir().unwrap();
    let err = generate_migration(dir.path(), "drop table users").unwrap_err();
    assert!(err.to_string().contains("invalid migration name"));
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_generated_notes_are_the_name_only() {
    let dir = tempfile::tempdir().unwrap();
    generate_migration(dir.path(), "create_users").unwrap();

    let migrations = SqlDirectory::new(dir.path()).migrations().unwrap();
    assert_eq!(migrations.len(), 1);
    assert_eq!(migrations[0].notes(), Some("create_users"));
    assert!(migrations[0].is_reversible());
}

//! # Tidemark
//!
//! Ordered schema migrations with a lease-protected ledger.
//!
//! Migrations are discovered from a [`MigrationSource`](migration::MigrationSource),
//! ordered by name, and applied one at a time by the
//! [`Migrator`](migration::Migrator). Every attempt is recorded in a ledger table
//! so a later run resumes exactly where an earlier one stopped.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;

pub use connection::{connect, ConnectionError};
pub use executor::{DbError, Executor, PgExecutor, RecordingExecutor};
pub use migration::{
    MigrationDefinition, MigrationError, MigrationReport, Migrator, RevertTarget,
};

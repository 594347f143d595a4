//! Migration system for Tidemark
//!
//! This module provides the infrastructure for ordered schema migrations:
//! - Migration definitions and the context their steps run in
//! - A catalog that discovers and orders migrations
//! - A ledger of attempts, with a lease policy for detecting stuck runs
//! - The `Migrator`, which runs and reverts batches
//!
//! # Example
//!
//! ```rust
//! use tidemark::executor::RecordingExecutor;
//! use tidemark::migration::{MemoryLedger, MigrationDefinition, MigrationSet, Migrator};
//!
//! let migrations = MigrationSet::new()
//!     .with(
//!         MigrationDefinition::new("Migration1000", |ctx| {
//!             ctx.execute("CREATE TABLE users (id BIGSERIAL PRIMARY KEY, email TEXT NOT NULL UNIQUE)")?;
//!             Ok(())
//!         })
//!         .with_down(|ctx| {
//!             ctx.execute("DROP TABLE users")?;
//!             Ok(())
//!         }),
//!     );
//!
//! let migrator = Migrator::new(RecordingExecutor::new(), MemoryLedger::new(), migrations);
//! migrator.run(true).unwrap();
//! let reverted = migrator.revert("all", true).unwrap();
//! assert_eq!(reverted.completed_names(), vec!["Migration1000"]);
//! ```

pub mod error;
pub mod file;
pub mod lease;
pub mod ledger;
pub mod migration;
pub mod migrator;
pub mod ordering;
pub mod record;
pub mod registry;
pub mod startup;
pub mod state_table;
pub mod status;

pub use error::{BoxError, LedgerError, MigrationError};
pub use file::{MigrationFile, SqlDirectory};
pub use lease::{classify, LeaseState};
pub use ledger::{LedgerStore, MemoryLedger};
pub use migration::{Direction, MigrationContext, MigrationDefinition};
pub use migrator::{Migrator, RevertTarget, DEFAULT_LEASE_TIMEOUT};
pub use ordering::compare_names;
pub use record::MigrationRecord;
pub use registry::{Catalog, MigrationSet, MigrationSource};
pub use startup::{pg_migrator, startup_migrations};
pub use state_table::PgLedger;
pub use status::{MigrationReport, MigrationStatus, MigrationStatusEntry};

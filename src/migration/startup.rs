//! In-process migration execution helpers

use crate::config::MigratorConfig;
use crate::connection::connect;
use crate::executor::PgExecutor;
use crate::migration::{LedgerError, MigrationError, MigrationReport, Migrator, PgLedger, SqlDirectory};

/// Build a migrator for PostgreSQL and the SQL files in `config.migrations_dir`
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the database cannot be
/// reached.
pub fn pg_migrator(config: &MigratorConfig) -> Result<Migrator, MigrationError> {
    config.validate()?;

    let client = connect(&config.database_url).map_err(LedgerError::from)?;

    let ledger = PgLedger::new(client.clone(), config.table.clone())?;
    let migrator = Migrator::new(
        PgExecutor::new(client),
        ledger,
        SqlDirectory::new(&config.migrations_dir),
    )
    .with_timeout(config.lease_timeout());

    Ok(migrator)
}

/// Run migrations on application startup
///
/// Applies every pending migration and fails fast: any halting condition,
/// including a lease held by another instance, is returned as an error so the
/// application does not start against a partially migrated database.
///
/// # Example
///
/// ```rust,no_run
/// use tidemark::{config::MigratorConfig, migration::startup_migrations};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = MigratorConfig::load()?;
///     startup_migrations(&config)?;
///
///     // Continue with application startup...
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// Returns `MigrationError` if the migrator cannot be built or the run halts.
pub fn startup_migrations(config: &MigratorConfig) -> Result<MigrationReport, MigrationError> {
    let migrator = pg_migrator(config)?;
    let report = migrator.run(true)?;

    if report.completed.is_empty() {
        log::debug!("No pending migrations to apply");
    } else {
        log::info!("Applied {} migration(s) on startup", report.completed.len());
    }

    Ok(report)
}

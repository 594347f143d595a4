//! Migration-specific error types

use crate::connection::ConnectionError;
use crate::executor::DbError;
use crate::migration::Direction;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error type returned by user supplied `up`/`down` steps
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a ledger store
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger database could not be reached
    #[error("Ledger connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The backing database rejected a ledger statement
    #[error("Ledger database error: {0}")]
    Database(#[from] DbError),

    /// A ledger row could not be decoded
    #[error("Ledger row for '{name}' could not be decoded: {reason}")]
    Decode { name: String, reason: String },

    /// The configured ledger table name is not a plain SQL identifier
    #[error("Invalid ledger table name '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidTableName(String),

    /// The in-memory ledger lock was poisoned by a panicking writer
    #[error("Ledger lock poisoned: {0}")]
    Poisoned(String),
}

/// Migration-specific errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The catalog could not enumerate migrations; nothing was executed
    #[error("Migration discovery failed: {0}")]
    Discovery(String),

    /// Another runner holds a fresh lease on this migration
    #[error(
        "Migration '{name}' is in progress (attempt started {created_date}, lease expires {expires_at}).\n\
         Another process may be running migrations. Wait for it to finish or for the lease to expire."
    )]
    LeaseHeld {
        name: String,
        created_date: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },

    /// A revert reached a ledger row whose last attempt never finished
    #[error(
        "Migration '{name}' has an unfinished attempt (started {created_date}).\n\
         Finish it with a run, or clear its ledger row, before reverting past it."
    )]
    UnfinishedAttempt {
        name: String,
        created_date: DateTime<Utc>,
    },

    /// A migration step failed; earlier migrations in the batch stay applied
    #[error("Migration '{name}' failed during {direction}: {source}")]
    Execution {
        name: String,
        direction: Direction,
        #[source]
        source: BoxError,
    },

    /// A revert selected a migration without a `down` step
    #[error("Migration '{name}' cannot be reverted: it has no down step")]
    NotReversible { name: String },

    /// A revert target names a migration the catalog does not know
    #[error("Unknown migration '{0}'")]
    UnknownMigration(String),

    /// The ledger store is unreachable or rejected an operation
    #[error(transparent)]
    LedgerStorage(#[from] LedgerError),

    /// Invalid migrator configuration
    #[error("Invalid migration configuration: {0}")]
    Config(String),
}

impl MigrationError {
    /// Conditions that `throw_if_error = false` turns into an unsuccessful report
    ///
    /// Discovery, storage and configuration failures are always raised.
    #[must_use]
    pub fn is_batch_halt(&self) -> bool {
        matches!(
            self,
            MigrationError::LeaseHeld { .. }
                | MigrationError::UnfinishedAttempt { .. }
                | MigrationError::Execution { .. }
                | MigrationError::NotReversible { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_keeps_source() {
        let err = MigrationError::Execution {
            name: "Migration1001".to_string(),
            direction: Direction::Up,
            source: "relation already exists".into(),
        };
        let display = err.to_string();
        assert!(display.contains("Migration1001"));
        assert!(display.contains("up"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_ledger_error_converts() {
        let err: MigrationError = LedgerError::InvalidTableName("bad name".to_string()).into();
        assert!(matches!(err, MigrationError::LedgerStorage(_)));
        assert!(err.to_string().contains("bad name"));
        assert!(!err.is_batch_halt());
    }

    #[test]
    fn test_batch_halt_classification() {
        assert!(MigrationError::NotReversible { name: "m".into() }.is_batch_halt());
        assert!(MigrationError::UnfinishedAttempt {
            name: "m".into(),
            created_date: Utc::now(),
        }
        .is_batch_halt());
        assert!(!MigrationError::Discovery("x".into()).is_batch_halt());
        assert!(!MigrationError::UnknownMigration("x".into()).is_batch_halt());
    }
}

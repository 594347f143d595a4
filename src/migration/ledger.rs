//! Ledger storage: the persisted record of migration attempts

use crate::migration::{LedgerError, MigrationRecord};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage for ledger rows, keyed by migration name
///
/// Every mutation is a full-row upsert or delete; there are no partial updates.
pub trait LedgerStore {
    /// Create the ledger if it does not exist (idempotent)
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the store is unreachable.
    fn ensure_table(&self) -> Result<(), LedgerError>;

    /// Fetch the row for `name`
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the store is unreachable or the row is malformed.
    fn get(&self, name: &str) -> Result<Option<MigrationRecord>, LedgerError>;

    /// Fetch every row
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the store is unreachable or a row is malformed.
    fn all(&self) -> Result<Vec<MigrationRecord>, LedgerError>;

    /// Insert the row, replacing any existing row with the same name
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the write fails.
    fn upsert(&self, record: &MigrationRecord) -> Result<(), LedgerError>;

    /// Remove the row for `name`; returns whether a row existed
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the delete fails.
    fn delete(&self, name: &str) -> Result<bool, LedgerError>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for Box<T> {
    fn ensure_table(&self) -> Result<(), LedgerError> {
        (**self).ensure_table()
    }

    fn get(&self, name: &str) -> Result<Option<MigrationRecord>, LedgerError> {
        (**self).get(name)
    }

    fn all(&self) -> Result<Vec<MigrationRecord>, LedgerError> {
        (**self).all()
    }

    fn upsert(&self, record: &MigrationRecord) -> Result<(), LedgerError> {
        (**self).upsert(record)
    }

    fn delete(&self, name: &str) -> Result<bool, LedgerError> {
        (**self).delete(name)
    }
}

/// In-process ledger
///
/// Clones share the same rows. Rows are only visible after `ensure_table`,
/// matching a database-backed ledger that has not been created yet.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<MemoryLedgerState>>,
}

#[derive(Debug, Default)]
struct MemoryLedgerState {
    created: bool,
    rows: BTreeMap<String, MigrationRecord>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that already exists and holds `records`
    ///
    /// Useful for seeding a known state.
    pub fn with_records(records: impl IntoIterator<Item = MigrationRecord>) -> Self {
        let ledger = Self::new();
        if let Ok(mut state) = ledger.inner.lock() {
            state.created = true;
            for record in records {
                state.rows.insert(record.name.clone(), record);
            }
        }
        ledger
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryLedgerState>, LedgerError> {
        self.inner
            .lock()
            .map_err(|e| LedgerError::Poisoned(e.to_string()))
    }

    fn missing_table() -> LedgerError {
        LedgerError::Database(crate::executor::DbError::QueryError(
            "ledger table does not exist".to_string(),
        ))
    }
}

impl LedgerStore for MemoryLedger {
    fn ensure_table(&self) -> Result<(), LedgerError> {
        self.state()?.created = true;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<MigrationRecord>, LedgerError> {
        let state = self.state()?;
        if !state.created {
            return Err(Self::missing_table());
        }
        Ok(state.rows.get(name).cloned())
    }

    fn all(&self) -> Result<Vec<MigrationRecord>, LedgerError> {
        let state = self.state()?;
        if !state.created {
            return Err(Self::missing_table());
        }
        Ok(state.rows.values().cloned().collect())
    }

    fn upsert(&self, record: &MigrationRecord) -> Result<(), LedgerError> {
        let mut state = self.state()?;
        if !state.created {
            return Err(Self::missing_table());
        }
        log::debug!("ledger upsert: {}", record.name);
        state.rows.insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, LedgerError> {
        let mut state = self.state()?;
        if !state.created {
            return Err(Self::missing_table());
        }
        log::debug!("ledger delete: {name}");
        Ok(state.rows.remove(name).is_some())
    }
}

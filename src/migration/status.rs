//! Migration status tracking

use crate::migration::{LeaseState, MigrationDefinition, MigrationError, MigrationRecord};

/// One catalog entry and its ledger state
#[derive(Debug, Clone)]
pub struct MigrationStatusEntry {
    pub migration: MigrationDefinition,
    pub state: LeaseState,
    pub record: Option<MigrationRecord>,
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Every catalog migration in migration order
    pub entries: Vec<MigrationStatusEntry>,

    /// Ledger rows whose migration is no longer in the catalog
    pub orphaned: Vec<MigrationRecord>,
}

impl MigrationStatus {
    #[must_use]
    pub fn new(entries: Vec<MigrationStatusEntry>, orphaned: Vec<MigrationRecord>) -> Self {
        Self { entries, orphaned }
    }

    /// Number of entries in `state`
    #[must_use]
    pub fn count(&self, state: LeaseState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    /// Migrations a `run` would still have to apply
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.state != LeaseState::Done).count()
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count() == 0
    }

    /// The newest completed migration
    #[must_use]
    pub fn latest_completed(&self) -> Option<&MigrationDefinition> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.state == LeaseState::Done)
            .map(|e| &e.migration)
    }
}

/// Outcome of one `run`, `revert`, `up` or `down` call
///
/// `completed` lists exactly the migrations executed by this call, in
/// execution order. When the call halted and the caller asked not to raise,
/// `error` holds the reason.
#[derive(Debug)]
pub struct MigrationReport {
    pub succeeded: bool,
    pub completed: Vec<MigrationDefinition>,
    pub error: Option<MigrationError>,
}

impl MigrationReport {
    #[must_use]
    pub fn success(completed: Vec<MigrationDefinition>) -> Self {
        Self {
            succeeded: true,
            completed,
            error: None,
        }
    }

    #[must_use]
    pub fn halted(completed: Vec<MigrationDefinition>, error: MigrationError) -> Self {
        Self {
            succeeded: false,
            completed,
            error: Some(error),
        }
    }

    /// Names of the executed migrations
    #[must_use]
    pub fn completed_names(&self) -> Vec<&str> {
        self.completed.iter().map(MigrationDefinition::name).collect()
    }
}

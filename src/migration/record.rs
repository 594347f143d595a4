//! `MigrationRecord` - one row of the migration ledger

use chrono::{DateTime, Utc};

/// The current ledger row for a migration
///
/// There is at most one row per name; every new attempt overwrites it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Migration name (ledger key)
    pub name: String,

    /// When the current attempt started
    pub created_date: DateTime<Utc>,

    /// When the current attempt finished successfully (`None` while in flight or after a failure)
    pub completed_date: Option<DateTime<Utc>>,

    /// Notes copied from the migration definition
    pub notes: Option<String>,

    /// Lines the migration logged during the attempt
    pub log: Option<String>,

    /// Error message of the failed attempt
    pub error_message: Option<String>,
}

impl MigrationRecord {
    /// Start a new attempt at `created_date`
    #[must_use]
    pub fn started(name: impl Into<String>, created_date: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_date,
            completed_date: None,
            notes: None,
            log: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = notes.map(str::to_string);
        self
    }

    /// Mark the attempt completed
    ///
    /// The completion time never precedes the start time, even if the clock
    /// moved backwards during the attempt.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.completed_date = Some(at.max(self.created_date));
        self.error_message = None;
    }

    /// Record a failed attempt; the row stays incomplete
    pub fn fail(&mut self, message: impl Into<String>) {
        self.completed_date = None;
        self.error_message = Some(message.into());
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_date.is_some()
    }
}

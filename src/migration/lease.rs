//! Lease policy over ledger rows
//!
//! An incomplete ledger row doubles as a lease: while it is younger than the
//! lease timeout the migration is assumed to be running in another process.
//! Once the timeout has passed the attempt is presumed dead and may be retried.
//!
//! Two runners that read the ledger within the same instant can both see
//! `Pending` and both start the migration. The lease narrows that window but
//! does not close it.

use crate::migration::MigrationRecord;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Ledger state of a single migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseState {
    /// No ledger row
    Pending,
    /// Completed
    Done,
    /// Incomplete row younger than the lease timeout
    InProgress,
    /// Incomplete row whose lease expired
    Stale,
}

impl LeaseState {
    /// Whether a runner may start (or restart) this migration
    #[must_use]
    pub fn is_runnable(self) -> bool {
        matches!(self, LeaseState::Pending | LeaseState::Stale)
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeaseState::Pending => "pending",
            LeaseState::Done => "done",
            LeaseState::InProgress => "in progress",
            LeaseState::Stale => "stale",
        };
        f.write_str(s)
    }
}

/// Classify a ledger row at `now` under `timeout`
///
/// A row created in the future (clock skew between runners) counts as a fresh
/// lease.
#[must_use]
pub fn classify(record: Option<&MigrationRecord>, now: DateTime<Utc>, timeout: Duration) -> LeaseState {
    match record {
        None => LeaseState::Pending,
        Some(r) if r.completed_date.is_some() => LeaseState::Done,
        Some(r) if now - r.created_date < timeout => LeaseState::InProgress,
        Some(_) => LeaseState::Stale,
    }
}

/// When the lease on `record` runs out
#[must_use]
pub fn lease_expires_at(record: &MigrationRecord, timeout: Duration) -> DateTime<Utc> {
    record
        .created_date
        .checked_add_signed(timeout)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

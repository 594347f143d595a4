//! Migrator - Core migration execution engine

use crate::executor::Executor;
use crate::migration::lease::{classify, lease_expires_at, LeaseState};
use crate::migration::{
    compare_names, Catalog, Direction, LedgerStore, MigrationContext, MigrationDefinition,
    MigrationError, MigrationRecord, MigrationReport, MigrationSource, MigrationStatus,
    MigrationStatusEntry,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Default lease timeout: 10 minutes
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// What a revert rolls back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTarget {
    /// Every completed migration, newest first
    All,
    /// Only the newest completed migration
    Last,
    /// Every completed migration at or after the named one, newest first
    Name(String),
}

impl RevertTarget {
    pub const ALL: &'static str = "all";
    pub const LAST: &'static str = "last";
}

impl FromStr for RevertTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            _ if s.eq_ignore_ascii_case(Self::ALL) => RevertTarget::All,
            _ if s.eq_ignore_ascii_case(Self::LAST) => RevertTarget::Last,
            name => RevertTarget::Name(name.to_string()),
        })
    }
}

impl From<&str> for RevertTarget {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(target) => target,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for RevertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertTarget::All => f.write_str(Self::ALL),
            RevertTarget::Last => f.write_str(Self::LAST),
            RevertTarget::Name(name) => f.write_str(name),
        }
    }
}

/// Core migration execution engine
///
/// The `Migrator` composes a migration source, a ledger store and a database
/// executor. Migrations run strictly one at a time: ascending for [`run`],
/// descending for [`revert`].
///
/// [`run`]: Migrator::run
/// [`revert`]: Migrator::revert
///
/// # Example
///
/// ```rust
/// use tidemark::executor::RecordingExecutor;
/// use tidemark::migration::{MemoryLedger, MigrationDefinition, MigrationSet, Migrator};
///
/// let migrations = MigrationSet::new()
///     .with(MigrationDefinition::new("Migration1000", |ctx| {
///         ctx.execute("CREATE TABLE contact (id BIGINT PRIMARY KEY)")?;
///         Ok(())
///     }));
///
/// let migrator = Migrator::new(RecordingExecutor::new(), MemoryLedger::new(), migrations);
/// let report = migrator.run(true).unwrap();
/// assert_eq!(report.completed_names(), vec!["Migration1000"]);
///
/// // Running again is a no-op
/// assert!(migrator.run(true).unwrap().completed.is_empty());
/// ```
pub struct Migrator {
    executor: Box<dyn Executor>,
    ledger: Box<dyn LedgerStore>,
    source: Box<dyn MigrationSource>,
    timeout: Duration,
}

impl Migrator {
    /// Create a migrator with the default lease timeout
    pub fn new<E, L, S>(executor: E, ledger: L, source: S) -> Self
    where
        E: Executor + 'static,
        L: LedgerStore + 'static,
        S: MigrationSource + 'static,
    {
        Self {
            executor: Box::new(executor),
            ledger: Box::new(ledger),
            source: Box::new(source),
            timeout: DEFAULT_LEASE_TIMEOUT,
        }
    }

    /// Override how long an incomplete attempt counts as in progress
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lease_timeout(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::MAX)
    }

    fn ledger_rows(&self) -> Result<HashMap<String, MigrationRecord>, MigrationError> {
        Ok(self
            .ledger
            .all()?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect())
    }

    /// Apply every pending migration in ascending order
    ///
    /// Completed migrations are skipped. Pending and stale ones are leased,
    /// executed and marked completed one at a time. The batch stops at the
    /// first migration another runner holds a fresh lease on, or at the first
    /// failure; later migrations are left untouched.
    ///
    /// # Arguments
    ///
    /// * `throw_if_error` - raise halting conditions as errors; when `false`
    ///   they produce a report with `succeeded == false` and the migrations
    ///   completed before the halt
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` or `MigrationError::LedgerStorage`
    /// regardless of `throw_if_error`. With `throw_if_error`, also returns
    /// `MigrationError::LeaseHeld` or `MigrationError::Execution`.
    pub fn run(&self, throw_if_error: bool) -> Result<MigrationReport, MigrationError> {
        self.ledger.ensure_table()?;
        let migrations = Catalog::discover(self.source.as_ref())?;
        let records = self.ledger_rows()?;
        let timeout = self.lease_timeout();

        let mut completed = Vec::new();

        for migration in migrations {
            let now = Utc::now();
            let record = records.get(migration.name());

            match classify(record, now, timeout) {
                LeaseState::Done => {
                    log::debug!("Skipping completed migration {}", migration.name());
                    continue;
                }
                LeaseState::InProgress => {
                    let err = lease_held(&migration, record, now, timeout);
                    return halt(completed, err, throw_if_error);
                }
                LeaseState::Stale => {
                    log::warn!(
                        "Reclaiming stale lease on migration {} (attempt started {})",
                        migration.name(),
                        record.map_or(now, |r| r.created_date)
                    );
                }
                LeaseState::Pending => {}
            }

            if let Err(err) = apply(self.executor.as_ref(), self.ledger.as_ref(), &migration, Direction::Up) {
                return halt(completed, err, throw_if_error);
            }
            completed.push(migration);
        }

        if completed.is_empty() {
            log::debug!("No pending migrations to apply");
        } else {
            log::info!("Applied {} migration(s)", completed.len());
        }
        Ok(MigrationReport::success(completed))
    }

    /// Roll back completed migrations in descending order
    ///
    /// The selection is resolved against every migration with a ledger row.
    /// Rows are visited newest first: completed ones are rolled back, and the
    /// walk stops at the first unfinished attempt, whether its lease is still
    /// held or has gone stale. Every migration that would be rolled back must
    /// have a `down` step; if one does not, nothing is rolled back.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::UnknownMigration` if a named target is not in
    /// the catalog, and `MigrationError::Discovery` or
    /// `MigrationError::LedgerStorage` regardless of `throw_if_error`. With
    /// `throw_if_error`, also returns `MigrationError::LeaseHeld`,
    /// `MigrationError::UnfinishedAttempt`, `MigrationError::NotReversible` or
    /// `MigrationError::Execution`.
    pub fn revert(
        &self,
        target: impl Into<RevertTarget>,
        throw_if_error: bool,
    ) -> Result<MigrationReport, MigrationError> {
        let target = target.into();
        self.ledger.ensure_table()?;
        let migrations = Catalog::discover(self.source.as_ref())?;

        if let RevertTarget::Name(name) = &target {
            if !migrations.iter().any(|m| m.name() == name) {
                return Err(MigrationError::UnknownMigration(name.clone()));
            }
        }

        let records = self.ledger_rows()?;
        let attempted: Vec<MigrationDefinition> = migrations
            .into_iter()
            .filter(|m| records.contains_key(m.name()))
            .collect();

        let mut selected = select_for_revert(attempted, &target);
        selected.reverse();

        // Newest first; stop at the first unfinished attempt
        let now = Utc::now();
        let timeout = self.lease_timeout();
        let mut plan = Vec::with_capacity(selected.len());
        let mut blocker = None;
        for migration in selected {
            let record = records.get(migration.name());
            match classify(record, now, timeout) {
                LeaseState::Done => plan.push(migration),
                LeaseState::InProgress => {
                    blocker = Some(lease_held(&migration, record, now, timeout));
                    break;
                }
                LeaseState::Stale => {
                    log::warn!(
                        "Migration {} has an unfinished attempt; halting revert",
                        migration.name()
                    );
                    blocker = Some(MigrationError::UnfinishedAttempt {
                        name: migration.name().to_string(),
                        created_date: record.map_or(now, |r| r.created_date),
                    });
                    break;
                }
                LeaseState::Pending => {}
            }
        }

        if let Some(migration) = plan.iter().find(|m| !m.is_reversible()) {
            let err = MigrationError::NotReversible {
                name: migration.name().to_string(),
            };
            return halt(Vec::new(), err, throw_if_error);
        }

        let mut completed = Vec::with_capacity(plan.len());
        for migration in plan {
            if let Err(err) = apply(self.executor.as_ref(), self.ledger.as_ref(), &migration, Direction::Down) {
                return halt(completed, err, throw_if_error);
            }
            completed.push(migration);
        }

        if let Some(err) = blocker {
            return halt(completed, err, throw_if_error);
        }

        log::info!("Reverted {} migration(s) (target: {target})", completed.len());
        Ok(MigrationReport::success(completed))
    }

    /// Ledger state of every catalog migration
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` or `MigrationError::LedgerStorage`.
    pub fn status(&self) -> Result<MigrationStatus, MigrationError> {
        self.ledger.ensure_table()?;
        let migrations = Catalog::discover(self.source.as_ref())?;
        let mut records = self.ledger_rows()?;
        let now = Utc::now();
        let timeout = self.lease_timeout();

        let entries = migrations
            .into_iter()
            .map(|migration| {
                let record = records.remove(migration.name());
                MigrationStatusEntry {
                    state: classify(record.as_ref(), now, timeout),
                    migration,
                    record,
                }
            })
            .collect();

        let mut orphaned: Vec<MigrationRecord> = records.into_values().collect();
        orphaned.sort_by(|a, b| compare_names(&a.name, &b.name));

        Ok(MigrationStatus::new(entries, orphaned))
    }

    /// Apply `migrations` in the given order, ignoring leases
    ///
    /// Every migration is leased, run and marked completed exactly as in
    /// [`Migrator::run`], but ledger state is not consulted first. Intended for
    /// seeding known states.
    ///
    /// # Errors
    ///
    /// Returns the first error; migrations before it stay applied.
    pub fn up(
        executor: &dyn Executor,
        ledger: &dyn LedgerStore,
        migrations: &[MigrationDefinition],
    ) -> Result<MigrationReport, MigrationError> {
        apply_all(executor, ledger, migrations, Direction::Up)
    }

    /// Roll back `migrations` in the given order, ignoring ledger state
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::NotReversible` when reaching a migration
    /// without a `down` step, or the first execution error.
    pub fn down(
        executor: &dyn Executor,
        ledger: &dyn LedgerStore,
        migrations: &[MigrationDefinition],
    ) -> Result<MigrationReport, MigrationError> {
        apply_all(executor, ledger, migrations, Direction::Down)
    }
}

fn select_for_revert(done: Vec<MigrationDefinition>, target: &RevertTarget) -> Vec<MigrationDefinition> {
    match target {
        RevertTarget::All => done,
        RevertTarget::Last => done.into_iter().last().into_iter().collect(),
        RevertTarget::Name(name) => done
            .into_iter()
            .filter(|m| compare_names(m.name(), name) != Ordering::Less)
            .collect(),
    }
}

fn lease_held(
    migration: &MigrationDefinition,
    record: Option<&MigrationRecord>,
    now: DateTime<Utc>,
    timeout: chrono::Duration,
) -> MigrationError {
    let created_date = record.map_or(now, |r| r.created_date);
    let expires_at = record.map_or(now, |r| lease_expires_at(r, timeout));
    log::warn!(
        "Migration {} is in progress since {created_date}; halting batch",
        migration.name()
    );
    MigrationError::LeaseHeld {
        name: migration.name().to_string(),
        created_date,
        expires_at,
    }
}

fn halt(
    completed: Vec<MigrationDefinition>,
    err: MigrationError,
    throw_if_error: bool,
) -> Result<MigrationReport, MigrationError> {
    if throw_if_error || !err.is_batch_halt() {
        Err(err)
    } else {
        Ok(MigrationReport::halted(completed, err))
    }
}

fn apply_all(
    executor: &dyn Executor,
    ledger: &dyn LedgerStore,
    migrations: &[MigrationDefinition],
    direction: Direction,
) -> Result<MigrationReport, MigrationError> {
    ledger.ensure_table()?;
    for migration in migrations {
        apply(executor, ledger, migration, direction)?;
    }
    Ok(MigrationReport::success(migrations.to_vec()))
}

/// Run one migration step with ledger bookkeeping around it
///
/// The row is (re)written with a fresh `created_date` before the step runs.
/// On success an `up` completes the row and a `down` deletes it; on failure the
/// row stays incomplete with the error message attached.
fn apply(
    executor: &dyn Executor,
    ledger: &dyn LedgerStore,
    migration: &MigrationDefinition,
    direction: Direction,
) -> Result<(), MigrationError> {
    let step = migration
        .step(direction)
        .ok_or_else(|| MigrationError::NotReversible {
            name: migration.name().to_string(),
        })?;

    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("migration", name = migration.name(), direction = %direction).entered();

    let mut record = MigrationRecord::started(migration.name(), Utc::now()).with_notes(migration.notes());
    ledger.upsert(&record)?;

    let start = Instant::now();
    let ctx = MigrationContext::new(executor);
    let result = step(&ctx);
    record.log = ctx.take_log();

    match result {
        Ok(()) => {
            match direction {
                Direction::Up => {
                    record.complete(Utc::now());
                    ledger.upsert(&record)?;
                }
                Direction::Down => {
                    ledger.delete(migration.name())?;
                }
            }
            log::info!(
                "Migration {} {direction} completed in {}ms",
                migration.name(),
                start.elapsed().as_millis()
            );
            Ok(())
        }
        Err(source) => {
            log::error!("Migration {} {direction} failed: {source}", migration.name());
            record.fail(source.to_string());
            if let Err(e) = ledger.upsert(&record) {
                log::warn!("Failed to record error for migration {}: {e}", migration.name());
            }
            Err(MigrationError::Execution {
                name: migration.name().to_string(),
                direction,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use crate::migration::{MemoryLedger, MigrationSet};

    fn reversible(name: &'static str) -> MigrationDefinition {
        MigrationDefinition::new(name, move |ctx| {
            ctx.execute(&format!("CREATE TABLE {name} (id INT)"))?;
            Ok(())
        })
        .with_down(move |ctx| {
            ctx.execute(&format!("DROP TABLE {name}"))?;
            Ok(())
        })
    }

    #[test]
    fn test_revert_target_parsing() {
        assert_eq!(RevertTarget::from("all"), RevertTarget::All);
        assert_eq!(RevertTarget::from("LAST"), RevertTarget::Last);
        assert_eq!(
            RevertTarget::from("Migration1001"),
            RevertTarget::Name("Migration1001".to_string())
        );
        assert_eq!(RevertTarget::Last.to_string(), "last");
    }

    #[test]
    fn test_select_for_revert() {
        let done = vec![reversible("m1"), reversible("m2"), reversible("m10")];
        let names = |v: Vec<MigrationDefinition>| v.iter().map(|m| m.name().to_string()).collect::<Vec<_>>();

        assert_eq!(names(select_for_revert(done.clone(), &RevertTarget::All)), vec!["m1", "m2", "m10"]);
        assert_eq!(names(select_for_revert(done.clone(), &RevertTarget::Last)), vec!["m10"]);
        assert_eq!(
            names(select_for_revert(done.clone(), &RevertTarget::Name("m2".into()))),
            vec!["m2", "m10"]
        );
        assert!(select_for_revert(Vec::new(), &RevertTarget::Last).is_empty());
    }

    #[test]
    fn test_default_timeout() {
        let migrator = Migrator::new(RecordingExecutor::new(), MemoryLedger::new(), MigrationSet::new());
        assert_eq!(migrator.timeout(), DEFAULT_LEASE_TIMEOUT);

        let migrator = migrator.with_timeout(Duration::from_secs(30));
        assert_eq!(migrator.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_apply_records_log_and_completion() {
        let executor = RecordingExecutor::new();
        let ledger = MemoryLedger::new();
        ledger.ensure_table().unwrap();

        let migration = MigrationDefinition::new("Migration1000", |ctx| {
            ctx.log("seeding");
            Ok(())
        })
        .with_notes("seed data");

        apply(&executor, &ledger, &migration, Direction::Up).unwrap();

        let record = ledger.get("Migration1000").unwrap().unwrap();
        assert!(record.is_completed());
        assert_eq!(record.log.as_deref(), Some("seeding"));
        assert_eq!(record.notes.as_deref(), Some("seed data"));
    }

    #[test]
    fn test_apply_failure_leaves_incomplete_row() {
        let executor = RecordingExecutor::new();
        executor.fail_on("CREATE TABLE broken");
        let ledger = MemoryLedger::new();
        ledger.ensure_table().unwrap();

        let err = apply(&executor, &ledger, &reversible("broken"), Direction::Up).unwrap_err();
        assert!(matches!(err, MigrationError::Execution { direction: Direction::Up, .. }));

        let record = ledger.get("broken").unwrap().unwrap();
        assert!(!record.is_completed());
        assert!(record.error_message.unwrap().contains("statement rejected"));
    }

    #[test]
    fn test_apply_down_without_step_is_not_reversible() {
        let executor = RecordingExecutor::new();
        let ledger = MemoryLedger::new();
        ledger.ensure_table().unwrap();

        let migration = MigrationDefinition::new("Migration1000", |_| Ok(()));
        let err = apply(&executor, &ledger, &migration, Direction::Down).unwrap_err();
        assert!(matches!(err, MigrationError::NotReversible { .. }));
        assert!(ledger.all().unwrap().is_empty());
    }
}

//! Migration definition and the context its steps run in

use crate::executor::{DbError, Executor};
use crate::migration::error::BoxError;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// Signature shared by `up` and `down` steps
pub type MigrationStep = dyn Fn(&MigrationContext<'_>) -> Result<(), BoxError> + Send + Sync;

/// Direction a migration step runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Roll the migration back
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Execution context handed to a migration step
///
/// Wraps the database executor and collects log lines written by the step.
/// The collected log is stored on the ledger row for the attempt.
pub struct MigrationContext<'a> {
    executor: &'a dyn Executor,
    log: RefCell<Vec<String>>,
}

impl<'a> MigrationContext<'a> {
    pub fn new(executor: &'a dyn Executor) -> Self {
        Self {
            executor,
            log: RefCell::new(Vec::new()),
        }
    }

    /// The executor the step should issue its statements through
    pub fn executor(&self) -> &'a dyn Executor {
        self.executor
    }

    /// Execute a parameterless statement
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the executor rejects the statement.
    pub fn execute(&self, sql: &str) -> Result<u64, DbError> {
        self.executor.execute(sql, &[])
    }

    /// Execute a script of one or more statements
    ///
    /// # Errors
    ///
    /// Returns `DbError` if any statement fails.
    pub fn batch(&self, sql: &str) -> Result<(), DbError> {
        self.executor.batch_execute(sql)
    }

    /// Append a line to the attempt log
    pub fn log(&self, line: impl Into<String>) {
        self.log.borrow_mut().push(line.into());
    }

    /// Lines logged so far, joined with newlines; `None` when nothing was logged
    pub fn take_log(&self) -> Option<String> {
        let lines = std::mem::take(&mut *self.log.borrow_mut());
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// One named, ordered unit of schema change
///
/// Definitions are immutable once built and cheap to clone; the step closures
/// are shared behind `Arc`.
///
/// # Example
///
/// ```rust
/// use tidemark::migration::MigrationDefinition;
///
/// let migration = MigrationDefinition::new("Migration1000", |ctx| {
///     ctx.execute("CREATE TABLE contact (id BIGSERIAL PRIMARY KEY, email TEXT NOT NULL)")?;
///     Ok(())
/// })
/// .with_down(|ctx| {
///     ctx.execute("DROP TABLE contact")?;
///     Ok(())
/// })
/// .with_notes("Create contact table");
///
/// assert!(migration.is_reversible());
/// ```
#[derive(Clone)]
pub struct MigrationDefinition {
    name: String,
    notes: Option<String>,
    up: Arc<MigrationStep>,
    down: Option<Arc<MigrationStep>>,
}

impl MigrationDefinition {
    /// Create an irreversible migration with only an `up` step
    pub fn new<F>(name: impl Into<String>, up: F) -> Self
    where
        F: Fn(&MigrationContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            notes: None,
            up: Arc::new(up),
            down: None,
        }
    }

    /// Attach the inverse step
    #[must_use]
    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(&MigrationContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(down));
        self
    }

    /// Attach descriptive notes
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }

    /// Run the step for `direction`
    ///
    /// Returns `None` when asked to run `down` on an irreversible migration.
    pub(crate) fn step(&self, direction: Direction) -> Option<&MigrationStep> {
        match direction {
            Direction::Up => Some(self.up.as_ref()),
            Direction::Down => self.down.as_deref(),
        }
    }
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDefinition")
            .field("name", &self.name)
            .field("notes", &self.notes)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

impl PartialEq for MigrationDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MigrationDefinition {}

//! Migration catalog: discovery and ordering of migration definitions

use crate::migration::{compare_names, MigrationDefinition, MigrationError};
use std::collections::HashSet;

/// A handle to a set of migrations
///
/// Implementations enumerate the migrations they contain; ordering and
/// duplicate checks are left to [`Catalog::discover`].
pub trait MigrationSource {
    /// Enumerate every migration in this source, in any order
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` if the source cannot be read.
    fn migrations(&self) -> Result<Vec<MigrationDefinition>, MigrationError>;
}

impl<T: MigrationSource + ?Sized> MigrationSource for Box<T> {
    fn migrations(&self) -> Result<Vec<MigrationDefinition>, MigrationError> {
        (**self).migrations()
    }
}

/// Migrations defined in code
///
/// # Example
///
/// ```rust
/// use tidemark::migration::{Catalog, MigrationDefinition, MigrationSet};
///
/// let set = MigrationSet::new()
///     .with(MigrationDefinition::new("Migration1001", |_| Ok(())))
///     .with(MigrationDefinition::new("Migration1000", |_| Ok(())));
///
/// let ordered = Catalog::discover(&set).unwrap();
/// assert_eq!(ordered[0].name(), "Migration1000");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<MigrationDefinition>,
}

impl MigrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, migration: MigrationDefinition) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn push(&mut self, migration: MigrationDefinition) {
        self.migrations.push(migration);
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl From<Vec<MigrationDefinition>> for MigrationSet {
    fn from(migrations: Vec<MigrationDefinition>) -> Self {
        Self { migrations }
    }
}

impl FromIterator<MigrationDefinition> for MigrationSet {
    fn from_iter<I: IntoIterator<Item = MigrationDefinition>>(iter: I) -> Self {
        Self {
            migrations: iter.into_iter().collect(),
        }
    }
}

impl MigrationSource for MigrationSet {
    fn migrations(&self) -> Result<Vec<MigrationDefinition>, MigrationError> {
        Ok(self.migrations.clone())
    }
}

/// Discovery entry point
pub struct Catalog;

impl Catalog {
    /// Return every migration of `source` in migration order
    ///
    /// Ordering uses [`compare_names`], so numeric suffixes of different widths
    /// sort by value.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` if the source fails or contains a
    /// duplicate or empty name.
    pub fn discover(source: &dyn MigrationSource) -> Result<Vec<MigrationDefinition>, MigrationError> {
        let mut migrations = source.migrations()?;
        check_names(&migrations)?;

        migrations.sort_by(|a, b| compare_names(a.name(), b.name()));
        log::debug!("discovered {} migration(s)", migrations.len());
        Ok(migrations)
    }
}

fn check_names(migrations: &[MigrationDefinition]) -> Result<(), MigrationError> {
    let mut seen = HashSet::with_capacity(migrations.len());
    for migration in migrations {
        if migration.name().trim().is_empty() {
            return Err(MigrationError::Discovery(
                "migration name cannot be empty".to_string(),
            ));
        }
        if !seen.insert(migration.name()) {
            return Err(MigrationError::Discovery(format!(
                "duplicate migration name '{}'",
                migration.name()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> MigrationDefinition {
        MigrationDefinition::new(name, |_| Ok(()))
    }

    fn names(migrations: &[MigrationDefinition]) -> Vec<&str> {
        migrations.iter().map(MigrationDefinition::name).collect()
    }

    #[test]
    fn test_discover_sorts_ascending() {
        let set: MigrationSet = vec![noop("Migration1002"), noop("Migration1000"), noop("Migration1001")].into();
        let ordered = Catalog::discover(&set).unwrap();
        assert_eq!(names(&ordered), vec!["Migration1000", "Migration1001", "Migration1002"]);
    }

    #[test]
    fn test_discover_orders_numeric_suffix_by_value() {
        let set: MigrationSet = [noop("Migration1000"), noop("Migration999")].into_iter().collect();
        let ordered = Catalog::discover(&set).unwrap();
        assert_eq!(names(&ordered), vec!["Migration999", "Migration1000"]);
    }

    #[test]
    fn test_discover_rejects_duplicates() {
        let set = MigrationSet::new().with(noop("Migration1000")).with(noop("Migration1000"));
        let err = Catalog::discover(&set).unwrap_err();
        assert!(matches!(err, MigrationError::Discovery(_)));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_discover_rejects_empty_name() {
        let set = MigrationSet::new().with(noop("  "));
        assert!(matches!(Catalog::discover(&set), Err(MigrationError::Discovery(_))));
    }

    #[test]
    fn test_discover_empty_set() {
        let set = MigrationSet::new();
        assert!(set.is_empty());
        assert!(Catalog::discover(&set).unwrap().is_empty());
    }

    #[test]
    fn test_source_errors_propagate() {
        struct Broken;
        impl MigrationSource for Broken {
            fn migrations(&self) -> Result<Vec<MigrationDefinition>, MigrationError> {
                Err(MigrationError::Discovery("cannot introspect".to_string()))
            }
        }

        assert!(matches!(Catalog::discover(&Broken), Err(MigrationError::Discovery(_))));
    }
}

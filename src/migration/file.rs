//! SQL file migrations
//!
//! A directory of `<name>.up.sql` files, each with an optional
//! `<name>.down.sql` counterpart. Leading `--` comment lines of the up file
//! become the migration notes.

use crate::migration::{MigrationDefinition, MigrationError, MigrationSource};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Static pattern
    Regex::new(r"^([A-Za-z0-9_\-]+)\.(up|down)\.sql$").expect("valid file name pattern")
});

/// A discovered pair of migration files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub up_path: PathBuf,
    pub down_path: Option<PathBuf>,
}

impl MigrationFile {
    /// Parse a file name into migration name and direction
    ///
    /// # Example
    /// - `Migration1000_create_contacts.up.sql` → (`Migration1000_create_contacts`, `up`)
    pub fn parse_filename(filename: &str) -> Option<(String, bool)> {
        let caps = FILE_NAME.captures(filename)?;
        let name = caps.get(1)?.as_str().to_string();
        let is_up = caps.get(2)?.as_str() == "up";
        Some((name, is_up))
    }
}

/// Extract notes from the leading `--` comment block of a SQL file
pub fn leading_comment(sql: &str) -> Option<String> {
    let lines: Vec<&str> = sql
        .lines()
        .map(str::trim)
        .take_while(|line| line.starts_with("--"))
        .map(|line| line.trim_start_matches('-').trim())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

/// Scan `dir` for migration files
///
/// Files that do not end in `.sql` are ignored.
///
/// # Errors
///
/// Returns `MigrationError::Discovery` if:
/// - The directory doesn't exist or can't be read
/// - A `.sql` file does not match `<name>.up.sql` / `<name>.down.sql`
/// - A down file has no matching up file
pub fn discover_migration_files(dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
    if !dir.is_dir() {
        return Err(MigrationError::Discovery(format!(
            "migrations directory not found: {}",
            dir.display()
        )));
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        MigrationError::Discovery(format!(
            "failed to read migrations directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut ups: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut downs: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in entries {
        let entry = entry
            .map_err(|e| MigrationError::Discovery(format!("failed to read directory entry: {e}")))?;
        let path = entry.path();

        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("sql") {
            continue;
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MigrationError::Discovery(format!("invalid file name: {}", path.display())))?;

        let (name, is_up) = MigrationFile::parse_filename(filename).ok_or_else(|| {
            MigrationError::Discovery(format!(
                "migration file '{filename}' does not match <name>.up.sql or <name>.down.sql"
            ))
        })?;

        if is_up {
            ups.insert(name, path);
        } else {
            downs.insert(name, path);
        }
    }

    if let Some(orphan) = downs.keys().find(|name| !ups.contains_key(*name)) {
        return Err(MigrationError::Discovery(format!(
            "down migration '{orphan}' has no matching up file"
        )));
    }

    Ok(ups
        .into_iter()
        .map(|(name, up_path)| {
            let down_path = downs.remove(&name);
            MigrationFile {
                name,
                up_path,
                down_path,
            }
        })
        .collect())
}

/// A directory of SQL migrations
///
/// Each file's content is read at discovery time and executed as one
/// batch, so a file may hold several statements.
#[derive(Debug, Clone)]
pub struct SqlDirectory {
    dir: PathBuf,
}

impl SqlDirectory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn read(path: &Path) -> Result<String, MigrationError> {
        fs::read_to_string(path).map_err(|e| {
            MigrationError::Discovery(format!("failed to read {}: {e}", path.display()))
        })
    }
}

impl MigrationSource for SqlDirectory {
    fn migrations(&self) -> Result<Vec<MigrationDefinition>, MigrationError> {
        let files = discover_migration_files(&self.dir)?;
        let mut migrations = Vec::with_capacity(files.len());

        for file in files {
            let up_sql = Self::read(&file.up_path)?;
            let notes = leading_comment(&up_sql);

            let mut migration = MigrationDefinition::new(file.name, move |ctx| {
                ctx.batch(&up_sql)?;
                Ok(())
            });

            if let Some(down_path) = &file.down_path {
                let down_sql = Self::read(down_path)?;
                migration = migration.with_down(move |ctx| {
                    ctx.batch(&down_sql)?;
                    Ok(())
                });
            }
            if let Some(notes) = notes {
                migration = migration.with_notes(notes);
            }

            migrations.push(migration);
        }

        Ok(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use crate::migration::{Catalog, Direction, MigrationContext};
    use std::fs;

    #[test]
    fn test_parse_filename() {
        assert_eq!(
            MigrationFile::parse_filename("Migration1000_init.up.sql"),
            Some(("Migration1000_init".to_string(), true))
        );
        assert_eq!(
            MigrationFile::parse_filename("Migration1000_init.down.sql"),
            Some(("Migration1000_init".to_string(), false))
        );
        assert_eq!(MigrationFile::parse_filename("Migration1000_init.sql"), None);
        assert_eq!(MigrationFile::parse_filename("bad name.up.sql"), None);
    }

    #[test]
    fn test_leading_comment() {
        let sql = "-- Add contacts\n--   and jobs\n\nCREATE TABLE contact (id INT);";
        assert_eq!(leading_comment(sql).as_deref(), Some("Add contacts and jobs"));
        assert_eq!(leading_comment("CREATE TABLE t (id INT);"), None);
    }

    #[test]
    fn test_sql_directory_discovery() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Migration1001.up.sql"), "-- second\nCREATE TABLE b (id INT);").unwrap();
        fs::write(dir.path().join("Migration1000.up.sql"), "CREATE TABLE a (id INT);").unwrap();
        fs::write(dir.path().join("Migration1000.down.sql"), "DROP TABLE a;").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let migrations = Catalog::discover(&SqlDirectory::new(dir.path())).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].name(), "Migration1000");
        assert!(migrations[0].is_reversible());
        assert_eq!(migrations[1].notes(), Some("second"));
        assert!(!migrations[1].is_reversible());

        let executor = RecordingExecutor::new();
        let ctx = MigrationContext::new(&executor);
        let down = migrations[0].step(Direction::Down).unwrap();
        down(&ctx).unwrap();
        assert_eq!(executor.statements(), vec!["DROP TABLE a;"]);
    }

    #[test]
    fn test_sql_directory_rejects_orphan_down() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Migration1000.down.sql"), "DROP TABLE a;").unwrap();

        let err = SqlDirectory::new(dir.path()).migrations().unwrap_err();
        assert!(err.to_string().contains("no matching up file"));
    }

    #[test]
    fn test_sql_directory_rejects_bad_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("create users.sql"), "CREATE TABLE users (id INT);").unwrap();

        assert!(matches!(
            SqlDirectory::new(dir.path()).migrations(),
            Err(MigrationError::Discovery(_))
        ));
    }

    #[test]
    fn test_missing_directory() {
        let err = SqlDirectory::new("/definitely/not/here").migrations().unwrap_err();
        assert!(matches!(err, MigrationError::Discovery(_)));
    }
}

//! Scaffolding for new SQL migration files

use anyhow::{bail, Context, Result};
use chrono::Utc;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tidemark::migration::file::discover_migration_files;

/// Number given to the first migration of an empty directory
pub const FIRST_NUMBER: u64 = 1000;

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Static pattern
    Regex::new(r"^Migration([0-9]+)").expect("valid migration number pattern")
});

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Static pattern
    Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid slug pattern")
});

/// Paths written by [`generate_migration`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMigration {
    pub name: String,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// Next `MigrationNNNN` number after the highest one in `names`
///
/// Names without a `Migration<digits>` prefix are ignored.
pub fn next_number<'a>(names: impl IntoIterator<Item = &'a str>) -> u64 {
    names
        .into_iter()
        .filter_map(|name| NUMBERED.captures(name))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .max()
        .map_or(FIRST_NUMBER, |n| n.saturating_add(1))
}

/// Write `Migration<NNNN>_<slug>.up.sql` and its `.down.sql` into `dir`
///
/// The directory is created if it does not exist.
///
/// # Errors
///
/// Fails for an invalid slug, an unreadable directory, or if either file
/// already exists.
pub fn generate_migration(dir: &Path, slug: &str) -> Result<GeneratedMigration> {
    if !SLUG.is_match(slug) {
        bail!("invalid migration name '{slug}': use letters, digits, '_' or '-'");
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create migrations directory {}", dir.display()))?;

    let existing = discover_migration_files(dir)?;
    let number = next_number(existing.iter().map(|f| f.name.as_str()));
    let name = format!("Migration{number:04}_{slug}");

    let up_path = dir.join(format!("{name}.up.sql"));
    let down_path = dir.join(format!("{name}.down.sql"));
    for path in [&up_path, &down_path] {
        if path.exists() {
            bail!("refusing to overwrite {}", path.display());
        }
    }

    let generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    // Only the first comment block becomes the notes
    let up = format!("-- {slug}\n\n-- Generated: {generated}\n\n");
    let down = format!("-- Revert {slug}\n\n");

    fs::write(&up_path, up).with_context(|| format!("Failed to write {}", up_path.display()))?;
    fs::write(&down_path, down).with_context(|| format!("Failed to write {}", down_path.display()))?;

    log::debug!("generated migration {name} in {}", dir.display());

    Ok(GeneratedMigration {
        name,
        up_path,
        down_path,
    })
}

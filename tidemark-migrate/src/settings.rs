//! Resolution of CLI flags against the config file and environment

use std::path::PathBuf;
use tidemark::config::MigratorConfig;

/// Command line values that override `MigratorConfig`
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub table: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Overrides {
    /// Apply the flags on top of `config`
    pub fn apply(self, mut config: MigratorConfig) -> MigratorConfig {
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(dir) = self.migrations_dir {
            config.migrations_dir = dir;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if let Some(seconds) = self.timeout_seconds {
            config.lease_timeout_seconds = seconds;
        }
        config
    }
}

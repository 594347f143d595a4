//! Tidemark Migration CLI Tool
//!
//! Command-line interface for running and reverting Tidemark migrations.
//! Suitable for CI/CD pipelines: every failure ends with a non-zero exit code.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tidemark::config::{MigratorConfig, CONFIG_FILE};
use tidemark::migration::{pg_migrator, LeaseState, MigrationReport, Migrator, RevertTarget};
use tidemark_migrate::generate::generate_migration;
use tidemark_migrate::settings::Overrides;

#[derive(Parser)]
#[command(name = "tidemark-migrate")]
#[command(about = "Migration runner for Tidemark")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Database connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Migrations directory path
    #[arg(long)]
    migrations_dir: Option<PathBuf>,

    /// Ledger table name
    #[arg(long)]
    table: Option<String>,

    /// Seconds before an unfinished attempt is considered stale
    #[arg(long)]
    timeout_seconds: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the lease state of every migration
    Status,

    /// Apply pending migrations
    Run {
        /// Report partial progress instead of failing on a halted batch
        #[arg(long)]
        no_fail: bool,
    },

    /// Revert completed migrations
    Revert {
        /// `all`, `last`, or a migration name (it and every later one)
        target: String,
    },

    /// Generate a new pair of SQL migration files
    New {
        /// Migration name (e.g., "create_users_table")
        name: String,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let quiet = cli.quiet;
    match execute(cli) {
        Ok(()) => {
            if !quiet {
                println!("{}", "✅ Success".green());
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{} {e:#}", "❌ Error:".red().bold());
            process::exit(1);
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let config = MigratorConfig::load_from(&cli.config)?;
    let overrides = Overrides {
        database_url: cli.database_url.or_else(|| std::env::var("DATABASE_URL").ok()),
        migrations_dir: cli.migrations_dir,
        table: cli.table,
        timeout_seconds: cli.timeout_seconds,
    };
    let config = overrides.apply(config);

    match cli.command {
        Commands::Status => handle_status(&pg_migrator(&config)?),
        Commands::Run { no_fail } => handle_run(&pg_migrator(&config)?, no_fail),
        Commands::Revert { target } => handle_revert(&pg_migrator(&config)?, &target),
        Commands::New { name } => handle_new(&config, &name),
    }
}

fn handle_status(migrator: &Migrator) -> Result<()> {
    let status = migrator.status()?;

    println!("\n{}\n", "📊 Migration Status".bold());

    if status.entries.is_empty() {
        println!("No migrations found");
    }

    for entry in &status.entries {
        let name = entry.migration.name();
        match entry.state {
            LeaseState::Done => {
                let completed = entry
                    .record
                    .as_ref()
                    .and_then(|r| r.completed_date)
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("  {} {name} ({completed})", "✓".green());
            }
            LeaseState::Pending => println!("  {} {name}", "⏳".yellow()),
            LeaseState::InProgress => {
                let started = entry
                    .record
                    .as_ref()
                    .map(|r| r.created_date.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("  {} {name} (in progress since {started})", "⚠".yellow().bold());
            }
            LeaseState::Stale => {
                let error = entry
                    .record
                    .as_ref()
                    .and_then(|r| r.error_message.as_deref())
                    .unwrap_or("abandoned attempt");
                println!("  {} {name} (stale: {error})", "✗".red());
            }
        }
    }

    if !status.orphaned.is_empty() {
        println!("\n{}", "Ledger rows without a migration:".yellow());
        for record in &status.orphaned {
            println!("  ? {}", record.name);
        }
    }

    println!(
        "\n📈 Summary: {} done, {} pending, {} in progress, {} stale",
        status.count(LeaseState::Done),
        status.count(LeaseState::Pending),
        status.count(LeaseState::InProgress),
        status.count(LeaseState::Stale),
    );

    Ok(())
}

fn handle_run(migrator: &Migrator, no_fail: bool) -> Result<()> {
    println!("Applying migrations...");
    let report = migrator.run(!no_fail)?;
    print_report(report, "apply", "applied")
}

fn handle_revert(migrator: &Migrator, target: &str) -> Result<()> {
    let target = RevertTarget::from(target);
    println!("Reverting migrations ({target})...");
    let report = migrator.revert(target, true)?;
    print_report(report, "revert", "reverted")
}

fn print_report(mut report: MigrationReport, verb: &str, past: &str) -> Result<()> {
    for migration in &report.completed {
        println!("  {} {}", "✓".green(), migration.name());
    }

    if report.succeeded {
        if report.completed.is_empty() {
            println!("No migrations to {verb}");
        } else {
            println!("Successfully {past} {} migration(s)", report.completed.len());
        }
        return Ok(());
    }

    println!(
        "{}",
        format!("Halted after {} {past} migration(s)", report.completed.len()).yellow()
    );
    Err(report
        .error
        .take()
        .map_or_else(|| anyhow!("migration batch did not complete"), anyhow::Error::from))
}

fn handle_new(config: &MigratorConfig, name: &str) -> Result<()> {
    let generated = generate_migration(&config.migrations_dir, name)?;
    println!("Generated migration: {}", generated.name);
    println!("   {}", generated.up_path.display());
    println!("   {}", generated.down_path.display());
    println!("   Edit the files to add the up and down SQL");
    Ok(())
}

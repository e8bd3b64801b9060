// src/cli.rs

//! Command-line surface: one subcommand per `Engine` operation, matching
//! SPEC_FULL.md §10's command reference.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jetbase")]
#[command(author, version, about = "Schema-migration engine for relational databases", long_about = None)]
pub struct Cli {
    /// Path to jetbase.toml (defaults to ./jetbase.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database connection URL (overrides config file and environment).
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Directory containing migration `.sql` files.
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Increase log verbosity (`-v`, `-vv`).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold the migrations directory.
    Init,
    /// Apply every pending migration.
    Upgrade {
        /// Stop after reaching this version (inclusive).
        #[arg(long, conflicts_with = "count")]
        to_version: Option<String>,
        /// Apply only the next N pending versions.
        #[arg(long, conflicts_with = "to_version")]
        count: Option<i64>,
        /// Preview the SQL that would run without executing it.
        #[arg(long)]
        dry_run: bool,
        /// Skip every validator check.
        #[arg(long)]
        skip_validation: bool,
        /// Skip the checksum-drift check.
        #[arg(long)]
        skip_checksum_validation: bool,
        /// Skip the applied-versions/repeatables-present and order checks.
        #[arg(long)]
        skip_file_validation: bool,
    },
    /// Roll back the latest applied versioned migration(s).
    Rollback {
        /// Target version to roll back to (every version applied after this
        /// one is rolled back; that version itself is left applied).
        #[arg(long, conflicts_with = "count")]
        to_version: Option<String>,
        /// Roll back this many of the most recently applied versions
        /// (defaults to 1 if neither flag is given).
        #[arg(long, conflicts_with = "to_version")]
        count: Option<i64>,
        /// Preview what would be rolled back without executing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show applied migration history, newest first.
    History,
    /// Show the most recently applied versioned migration.
    Current,
    /// List versions on disk that have not yet been applied.
    Status,
    /// Re-run the checksum and file-presence checks without applying
    /// anything, or repair checksum drift with `--fix`.
    ValidateChecksums {
        #[arg(long)]
        fix: bool,
    },
    /// Re-run the file-presence and order checks without applying anything,
    /// or delete orphaned history rows with `--fix`.
    ValidateFiles {
        #[arg(long)]
        fix: bool,
    },
    /// Repair both checksum drift and orphaned history rows.
    Fix,
    /// Scaffold a new versioned migration file.
    New {
        /// Short description used in the generated filename.
        description: String,
    },
    /// Show the migration lock's current state.
    LockStatus,
    /// Clear the migration lock regardless of which process holds it.
    Unlock,
    /// Generate shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

// src/main.rs

mod cli;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use jetbase::config::{CliOverrides, EngineConfig, EnvConfig, FileConfig};
use jetbase::engine::Engine;
use jetbase::events::{ProgressEvent, ProgressSink};
use jetbase::validate::ValidationOptions;
use jetbase::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct CliSink;

impl ProgressSink for CliSink {
    fn on_event(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Applying { entry, index, total } => {
                info!("[{index}/{total}] applying {}", entry.filename);
            }
            ProgressEvent::Applied { entry, index, total } => {
                info!("[{index}/{total}] applied {}", entry.filename);
            }
            ProgressEvent::RolledBack { entry, index, total } => {
                info!("[{index}/{total}] rolled back {}", entry.filename);
            }
            ProgressEvent::Failed { entry, message } => {
                error!("failed on {}: {message}", entry.filename);
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "jetbase=info",
        1 => "jetbase=debug",
        _ => "jetbase=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> jetbase::Result<EngineConfig> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("jetbase.toml"));
    let file = FileConfig::load(&config_path)?;
    let env = EnvConfig::from_env();
    let overrides = CliOverrides {
        database_url: cli.database_url.clone(),
        migrations_dir: cli.migrations_dir.clone(),
        postgres_schema: None,
        skip_validation: None,
        skip_checksum_validation: None,
        skip_file_validation: None,
    };
    EngineConfig::resolve(file, env, overrides)
}

/// Converts a CLI `--count` flag (accepted as a signed integer so a
/// non-positive value can be rejected with `InvalidArgument` rather than
/// failing to parse) into the `usize` the engine expects.
fn parse_count(count: Option<i64>) -> Result<Option<usize>> {
    count
        .map(|c| {
            usize::try_from(c)
                .map_err(|_| Error::InvalidArgument("count must be a positive integer".to_string()))
        })
        .transpose()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    if let Commands::Init = cli.command {
        let config = load_config(&cli)?;
        init_migrations_dir(&config.migrations_dir)?;
        println!("initialized {}", config.migrations_dir.display());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let exit_code = run(&cli, &config);
    std::process::exit(exit_code);
}

fn run(cli: &Cli, config: &EngineConfig) -> i32 {
    match run_inner(cli, config) {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}

fn run_inner(cli: &Cli, config: &EngineConfig) -> jetbase::Result<()> {
    let mut engine = Engine::open(config)?;
    let mut sink = CliSink;

    match &cli.command {
        Commands::Init => unreachable!("handled before engine open"),
        Commands::Upgrade {
            to_version,
            count,
            dry_run,
            skip_validation,
            skip_checksum_validation,
            skip_file_validation,
        } => {
            let count = parse_count(*count)?;
            if *dry_run {
                let steps = engine.dry_run_upgrade(to_version.as_deref(), count)?;
                for step in steps {
                    println!("-- {}", step.entry.filename);
                    for statement in step.statements {
                        println!("{statement};");
                    }
                }
            } else {
                let options = ValidationOptions {
                    skip_validation: config.skip_validation || *skip_validation,
                    skip_checksum_validation: config.skip_checksum_validation
                        || *skip_checksum_validation,
                    skip_file_validation: config.skip_file_validation || *skip_file_validation,
                };
                let applied = engine.upgrade(to_version.as_deref(), count, &options, &mut sink)?;
                println!("applied {applied} migration(s)");
            }
        }
        Commands::Rollback {
            to_version,
            count,
            dry_run,
        } => {
            let count = parse_count(*count)?;
            if *dry_run {
                let steps = engine.dry_run_rollback(to_version.as_deref(), count)?;
                for step in steps {
                    println!("-- {}", step.entry.filename);
                    for statement in step.statements {
                        println!("{statement};");
                    }
                }
            } else {
                let removed = engine.rollback(to_version.as_deref(), count, &mut sink)?;
                println!("rolled back {removed} migration(s)");
            }
        }
        Commands::History => {
            for record in engine.history()? {
                println!(
                    "{:>4} {:<10} {:<30} {}",
                    record.order_executed,
                    record.version.as_deref().unwrap_or("-"),
                    record.filename,
                    record.applied_at,
                );
            }
        }
        Commands::Current => match engine.current()? {
            Some(record) => println!("{}", record.version.as_deref().unwrap_or("-")),
            None => println!("no migrations applied"),
        },
        Commands::Status => {
            let pending = engine.status()?;
            if pending.is_empty() {
                println!("up to date");
            } else {
                for version in pending {
                    println!("{version}");
                }
            }
        }
        Commands::ValidateChecksums { fix } => {
            if *fix {
                let count = engine.repair_checksums()?;
                println!("repaired {count} checksum(s)");
            } else {
                engine.validate_checksums()?;
                println!("ok");
            }
        }
        Commands::ValidateFiles { fix } => {
            if *fix {
                let count = engine.repair_files()?;
                println!("removed {count} orphaned history row(s)");
            } else {
                engine.validate_files()?;
                println!("ok");
            }
        }
        Commands::Fix => {
            let checksums = engine.repair_checksums()?;
            let files = engine.repair_files()?;
            println!("repaired {checksums} checksum(s), removed {files} orphaned history row(s)");
        }
        Commands::New { description } => {
            let path = new_migration_file(&config.migrations_dir, description)?;
            println!("created {}", path.display());
        }
        Commands::LockStatus => {
            let status = engine.lock_status()?;
            println!("locked: {}", status.is_locked);
            if let Some(pid) = status.process_id {
                println!("held by: {pid}");
            }
        }
        Commands::Unlock => {
            engine.force_unlock()?;
            println!("unlocked");
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }
    Ok(())
}

/// Creates the migrations directory if it does not already exist.
/// Collaborator-level scaffolding, not engine logic (SPEC_FULL.md §10).
fn init_migrations_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(Error::from)
}

/// Scaffolds a new `V<next>__<description>.sql` file with empty upgrade and
/// rollback sections. `<next>` is one past the highest versioned file
/// already on disk (or `1` if none exist).
fn new_migration_file(migrations_dir: &Path, description: &str) -> Result<PathBuf> {
    let catalog = jetbase::catalog::Catalog::scan(migrations_dir)?;
    let next = catalog
        .versioned()
        .last()
        .map(|e| e.version.as_ref().unwrap().as_str())
        .and_then(|v| v.split('.').next())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|v| v + 1)
        .unwrap_or(1);
    let slug = description.trim().replace(' ', "_");
    let filename = format!("V{next}__{slug}.sql");
    let path = migrations_dir.join(&filename);
    std::fs::write(&path, "-- upgrade\n\n-- rollback\n\n").map_err(Error::from)?;
    Ok(path)
}

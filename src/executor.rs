// src/executor.rs

//! Runs a computed [`Plan`](crate::planner::Plan) against the database.
//!
//! Each migration file runs in its own transaction: the upgrade (or
//! rollback) statements execute, the history row is written in the same
//! transaction, and a failure rolls back only that file's changes — earlier
//! files in the batch stay committed, matching the original implementation's
//! one-transaction-per-file behavior in `run_migration`.

use crate::catalog::CatalogEntry;
use crate::checksum::calculate_checksum;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::events::{ProgressEvent, ProgressSink};
use crate::parser::{self, ParseMode, Section};
use crate::planner::Plan;
use crate::repository;
use crate::storage::StorageAdapter;
use rusqlite::Transaction;

/// A single statement-level preview line, produced instead of execution when
/// running in dry-run mode.
#[derive(Debug, Clone)]
pub struct DryRunStep {
    pub entry: CatalogEntry,
    pub statements: Vec<String>,
}

/// Executes every entry in `plan`'s upgrade order, stopping at the first
/// failure and reporting progress through `sink`.
pub fn run_upgrade(
    storage: &mut StorageAdapter,
    plan: &Plan<'_>,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let total = plan.total();
    let mut index = 0;

    for entry in plan.versioned.iter().chain(plan.runs_always.iter()) {
        index += 1;
        run_one_upgrade(storage, entry, index, total, sink)?;
    }
    for entry in &plan.runs_on_change {
        index += 1;
        run_one_upgrade(storage, entry, index, total, sink)?;
    }
    Ok(())
}

fn run_one_upgrade(
    storage: &mut StorageAdapter,
    entry: &CatalogEntry,
    index: usize,
    total: usize,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    sink.on_event(ProgressEvent::Applying {
        entry: (*entry).clone(),
        index,
        total,
    });

    let statements = parser::parse_section(&entry.path, Section::Upgrade, ParseMode::Execute)?;
    let checksum = calculate_checksum(&statements);

    let result = storage.run(|tx, dialect| apply_upgrade(tx, dialect, entry, &statements, &checksum));

    match result {
        Ok(()) => {
            sink.on_event(ProgressEvent::Applied {
                entry: (*entry).clone(),
                index,
                total,
            });
            Ok(())
        }
        Err(e) => {
            sink.on_event(ProgressEvent::Failed {
                entry: (*entry).clone(),
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

fn apply_upgrade(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    entry: &CatalogEntry,
    statements: &[String],
    checksum: &str,
) -> Result<()> {
    for statement in statements {
        tx.execute_batch(statement)?;
    }

    match entry.kind {
        crate::catalog::MigrationKind::Versioned => {
            repository::insert_version(tx, dialect, entry, checksum)?;
        }
        crate::catalog::MigrationKind::RunsAlways | crate::catalog::MigrationKind::RunsOnChange => {
            let recorded =
                repository::repeatable_is_recorded(tx, dialect, &entry.filename, entry.kind)?;
            repository::upsert_repeatable(tx, dialect, entry, checksum, recorded)?;
        }
    }
    Ok(())
}

/// Rolls back every entry in `plan`'s versioned list (already ordered
/// newest-first by the planner), deleting each history row as it succeeds.
pub fn run_rollback(
    storage: &mut StorageAdapter,
    plan: &Plan<'_>,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let total = plan.versioned.len();
    for (i, entry) in plan.versioned.iter().enumerate() {
        let index = i + 1;
        sink.on_event(ProgressEvent::Applying {
            entry: (*entry).clone(),
            index,
            total,
        });

        let statements =
            parser::parse_section(&entry.path, Section::Rollback, ParseMode::Execute)?;
        let version = entry.version.clone().unwrap();

        let result = storage.run(|tx, dialect| {
            for statement in &statements {
                tx.execute_batch(statement)?;
            }
            repository::delete_version(tx, dialect, &version)
        });

        match result {
            Ok(()) => sink.on_event(ProgressEvent::RolledBack {
                entry: (*entry).clone(),
                index,
                total,
            }),
            Err(e) => {
                sink.on_event(ProgressEvent::Failed {
                    entry: (*entry).clone(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Computes what `upgrade` would run without touching the database, for
/// `jetbase upgrade --dry-run`.
pub fn dry_run_upgrade(plan: &Plan<'_>) -> Result<Vec<DryRunStep>> {
    let mut steps = Vec::new();
    for entry in plan
        .versioned
        .iter()
        .chain(plan.runs_always.iter())
        .chain(plan.runs_on_change.iter())
    {
        let statements = parser::parse_section(&entry.path, Section::Upgrade, ParseMode::DryRun)?;
        steps.push(DryRunStep {
            entry: (*entry).clone(),
            statements,
        });
    }
    Ok(steps)
}

/// Computes what `rollback` would run without touching the database, for
/// `jetbase rollback --dry-run`. Rollback statements run in the plan's
/// order (newest applied first), mirroring `run_rollback`.
pub fn dry_run_rollback(plan: &Plan<'_>) -> Result<Vec<DryRunStep>> {
    let mut steps = Vec::new();
    for entry in plan.versioned.iter() {
        let statements = parser::parse_section(&entry.path, Section::Rollback, ParseMode::DryRun)?;
        steps.push(DryRunStep {
            entry: (*entry).clone(),
            statements,
        });
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::dialect::SqliteDialect;
    use crate::events::VecSink;
    use crate::planner;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &std::path::Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn storage() -> StorageAdapter {
        let mut storage = StorageAdapter::open_in_memory(Box::new(SqliteDialect)).unwrap();
        storage
            .run(|tx, dialect| repository::ensure_migrations_table(tx, dialect))
            .unwrap();
        storage
    }

    #[test]
    fn upgrade_runs_statements_and_records_history() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "V1__a.sql",
            "-- upgrade\nCREATE TABLE t(x INT);\n-- rollback\nDROP TABLE t;\n",
        );
        let catalog = Catalog::scan(tmp.path()).unwrap();
        let plan = planner::plan_upgrade(
            &catalog,
            None,
            None,
            None,
            &std::collections::HashMap::new(),
            |_| Ok(String::new()),
        )
        .unwrap();

        let mut storage = storage();
        let mut sink = VecSink::default();
        run_upgrade(&mut storage, &plan, &mut sink).unwrap();

        assert_eq!(sink.0.len(), 2);
        storage
            .run(|tx, dialect| {
                let history = repository::fetch_history(tx, dialect)?;
                assert_eq!(history.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn failed_statement_reports_failed_event_and_rolls_back() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "V1__a.sql", "-- upgrade\nNOT VALID SQL;\n");
        let catalog = Catalog::scan(tmp.path()).unwrap();
        let plan = planner::plan_upgrade(
            &catalog,
            None,
            None,
            None,
            &std::collections::HashMap::new(),
            |_| Ok(String::new()),
        )
        .unwrap();

        let mut storage = storage();
        let mut sink = VecSink::default();
        let result = run_upgrade(&mut storage, &plan, &mut sink);
        assert!(result.is_err());
        assert!(matches!(sink.0.last(), Some(ProgressEvent::Failed { .. })));
    }

    #[test]
    fn rollback_deletes_history_row() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "V1__a.sql",
            "-- upgrade\nCREATE TABLE t(x INT);\n-- rollback\nDROP TABLE t;\n",
        );
        let catalog = Catalog::scan(tmp.path()).unwrap();
        let up_plan = planner::plan_upgrade(
            &catalog,
            None,
            None,
            None,
            &std::collections::HashMap::new(),
            |_| Ok(String::new()),
        )
        .unwrap();

        let mut storage = storage();
        let mut sink = VecSink::default();
        run_upgrade(&mut storage, &up_plan, &mut sink).unwrap();

        let down_plan = planner::plan_rollback(&catalog, &["1".to_string()]).unwrap();
        run_rollback(&mut storage, &down_plan, &mut sink).unwrap();

        storage
            .run(|tx, dialect| {
                assert!(repository::fetch_history(tx, dialect)?.is_empty());
                Ok(())
            })
            .unwrap();
    }
}

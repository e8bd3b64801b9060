// src/engine.rs

//! Top-level operations the CLI calls into: `upgrade`, `rollback`, `history`,
//! `status`, `validate`, `repair-checksums`, and lock management. Mirrors the
//! original implementation's `MigrationEngine` class, one public method per
//! CLI subcommand.

use crate::catalog::{Catalog, Version};
use crate::checksum::calculate_checksum;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::ProgressSink;
use crate::executor::{self, DryRunStep};
use crate::lock::{self, LockStatus};
use crate::parser::{self, ParseMode, Section};
use crate::planner::{self, Plan};
use crate::repository::{self, MigrationRecord};
use crate::storage::StorageAdapter;
use crate::validate::{self, ValidationOptions};
use uuid::Uuid;

pub struct Engine {
    storage: StorageAdapter,
    catalog: Catalog,
}

impl Engine {
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let storage = StorageAdapter::open(&config.database_url, config.postgres_schema.clone())?;
        let catalog = Catalog::scan(&config.migrations_dir)?;
        Ok(Self { storage, catalog })
    }

    fn ensure_system_tables(&mut self) -> Result<()> {
        self.storage.run(|tx, dialect| {
            repository::ensure_migrations_table(tx, dialect)?;
            tx.execute_batch(&dialect.create_lock_table_stmt())?;
            Ok(())
        })
    }

    fn latest_applied(&mut self) -> Result<Option<Version>> {
        let latest = self
            .storage
            .run(|tx, dialect| repository::fetch_latest_versioned(tx, dialect))?;
        latest
            .map(|record| record.version.map(|v| Version::parse(&v)).transpose())
            .transpose()
            .map(Option::flatten)
    }

    /// Runs every pending migration: new versioned files, then `RUNS_ALWAYS`
    /// files, then changed `RUNS_ON_CHANGE` files. Acquires the migration
    /// lock for the duration and validates before running anything.
    ///
    /// `count` and `target_version` are mutually exclusive (spec §4.9, §8):
    /// a non-positive `count`, or both set, is `Error::InvalidArgument`.
    pub fn upgrade(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
        options: &ValidationOptions,
        sink: &mut dyn ProgressSink,
    ) -> Result<usize> {
        validate_count_and_target(count, target_version)?;

        self.ensure_system_tables()?;
        let process_id = Uuid::new_v4();
        self.storage
            .run(|tx, dialect| lock::acquire(tx, dialect, &process_id))?;

        let result = self.upgrade_inner(target_version, count, options, sink);
        self.storage
            .run(|tx, dialect| lock::release(tx, dialect, &process_id))?;
        result
    }

    fn upgrade_inner(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
        options: &ValidationOptions,
        sink: &mut dyn ProgressSink,
    ) -> Result<usize> {
        let target = target_version.map(Version::parse).transpose()?;
        let latest = self.latest_applied()?;

        let stored_checksums = self
            .storage
            .run(|tx, dialect| repository::fetch_version_checksums(tx, dialect))?;
        let migrated_versions: Vec<String> = stored_checksums.keys().cloned().collect();
        let applied_repeatable_filenames = self.applied_repeatable_filenames()?;
        let pending = planner::pending_versioned(&self.catalog, latest.as_ref());

        validate::validate_all(
            &self.catalog,
            &stored_checksums,
            &migrated_versions,
            &applied_repeatable_filenames,
            &pending,
            latest.as_ref(),
            options,
        )?;

        let on_change_checksums = self
            .storage
            .run(|tx, dialect| repository::fetch_runs_on_change_checksums(tx, dialect))?;

        let plan = planner::plan_upgrade(
            &self.catalog,
            latest.as_ref(),
            target.as_ref(),
            count,
            &on_change_checksums,
            |entry| {
                let statements =
                    parser::parse_section(&entry.path, Section::Upgrade, ParseMode::Execute)?;
                Ok(calculate_checksum(&statements))
            },
        )?;

        let applied = plan.total();
        executor::run_upgrade(&mut self.storage, &plan, sink)?;
        Ok(applied)
    }

    /// `filename -> ` membership set of every repeatable (`RUNS_ALWAYS`/
    /// `RUNS_ON_CHANGE`) migration recorded as applied.
    fn applied_repeatable_filenames(&mut self) -> Result<Vec<String>> {
        let mut filenames = self
            .storage
            .run(|tx, dialect| repository::fetch_runs_always_filenames(tx, dialect))?;
        let on_change = self
            .storage
            .run(|tx, dialect| repository::fetch_runs_on_change_checksums(tx, dialect))?;
        filenames.extend(on_change.into_keys());
        Ok(filenames)
    }

    /// Rolls back the latest applied versioned migrations, selected from
    /// history rather than the on-disk catalog (spec §4.9): either the
    /// `count` most recently applied rows (defaults to 1), or every row
    /// applied after `target_version`. `"0"` rolls back everything ever
    /// applied. `count` and `target_version` are mutually exclusive.
    pub fn rollback(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
        sink: &mut dyn ProgressSink,
    ) -> Result<usize> {
        validate_count_and_target(count, target_version)?;

        self.ensure_system_tables()?;
        let process_id = Uuid::new_v4();
        self.storage
            .run(|tx, dialect| lock::acquire(tx, dialect, &process_id))?;

        let result = self.rollback_inner(target_version, count, sink);
        self.storage
            .run(|tx, dialect| lock::release(tx, dialect, &process_id))?;
        result
    }

    fn rollback_inner(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
        sink: &mut dyn ProgressSink,
    ) -> Result<usize> {
        let applied_versions_desc = self.applied_versions_desc(target_version, count)?;
        let plan = planner::plan_rollback(&self.catalog, &applied_versions_desc)?;
        let applied = plan.versioned.len();
        executor::run_rollback(&mut self.storage, &plan, sink)?;
        Ok(applied)
    }

    /// Resolves `target_version`/`count` against applied history into a
    /// newest-first list of versions, shared by `rollback` and
    /// `dry_run_rollback`.
    fn applied_versions_desc(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
    ) -> Result<Vec<String>> {
        let target = target_version.map(Version::parse).transpose()?;

        match target.as_ref() {
            Some(t) if t.as_str() == "0" => self
                .storage
                .run(|tx, dialect| repository::fetch_latest_versions(tx, dialect, None, None)),
            Some(t) => self
                .storage
                .run(|tx, dialect| repository::fetch_latest_versions(tx, dialect, None, Some(t))),
            None => {
                let count = count.unwrap_or(1);
                self.storage.run(|tx, dialect| {
                    repository::fetch_latest_versions(tx, dialect, Some(count as u32), None)
                })
            }
        }
    }

    /// Full applied-migration history, newest first.
    pub fn history(&mut self) -> Result<Vec<MigrationRecord>> {
        self.ensure_system_tables()?;
        self.storage
            .run(|tx, dialect| repository::fetch_history(tx, dialect))
    }

    /// The most recently applied versioned migration.
    pub fn current(&mut self) -> Result<Option<MigrationRecord>> {
        self.ensure_system_tables()?;
        self.storage
            .run(|tx, dialect| repository::fetch_latest_versioned(tx, dialect))
    }

    /// Versions pending application, without running anything.
    pub fn status(&mut self) -> Result<Vec<Version>> {
        self.ensure_system_tables()?;
        let latest = self.latest_applied()?;
        Ok(planner::pending_versioned(&self.catalog, latest.as_ref())
            .into_iter()
            .cloned()
            .collect())
    }

    /// Previews what `upgrade` would run, without touching the database.
    pub fn dry_run_upgrade(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
    ) -> Result<Vec<DryRunStep>> {
        validate_count_and_target(count, target_version)?;
        self.ensure_system_tables()?;
        let target = target_version.map(Version::parse).transpose()?;
        let latest = self.latest_applied()?;
        let on_change_checksums = self
            .storage
            .run(|tx, dialect| repository::fetch_runs_on_change_checksums(tx, dialect))?;

        let plan: Plan<'_> = planner::plan_upgrade(
            &self.catalog,
            latest.as_ref(),
            target.as_ref(),
            count,
            &on_change_checksums,
            |entry| {
                let statements =
                    parser::parse_section(&entry.path, Section::Upgrade, ParseMode::DryRun)?;
                Ok(calculate_checksum(&statements))
            },
        )?;
        executor::dry_run_upgrade(&plan)
    }

    /// Previews what `rollback` would run, without touching the database.
    pub fn dry_run_rollback(
        &mut self,
        target_version: Option<&str>,
        count: Option<usize>,
    ) -> Result<Vec<DryRunStep>> {
        validate_count_and_target(count, target_version)?;
        self.ensure_system_tables()?;
        let applied_versions_desc = self.applied_versions_desc(target_version, count)?;
        let plan = planner::plan_rollback(&self.catalog, &applied_versions_desc)?;
        executor::dry_run_rollback(&plan)
    }

    /// Re-runs the checksum-fidelity check alone, without applying anything.
    /// Backs `jetbase validate-checksums`.
    pub fn validate_checksums(&mut self) -> Result<()> {
        self.ensure_system_tables()?;
        validate::validate_no_duplicate_versions(&self.catalog)?;
        let stored_checksums = self
            .storage
            .run(|tx, dialect| repository::fetch_version_checksums(tx, dialect))?;
        validate::validate_checksums_match(&self.catalog, &stored_checksums)
    }

    /// Re-runs the file-presence and order checks alone, without applying
    /// anything. Backs `jetbase validate-files`.
    pub fn validate_files(&mut self) -> Result<()> {
        self.ensure_system_tables()?;
        validate::validate_no_duplicate_versions(&self.catalog)?;
        let latest = self.latest_applied()?;
        let stored_checksums = self
            .storage
            .run(|tx, dialect| repository::fetch_version_checksums(tx, dialect))?;
        let migrated_versions: Vec<String> = stored_checksums.keys().cloned().collect();
        let applied_repeatable_filenames = self.applied_repeatable_filenames()?;
        let pending = planner::pending_versioned(&self.catalog, latest.as_ref());
        validate::validate_migrated_versions_present(&self.catalog, &migrated_versions)?;
        validate::validate_applied_repeatables_present(&self.catalog, &applied_repeatable_filenames)?;
        validate::validate_no_new_file_below_latest(&pending, latest.as_ref())
    }

    /// Overwrites every stored checksum with the current on-disk value.
    /// Intended for the rare case where a migration's formatting legitimately
    /// changed (e.g. whitespace) and the operator has confirmed the SQL
    /// itself did not.
    pub fn repair_checksums(&mut self) -> Result<usize> {
        self.ensure_system_tables()?;
        let mut repaired = 0;
        for entry in self.catalog.versioned() {
            let version = entry.version.clone().unwrap();
            let statements =
                parser::parse_section(&entry.path, Section::Upgrade, ParseMode::Execute)?;
            let checksum = calculate_checksum(&statements);
            self.storage.run(|tx, dialect| {
                repository::repair_checksum(tx, dialect, &version, &checksum)
            })?;
            repaired += 1;
        }
        Ok(repaired)
    }

    /// Deletes history rows whose file no longer exists on disk.
    pub fn repair_files(&mut self) -> Result<usize> {
        self.ensure_system_tables()?;
        let history = self.history()?;
        let mut removed = 0;
        for record in history {
            if let Some(version) = &record.version {
                let v = Version::parse(version)?;
                if self.catalog.find_version(&v).is_none() {
                    self.storage
                        .run(|tx, dialect| repository::delete_missing_version(tx, dialect, &v))?;
                    removed += 1;
                }
            } else if !self.catalog.has_repeatable(&record.filename) {
                self.storage.run(|tx, dialect| {
                    repository::delete_missing_repeatable(tx, dialect, &record.filename)
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn lock_status(&mut self) -> Result<LockStatus> {
        self.ensure_system_tables()?;
        self.storage.run(|tx, dialect| lock::status(tx, dialect))
    }

    pub fn force_unlock(&mut self) -> Result<()> {
        self.ensure_system_tables()?;
        self.storage
            .run(|tx, dialect| lock::force_unlock(tx, dialect))
    }
}

/// `count` and `target_version` are mutually exclusive; `count`, if given,
/// must be a positive integer (spec §4.9, §8).
fn validate_count_and_target(count: Option<usize>, target_version: Option<&str>) -> Result<()> {
    if count.is_some() && target_version.is_some() {
        return Err(Error::InvalidArgument(
            "count and to_version are mutually exclusive".to_string(),
        ));
    }
    if let Some(count) = count {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "count must be a positive integer".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecSink;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &std::path::Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn engine(dir: &std::path::Path) -> Engine {
        let storage = StorageAdapter::open_in_memory(Box::new(crate::dialect::SqliteDialect)).unwrap();
        let catalog = Catalog::scan(dir).unwrap();
        Engine { storage, catalog }
    }

    #[test]
    fn first_time_upgrade_applies_all_versions_in_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "V1__a.sql", "-- upgrade\nCREATE TABLE t(x INT);\n");
        write(tmp.path(), "V2__b.sql", "-- upgrade\nALTER TABLE t ADD y INT;\n");

        let mut engine = engine(tmp.path());
        let mut sink = VecSink::default();
        let count = engine
            .upgrade(None, None, &ValidationOptions::default(), &mut sink)
            .unwrap();
        assert_eq!(count, 2);

        let history = engine.history().unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn rollback_one_removes_the_latest_version() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "V1__a.sql",
            "-- upgrade\nCREATE TABLE t(x INT);\n-- rollback\nDROP TABLE t;\n",
        );
        write(
            tmp.path(),
            "V2__b.sql",
            "-- upgrade\nCREATE TABLE u(y INT);\n-- rollback\nDROP TABLE u;\n",
        );

        let mut engine = engine(tmp.path());
        let mut sink = VecSink::default();
        engine
            .upgrade(None, None, &ValidationOptions::default(), &mut sink)
            .unwrap();

        engine.rollback(Some("1"), None, &mut sink).unwrap();
        let history = engine.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version.as_deref(), Some("1"));
    }

    #[test]
    fn checksum_drift_blocks_upgrade() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "V1__a.sql", "-- upgrade\nCREATE TABLE t(x INT);\n");

        let mut engine = engine(tmp.path());
        let mut sink = VecSink::default();
        engine
            .upgrade(None, None, &ValidationOptions::default(), &mut sink)
            .unwrap();

        write(tmp.path(), "V1__a.sql", "-- upgrade\nCREATE TABLE t(x INT, y INT);\n");
        engine.catalog = Catalog::scan(tmp.path()).unwrap();
        write(tmp.path(), "V2__b.sql", "-- upgrade\nSELECT 1;\n");
        engine.catalog = Catalog::scan(tmp.path()).unwrap();

        let err = engine
            .upgrade(None, None, &ValidationOptions::default(), &mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::MigrationChecksumMismatch(_)));
    }

    #[test]
    fn repair_checksums_clears_drift() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "V1__a.sql", "-- upgrade\nCREATE TABLE t(x INT);\n");

        let mut engine = engine(tmp.path());
        let mut sink = VecSink::default();
        engine
            .upgrade(None, None, &ValidationOptions::default(), &mut sink)
            .unwrap();

        write(tmp.path(), "V1__a.sql", "-- upgrade\nCREATE TABLE t(x INT, y INT);\n");
        engine.catalog = Catalog::scan(tmp.path()).unwrap();

        engine.repair_checksums().unwrap();
        engine
            .upgrade(None, None, &ValidationOptions::default(), &mut sink)
            .unwrap();
    }

    #[test]
    fn second_lock_acquisition_fails_while_first_is_held() {
        let tmp = TempDir::new().unwrap();
        let mut engine = engine(tmp.path());
        engine.ensure_system_tables().unwrap();
        let process_id = Uuid::new_v4();
        engine
            .storage
            .run(|tx, dialect| lock::acquire(tx, dialect, &process_id))
            .unwrap();

        let status = engine.storage.run(|tx, dialect| lock::status(tx, dialect)).unwrap();
        assert!(status.is_locked);

        engine
            .storage
            .run(|tx, dialect| lock::release(tx, dialect, &process_id))
            .unwrap();
        let status = engine.storage.run(|tx, dialect| lock::status(tx, dialect)).unwrap();
        assert!(!status.is_locked);
    }
}

// src/repository.rs

//! Reads and writes the `jetbase_migrations` history table.
//!
//! Every operation here is grounded on the original implementation's
//! `MigrationsRepository` (`jetbase/repositories/migrations_repo.py`):
//! table bootstrap, recording a run, fetching the checksums and versions
//! needed by the validator, repairing a stored checksum, and reconciling
//! deleted files.

use crate::catalog::{CatalogEntry, MigrationKind, Version};
use crate::dialect::{Dialect, HistoryFilter};
use crate::error::{Error, Result};
use rusqlite::{params, Transaction};
use std::collections::HashMap;

/// One row of `jetbase_migrations`, in the column order the table defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub order_executed: i64,
    pub version: Option<String>,
    pub description: String,
    pub filename: String,
    pub migration_type: String,
    pub applied_at: String,
    pub checksum: String,
}

/// Creates `jetbase_migrations` if it does not already exist.
pub fn ensure_migrations_table(tx: &Transaction<'_>, dialect: &dyn Dialect) -> Result<()> {
    tx.execute_batch(&dialect.create_migrations_table_stmt())?;
    Ok(())
}

pub fn migrations_table_exists(tx: &Transaction<'_>, dialect: &dyn Dialect) -> Result<bool> {
    let exists: bool = tx.query_row(&dialect.table_exists_query(None), [], |r| r.get(0))?;
    Ok(exists)
}

/// Records a completed versioned migration.
pub fn insert_version(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    entry: &CatalogEntry,
    checksum: &str,
) -> Result<()> {
    tx.execute(
        &dialect.insert_version_stmt(),
        rusqlite::named_params! {
            ":version": entry.version.as_ref().map(|v| v.to_string()),
            ":description": entry.description,
            ":filename": entry.filename,
            ":migration_type": entry.kind.as_str(),
            ":checksum": checksum,
        },
    )?;
    Ok(())
}

/// Records a completed repeatable migration (`RA`/`RC`), inserting a new row
/// on its first run and updating the existing row on subsequent runs.
pub fn upsert_repeatable(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    entry: &CatalogEntry,
    checksum: &str,
    already_recorded: bool,
) -> Result<()> {
    if already_recorded {
        tx.execute(
            &dialect.update_repeatable_stmt(),
            rusqlite::named_params! {
                ":checksum": checksum,
                ":filename": entry.filename,
                ":migration_type": entry.kind.as_str(),
            },
        )?;
    } else {
        tx.execute(
            &dialect.insert_repeatable_stmt(),
            rusqlite::named_params! {
                ":description": entry.description,
                ":filename": entry.filename,
                ":migration_type": entry.kind.as_str(),
                ":checksum": checksum,
            },
        )?;
    }
    Ok(())
}

/// Removes the row for `version` (used by `rollback`).
pub fn delete_version(tx: &Transaction<'_>, dialect: &dyn Dialect, version: &Version) -> Result<()> {
    tx.execute(
        &dialect.delete_version_stmt(),
        rusqlite::named_params! { ":version": version.to_string() },
    )?;
    Ok(())
}

/// Full history, newest first by default, for `jetbase history`.
pub fn fetch_history(tx: &Transaction<'_>, dialect: &dyn Dialect) -> Result<Vec<MigrationRecord>> {
    fetch_with_filter(tx, dialect, &HistoryFilter::default())
}

/// The most recently applied versioned migration, or `None` if none have run.
pub fn fetch_latest_versioned(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
) -> Result<Option<MigrationRecord>> {
    let filter = HistoryFilter {
        ascending: false,
        migration_type: Some("VERSIONED"),
        all_repeatables: false,
    };
    Ok(fetch_with_filter(tx, dialect, &filter)?.into_iter().next())
}

/// Versions ordered newest-first, optionally bounded to `limit` rows or to
/// rows applied strictly after `starting_version`. The original implementation
/// treats supplying both as a usage error (spec §4.3); callers must enforce
/// that mutual exclusion before calling this. Fails with `VersionNotFound` if
/// `starting_version` has never been applied (spec §4.3's `fetch_versions_after`
/// contract), rather than silently returning an empty list.
pub fn fetch_latest_versions(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    limit: Option<u32>,
    starting_version: Option<&Version>,
) -> Result<Vec<String>> {
    let mut stmt = if let Some(starting) = starting_version {
        let exists: i64 = tx.query_row(
            &dialect.check_version_exists_query(),
            rusqlite::named_params! { ":version": starting.to_string() },
            |r| r.get(0),
        )?;
        if exists == 0 {
            return Err(Error::VersionNotFound(starting.to_string()));
        }

        let sql = dialect.latest_versions_by_starting_version_query();
        let mut s = tx.prepare(&sql)?;
        let rows = s
            .query_map(
                rusqlite::named_params! { ":starting_version": starting.to_string() },
                |r| r.get::<_, String>(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        return Ok(rows);
    } else {
        tx.prepare(&dialect.latest_versions_query())?
    };
    let limit = limit.unwrap_or(u32::MAX);
    let rows = stmt
        .query_map(rusqlite::named_params! { ":limit": limit }, |r| {
            r.get::<_, String>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `version -> checksum` for every applied versioned migration, used by the
/// checksum-drift validator.
pub fn fetch_version_checksums(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
) -> Result<HashMap<String, String>> {
    let mut stmt = tx.prepare(&dialect.get_version_checksums_query())?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut map = HashMap::new();
    for row in rows {
        let (version, checksum) = row?;
        map.insert(version, checksum);
    }
    Ok(map)
}

/// Overwrites the stored checksum for `version`, used by `repair-checksums`.
pub fn repair_checksum(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    version: &Version,
    checksum: &str,
) -> Result<()> {
    tx.execute(
        &dialect.repair_checksum_stmt(),
        rusqlite::named_params! { ":checksum": checksum, ":version": version.to_string() },
    )?;
    Ok(())
}

/// `filename -> checksum` for every recorded `RUNS_ON_CHANGE` migration.
pub fn fetch_runs_on_change_checksums(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
) -> Result<HashMap<String, String>> {
    let mut stmt = tx.prepare(&dialect.get_runs_on_change_query())?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut map = HashMap::new();
    for row in rows {
        let (filename, checksum) = row?;
        map.insert(filename, checksum);
    }
    Ok(map)
}

/// Filenames of every recorded `RUNS_ALWAYS` migration.
pub fn fetch_runs_always_filenames(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
) -> Result<Vec<String>> {
    let mut stmt = tx.prepare(&dialect.get_runs_always_query())?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes the history row for a versioned migration file that no longer
/// exists on disk.
pub fn delete_missing_version(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    version: &Version,
) -> Result<()> {
    tx.execute(
        &dialect.delete_missing_version_stmt(),
        rusqlite::named_params! { ":version": version.to_string() },
    )?;
    Ok(())
}

/// Deletes the history row for a repeatable migration file that no longer
/// exists on disk.
pub fn delete_missing_repeatable(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    filename: &str,
) -> Result<()> {
    tx.execute(
        &dialect.delete_missing_repeatable_stmt(),
        rusqlite::named_params! { ":filename": filename },
    )?;
    Ok(())
}

fn fetch_with_filter(
    tx: &Transaction<'_>,
    dialect: &dyn Dialect,
    filter: &HistoryFilter,
) -> Result<Vec<MigrationRecord>> {
    let sql = dialect.migration_records_query(filter);
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt.query_map(params![], |r| {
        Ok(MigrationRecord {
            order_executed: r.get(0)?,
            version: r.get(1)?,
            description: r.get(2)?,
            filename: r.get(3)?,
            migration_type: r.get(4)?,
            applied_at: r.get(5)?,
            checksum: r.get(6)?,
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// `true` if `kind` at `filename` already has a row in history.
pub fn repeatable_is_recorded(
    tx: &Transaction<'_>,
    _dialect: &dyn Dialect,
    filename: &str,
    kind: MigrationKind,
) -> Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM jetbase_migrations WHERE filename = ?1 AND migration_type = ?2",
        params![filename, kind.as_str()],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::catalog::MigrationKind;
    use rusqlite::Connection;
    use std::path::PathBuf;

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        ensure_migrations_table(&tx, &SqliteDialect).unwrap();
        tx.commit().unwrap();
        conn
    }

    fn entry(version: &str, filename: &str) -> CatalogEntry {
        CatalogEntry {
            path: PathBuf::from(filename),
            filename: filename.to_string(),
            description: "desc".to_string(),
            kind: MigrationKind::Versioned,
            version: Some(Version::parse(version).unwrap()),
        }
    }

    #[test]
    fn insert_and_fetch_history_round_trips() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "deadbeef").unwrap();
        let history = fetch_history(&tx, &SqliteDialect).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version.as_deref(), Some("1"));
        assert_eq!(history[0].checksum, "deadbeef");
        tx.commit().unwrap();
    }

    #[test]
    fn latest_versioned_is_most_recent() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "c1").unwrap();
        insert_version(&tx, &SqliteDialect, &entry("2", "V2__b.sql"), "c2").unwrap();
        let latest = fetch_latest_versioned(&tx, &SqliteDialect).unwrap().unwrap();
        assert_eq!(latest.version.as_deref(), Some("2"));
        tx.commit().unwrap();
    }

    #[test]
    fn repair_checksum_overwrites_stored_value() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "stale").unwrap();
        repair_checksum(&tx, &SqliteDialect, &Version::parse("1").unwrap(), "fresh").unwrap();
        let checksums = fetch_version_checksums(&tx, &SqliteDialect).unwrap();
        assert_eq!(checksums.get("1"), Some(&"fresh".to_string()));
        tx.commit().unwrap();
    }

    #[test]
    fn latest_versions_bounded_by_limit() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "c1").unwrap();
        insert_version(&tx, &SqliteDialect, &entry("2", "V2__b.sql"), "c2").unwrap();
        insert_version(&tx, &SqliteDialect, &entry("3", "V3__c.sql"), "c3").unwrap();
        let versions = fetch_latest_versions(&tx, &SqliteDialect, Some(2), None).unwrap();
        assert_eq!(versions, vec!["3".to_string(), "2".to_string()]);
        tx.commit().unwrap();
    }

    #[test]
    fn latest_versions_after_starting_version_excludes_it_and_earlier() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "c1").unwrap();
        insert_version(&tx, &SqliteDialect, &entry("2", "V2__b.sql"), "c2").unwrap();
        insert_version(&tx, &SqliteDialect, &entry("3", "V3__c.sql"), "c3").unwrap();
        let starting = Version::parse("1").unwrap();
        let versions = fetch_latest_versions(&tx, &SqliteDialect, None, Some(&starting)).unwrap();
        assert_eq!(versions, vec!["3".to_string(), "2".to_string()]);
        tx.commit().unwrap();
    }

    #[test]
    fn latest_versions_unknown_starting_version_fails() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "c1").unwrap();
        let starting = Version::parse("9").unwrap();
        let err = fetch_latest_versions(&tx, &SqliteDialect, None, Some(&starting)).unwrap_err();
        assert!(matches!(err, Error::VersionNotFound(_)));
        tx.commit().unwrap();
    }

    #[test]
    fn delete_missing_version_removes_row() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        insert_version(&tx, &SqliteDialect, &entry("1", "V1__a.sql"), "c1").unwrap();
        delete_missing_version(&tx, &SqliteDialect, &Version::parse("1").unwrap()).unwrap();
        assert!(fetch_history(&tx, &SqliteDialect).unwrap().is_empty());
        tx.commit().unwrap();
    }

    #[test]
    fn repeatable_upsert_inserts_then_updates() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        let ra = CatalogEntry {
            path: PathBuf::from("RA__seed.sql"),
            filename: "RA__seed.sql".to_string(),
            description: "seed".to_string(),
            kind: MigrationKind::RunsAlways,
            version: None,
        };
        let recorded = repeatable_is_recorded(&tx, &SqliteDialect, &ra.filename, ra.kind).unwrap();
        assert!(!recorded);
        upsert_repeatable(&tx, &SqliteDialect, &ra, "c1", recorded).unwrap();

        let recorded = repeatable_is_recorded(&tx, &SqliteDialect, &ra.filename, ra.kind).unwrap();
        assert!(recorded);
        upsert_repeatable(&tx, &SqliteDialect, &ra, "c2", recorded).unwrap();

        let history = fetch_history(&tx, &SqliteDialect).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].checksum, "c2");
        tx.commit().unwrap();
    }
}

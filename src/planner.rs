// src/planner.rs

//! Computes the set of migrations an `upgrade` or `rollback` must run,
//! without touching the database itself. Grounded on the original
//! implementation's `get_migration_filepaths_by_version` and the upgrade/
//! rollback driver logic in `jetbase/engine/migration_engine.py`.

use crate::catalog::{Catalog, CatalogEntry, Version};
use crate::error::{Error, Result as JetResult};

/// An ordered batch of work to run, split by kind the way the executor
/// expects: versioned migrations run upgrade statements in ascending order,
/// `RUNS_ALWAYS` files always follow, `RUNS_ON_CHANGE` files run only when
/// their checksum differs from what's stored.
#[derive(Debug, Default)]
pub struct Plan<'a> {
    pub versioned: Vec<&'a CatalogEntry>,
    pub runs_always: Vec<&'a CatalogEntry>,
    pub runs_on_change: Vec<&'a CatalogEntry>,
}

impl Plan<'_> {
    pub fn is_empty(&self) -> bool {
        self.versioned.is_empty() && self.runs_always.is_empty() && self.runs_on_change.is_empty()
    }

    pub fn total(&self) -> usize {
        self.versioned.len() + self.runs_always.len() + self.runs_on_change.len()
    }
}

/// Plans an `upgrade`: every versioned file newer than `latest_applied`, up
/// to and including `target_version` if given, or truncated to a prefix of
/// length `count` if given instead (the two are mutually exclusive; callers
/// enforce that and `count`'s positivity before calling this — spec §4.9,
/// §8), then every `RUNS_ALWAYS` file, then every `RUNS_ON_CHANGE` file whose
/// checksum differs from `on_change`.
pub fn plan_upgrade<'a>(
    catalog: &'a Catalog,
    latest_applied: Option<&Version>,
    target_version: Option<&Version>,
    count: Option<usize>,
    on_change_checksums: &std::collections::HashMap<String, String>,
    on_change_current: impl Fn(&CatalogEntry) -> crate::error::Result<String>,
) -> crate::error::Result<Plan<'a>> {
    let start = latest_applied;
    let versioned = catalog.versioned_in_range(start, target_version);
    let mut versioned: Vec<&CatalogEntry> = versioned
        .into_iter()
        .filter(|e| match (start, e.version.as_ref()) {
            (Some(s), Some(v)) => v > s,
            _ => true,
        })
        .collect();
    if let Some(count) = count {
        versioned.truncate(count);
    }

    let runs_always = catalog.runs_always().iter().collect();

    let mut runs_on_change = Vec::new();
    for entry in catalog.runs_on_change() {
        let current = on_change_current(entry)?;
        let changed = on_change_checksums
            .get(&entry.filename)
            .map(|stored| stored != &current)
            .unwrap_or(true);
        if changed {
            runs_on_change.push(entry);
        }
    }

    Ok(Plan {
        versioned,
        runs_always,
        runs_on_change,
    })
}

/// Plans a `rollback` from applied history rather than the on-disk catalog
/// (spec §4.9): `applied_versions_desc` is the already newest-first list of
/// versions actually recorded in `jetbase_migrations` (see
/// `repository::fetch_latest_versions`), bounded by the caller to either the
/// latest `count` rows or every row applied after `to_version`. Each version
/// is looked up in the catalog to find its rollback SQL; a version that was
/// applied but whose file has since disappeared fails with `VersionNotFound`
/// rather than being silently skipped or rolling back some other file.
pub fn plan_rollback<'a>(
    catalog: &'a Catalog,
    applied_versions_desc: &[String],
) -> JetResult<Plan<'a>> {
    let mut versioned = Vec::with_capacity(applied_versions_desc.len());
    for raw in applied_versions_desc {
        let version = Version::parse(raw)?;
        let entry = catalog
            .find_version(&version)
            .ok_or_else(|| Error::VersionNotFound(raw.clone()))?;
        versioned.push(entry);
    }
    Ok(Plan {
        versioned,
        runs_always: Vec::new(),
        runs_on_change: Vec::new(),
    })
}

/// The subset of on-disk versions that have not yet been applied, in
/// ascending order — used by the validator's out-of-order check.
pub fn pending_versioned<'a>(
    catalog: &'a Catalog,
    latest_applied: Option<&Version>,
) -> Vec<&'a Version> {
    catalog
        .versioned()
        .iter()
        .filter(|e| {
            latest_applied
                .map(|latest| e.version.as_ref().unwrap() > latest)
                .unwrap_or(true)
        })
        .map(|e| e.version.as_ref().unwrap())
        .collect()
}

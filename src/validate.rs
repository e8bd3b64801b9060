// src/validate.rs

//! Pre-flight checks run before any migration is applied.
//!
//! Each function mirrors one check from the original implementation's
//! `jetbase/core/checksum.py` and `jetbase/core/version.py`: files that
//! changed after being applied, duplicate versions on disk, out-of-order new
//! files, and history rows (versioned or repeatable) whose file has
//! disappeared. `validate_all` runs all five checks from spec §4.8.

use crate::catalog::{Catalog, Version};
use crate::checksum::calculate_checksum;
use crate::error::{Error, Result};
use crate::parser::{self, ParseMode, Section};
use std::collections::HashMap;

/// Which validator checks to skip; every field defaults to `false` so a
/// caller has to opt out explicitly (matching the original's `validate=True`
/// default on `upgrade`). Named and grouped the way `EngineConfig` is:
/// `skip_checksum_validation` gates the checksum-fidelity check alone,
/// `skip_file_validation` gates the order and both present-on-disk checks,
/// and `skip_validation` is the coarse flag that implies both.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    pub skip_validation: bool,
    pub skip_checksum_validation: bool,
    pub skip_file_validation: bool,
}

impl ValidationOptions {
    fn checksums_enabled(&self) -> bool {
        !self.skip_validation && !self.skip_checksum_validation
    }

    fn file_checks_enabled(&self) -> bool {
        !self.skip_validation && !self.skip_file_validation
    }
}

/// Recomputes every versioned file's checksum and compares it against the
/// value stored when it was applied. The first mismatch is reported; a
/// mismatch means the file was edited after being run and must not be
/// silently re-applied or skipped.
pub fn validate_checksums_match(
    catalog: &Catalog,
    stored: &HashMap<String, String>,
) -> Result<()> {
    for entry in catalog.versioned() {
        let version = entry.version.as_ref().unwrap();
        let Some(expected) = stored.get(version.as_str()) else {
            continue;
        };
        let statements = parser::parse_section(&entry.path, Section::Upgrade, ParseMode::Execute)?;
        let actual = calculate_checksum(&statements);
        if &actual != expected {
            return Err(Error::MigrationChecksumMismatch(version.to_string()));
        }
    }
    Ok(())
}

/// Every version recorded as migrated must still exist as a file on disk.
pub fn validate_migrated_versions_present(
    catalog: &Catalog,
    migrated_versions: &[String],
) -> Result<()> {
    for raw in migrated_versions {
        let version = Version::parse(raw)?;
        if catalog.find_version(&version).is_none() {
            return Err(Error::VersionNotFound(raw.clone()));
        }
    }
    Ok(())
}

/// No pending (not yet applied) file may carry a version lower than the
/// latest one already applied — migrations are numbered in the order they
/// are meant to run. Callers pass only the unapplied subset of the catalog
/// (see `planner::pending_versioned`); an already-applied version sorting
/// below `latest_applied` is expected and not a violation.
pub fn validate_no_new_file_below_latest(
    pending: &[&Version],
    latest_applied: Option<&Version>,
) -> Result<()> {
    let Some(latest) = latest_applied else {
        return Ok(());
    };
    for version in pending {
        if *version < latest {
            return Err(Error::OutOfOrderMigration(version.to_string()));
        }
    }
    Ok(())
}

/// Every repeatable (`RA`/`RC`) file recorded as applied must still exist on
/// disk under the same filename. Reuses `VersionNotFound` for the failure
/// (repeatables have no version, only a filename, but the defect is the same
/// shape: history points at a file the catalog no longer has).
pub fn validate_applied_repeatables_present(
    catalog: &Catalog,
    applied_repeatable_filenames: &[String],
) -> Result<()> {
    for filename in applied_repeatable_filenames {
        if !catalog.has_repeatable(filename) {
            return Err(Error::VersionNotFound(filename.clone()));
        }
    }
    Ok(())
}

/// Duplicate on-disk versions are already rejected during `Catalog::scan`;
/// this re-check exists for callers (like `jetbase validate`) that want an
/// explicit, named error rather than relying on scan-time failure.
pub fn validate_no_duplicate_versions(catalog: &Catalog) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for entry in catalog.versioned() {
        let version = entry.version.as_ref().unwrap().to_string();
        if !seen.insert(version.clone()) {
            return Err(Error::DuplicateMigrationVersion(version));
        }
    }
    Ok(())
}

/// Runs the full validator suite against `catalog`: five checks in total
/// (spec §4.8) — duplicate versions (always on), checksum fidelity (gated by
/// `skip_checksum_validation`), and applied-versions-present,
/// applied-repeatables-present, and out-of-order (all three gated by
/// `skip_file_validation`). `upgrade` always runs all five unless the caller
/// opts out via `options`.
#[allow(clippy::too_many_arguments)]
pub fn validate_all(
    catalog: &Catalog,
    stored_checksums: &HashMap<String, String>,
    migrated_versions: &[String],
    applied_repeatable_filenames: &[String],
    pending: &[&Version],
    latest_applied: Option<&Version>,
    options: &ValidationOptions,
) -> Result<()> {
    validate_no_duplicate_versions(catalog)?;
    if options.checksums_enabled() {
        validate_checksums_match(catalog, stored_checksums)?;
    }
    if options.file_checks_enabled() {
        validate_migrated_versions_present(catalog, migrated_versions)?;
        validate_applied_repeatables_present(catalog, applied_repeatable_filenames)?;
        validate_no_new_file_below_latest(pending, latest_applied)?;
    }
    Ok(())
}

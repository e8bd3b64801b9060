// src/catalog.rs

//! Walks the migrations directory and classifies every `.sql` file.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const MAX_FILENAME_LEN: usize = 512;

fn check_filename_length(filename: &str) -> Result<()> {
    if filename.len() > MAX_FILENAME_LEN {
        return Err(Error::MigrationFilenameTooLong(
            filename.to_string(),
            filename.len(),
        ));
    }
    Ok(())
}

fn versioned_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^V(?P<version>\d+([._]\d+)*)__(?P<desc>\S.*?)\.sql$").unwrap())
}

fn repeatable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<kind>RA|RC)__(?P<desc>\S.*?)\.sql$").unwrap())
}

/// A version key, ordered numerically component-by-component rather than
/// lexically (so `1.9` sorts before `1.10`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    normalized: String,
    components: Vec<u64>,
}

impl Version {
    /// Parses a raw version token (e.g. `1`, `1.2`, `1_2_3`). Underscores
    /// and dots are equivalent separators and are normalized to dots.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidMigrationFilename(format!(
                "empty version token: {raw}"
            )));
        }
        let components: std::result::Result<Vec<u64>, _> = raw
            .split(['.', '_'])
            .map(|part| part.parse::<u64>())
            .collect();
        let components = components.map_err(|_| {
            Error::InvalidMigrationFilename(format!("invalid version token: {raw}"))
        })?;
        let normalized = components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Ok(Version {
            normalized,
            components,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.components.cmp(&other.components)
    }
}

/// Which kind of migration a file represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    Versioned,
    RunsAlways,
    RunsOnChange,
}

impl MigrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::Versioned => "VERSIONED",
            MigrationKind::RunsAlways => "RUNS_ALWAYS",
            MigrationKind::RunsOnChange => "RUNS_ON_CHANGE",
        }
    }
}

/// A single file found in the migrations directory.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub filename: String,
    pub description: String,
    pub kind: MigrationKind,
    pub version: Option<Version>,
}

/// The full set of migration files found on disk for one operation.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Versioned entries ordered ascending by numeric version.
    versioned: Vec<CatalogEntry>,
    /// Runs-always entries, sorted alphabetically by filename.
    runs_always: Vec<CatalogEntry>,
    /// Runs-on-change entries, sorted alphabetically by filename.
    runs_on_change: Vec<CatalogEntry>,
}

impl Catalog {
    /// Walks `dir` (non-recursively, one directory of `.sql` files) and
    /// builds the classified catalog. Fails fast on the first invalid or
    /// duplicate-version file encountered.
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut versioned_by_version: BTreeMap<Version, CatalogEntry> = BTreeMap::new();
        let mut runs_always = Vec::new();
        let mut runs_on_change = Vec::new();

        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let filename = entry.file_name().to_string_lossy().into_owned();

            if !filename.ends_with(".sql") {
                continue;
            }
            check_filename_length(&filename)?;

            if let Some(caps) = versioned_re().captures(&filename) {
                let raw_version = &caps["version"];
                let desc = caps["desc"].replace('_', " ");
                let version = Version::parse(raw_version)?;

                if versioned_by_version.contains_key(&version) {
                    return Err(Error::DuplicateMigrationVersion(version.to_string()));
                }

                versioned_by_version.insert(
                    version.clone(),
                    CatalogEntry {
                        path,
                        filename,
                        description: desc,
                        kind: MigrationKind::Versioned,
                        version: Some(version),
                    },
                );
            } else if let Some(caps) = repeatable_re().captures(&filename) {
                let desc = caps["desc"].replace('_', " ");
                let kind = if &caps["kind"] == "RA" {
                    MigrationKind::RunsAlways
                } else {
                    MigrationKind::RunsOnChange
                };
                let entry = CatalogEntry {
                    path,
                    filename,
                    description: desc,
                    kind,
                    version: None,
                };
                match kind {
                    MigrationKind::RunsAlways => runs_always.push(entry),
                    MigrationKind::RunsOnChange => runs_on_change.push(entry),
                    MigrationKind::Versioned => unreachable!(),
                }
            } else {
                return Err(Error::InvalidMigrationFilename(filename));
            }
        }

        runs_always.sort_by(|a, b| a.filename.cmp(&b.filename));
        runs_on_change.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(Catalog {
            versioned: versioned_by_version.into_values().collect(),
            runs_always,
            runs_on_change,
        })
    }

    /// Versioned entries, ascending by numeric version, optionally bounded
    /// by `start_from` (inclusive) and `end` (inclusive).
    pub fn versioned_in_range<'a>(
        &'a self,
        start_from: Option<&Version>,
        end: Option<&Version>,
    ) -> Vec<&'a CatalogEntry> {
        self.versioned
            .iter()
            .filter(|e| {
                let v = e.version.as_ref().unwrap();
                start_from.map(|s| v >= s).unwrap_or(true) && end.map(|e2| v <= e2).unwrap_or(true)
            })
            .collect()
    }

    pub fn versioned(&self) -> &[CatalogEntry] {
        &self.versioned
    }

    pub fn runs_always(&self) -> &[CatalogEntry] {
        &self.runs_always
    }

    pub fn runs_on_change(&self) -> &[CatalogEntry] {
        &self.runs_on_change
    }

    pub fn find_version(&self, version: &Version) -> Option<&CatalogEntry> {
        self.versioned.iter().find(|e| e.version.as_ref() == Some(version))
    }

    pub fn has_repeatable(&self, filename: &str) -> bool {
        self.runs_always.iter().any(|e| e.filename == filename)
            || self.runs_on_change.iter().any(|e| e.filename == filename)
    }
}

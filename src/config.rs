// src/config.rs

//! Layered configuration: TOML file, then `JETBASE_*` environment
//! variables, then CLI flags (highest precedence).
//!
//! Deliberate departure from the original implementation, whose config
//! loader `exec`s an arbitrary Python file supplied by path. That is not a
//! pattern Rust has an idiomatic equivalent for and is exactly the kind of
//! redesign called for: a typed struct deserialized from TOML.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fully resolved configuration for one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub migrations_dir: PathBuf,
    pub postgres_schema: Option<String>,
    /// Coarse skip: implies both `skip_checksum_validation` and
    /// `skip_file_validation`.
    pub skip_validation: bool,
    pub skip_checksum_validation: bool,
    pub skip_file_validation: bool,
}

/// Shape of `jetbase.toml`; every field is optional since env vars and CLI
/// flags can supply them instead.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub postgres_schema: Option<String>,
    pub skip_validation: Option<bool>,
    pub skip_checksum_validation: Option<bool>,
    pub skip_file_validation: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(Error::from)
    }
}

/// Values pulled from `JETBASE_*` environment variables.
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub postgres_schema: Option<String>,
    pub skip_validation: Option<bool>,
    pub skip_checksum_validation: Option<bool>,
    pub skip_file_validation: Option<bool>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("JETBASE_DATABASE_URL").ok(),
            migrations_dir: std::env::var("JETBASE_MIGRATIONS_DIR").ok().map(PathBuf::from),
            postgres_schema: std::env::var("JETBASE_POSTGRES_SCHEMA").ok(),
            skip_validation: std::env::var("JETBASE_SKIP_VALIDATION")
                .ok()
                .and_then(|v| v.parse().ok()),
            skip_checksum_validation: std::env::var("JETBASE_SKIP_CHECKSUM_VALIDATION")
                .ok()
                .and_then(|v| v.parse().ok()),
            skip_file_validation: std::env::var("JETBASE_SKIP_FILE_VALIDATION")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// CLI-flag overrides; `None` fields fall through to env/file layers.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub postgres_schema: Option<String>,
    pub skip_validation: Option<bool>,
    pub skip_checksum_validation: Option<bool>,
    pub skip_file_validation: Option<bool>,
}

impl EngineConfig {
    /// Resolves the final configuration: CLI flags win, then env vars, then
    /// the TOML file, then built-in defaults (every `skip_*` defaults to
    /// `false`; validation runs in full unless told otherwise).
    pub fn resolve(file: FileConfig, env: EnvConfig, cli: CliOverrides) -> Result<Self> {
        let database_url = cli
            .database_url
            .or(env.database_url)
            .or(file.database_url)
            .ok_or(Error::MissingConfig("database_url"))?;

        let migrations_dir = cli
            .migrations_dir
            .or(env.migrations_dir)
            .or(file.migrations_dir)
            .ok_or(Error::MissingConfig("migrations_dir"))?;

        let postgres_schema = cli.postgres_schema.or(env.postgres_schema).or(file.postgres_schema);

        let skip_validation = cli
            .skip_validation
            .or(env.skip_validation)
            .or(file.skip_validation)
            .unwrap_or(false);
        let skip_checksum_validation = cli
            .skip_checksum_validation
            .or(env.skip_checksum_validation)
            .or(file.skip_checksum_validation)
            .unwrap_or(false);
        let skip_file_validation = cli
            .skip_file_validation
            .or(env.skip_file_validation)
            .or(file.skip_file_validation)
            .unwrap_or(false);

        Ok(Self {
            database_url,
            migrations_dir,
            postgres_schema,
            skip_validation,
            skip_checksum_validation,
            skip_file_validation,
        })
    }
}

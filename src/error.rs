// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for jetbase
#[derive(Error, Debug)]
pub enum Error {
    /// A migration filename does not match `V<version>__<desc>.sql`,
    /// `RA__<desc>.sql`, or `RC__<desc>.sql`.
    #[error("invalid migration filename: {0}")]
    InvalidMigrationFilename(String),

    /// A migration filename exceeds the 512-character limit.
    #[error("migration filename too long ({1} chars, max 512): {0}")]
    MigrationFilenameTooLong(String, usize),

    /// Two migration files on disk share the same version.
    #[error("duplicate migration version: {0}")]
    DuplicateMigrationVersion(String),

    /// A new migration file has a version lower than the latest applied one.
    #[error("out-of-order migration: {0}")]
    OutOfOrderMigration(String),

    /// A migration file's recomputed checksum no longer matches the stored one.
    #[error("checksum mismatch for version {0}: file has changed since it was applied")]
    MigrationChecksumMismatch(String),

    /// The catalog and history disagree about which version a row refers to.
    #[error("version mismatch: expected {expected}, found {found}")]
    MigrationVersionMismatch { expected: String, found: String },

    /// A rollback or `to_version` target does not exist in history or on disk.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// The migration lock row is already held by another process.
    #[error(
        "migration lock is already held by another process.\n\n\
         If you are completely sure that no other migrations are running, \
         you can unlock using:\n  jetbase unlock\n\n\
         WARNING: Unlocking then running a migration while another migration \
         process is running may lead to database corruption."
    )]
    AlreadyLocked,

    /// The configured migrations directory does not exist.
    #[error("migrations directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// An operation received mutually-exclusive or otherwise invalid arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The configured database URL's scheme does not map to a known dialect.
    #[error("unsupported database dialect for url: {0}")]
    UnsupportedDialect(String),

    /// A required configuration value was not supplied by file, env, or CLI flag.
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Underlying database driver error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error reading a migration file or config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file failed to parse as TOML.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The operation was cancelled before it could complete.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias using jetbase's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps an error to the CLI exit code it corresponds to (spec §6).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => 2,
            Error::VersionNotFound(_) => 2,
            Error::AlreadyLocked => 3,
            Error::MigrationChecksumMismatch(_)
            | Error::MigrationVersionMismatch { .. }
            | Error::OutOfOrderMigration(_)
            | Error::InvalidMigrationFilename(_)
            | Error::MigrationFilenameTooLong(_, _)
            | Error::DuplicateMigrationVersion(_) => 4,
            _ => 1,
        }
    }
}

// src/storage.rs

//! Opens a connection and runs a unit of work inside a single transaction.

use crate::dialect::{self, Dialect};
use crate::error::Result;
use rusqlite::Connection;

/// Wraps a database connection and the dialect selected for it.
///
/// Only SQLite is wired to a live driver (see DESIGN.md); the `dialect`
/// behind this adapter is still resolved from the configured URL so the
/// statement text always matches the configured backend even when the
/// connection itself is a SQLite stand-in used for local development.
pub struct StorageAdapter {
    conn: Connection,
    dialect: Box<dyn Dialect>,
    postgres_schema: Option<String>,
}

impl StorageAdapter {
    /// Opens a connection for `database_url`, selecting the dialect from its
    /// scheme. `postgres_schema` is applied via `SET search_path` on every
    /// transaction when the active dialect is PostgreSQL.
    pub fn open(database_url: &str, postgres_schema: Option<String>) -> Result<Self> {
        let dialect = dialect::for_url(database_url)?;
        let path = sqlite_path(database_url);
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        Ok(Self {
            conn,
            dialect,
            postgres_schema,
        })
    }

    /// Opens an in-memory connection, used by tests and dry-run previews
    /// that must not touch a real database file.
    pub fn open_in_memory(dialect: Box<dyn Dialect>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            dialect,
            postgres_schema: None,
        })
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Runs `f` inside a single transaction: commits on `Ok`, rolls back on
    /// `Err`. If a PostgreSQL schema is configured, `SET search_path` is
    /// executed first.
    pub fn run<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction<'_>, &dyn Dialect) -> Result<T>,
    ) -> Result<T> {
        let tx = self.conn.transaction()?;

        if self.dialect.name() == "postgres" {
            if let Some(schema) = &self.postgres_schema {
                tx.execute_batch(&format!("SET search_path TO {schema}"))?;
            }
        }

        let dialect = self.dialect.as_ref();
        let result = f(&tx, dialect);
        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                // rolled back implicitly on Drop; explicit for clarity/logging
                let _ = tx.rollback();
                Err(e)
            }
        }
    }

    /// Suppresses noisy driver-level log output for the duration of `f`,
    /// restoring the prior tracing level on exit. A no-op for backends (like
    /// SQLite) that have nothing to suppress; meaningful for Databricks,
    /// whose JDBC-style driver logs verbosely at `INFO`.
    pub fn with_suppressed_driver_logs<T>(&self, f: impl FnOnce() -> T) -> T {
        if self.dialect.name() != "databricks" {
            return f();
        }
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }
}

/// Strips a `sqlite://` prefix if present; otherwise the URL is already a
/// bare filesystem path.
fn sqlite_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .unwrap_or(database_url)
}

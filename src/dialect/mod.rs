// src/dialect/mod.rs

//! Per-backend SQL text and behavior.
//!
//! `Dialect` is a trait with default method bodies targeting PostgreSQL —
//! mirroring the original implementation's `BaseQueries` class, whose
//! Postgres subclass is empty because the base class already returns
//! Postgres-flavored SQL. Every other backend overrides only the methods
//! where its SQL genuinely differs (identity columns, catalog queries,
//! boolean encoding, lock-row initialization, timestamp precision).
//!
//! Only [`sqlite::SqliteDialect`] is wired to a live driver by
//! [`crate::storage::StorageAdapter`] (see DESIGN.md); the others are fully
//! implemented and unit-tested at the SQL-text level.

mod databricks;
mod mysql;
mod postgres;
mod snowflake;
mod sqlite;

pub use databricks::DatabricksDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use snowflake::SnowflakeDialect;
pub use sqlite::SqliteDialect;

use crate::error::{Error, Result};

/// Filters applied to a history snapshot query (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub ascending: bool,
    pub migration_type: Option<&'static str>,
    pub all_repeatables: bool,
}

/// Per-backend SQL text and behavior for the two system tables.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Column DDL fragment for the migrations table's identity column.
    fn identity_column_ddl(&self) -> &'static str {
        "INTEGER GENERATED ALWAYS AS IDENTITY"
    }

    /// Boolean literal text for this backend's encoding.
    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Expression producing the current timestamp at microsecond precision.
    fn now_expr(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn create_migrations_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS jetbase_migrations (
                order_executed {id} PRIMARY KEY,
                version TEXT,
                description TEXT,
                filename TEXT NOT NULL,
                migration_type TEXT NOT NULL,
                applied_at TIMESTAMP DEFAULT {now},
                checksum TEXT
            )",
            id = self.identity_column_ddl(),
            now = self.now_expr(),
        )
    }

    fn create_lock_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS jetbase_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                is_locked BOOLEAN NOT NULL DEFAULT {false_lit},
                locked_at TIMESTAMP,
                process_id TEXT
            )",
            false_lit = self.bool_literal(false),
        )
    }

    /// Insert-if-absent idiom for the singleton lock row.
    fn initialize_lock_record_stmt(&self) -> String {
        format!(
            "INSERT INTO jetbase_lock (id, is_locked) VALUES (1, {false_lit}) \
             ON CONFLICT (id) DO NOTHING",
            false_lit = self.bool_literal(false),
        )
    }

    fn table_exists_query(&self, schema: Option<&str>) -> String {
        let schema = schema.unwrap_or("public");
        format!(
            "SELECT COUNT(*) > 0 FROM information_schema.tables \
             WHERE table_schema = '{schema}' AND table_name = 'jetbase_migrations'"
        )
    }

    fn lock_table_exists_query(&self, schema: Option<&str>) -> String {
        let schema = schema.unwrap_or("public");
        format!(
            "SELECT COUNT(*) > 0 FROM information_schema.tables \
             WHERE table_schema = '{schema}' AND table_name = 'jetbase_lock'"
        )
    }

    fn acquire_lock_stmt(&self) -> String {
        format!(
            "UPDATE jetbase_lock SET is_locked = {true_lit}, locked_at = :locked_at, \
             process_id = :process_id WHERE id = 1 AND is_locked = {false_lit}",
            true_lit = self.bool_literal(true),
            false_lit = self.bool_literal(false),
        )
    }

    fn release_lock_stmt(&self) -> String {
        "UPDATE jetbase_lock SET is_locked = FALSE, locked_at = NULL, process_id = NULL \
         WHERE id = 1 AND process_id = :process_id"
            .to_string()
    }

    fn force_unlock_stmt(&self) -> String {
        "UPDATE jetbase_lock SET is_locked = FALSE, locked_at = NULL, process_id = NULL \
         WHERE id = 1"
            .to_string()
    }

    fn check_lock_status_stmt(&self) -> String {
        "SELECT is_locked, locked_at, process_id FROM jetbase_lock WHERE id = 1".to_string()
    }

    fn insert_version_stmt(&self) -> String {
        "INSERT INTO jetbase_migrations \
         (version, description, filename, migration_type, checksum) \
         VALUES (:version, :description, :filename, :migration_type, :checksum)"
            .to_string()
    }

    fn delete_version_stmt(&self) -> String {
        "DELETE FROM jetbase_migrations WHERE version = :version".to_string()
    }

    fn update_repeatable_stmt(&self) -> String {
        format!(
            "UPDATE jetbase_migrations SET checksum = :checksum, applied_at = {now} \
             WHERE filename = :filename AND migration_type = :migration_type",
            now = self.now_expr(),
        )
    }

    fn insert_repeatable_stmt(&self) -> String {
        "INSERT INTO jetbase_migrations \
         (version, description, filename, migration_type, checksum) \
         VALUES (NULL, :description, :filename, :migration_type, :checksum)"
            .to_string()
    }

    fn migration_records_query(&self, filter: &HistoryFilter) -> String {
        let mut where_clauses = Vec::new();
        if let Some(mt) = filter.migration_type {
            where_clauses.push(format!("migration_type = '{mt}'"));
        }
        if filter.all_repeatables {
            where_clauses.push(
                "migration_type IN ('RUNS_ALWAYS', 'RUNS_ON_CHANGE')".to_string(),
            );
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };
        let order = if filter.ascending { "ASC" } else { "DESC" };
        format!(
            "SELECT order_executed, version, description, filename, migration_type, \
             applied_at, checksum FROM jetbase_migrations{where_sql} ORDER BY order_executed {order}"
        )
    }

    fn latest_versions_query(&self) -> String {
        "SELECT version FROM jetbase_migrations WHERE migration_type = 'VERSIONED' \
         ORDER BY order_executed DESC LIMIT :limit"
            .to_string()
    }

    fn check_version_exists_query(&self) -> String {
        "SELECT COUNT(*) FROM jetbase_migrations WHERE version = :version".to_string()
    }

    fn latest_versions_by_starting_version_query(&self) -> String {
        "SELECT version FROM jetbase_migrations \
         WHERE migration_type = 'VERSIONED' AND order_executed > \
         (SELECT order_executed FROM jetbase_migrations WHERE version = :starting_version) \
         ORDER BY order_executed DESC"
            .to_string()
    }

    fn get_version_checksums_query(&self) -> String {
        "SELECT version, checksum FROM jetbase_migrations \
         WHERE migration_type = 'VERSIONED' ORDER BY order_executed ASC"
            .to_string()
    }

    fn repair_checksum_stmt(&self) -> String {
        "UPDATE jetbase_migrations SET checksum = :checksum WHERE version = :version".to_string()
    }

    fn get_runs_on_change_query(&self) -> String {
        "SELECT filename, checksum FROM jetbase_migrations \
         WHERE migration_type = 'RUNS_ON_CHANGE'"
            .to_string()
    }

    fn get_runs_always_query(&self) -> String {
        "SELECT filename FROM jetbase_migrations WHERE migration_type = 'RUNS_ALWAYS'"
            .to_string()
    }

    fn delete_missing_version_stmt(&self) -> String {
        "DELETE FROM jetbase_migrations WHERE version = :version".to_string()
    }

    fn delete_missing_repeatable_stmt(&self) -> String {
        "DELETE FROM jetbase_migrations WHERE filename = :filename".to_string()
    }
}

/// Resolves the active dialect from a connection URL's scheme.
pub fn for_url(url: &str) -> Result<Box<dyn Dialect>> {
    let scheme = url.split("://").next().unwrap_or("");
    match scheme {
        "postgres" | "postgresql" => Ok(Box::new(PostgresDialect)),
        "mysql" => Ok(Box::new(MySqlDialect)),
        "sqlite" => Ok(Box::new(SqliteDialect)),
        "snowflake" => Ok(Box::new(SnowflakeDialect)),
        "databricks" => Ok(Box::new(DatabricksDialect)),
        _ if !url.contains("://") => Ok(Box::new(SqliteDialect)),
        other => Err(Error::UnsupportedDialect(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_schemes() {
        assert_eq!(for_url("postgres://localhost/db").unwrap().name(), "postgres");
        assert_eq!(for_url("postgresql://localhost/db").unwrap().name(), "postgres");
        assert_eq!(for_url("mysql://localhost/db").unwrap().name(), "mysql");
        assert_eq!(for_url("sqlite:///tmp/db.sqlite").unwrap().name(), "sqlite");
        assert_eq!(for_url("snowflake://account/db").unwrap().name(), "snowflake");
        assert_eq!(for_url("databricks://host/db").unwrap().name(), "databricks");
    }

    #[test]
    fn bare_path_defaults_to_sqlite() {
        assert_eq!(for_url("/tmp/jetbase.db").unwrap().name(), "sqlite");
    }

    #[test]
    fn rejects_unknown_scheme() {
        match for_url("oracle://localhost/db") {
            Err(Error::UnsupportedDialect(_)) => {}
            other => panic!("expected UnsupportedDialect, got {}", other.is_ok()),
        }
    }
}

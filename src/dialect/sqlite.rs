// src/dialect/sqlite.rs

use super::{Dialect, HistoryFilter};

/// SQLite-flavored queries.
///
/// Overrides identity column syntax, catalog lookups (`sqlite_master`
/// instead of `information_schema`), boolean encoding (0/1 instead of native
/// `BOOLEAN`), timestamp formatting, and the insert-if-absent idiom for the
/// lock row, the way the original implementation's `SQLiteQueries` class
/// overrides exactly these methods and nothing else.
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn identity_column_ddl(&self) -> &'static str {
        "INTEGER"
    }

    fn create_migrations_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS jetbase_migrations (
                order_executed INTEGER PRIMARY KEY AUTOINCREMENT,
                version TEXT,
                description TEXT,
                filename TEXT NOT NULL,
                migration_type TEXT NOT NULL,
                applied_at TIMESTAMP DEFAULT {now},
                checksum TEXT
            )",
            now = self.now_expr(),
        )
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn now_expr(&self) -> &'static str {
        "(STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW'))"
    }

    fn table_exists_query(&self, _schema: Option<&str>) -> String {
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'jetbase_migrations'"
            .to_string()
    }

    fn lock_table_exists_query(&self, _schema: Option<&str>) -> String {
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'jetbase_lock'"
            .to_string()
    }

    fn initialize_lock_record_stmt(&self) -> String {
        "INSERT OR IGNORE INTO jetbase_lock (id, is_locked) VALUES (1, 0)".to_string()
    }

    fn acquire_lock_stmt(&self) -> String {
        "UPDATE jetbase_lock SET is_locked = 1, locked_at = :locked_at, process_id = :process_id \
         WHERE id = 1 AND is_locked = 0"
            .to_string()
    }

    fn release_lock_stmt(&self) -> String {
        "UPDATE jetbase_lock SET is_locked = 0, locked_at = NULL, process_id = NULL \
         WHERE id = 1 AND process_id = :process_id"
            .to_string()
    }

    fn force_unlock_stmt(&self) -> String {
        "UPDATE jetbase_lock SET is_locked = 0, locked_at = NULL, process_id = NULL WHERE id = 1"
            .to_string()
    }

    fn update_repeatable_stmt(&self) -> String {
        "UPDATE jetbase_migrations SET checksum = :checksum, \
         applied_at = STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW') \
         WHERE filename = :filename AND migration_type = :migration_type"
            .to_string()
    }

    fn migration_records_query(&self, filter: &HistoryFilter) -> String {
        let mut where_clauses = Vec::new();
        if let Some(mt) = filter.migration_type {
            where_clauses.push(format!("migration_type = '{mt}'"));
        }
        if filter.all_repeatables {
            where_clauses
                .push("migration_type IN ('RUNS_ALWAYS', 'RUNS_ON_CHANGE')".to_string());
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
}

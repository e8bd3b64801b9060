// src/dialect/mysql.rs

use super::Dialect;

/// MySQL-flavored queries.
///
/// Overrides identity column syntax (`AUTO_INCREMENT`), the table-existence
/// check (`DATABASE()` instead of a configured schema name), boolean
/// encoding (`TINYINT(1)`), and the lock-row insert-if-absent idiom
/// (`INSERT IGNORE`).
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identity_column_ddl(&self) -> &'static str {
        "INTEGER AUTO_INCREMENT"
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn table_exists_query(&self, _schema: Option<&str>) -> String {
        "SELECT COUNT(*) > 0 FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name = 'jetbase_migrations'"
            .to_string()
    }

    fn lock_table_exists_query(&self, _schema: Option<&str>) -> String {
        "SELECT COUNT(*) > 0 FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name = 'jetbase_lock'"
            .to_string()
    }

    fn initialize_lock_record_stmt(&self) -> String {
        "INSERT IGNORE INTO jetbase_lock (id, is_locked) VALUES (1, 0)".to_string()
    }
}

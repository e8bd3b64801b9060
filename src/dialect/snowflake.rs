// src/dialect/snowflake.rs

use super::Dialect;

/// Snowflake-flavored queries.
///
/// Overrides identity column syntax and the lock-row initialization, which
/// uses a `MERGE` rather than an `INSERT ... ON CONFLICT`/`INSERT OR IGNORE`
/// idiom since Snowflake's `INSERT` has no native upsert clause.
pub struct SnowflakeDialect;

impl Dialect for SnowflakeDialect {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn identity_column_ddl(&self) -> &'static str {
        "INTEGER AUTOINCREMENT"
    }

    fn initialize_lock_record_stmt(&self) -> String {
        "MERGE INTO jetbase_lock USING (SELECT 1 AS id) AS src ON jetbase_lock.id = src.id \
         WHEN NOT MATCHED THEN INSERT (id, is_locked) VALUES (1, FALSE)"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_column_uses_autoincrement_keyword() {
        assert_eq!(SnowflakeDialect.identity_column_ddl(), "INTEGER AUTOINCREMENT");
    }

    #[test]
    fn lock_initialization_uses_merge() {
        assert!(SnowflakeDialect
            .initialize_lock_record_stmt()
            .starts_with("MERGE"));
    }
}

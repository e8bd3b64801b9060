// src/dialect/databricks.rs

use super::Dialect;

/// Databricks-flavored queries (Delta Lake SQL).
///
/// Overrides identity column syntax (`GENERATED ALWAYS AS IDENTITY` is
/// supported but Delta Lake tables declare it without a primary key
/// constraint) and the lock-row initialization, which uses `MERGE` the same
/// way Snowflake does since Databricks SQL also lacks `INSERT OR IGNORE`.
pub struct DatabricksDialect;

impl Dialect for DatabricksDialect {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn identity_column_ddl(&self) -> &'static str {
        "BIGINT GENERATED ALWAYS AS IDENTITY"
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
    fn identity_column_is_bigint_identity() {
        assert_eq!(
            DatabricksDialect.identity_column_ddl(),
            "BIGINT GENERATED ALWAYS AS IDENTITY"
        );
    }
}

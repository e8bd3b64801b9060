// src/dialect/postgres.rs

use super::Dialect;

/// PostgreSQL-flavored queries.
///
/// This struct has no method overrides: the default trait bodies in
/// [`Dialect`] already target PostgreSQL, mirroring the original
/// implementation's `PostgresQueries` class, which is empty for the same
/// reason.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_column_uses_generated_always() {
        assert!(PostgresDialect
            .identity_column_ddl()
            .contains("GENERATED ALWAYS AS IDENTITY"));
    }

    #[test]
    fn schema_qualifies_table_existence_query() {
        let sql = PostgresDialect.table_exists_query(Some("custom"));
        assert!(sql.contains("table_schema = 'custom'"));
    }

    #[test]
    fn defaults_to_public_schema() {
        let sql = PostgresDialect.table_exists_query(None);
        assert!(sql.contains("table_schema = 'public'"));
    }
}

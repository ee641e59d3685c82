//! sqlite/libsql catalog driver.
//!
//! Columns and constraints come from the `table_info`,
//! `foreign_key_list`, `index_list` and `index_info` pragmas. What the
//! pragmas omit (AUTOINCREMENT, CHECK clauses) is recovered from the
//! stored `CREATE TABLE` text in `sqlite_master`.

use sqlx::{AnyPool, Row};

use crate::ddl;
use crate::error::Result;
use crate::inspect::{catalog_err, SchemaDriver};
use crate::schema::{Column, Constraint, ConstraintKind, Enum, Index};

pub struct SqliteCatalog<'a> {
    pool: &'a AnyPool,
}

impl<'a> SqliteCatalog<'a> {
    #[must_use]
    pub const fn new(pool: &'a AnyPool) -> Self {
        Self { pool }
    }

    /// Stored DDL of a table, if sqlite_master has it.
    async fn stored_ddl(&self, table: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT sql FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(self.pool)
            .await
            .map_err(catalog_err(table))?;
        Ok(row.and_then(|r| r.try_get::<Option<String>, _>(0).ok().flatten()))
    }
}

impl SchemaDriver for SqliteCatalog<'_> {
    async fn name(&self) -> Result<String> {
        Ok("sqlite".to_string())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' \
             AND name NOT LIKE 'sqlite_%' AND name != '_schema_migrations'",
        )
        .fetch_all(self.pool)
        .await?;
        let mut tables = rows
            .iter()
            .map(|r| r.try_get::<String, _>(0))
            .collect::<sqlx::Result<Vec<_>>>()?;
        // Catalog row order is reversed before use.
        tables.reverse();
        Ok(tables)
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let auto_inc = self
            .stored_ddl(table)
            .await?
            .map(|ddl| ddl::autoincrement_columns(&ddl))
            .unwrap_or_default();

        let rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
            .fetch_all(self.pool)
            .await
            .map_err(catalog_err(table))?;

        let mut columns = Vec::new();
        for row in rows {
            let name: String = row.try_get("name").map_err(catalog_err(table))?;
            let data_type: String = row.try_get("type").map_err(catalog_err(table))?;
            let not_null: i64 = row.try_get("notnull").map_err(catalog_err(table))?;
            let default: Option<String> =
                row.try_get("dflt_value").map_err(catalog_err(table))?;
            columns.push(Column {
                auto_increment: auto_inc.contains(&name),
                name,
                data_type: data_type.to_uppercase(),
                nullable: not_null == 0,
                default_value: default,
            });
        }
        Ok(columns)
    }

    async fn constraints(&self, table: &str) -> Result<Vec<Constraint>> {
        let mut constraints = Vec::new();

        // Primary key: table_info rows with a nonzero pk ordinal.
        let rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
            .fetch_all(self.pool)
            .await
            .map_err(catalog_err(table))?;
        let mut pk_cols = Vec::new();
        for row in &rows {
            let pk: i64 = row.try_get("pk").map_err(catalog_err(table))?;
            if pk > 0 {
                pk_cols.push(row.try_get::<String, _>("name").map_err(catalog_err(table))?);
            }
        }
        if !pk_cols.is_empty() {
            constraints.push(Constraint::primary_key(pk_cols));
        }

        // Foreign keys: grouped by the pragma's internal id, first-seen
        // order preserved; composite keys collect one column pair per row.
        let rows = sqlx::query(&format!("PRAGMA foreign_key_list(\"{table}\")"))
            .fetch_all(self.pool)
            .await
            .map_err(catalog_err(table))?;
        let mut fks: Vec<(i64, Constraint)> = Vec::new();
        for row in rows {
            let id: i64 = row.try_get("id").map_err(catalog_err(table))?;
            let ref_table: String = row.try_get("table").map_err(catalog_err(table))?;
            let from: String = row.try_get("from").map_err(catalog_err(table))?;
            let to: String = row.try_get("to").map_err(catalog_err(table))?;
            let on_update: String = row.try_get("on_update").map_err(catalog_err(table))?;
            let on_delete: String = row.try_get("on_delete").map_err(catalog_err(table))?;

            if let Some((_, fk)) = fks.iter_mut().find(|(fk_id, _)| *fk_id == id) {
                fk.columns.push(from);
                fk.reference_columns.push(to);
            } else {
                fks.push((
                    id,
                    Constraint {
                        name: String::new(),
                        kind: ConstraintKind::ForeignKey,
                        columns: vec![from],
                        reference_table: ref_table,
                        reference_columns: vec![to],
                        check_expression: String::new(),
                        on_delete,
                        on_update,
                    },
                ));
            }
        }
        constraints.extend(fks.into_iter().map(|(_, fk)| fk));

        // CHECKs are only visible in the stored DDL.
        if let Some(ddl) = self.stored_ddl(table).await? {
            for expr in ddl::sqlite_check_expressions(&ddl) {
                constraints.push(Constraint::check("", expr));
            }
        }
        Ok(constraints)
    }

    async fn indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows = sqlx::query(&format!("PRAGMA index_list(\"{table}\")"))
            .fetch_all(self.pool)
            .await
            .map_err(catalog_err(table))?;

        let mut indexes = Vec::new();
        for row in rows {
            let origin: String = row.try_get("origin").map_err(catalog_err(table))?;
            // pk/u origins are already represented as constraints.
            if origin == "pk" || origin == "u" {
                continue;
            }
            let name: String = row.try_get("name").map_err(catalog_err(table))?;
            let unique: i64 = row.try_get("unique").map_err(catalog_err(table))?;

            let col_rows = sqlx::query(&format!("PRAGMA index_info(\"{name}\")"))
                .fetch_all(self.pool)
                .await
                .map_err(catalog_err(table))?;
            let mut columns = Vec::new();
            for col_row in col_rows {
                columns.push(col_row.try_get::<String, _>("name").map_err(catalog_err(table))?);
            }
            indexes.push(Index {
                name,
                columns,
                unique: unique == 1,
            });
        }
        Ok(indexes)
    }

    async fn enums(&self) -> Result<Vec<Enum>> {
        // No native enum catalog and no synthesis convention for sqlite.
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect;
    use crate::dialect::Dialect;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, AnyPool) {
        let dir = TempDir::new().unwrap();
        let handle = connect::open(
            Dialect::Sqlite,
            dir.path().join("test.db").to_str().unwrap(),
        )
        .await
        .unwrap();
        (dir, handle.pool)
    }

    #[tokio::test]
    async fn test_tables_reverses_catalog_order() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE zebra (id INTEGER); CREATE TABLE apple (id INTEGER); \
             CREATE TABLE _schema_migrations (id INTEGER);",
        )
        .execute(&pool)
        .await
        .unwrap();

        let catalog = SqliteCatalog::new(&pool);
        let tables = catalog.tables().await.unwrap();
        // Internals and the ledger are filtered; the remaining names come
        // back reversed relative to sqlite_master row order.
        assert_eq!(tables, vec!["apple", "zebra"]);
    }

    #[tokio::test]
    async fn test_columns_with_autoincrement() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE t (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  name TEXT NOT NULL,\n  bio TEXT DEFAULT 'none'\n);",
        )
        .execute(&pool)
        .await
        .unwrap();

        let catalog = SqliteCatalog::new(&pool);
        let columns = catalog.columns("t").await.unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].auto_increment);
        assert_eq!(columns[1].name, "name");
        assert!(!columns[1].nullable);
        assert!(!columns[1].auto_increment);
        assert_eq!(columns[2].default_value.as_deref(), Some("'none'"));
        assert!(columns[2].nullable);
    }

    #[tokio::test]
    async fn test_constraints_one_of_each_kind() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT);\n\
             CREATE TABLE posts (\n  id INTEGER PRIMARY KEY,\n  author_id INTEGER REFERENCES users(id) ON DELETE CASCADE,\n  title TEXT,\n  CHECK(length(title) > 0)\n);",
        )
        .execute(&pool)
        .await
        .unwrap();

        let catalog = SqliteCatalog::new(&pool);
        let constraints = catalog.constraints("posts").await.unwrap();

        let pk = constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
            .unwrap();
        assert_eq!(pk.columns, vec!["id"]);

        let fk = constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::ForeignKey)
            .unwrap();
        assert_eq!(fk.columns, vec!["author_id"]);
        assert_eq!(fk.reference_table, "users");
        assert_eq!(fk.reference_columns, vec!["id"]);
        assert_eq!(fk.on_delete, "CASCADE");

        let check = constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::Check)
            .unwrap();
        assert_eq!(check.check_expression, "length(title) > 0");
    }

    #[tokio::test]
    async fn test_indexes_exclude_constraint_backed() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, email TEXT UNIQUE, name TEXT);\n\
             CREATE INDEX idx_t_name ON t (name);",
        )
        .execute(&pool)
        .await
        .unwrap();

        let catalog = SqliteCatalog::new(&pool);
        let indexes = catalog.indexes("t").await.unwrap();
        // The auto-index backing the UNIQUE column (origin 'u') is excluded.
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "idx_t_name");
        assert_eq!(indexes[0].columns, vec!["name"]);
        assert!(!indexes[0].unique);
    }

    #[tokio::test]
    async fn test_inspect_schema_end_to_end() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, CHECK(length(name) > 0));",
        )
        .execute(&pool)
        .await
        .unwrap();

        let db = crate::inspect::inspect_schema(&pool, Dialect::Sqlite)
            .await
            .unwrap();
        assert_eq!(db.name, "sqlite");
        assert_eq!(db.tables.len(), 1);
        assert!(db.enums.is_empty());

        let table = &db.tables[0];
        assert_eq!(table.name, "t");
        assert!(table.columns[0].auto_increment);
        assert!(table
            .constraints
            .iter()
            .any(|c| c.kind == ConstraintKind::Check));
    }
}

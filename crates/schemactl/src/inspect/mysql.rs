//! MySQL/MariaDB catalog driver.
//!
//! Tables and columns come from `information_schema`. CHECK constraints
//! are not exposed there on all server versions, so they are parsed out
//! of `SHOW CREATE TABLE` text; indexes come from `SHOW INDEX`. Enum
//! columns have no catalog of their own and are synthesized with the
//! `<table>_<column>` naming convention.

use sqlx::{AnyPool, Row};

use crate::ddl;
use crate::error::Result;
use crate::inspect::{catalog_err, SchemaDriver};
use crate::schema::{Column, Constraint, ConstraintKind, Enum, Index};

pub struct MysqlCatalog<'a> {
    pool: &'a AnyPool,
}

impl<'a> MysqlCatalog<'a> {
    #[must_use]
    pub const fn new(pool: &'a AnyPool) -> Self {
        Self { pool }
    }
}

impl SchemaDriver for MysqlCatalog<'_> {
    async fn name(&self) -> Result<String> {
        let row = sqlx::query("SELECT DATABASE()").fetch_one(self.pool).await?;
        // No default schema selected yields NULL, not an error.
        let name: Option<String> = row.try_get(0)?;
        Ok(name.unwrap_or_default())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             AND table_name != '_schema_migrations'",
        )
        .fetch_all(self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(Into::into))
            .collect()
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = sqlx::query(
            "SELECT column_name, data_type, column_type, is_nullable, column_default, extra \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        let mut columns = Vec::new();
        for row in rows {
            let name: String = row.try_get(0).map_err(catalog_err(table))?;
            let data_type: String = row.try_get(1).map_err(catalog_err(table))?;
            let column_type: String = row.try_get(2).map_err(catalog_err(table))?;
            let is_nullable: String = row.try_get(3).map_err(catalog_err(table))?;
            let default: Option<String> = row.try_get(4).map_err(catalog_err(table))?;
            let extra: String = row.try_get(5).map_err(catalog_err(table))?;

            let normalized = if data_type == "enum" {
                // Enum columns carry the synthesized type name.
                ddl::enum_type_name(table, &name)
            } else if column_type.contains("tinyint(1)") {
                "BOOLEAN".to_string()
            } else if data_type == "int" {
                "INTEGER".to_string()
            } else {
                data_type.to_uppercase()
            };
            columns.push(Column {
                name,
                data_type: normalized,
                nullable: is_nullable == "YES",
                default_value: default,
                auto_increment: extra.contains("auto_increment"),
            });
        }
        Ok(columns)
    }

    async fn constraints(&self, table: &str) -> Result<Vec<Constraint>> {
        let mut constraints = Vec::new();

        // Primary key.
        let rows = sqlx::query(
            "SELECT kcu.column_name FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu USING(constraint_name, table_schema) \
             WHERE table_schema = DATABASE() AND tc.table_name = ? \
               AND constraint_type = 'PRIMARY KEY' \
             ORDER BY kcu.ordinal_position",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;
        let pk_cols: Vec<String> = rows
            .iter()
            .map(|r| r.try_get(0))
            .collect::<sqlx::Result<_>>()
            .map_err(catalog_err(table))?;
        if !pk_cols.is_empty() {
            constraints.push(Constraint::primary_key(pk_cols));
        }

        // Foreign keys, grouped by constraint name in ordinal order.
        let rows = sqlx::query(
            "SELECT rc.constraint_name, kcu.column_name, kcu.referenced_table_name, \
             kcu.referenced_column_name, rc.update_rule, rc.delete_rule \
             FROM information_schema.referential_constraints rc \
             JOIN information_schema.key_column_usage kcu \
               USING(constraint_name, constraint_schema) \
             WHERE kcu.table_schema = DATABASE() AND kcu.table_name = ? \
             ORDER BY rc.constraint_name, kcu.ordinal_position",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        let mut fks: Vec<Constraint> = Vec::new();
        for row in rows {
            let cname: String = row.try_get(0).map_err(catalog_err(table))?;
            let col: String = row.try_get(1).map_err(catalog_err(table))?;
            let ref_table: String = row.try_get(2).map_err(catalog_err(table))?;
            let ref_col: String = row.try_get(3).map_err(catalog_err(table))?;
            let update_rule: String = row.try_get(4).map_err(catalog_err(table))?;
            let delete_rule: String = row.try_get(5).map_err(catalog_err(table))?;

            if let Some(existing) = fks.iter_mut().find(|c| c.name == cname) {
                existing.columns.push(col);
                existing.reference_columns.push(ref_col);
            } else {
                fks.push(Constraint {
                    name: cname,
                    kind: ConstraintKind::ForeignKey,
                    columns: vec![col],
                    reference_table: ref_table,
                    reference_columns: vec![ref_col],
                    check_expression: String::new(),
                    on_delete: delete_rule,
                    on_update: update_rule,
                });
            }
        }
        constraints.extend(fks);

        // Unique constraints.
        let rows = sqlx::query(
            "SELECT constraint_name, column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu USING(constraint_name, table_schema) \
             WHERE table_schema = DATABASE() AND tc.table_name = ? \
               AND constraint_type = 'UNIQUE' \
             ORDER BY constraint_name, ordinal_position",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        let mut uniques: Vec<Constraint> = Vec::new();
        for row in rows {
            let cname: String = row.try_get(0).map_err(catalog_err(table))?;
            let col: String = row.try_get(1).map_err(catalog_err(table))?;
            if let Some(existing) = uniques.iter_mut().find(|c| c.name == cname) {
                existing.columns.push(col);
            } else {
                uniques.push(Constraint::unique(cname, vec![col]));
            }
        }
        constraints.extend(uniques);

        // CHECKs: information_schema is unreliable here, fall back to
        // parsing SHOW CREATE TABLE output.
        let row = sqlx::query(&format!("SHOW CREATE TABLE {table}"))
            .fetch_optional(self.pool)
            .await
            .map_err(catalog_err(table))?;
        if let Some(row) = row {
            let create_sql: String = row.try_get(1).map_err(catalog_err(table))?;
            for (name, expr) in ddl::mysql_check_constraints(&create_sql) {
                constraints.push(Constraint::check(name, expr));
            }
        }
        Ok(constraints)
    }

    async fn indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows = sqlx::query(&format!("SHOW INDEX FROM {table}"))
            .fetch_all(self.pool)
            .await
            .map_err(catalog_err(table))?;

        // Group by Key_name; Seq_in_index places columns at the right
        // ordinal, sparse slots compacted afterwards.
        let mut order: Vec<String> = Vec::new();
        let mut grouped: Vec<(bool, Vec<Option<String>>)> = Vec::new();
        for row in rows {
            let key_name: String = row.try_get("Key_name").map_err(catalog_err(table))?;
            if key_name == "PRIMARY" {
                continue;
            }
            let non_unique: i64 = row.try_get("Non_unique").map_err(catalog_err(table))?;
            let seq: i64 = row.try_get("Seq_in_index").map_err(catalog_err(table))?;
            let column: String = row.try_get("Column_name").map_err(catalog_err(table))?;

            let idx = order.iter().position(|n| n == &key_name).unwrap_or_else(|| {
                order.push(key_name);
                grouped.push((non_unique == 0, Vec::new()));
                order.len() - 1
            });
            if seq > 0 {
                let slot = usize::try_from(seq - 1).unwrap_or_default();
                if grouped[idx].1.len() <= slot {
                    grouped[idx].1.resize(slot + 1, None);
                }
                grouped[idx].1[slot] = Some(column);
            }
        }

        Ok(order
            .into_iter()
            .zip(grouped)
            .map(|(name, (unique, slots))| Index {
                name,
                columns: slots.into_iter().flatten().collect(),
                unique,
            })
            .collect())
    }

    async fn enums(&self) -> Result<Vec<Enum>> {
        let rows = sqlx::query(
            "SELECT table_name, column_name, column_type \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND data_type = 'enum'",
        )
        .fetch_all(self.pool)
        .await?;

        let mut enums: Vec<Enum> = Vec::new();
        for row in rows {
            let table: String = row.try_get(0)?;
            let column: String = row.try_get(1)?;
            let column_type: String = row.try_get(2)?;

            let name = ddl::enum_type_name(&table, &column);
            if enums.iter().any(|e| e.name == name) {
                continue;
            }
            enums.push(Enum {
                name,
                values: ddl::mysql_enum_values(&column_type),
            });
        }
        Ok(enums)
    }
}

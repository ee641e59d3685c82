//! PostgreSQL catalog driver.
//!
//! Tables and columns come from `information_schema`; constraints and
//! indexes need `pg_catalog`, because the standard views lose FK column
//! order and constraint-backing indexes. Identifier-typed catalog
//! columns are cast to `::text` in SQL so rows decode uniformly through
//! the `Any` driver.

use sqlx::{AnyPool, Row};

use crate::error::Result;
use crate::inspect::{catalog_err, SchemaDriver};
use crate::schema::{Column, Constraint, ConstraintKind, Enum, Index};

pub struct PostgresCatalog<'a> {
    pool: &'a AnyPool,
}

impl<'a> PostgresCatalog<'a> {
    #[must_use]
    pub const fn new(pool: &'a AnyPool) -> Self {
        Self { pool }
    }

    /// Resolves pg_attribute numbers to column names, preserving the
    /// input order. Postgres stores FK columns as attribute numbers,
    /// not names, so every `conkey`/`confkey` array goes through here.
    async fn resolve_columns(&self, table: &str, attnums: &[i32]) -> Result<Vec<String>> {
        if attnums.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (0..attnums.len())
            .map(|i| format!("${}", i + 2))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT attname::text, attnum::int FROM pg_attribute \
             JOIN pg_class ON pg_class.oid = pg_attribute.attrelid \
             WHERE relname = $1 AND attnum IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(table);
        for num in attnums {
            query = query.bind(num);
        }
        let rows = query.fetch_all(self.pool).await.map_err(catalog_err(table))?;

        let mut by_num = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0).map_err(catalog_err(table))?;
            let num: i32 = row.try_get(1).map_err(catalog_err(table))?;
            by_num.push((num, name));
        }
        Ok(attnums
            .iter()
            .filter_map(|n| by_num.iter().find(|(num, _)| num == n).map(|(_, name)| name.clone()))
            .collect())
    }
}

impl SchemaDriver for PostgresCatalog<'_> {
    async fn name(&self) -> Result<String> {
        let row = sqlx::query("SELECT current_database()::text")
            .fetch_one(self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             AND table_name != '_schema_migrations' \
             ORDER BY table_name",
        )
        .fetch_all(self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(Into::into))
            .collect()
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = sqlx::query(
            "SELECT column_name::text, data_type::text, udt_name::text, \
             character_maximum_length::int, numeric_precision::int, numeric_scale::int, \
             is_nullable::text, column_default::text \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
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
            let udt: String = row.try_get(2).map_err(catalog_err(table))?;
            let char_max: Option<i32> = row.try_get(3).map_err(catalog_err(table))?;
            let precision: Option<i32> = row.try_get(4).map_err(catalog_err(table))?;
            let scale: Option<i32> = row.try_get(5).map_err(catalog_err(table))?;
            let is_nullable: String = row.try_get(6).map_err(catalog_err(table))?;
            let default: Option<String> = row.try_get(7).map_err(catalog_err(table))?;
            columns.push(Column {
                name,
                data_type: format_pg_type(&data_type, &udt, char_max, precision, scale),
                nullable: is_nullable == "YES",
                default_value: default,
                auto_increment: false,
            });
        }
        Ok(columns)
    }

    async fn constraints(&self, table: &str) -> Result<Vec<Constraint>> {
        let mut constraints = Vec::new();

        // PK and UNIQUE, grouped by constraint name in ordinal order.
        let rows = sqlx::query(
            "SELECT tc.constraint_name::text, tc.constraint_type::text, kcu.column_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
             WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
               AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
             ORDER BY tc.constraint_name, kcu.ordinal_position",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        let mut grouped: Vec<Constraint> = Vec::new();
        for row in rows {
            let cname: String = row.try_get(0).map_err(catalog_err(table))?;
            let ctype: String = row.try_get(1).map_err(catalog_err(table))?;
            let col: String = row.try_get(2).map_err(catalog_err(table))?;
            if let Some(existing) = grouped.iter_mut().find(|c| c.name == cname) {
                existing.columns.push(col);
            } else {
                let kind = if ctype == "PRIMARY KEY" {
                    ConstraintKind::PrimaryKey
                } else {
                    ConstraintKind::Unique
                };
                let mut c = Constraint::unique(cname, vec![col]);
                c.kind = kind;
                grouped.push(c);
            }
        }
        constraints.extend(grouped);

        // Foreign keys, with conkey/confkey attribute numbers resolved
        // to names per table.
        let rows = sqlx::query(
            "SELECT con.conname::text, ref_rel.relname::text, \
             con.conkey::text, con.confkey::text, \
             con.confdeltype::text, con.confupdtype::text \
             FROM pg_constraint con \
             JOIN pg_class src ON src.oid = con.conrelid \
             JOIN pg_class ref_rel ON ref_rel.oid = con.confrelid \
             WHERE src.relname = $1 AND con.contype = 'f'",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        for row in rows {
            let name: String = row.try_get(0).map_err(catalog_err(table))?;
            let ref_table: String = row.try_get(1).map_err(catalog_err(table))?;
            let conkey: String = row.try_get(2).map_err(catalog_err(table))?;
            let confkey: String = row.try_get(3).map_err(catalog_err(table))?;
            let del_rule: String = row.try_get(4).map_err(catalog_err(table))?;
            let upd_rule: String = row.try_get(5).map_err(catalog_err(table))?;

            let columns = self.resolve_columns(table, &parse_attnum_array(&conkey)).await?;
            let reference_columns = self
                .resolve_columns(&ref_table, &parse_attnum_array(&confkey))
                .await?;
            constraints.push(Constraint {
                name,
                kind: ConstraintKind::ForeignKey,
                columns,
                reference_table: ref_table,
                reference_columns,
                check_expression: String::new(),
                on_delete: parse_fk_rule(&del_rule).to_string(),
                on_update: parse_fk_rule(&upd_rule).to_string(),
            });
        }

        // CHECKs via pg_get_constraintdef, prefix/suffix stripped.
        let rows = sqlx::query(
            "SELECT con.conname::text, pg_get_constraintdef(con.oid)::text \
             FROM pg_constraint con \
             JOIN pg_class r ON r.oid = con.conrelid \
             WHERE r.relname = $1 AND con.contype = 'c'",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        for row in rows {
            let name: String = row.try_get(0).map_err(catalog_err(table))?;
            let def: String = row.try_get(1).map_err(catalog_err(table))?;
            constraints.push(Constraint::check(name, strip_check_def(&def)));
        }
        Ok(constraints)
    }

    async fn indexes(&self, table: &str) -> Result<Vec<Index>> {
        // Excludes indexes backing a constraint (pg_constraint.conindid).
        let rows = sqlx::query(
            "SELECT i.relname::text, \
             array_to_string(array_agg(a.attname ORDER BY array_position(ix.indkey, a.attnum)), ', ')::text, \
             ix.indisunique \
             FROM pg_class t \
             JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             LEFT JOIN pg_constraint c ON c.conindid = i.oid \
             WHERE t.relname = $1 AND c.conindid IS NULL \
             GROUP BY i.relname, ix.indisunique, ix.indkey",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(catalog_err(table))?;

        let mut indexes = Vec::new();
        for row in rows {
            let name: String = row.try_get(0).map_err(catalog_err(table))?;
            let columns: String = row.try_get(1).map_err(catalog_err(table))?;
            let unique: bool = row.try_get(2).map_err(catalog_err(table))?;
            indexes.push(Index {
                name,
                columns: columns.split(", ").map(str::to_string).collect(),
                unique,
            });
        }
        Ok(indexes)
    }

    async fn enums(&self) -> Result<Vec<Enum>> {
        let rows = sqlx::query(
            "SELECT t.typname::text, e.enumlabel::text \
             FROM pg_type t \
             JOIN pg_enum e ON t.oid = e.enumtypid \
             JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE n.nspname = 'public' \
             ORDER BY t.typname, e.enumsortorder",
        )
        .fetch_all(self.pool)
        .await?;

        let mut enums: Vec<Enum> = Vec::new();
        for row in rows {
            let name: String = row.try_get(0)?;
            let value: String = row.try_get(1)?;
            if let Some(existing) = enums.iter_mut().find(|e| e.name == name) {
                existing.values.push(value);
            } else {
                enums.push(Enum {
                    name,
                    values: vec![value],
                });
            }
        }
        Ok(enums)
    }
}

/// Reconstructs a display type from information_schema column metadata.
fn format_pg_type(
    data_type: &str,
    udt: &str,
    char_max: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    match data_type {
        // USER-DEFINED resolves to the underlying (enum) type name.
        "USER-DEFINED" => udt.to_string(),
        "character varying" => char_max.map_or_else(|| "VARCHAR".to_string(), |m| format!("VARCHAR({m})")),
        "character" => char_max.map_or_else(|| "CHAR".to_string(), |m| format!("CHAR({m})")),
        "numeric" => match (precision, scale) {
            (Some(p), Some(s)) => format!("NUMERIC({p},{s})"),
            _ => "NUMERIC".to_string(),
        },
        other => other.to_uppercase(),
    }
}

/// Maps pg_constraint's single-character action codes to SQL keywords.
fn parse_fk_rule(code: &str) -> &'static str {
    match code.chars().next() {
        Some('c') => "CASCADE",
        Some('n') => "SET NULL",
        Some('d') => "SET DEFAULT",
        Some('r') => "RESTRICT",
        Some('a') => "NO ACTION",
        _ => "",
    }
}

/// Parses an attribute-number array rendered as text, e.g. `{1,2}`.
fn parse_attnum_array(s: &str) -> Vec<i32> {
    s.trim_matches(|c| c == '{' || c == '}')
        .split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}

/// Strips the `CHECK (` prefix and trailing `)` from
/// `pg_get_constraintdef` output.
fn strip_check_def(def: &str) -> String {
    def.strip_prefix("CHECK (")
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(def)
        .to_string()
}

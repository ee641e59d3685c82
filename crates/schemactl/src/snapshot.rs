//! Schema snapshot writer.
//!
//! Renders the live schema into the declarative `table name ( ... )`
//! text form and writes it to `db.schema`, preserving the file's
//! configuration header. The sqlite and MySQL families reformat their
//! native DDL text; Postgres synthesizes column lines from the
//! introspected model.

use std::fs;
use std::path::Path;

use sqlx::{AnyPool, Row};
use tracing::debug;

use crate::ddl;
use crate::dialect::{Dialect, DialectFamily, LEDGER_TABLE};
use crate::error::Result;
use crate::inspect;
use crate::schema::{Constraint, ConstraintKind, Table};

/// Re-renders the snapshot file from the live schema.
pub async fn refresh(pool: &AnyPool, dialect: Dialect, schema_path: &Path) -> Result<()> {
    let rendered = match dialect.family() {
        DialectFamily::Sqlite => render_sqlite(pool).await?,
        DialectFamily::Postgres => render_postgres(pool, dialect).await?,
        DialectFamily::Mysql => render_mysql(pool).await?,
    };
    let rendered = rendered.replace("\r\n", "\n").replace('\r', "");

    let existing = match fs::read_to_string(schema_path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let combined = existing.map_or_else(
        || rendered.clone(),
        |content| merge_with_header(&content, &rendered),
    );

    fs::write(schema_path, combined)?;
    debug!(path = %schema_path.display(), "schema snapshot written");
    Ok(())
}

/// sqlite: reformat each object's stored DDL from sqlite_master.
async fn render_sqlite(pool: &AnyPool) -> Result<String> {
    let rows = sqlx::query(
        "SELECT sql FROM sqlite_master WHERE sql NOT NULL \
         AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_schema_migrations'",
    )
    .fetch_all(pool)
    .await?;

    let mut objects = Vec::new();
    for row in rows {
        let stmt: String = row.try_get(0)?;
        objects.push(format_sqlite_object(&stmt));
    }
    Ok(objects.join("\n\n"))
}

/// Reformats one stored `CREATE ...` statement: keyword rewritten,
/// column list split on top-level commas and indented one per line.
fn format_sqlite_object(create_sql: &str) -> String {
    let mut stmt = create_sql.replacen("CREATE TABLE ", "table ", 1);
    stmt = stmt.replacen("CREATE UNIQUE INDEX", "UNIQUE", 1);
    stmt = stmt.replacen("CREATE INDEX", "INDEX", 1);

    if let (Some(open), Some(close)) = (stmt.find('('), stmt.rfind(')')) {
        if close > open {
            let head = &stmt[..=open];
            let body = &stmt[open + 1..close];
            let tail = &stmt[close..];
            let defs = ddl::split_top_level_commas(body)
                .iter()
                .map(|def| format!("\t{}", def.trim()))
                .collect::<Vec<_>>()
                .join(",\n");
            return format!("{head}\n{defs}\n{tail}");
        }
    }
    stmt
}

/// Postgres: synthesize column lines from the introspected model, with
/// inlined REFERENCES clauses for resolved foreign keys.
async fn render_postgres(pool: &AnyPool, dialect: Dialect) -> Result<String> {
    let database = inspect::inspect_schema(pool, dialect).await?;
    let tables: Vec<String> = database.tables.iter().map(format_postgres_table).collect();
    Ok(tables.join("\n\n"))
}

fn format_postgres_table(table: &Table) -> String {
    let single_column = |kind: ConstraintKind, column: &str| {
        table
            .constraints
            .iter()
            .any(|c| c.kind == kind && c.columns.len() == 1 && c.columns[0] == column)
    };
    let foreign_key = |column: &str| -> Option<&Constraint> {
        table.constraints.iter().find(|c| {
            c.kind == ConstraintKind::ForeignKey && c.columns.len() == 1 && c.columns[0] == column
        })
    };

    let mut lines = Vec::new();
    for column in &table.columns {
        let serial = column
            .default_value
            .as_deref()
            .is_some_and(|d| d.contains("nextval("));
        let display_type = if serial {
            "SERIAL".to_string()
        } else {
            column.data_type.clone()
        };

        let mut line = format!("  {} {display_type}", column.name);
        if let Some(fk) = foreign_key(&column.name) {
            line.push_str(&format!(
                " REFERENCES {}({})",
                fk.reference_table,
                fk.reference_columns.join(", ")
            ));
            if !fk.on_delete.is_empty() && fk.on_delete != "NO ACTION" {
                line.push_str(&format!(" ON DELETE {}", fk.on_delete));
            }
            if !fk.on_update.is_empty() && fk.on_update != "NO ACTION" {
                line.push_str(&format!(" ON UPDATE {}", fk.on_update));
            }
            lines.push(line);
            continue;
        }

        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        if !serial {
            if let Some(default) = column.default_value.as_deref() {
                if !default.is_empty() {
                    // Strip the ::type cast Postgres appends to defaults.
                    let default = default.split("::").next().unwrap_or(default);
                    line.push_str(&format!(" DEFAULT {default}"));
                }
            }
        }
        if single_column(ConstraintKind::PrimaryKey, &column.name) {
            line.push_str(" PRIMARY KEY");
        }
        if single_column(ConstraintKind::Unique, &column.name) {
            line.push_str(" UNIQUE");
        }
        lines.push(line);
    }
    format!("table {} (\n{}\n)", table.name, lines.join(",\n"))
}

/// MySQL: reformat SHOW CREATE TABLE output, backquotes removed and the
/// storage-engine/charset suffix stripped.
async fn render_mysql(pool: &AnyPool) -> Result<String> {
    let rows = sqlx::query("SHOW TABLES").fetch_all(pool).await?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row.try_get::<String, _>(0)?);
    }

    let mut tables = Vec::new();
    for name in names {
        if name == LEDGER_TABLE {
            continue;
        }
        let row = sqlx::query(&format!("SHOW CREATE TABLE {name}"))
            .fetch_one(pool)
            .await?;
        let create_sql: String = row.try_get(1)?;
        let stmt = create_sql.replace('`', "").replacen("CREATE TABLE ", "table ", 1);
        tables.push(ddl::strip_engine_suffix(&stmt));
    }
    Ok(tables.join("\n\n"))
}

/// Joins the fresh schema onto the existing file's configuration
/// header. Leading lines are preserved until the first line that looks
/// like schema content; everything after is replaced.
fn merge_with_header(existing: &str, rendered: &str) -> String {
    let mut header = Vec::new();
    for line in existing.lines() {
        if line.contains("CREATE TABLE") || line.contains("table ") || line.contains("PRIMARY KEY")
        {
            break;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            header.push(trimmed);
        }
    }

    if header.is_empty() {
        rendered.to_string()
    } else {
        format!("{}\n\n{rendered}", header.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    #[test]
    fn test_format_sqlite_object_splits_top_level_commas() {
        let ddl = "CREATE TABLE t (id INTEGER PRIMARY KEY, price NUMERIC(10,2), CHECK(price > 0))";
        let formatted = format_sqlite_object(ddl);
        assert!(formatted.starts_with("table t ("));
        assert!(formatted.contains("\tprice NUMERIC(10,2)"));
        assert!(formatted.contains("\tCHECK(price > 0)"));
        assert_eq!(formatted.lines().count(), 5);
    }

    #[test]
    fn test_format_sqlite_object_indexes() {
        assert!(format_sqlite_object("CREATE UNIQUE INDEX idx ON t (a)").starts_with("UNIQUE idx"));
        assert!(format_sqlite_object("CREATE INDEX idx ON t (a)").starts_with("INDEX idx"));
    }

    #[test]
    fn test_merge_with_header_preserves_config() {
        let existing = "db = \"sqlite\"\nurl = env(\"APP_DB_URL\")\n\ntable old (\n\tid INTEGER\n)\n";
        let merged = merge_with_header(existing, "table new (\n\tid INTEGER\n)");
        assert!(merged.starts_with("db = \"sqlite\"\nurl = env(\"APP_DB_URL\")\n\ntable new"));
        assert!(!merged.contains("table old"));
    }

    #[test]
    fn test_merge_with_header_no_config() {
        let merged = merge_with_header("table old (\n\tid INTEGER\n)\n", "table new ()");
        assert_eq!(merged, "table new ()");
    }

    fn column(name: &str, data_type: &str) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default_value: None,
            auto_increment: false,
        }
    }

    #[test]
    fn test_format_postgres_table() {
        let mut id = column("id", "INTEGER");
        id.nullable = false;
        id.default_value = Some("nextval('users_id_seq'::regclass)".to_string());
        let mut email = column("email", "VARCHAR(255)");
        email.nullable = false;

        let table = Table {
            name: "users".to_string(),
            columns: vec![id, email],
            constraints: vec![
                Constraint::primary_key(vec!["id".to_string()]),
                Constraint::unique("users_email_key", vec!["email".to_string()]),
            ],
            indexes: vec![],
        };

        let rendered = format_postgres_table(&table);
        assert!(rendered.contains("  id SERIAL NOT NULL PRIMARY KEY"));
        assert!(rendered.contains("  email VARCHAR(255) NOT NULL UNIQUE"));
        assert!(!rendered.contains("nextval"));
    }

    #[test]
    fn test_format_postgres_table_foreign_key() {
        let table = Table {
            name: "posts".to_string(),
            columns: vec![column("author_id", "INTEGER")],
            constraints: vec![Constraint {
                name: "posts_author_fk".to_string(),
                kind: ConstraintKind::ForeignKey,
                columns: vec!["author_id".to_string()],
                reference_table: "users".to_string(),
                reference_columns: vec!["id".to_string()],
                check_expression: String::new(),
                on_delete: "CASCADE".to_string(),
                on_update: "NO ACTION".to_string(),
            }],
            indexes: vec![],
        };

        let rendered = format_postgres_table(&table);
        assert!(rendered.contains("  author_id INTEGER REFERENCES users(id) ON DELETE CASCADE"));
        assert!(!rendered.contains("ON UPDATE"));
    }

    #[test]
    fn test_format_postgres_table_default_cast_stripped() {
        let mut status = column("status", "VARCHAR(16)");
        status.default_value = Some("'new'::character varying".to_string());
        let table = Table {
            name: "orders".to_string(),
            columns: vec![status],
            constraints: vec![],
            indexes: vec![],
        };

        let rendered = format_postgres_table(&table);
        assert!(rendered.contains("DEFAULT 'new'"));
        assert!(!rendered.contains("::"));
    }
}

//! Dialect registry.
//!
//! A closed enumeration of the accepted dialect tags, grouped into three
//! families, plus the static SQL each family needs for ledger bookkeeping
//! and catalog listing. Parsing an unknown tag is the single fail-fast
//! gate: no caller ever observes an empty template.

use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

/// Name of the bookkeeping table that tracks applied migration files.
pub const LEDGER_TABLE: &str = "_schema_migrations";

/// Accepted dialect tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Libsql,
    Turso,
    Postgres,
    Mysql,
    Mariadb,
}

/// The three database families, each with its own catalog access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectFamily {
    Sqlite,
    Postgres,
    Mysql,
}

/// Static SQL for ledger bootstrap/CRUD and catalog listing.
///
/// Placeholder style follows the family: `?` for the sqlite and MySQL
/// families, `$N` for Postgres. `select_status` casts `migrated` to a
/// native integer so the result decodes uniformly across drivers.
#[derive(Debug, Clone, Copy)]
pub struct DialectTemplate {
    pub table_exists: &'static str,
    pub create_ledger: &'static str,
    pub insert: &'static str,
    pub update: &'static str,
    pub delete: &'static str,
    pub select_status: &'static str,
    pub list_tables: &'static str,
    pub list_columns: &'static str,
}

const SQLITE_TEMPLATE: DialectTemplate = DialectTemplate {
    table_exists: "SELECT name FROM sqlite_master WHERE type='table' AND name='_schema_migrations'",
    create_ledger: "CREATE TABLE IF NOT EXISTS _schema_migrations (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  file VARCHAR(255) UNIQUE,\n  migrated BOOLEAN DEFAULT false\n);",
    insert: "INSERT INTO _schema_migrations (file, migrated) VALUES (?, ?)",
    update: "UPDATE _schema_migrations SET migrated = ? WHERE file = ?",
    delete: "DELETE FROM _schema_migrations WHERE file = ?",
    select_status: "SELECT CAST(migrated AS INTEGER) FROM _schema_migrations WHERE file = ?",
    list_tables: "SELECT name FROM sqlite_master WHERE type='table'",
    list_columns: "SELECT name FROM PRAGMA_TABLE_INFO(?)",
};

const POSTGRES_TEMPLATE: DialectTemplate = DialectTemplate {
    table_exists: "SELECT tablename FROM pg_tables WHERE schemaname = 'public' AND tablename = '_schema_migrations'",
    create_ledger: "CREATE TABLE IF NOT EXISTS _schema_migrations (\n  id SERIAL PRIMARY KEY,\n  file VARCHAR(255) UNIQUE,\n  migrated BOOLEAN DEFAULT false\n);",
    insert: "INSERT INTO _schema_migrations (file, migrated) VALUES ($1, $2)",
    update: "UPDATE _schema_migrations SET migrated = $1 WHERE file = $2",
    delete: "DELETE FROM _schema_migrations WHERE file = $1",
    select_status: "SELECT migrated::int FROM _schema_migrations WHERE file = $1",
    list_tables: "SELECT tablename FROM pg_tables WHERE schemaname = 'public'",
    list_columns: "SELECT column_name FROM information_schema.columns WHERE table_schema = 'public' AND table_name = $1 ORDER BY ordinal_position",
};

const MYSQL_TEMPLATE: DialectTemplate = DialectTemplate {
    table_exists: "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = '_schema_migrations'",
    create_ledger: "CREATE TABLE IF NOT EXISTS _schema_migrations (\n  id INT PRIMARY KEY AUTO_INCREMENT,\n  file VARCHAR(255) UNIQUE,\n  migrated BOOLEAN DEFAULT false\n);",
    insert: "INSERT INTO _schema_migrations (file, migrated) VALUES (?, ?)",
    update: "UPDATE _schema_migrations SET migrated = ? WHERE file = ?",
    delete: "DELETE FROM _schema_migrations WHERE file = ?",
    select_status: "SELECT CAST(migrated AS SIGNED) FROM _schema_migrations WHERE file = ?",
    list_tables: "SHOW TABLES",
    list_columns: "SELECT column_name FROM information_schema.columns WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
};

impl Dialect {
    /// Returns the family this tag belongs to.
    #[must_use]
    pub const fn family(self) -> DialectFamily {
        match self {
            Self::Sqlite | Self::Libsql | Self::Turso => DialectFamily::Sqlite,
            Self::Postgres => DialectFamily::Postgres,
            Self::Mysql | Self::Mariadb => DialectFamily::Mysql,
        }
    }

    /// Returns the family's SQL template.
    #[must_use]
    pub const fn template(self) -> &'static DialectTemplate {
        match self.family() {
            DialectFamily::Sqlite => &SQLITE_TEMPLATE,
            DialectFamily::Postgres => &POSTGRES_TEMPLATE,
            DialectFamily::Mysql => &MYSQL_TEMPLATE,
        }
    }

    /// Returns the tag as written in `db.schema`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Libsql => "libsql",
            Self::Turso => "turso",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
        }
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "libsql" => Ok(Self::Libsql),
            "turso" => Ok(Self::Turso),
            "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "mariadb" => Ok(Self::Mariadb),
            other => Err(SchemaError::UnsupportedDialect(other.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

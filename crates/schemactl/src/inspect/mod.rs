//! Multi-dialect schema introspection.
//!
//! Each database family implements [`SchemaDriver`], the shared capability
//! set over its catalog. [`inspect_schema`] selects the driver once by
//! dialect family and collects a normalized [`Database`] value tree,
//! rebuilt wholesale on every call.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlCatalog;
pub use postgres::PostgresCatalog;
pub use sqlite::SqliteCatalog;

use sqlx::{AnyPool, Row};

use crate::dialect::{Dialect, DialectFamily};
use crate::error::{Result, SchemaError};
use crate::schema::{Column, Constraint, Database, Enum, Index, Table};

/// Capability set every dialect driver provides.
pub trait SchemaDriver {
    /// Database name (or the dialect tag where the engine has no notion
    /// of a current database).
    fn name(&self) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Table names in declaration order, excluding internal tables and
    /// the migration ledger.
    fn tables(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Columns of a table in catalog-ordinal order.
    fn columns(&self, table: &str) -> impl std::future::Future<Output = Result<Vec<Column>>> + Send;

    /// Constraints of a table.
    fn constraints(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Constraint>>> + Send;

    /// Secondary indexes of a table, excluding those backing a primary
    /// key or unique constraint.
    fn indexes(&self, table: &str) -> impl std::future::Future<Output = Result<Vec<Index>>> + Send;

    /// Enumerated types, native or synthesized.
    fn enums(&self) -> impl std::future::Future<Output = Result<Vec<Enum>>> + Send;
}

/// Introspects the live schema into the normalized model.
pub async fn inspect_schema(pool: &AnyPool, dialect: Dialect) -> Result<Database> {
    match dialect.family() {
        DialectFamily::Sqlite => collect(&SqliteCatalog::new(pool)).await,
        DialectFamily::Postgres => collect(&PostgresCatalog::new(pool)).await,
        DialectFamily::Mysql => collect(&MysqlCatalog::new(pool)).await,
    }
}

async fn collect<D: SchemaDriver>(driver: &D) -> Result<Database> {
    let name = driver.name().await?;
    let mut tables = Vec::new();
    for table in driver.tables().await? {
        let columns = driver.columns(&table).await?;
        let constraints = driver.constraints(&table).await?;
        let indexes = driver.indexes(&table).await?;
        tables.push(Table {
            name: table,
            columns,
            constraints,
            indexes,
        });
    }
    let enums = driver.enums().await?;
    Ok(Database { name, tables, enums })
}

/// Lists table names for display collaborators, via the dialect's
/// registry template.
pub async fn list_tables(pool: &AnyPool, dialect: Dialect) -> Result<Vec<String>> {
    let rows = sqlx::query(dialect.template().list_tables)
        .fetch_all(pool)
        .await?;
    let mut names = Vec::new();
    for row in rows {
        let name: String = row.try_get(0)?;
        if dialect.family() == DialectFamily::Sqlite && name.starts_with("sqlite_") {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Lists column names of a table for display collaborators.
pub async fn list_columns(pool: &AnyPool, dialect: Dialect, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(dialect.template().list_columns)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| SchemaError::CatalogQuery {
            table: table.to_string(),
            source: e,
        })?;
    rows.iter()
        .map(|row| {
            row.try_get::<String, _>(0)
                .map_err(|e| SchemaError::CatalogQuery {
                    table: table.to_string(),
                    source: e,
                })
        })
        .collect()
}

/// Wraps a catalog query failure with the table it concerned.
pub(crate) fn catalog_err(table: &str) -> impl FnOnce(sqlx::Error) -> SchemaError + '_ {
    move |source| SchemaError::CatalogQuery {
        table: table.to_string(),
        source,
    }
}

//! Arbitrary statement execution.
//!
//! The interface display collaborators consume: run a statement, get
//! back column names plus stringified rows, or an affected-row count.
//! Rendering (tables, pagers) stays with the caller.

use std::fs;
use std::path::Path;

use sqlx::any::AnyRow;
use sqlx::{AnyPool, Column as _, Row};

use crate::error::Result;

/// Result of running one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutput {
    /// A result set with every value rendered as text.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// A DML/DDL statement's affected-row count.
    Affected(u64),
}

/// Runs a single statement: `SELECT`s are fetched and stringified,
/// anything else is executed for its affected-row count.
pub async fn run_statement(pool: &AnyPool, sql: &str) -> Result<QueryOutput> {
    if sql.trim().to_uppercase().starts_with("SELECT") {
        let rows = sqlx::query(sql).fetch_all(pool).await?;
        Ok(rows_output(&rows))
    } else {
        let result = sqlx::raw_sql(sql).execute(pool).await?;
        Ok(QueryOutput::Affected(result.rows_affected()))
    }
}

/// Reads a `.sql` file and fetches its content as a query.
pub async fn run_file(pool: &AnyPool, path: &Path) -> Result<QueryOutput> {
    let sql = fs::read_to_string(path)?;
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows_output(&rows))
}

fn rows_output(rows: &[AnyRow]) -> QueryOutput {
    let columns = rows.first().map_or_else(Vec::new, |row| {
        row.columns().iter().map(|c| c.name().to_string()).collect()
    });
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| render_value(row, i)).collect())
        .collect();
    QueryOutput::Rows { columns, rows }
}

/// Stringifies one cell of an `Any` row. The driver reports no useful
/// type information up front, so decoding is by attempt: text first,
/// then the numeric kinds, then blobs.
fn render_value(row: &AnyRow, index: usize) -> String {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| format!("<{} bytes>", v.len()));
    }
    "?".to_string()
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
    async fn test_select_returns_rows() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql("CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a'), (2, NULL);")
            .execute(&pool)
            .await
            .unwrap();

        let output = run_statement(&pool, "SELECT id, name FROM t ORDER BY id").await.unwrap();
        match output {
            QueryOutput::Rows { columns, rows } => {
                assert_eq!(columns, vec!["id", "name"]);
                assert_eq!(rows, vec![vec!["1", "a"], vec!["2", "NULL"]]);
            }
            QueryOutput::Affected(_) => panic!("expected rows"),
        }
    }

    #[tokio::test]
    async fn test_dml_returns_affected_count() {
        let (_dir, pool) = test_pool().await;
        sqlx::raw_sql("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1), (2);")
            .execute(&pool)
            .await
            .unwrap();

        let output = run_statement(&pool, "DELETE FROM t").await.unwrap();
        assert_eq!(output, QueryOutput::Affected(2));
    }

    #[tokio::test]
    async fn test_run_file() {
        let (dir, pool) = test_pool().await;
        sqlx::raw_sql("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (7);")
            .execute(&pool)
            .await
            .unwrap();
        let path = dir.path().join("query.sql");
        std::fs::write(&path, "SELECT id FROM t").unwrap();

        let output = run_file(&pool, &path).await.unwrap();
        assert_eq!(
            output,
            QueryOutput::Rows {
                columns: vec!["id".to_string()],
                rows: vec![vec!["7".to_string()]],
            }
        );
    }
}

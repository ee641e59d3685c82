//! Database connection handling.
//!
//! One pooled handle per invocation, opened through sqlx's runtime
//! dispatched `Any` driver so a single binary serves all three families.
//! The pool is used as a single logical connection; the core never fans
//! out.

use std::path::Path;
use std::sync::Once;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::config::{self, SchemaConfig};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

static DRIVERS: Once = Once::new();

/// Installs the `Any` drivers, once per process.
pub fn install_drivers() {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// An open connection with its resolved dialect.
#[derive(Debug, Clone)]
pub struct DbHandle {
    pub pool: AnyPool,
    pub dialect: Dialect,
}

/// sqlite accepts bare filesystem paths; the `Any` driver needs a URL.
/// `:memory:` maps to the in-memory URL, bare paths get a `sqlite://`
/// scheme with `mode=rwc` so a missing file is created.
#[must_use]
pub fn normalize_sqlite_url(url: &str) -> String {
    if url.contains("://") || url.starts_with("sqlite:") {
        return url.to_string();
    }
    if url == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    format!("sqlite://{url}?mode=rwc")
}

/// Connects to the project's database.
///
/// Overrides short-circuit the config file: when both are given the file
/// is never read; a partial override merges with the loaded header.
pub async fn connect(
    root: &Path,
    db_override: Option<&str>,
    url_override: Option<&str>,
) -> Result<DbHandle> {
    let (dialect, url) = match (db_override, url_override) {
        (Some(db), Some(url)) => (db.parse::<Dialect>()?, url.to_string()),
        _ => {
            let loaded = SchemaConfig::load(&config::schema_path(root))?;
            let dialect = match db_override {
                Some(db) => db.parse::<Dialect>()?,
                None => loaded.dialect,
            };
            let url = url_override.map_or(loaded.url, ToString::to_string);
            (dialect, url)
        }
    };

    open(dialect, &url).await
}

/// Opens a handle for an already resolved dialect and URL.
pub async fn open(dialect: Dialect, url: &str) -> Result<DbHandle> {
    let url = match dialect.family() {
        crate::dialect::DialectFamily::Sqlite => normalize_sqlite_url(url),
        _ => url.to_string(),
    };

    install_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .map_err(SchemaError::Connection)?;

    Ok(DbHandle { pool, dialect })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sqlite_url() {
        assert_eq!(normalize_sqlite_url("schema/dev.db"), "sqlite://schema/dev.db?mode=rwc");
        assert_eq!(normalize_sqlite_url(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite://already/a/url"),
            "sqlite://already/a/url"
        );
        assert_eq!(
            normalize_sqlite_url("libsql://db.example.io"),
            "libsql://db.example.io"
        );
    }

    #[tokio::test]
    async fn test_open_creates_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.db");
        let handle = open(Dialect::Sqlite, path.to_str().unwrap()).await.unwrap();
        assert_eq!(handle.dialect, Dialect::Sqlite);
        sqlx::query("SELECT 1").fetch_one(&handle.pool).await.unwrap();
        assert!(path.exists());
    }
}

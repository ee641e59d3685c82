//! Migration executor.
//!
//! Applies pending migrations or a specific target, performs rollback
//! and removal. Each migration file's script and its ledger update run
//! inside one transaction; any failure rolls the transaction back and
//! aborts the command, so no partial application is ever persisted.
//! After every committed state change the schema snapshot is refreshed.

use std::fs;
use std::io::ErrorKind;

use sqlx::AnyPool;
use tracing::{info, warn};

use crate::connect::DbHandle;
use crate::ddl;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::ledger::Ledger;
use crate::snapshot;

/// Executes migrations for one project root.
#[derive(Debug, Clone)]
pub struct Executor {
    ledger: Ledger,
}

/// Target filenames accept an optional `.sql` suffix.
fn with_sql_suffix(name: &str) -> String {
    if name.ends_with(".sql") {
        name.to_string()
    } else {
        format!("{name}.sql")
    }
}

impl Executor {
    #[must_use]
    pub fn new(handle: &DbHandle, root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            ledger: Ledger::new(handle, root),
        }
    }

    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn pool(&self) -> &AnyPool {
        self.ledger.pool()
    }

    fn dialect(&self) -> Dialect {
        self.ledger.dialect()
    }

    /// Applies one migration or the whole pending queue (ascending by
    /// ledger id). Reconciles untracked local files first. A failure
    /// aborts the queue; files after the failing one are not attempted.
    pub async fn migrate(&self, target: Option<&str>) -> Result<()> {
        self.ledger.ensure_ready().await?;
        self.ledger.reconcile().await?;

        if let Some(target) = target {
            return self.apply(&with_sql_suffix(target)).await;
        }

        let pending = self.ledger.pending().await?;
        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(());
        }
        for record in pending {
            self.apply(&record.file).await?;
        }
        Ok(())
    }

    /// Runs one file's forward script and flips its ledger row to
    /// migrated, in a single transaction; refreshes the snapshot after
    /// the commit. A snapshot failure after the commit is fatal.
    async fn apply(&self, file: &str) -> Result<()> {
        let content = fs::read_to_string(self.ledger.migrations_dir().join(file))?;
        let (forward, _) = ddl::split_migration(&content);

        let tx_err = |source| SchemaError::Transaction {
            file: file.to_string(),
            source,
        };
        let template = self.dialect().template();
        let mut tx = self.pool().begin().await.map_err(tx_err)?;
        sqlx::raw_sql(forward)
            .execute(&mut *tx)
            .await
            .map_err(tx_err)?;
        sqlx::query(template.update)
            .bind(true)
            .bind(file)
            .execute(&mut *tx)
            .await
            .map_err(tx_err)?;
        tx.commit().await.map_err(tx_err)?;

        info!(file, "migration applied");
        snapshot::refresh(self.pool(), self.dialect(), &self.ledger.schema_path()).await
    }

    /// Rolls back an explicit target, or the most recently applied file
    /// when none is given. A file whose rollback section is missing or
    /// empty is rejected before any transaction is opened.
    pub async fn rollback(&self, target: Option<&str>) -> Result<()> {
        let file = match target {
            Some(name) => with_sql_suffix(name),
            None => match self.ledger.last_applied().await? {
                Some(record) => record.file,
                None => {
                    info!("no migrations to roll back");
                    return Ok(());
                }
            },
        };

        let content = fs::read_to_string(self.ledger.migrations_dir().join(&file))?;
        let (_, rollback) = ddl::split_migration(&content);
        let script = match rollback {
            Some(script) if !script.trim().is_empty() => script,
            _ => return Err(SchemaError::EmptyRollback(file)),
        };

        let tx_err = |source| SchemaError::Transaction {
            file: file.clone(),
            source,
        };
        let template = self.dialect().template();
        let mut tx = self.pool().begin().await.map_err(&tx_err)?;
        sqlx::raw_sql(script)
            .execute(&mut *tx)
            .await
            .map_err(&tx_err)?;
        sqlx::query(template.update)
            .bind(false)
            .bind(&file)
            .execute(&mut *tx)
            .await
            .map_err(&tx_err)?;
        tx.commit().await.map_err(&tx_err)?;

        info!(file, "migration rolled back");
        snapshot::refresh(self.pool(), self.dialect(), &self.ledger.schema_path()).await
    }

    /// Removes a migration that has not been applied: deletes its
    /// ledger row transactionally, commits, then deletes the file. A
    /// missing file is a warning (the ledger removal is authoritative);
    /// any other filesystem failure surfaces after the commit, an
    /// accepted inconsistency window.
    pub async fn remove(&self, target: &str) -> Result<()> {
        let file = with_sql_suffix(target);

        match self.ledger.status(&file).await? {
            Some(true) => return Err(SchemaError::LedgerGuard(file)),
            Some(false) => {
                let tx_err = |source| SchemaError::Transaction {
                    file: file.clone(),
                    source,
                };
                let mut tx = self.pool().begin().await.map_err(&tx_err)?;
                sqlx::query(self.dialect().template().delete)
                    .bind(&file)
                    .execute(&mut *tx)
                    .await
                    .map_err(&tx_err)?;
                tx.commit().await.map_err(&tx_err)?;
            }
            None => {}
        }

        match fs::remove_file(self.ledger.migrations_dir().join(&file)) {
            Ok(()) => {
                info!(file, "migration removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file, "migration file not found on disk; ledger record removed");
                Ok(())
            }
            Err(e) => {
                warn!(file, "ledger record already deleted; filesystem now out of sync");
                Err(SchemaError::Io(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect;
    use crate::inspect;
    use crate::ledger::SEED_FILE;
    use tempfile::TempDir;

    async fn test_executor() -> (TempDir, Executor) {
        let dir = TempDir::new().unwrap();
        let handle = connect::open(
            Dialect::Sqlite,
            dir.path().join("test.db").to_str().unwrap(),
        )
        .await
        .unwrap();
        let executor = Executor::new(&handle, dir.path());
        (dir, executor)
    }

    fn write_migration(executor: &Executor, file: &str, content: &str) {
        fs::create_dir_all(executor.ledger().migrations_dir()).unwrap();
        fs::write(executor.ledger().migrations_dir().join(file), content).unwrap();
    }

    #[tokio::test]
    async fn test_migrate_applies_pending_queue() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        write_migration(
            &executor,
            "1_users.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\n-- schema rollback\n\nDROP TABLE users;\n",
        );
        executor.migrate(None).await.unwrap();

        assert_eq!(executor.ledger().status("1_users.sql").await.unwrap(), Some(true));
        let db = inspect::inspect_schema(executor.pool(), Dialect::Sqlite)
            .await
            .unwrap();
        assert!(db.tables.iter().any(|t| t.name == "users"));
    }

    #[tokio::test]
    async fn test_migrate_target_accepts_bare_name() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        write_migration(&executor, "1_users.sql", "CREATE TABLE users (id INTEGER);");
        executor.ledger().reconcile().await.unwrap();
        executor.migrate(Some("1_users")).await.unwrap();

        assert_eq!(executor.ledger().status("1_users.sql").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_failed_migration_rolls_back_ledger() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        write_migration(&executor, "1_bad.sql", "CREATE TABLE oops (;\n");
        let err = executor.migrate(None).await.unwrap_err();
        assert!(matches!(err, SchemaError::Transaction { .. }));

        // The transaction rolled back; the row stays pending.
        assert_eq!(executor.ledger().status("1_bad.sql").await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_failure_stops_the_queue() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        write_migration(&executor, "1_bad.sql", "CREATE TABLE oops (;\n");
        executor.ledger().reconcile().await.unwrap();
        write_migration(&executor, "2_good.sql", "CREATE TABLE fine (id INTEGER);");

        assert!(executor.migrate(None).await.is_err());
        // The file after the failing one was never attempted.
        assert_eq!(executor.ledger().status("2_good.sql").await.unwrap(), Some(false));
        let db = inspect::inspect_schema(executor.pool(), Dialect::Sqlite)
            .await
            .unwrap();
        assert!(!db.tables.iter().any(|t| t.name == "fine"));
    }

    #[tokio::test]
    async fn test_apply_then_rollback_restores_schema() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        let before = inspect::inspect_schema(executor.pool(), Dialect::Sqlite)
            .await
            .unwrap();

        write_migration(
            &executor,
            "1_posts.sql",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT);\n\n-- schema rollback\n\nDROP TABLE posts;\n",
        );
        executor.migrate(None).await.unwrap();
        executor.rollback(None).await.unwrap();

        let after = inspect::inspect_schema(executor.pool(), Dialect::Sqlite)
            .await
            .unwrap();
        assert_eq!(before, after);
        assert_eq!(executor.ledger().status("1_posts.sql").await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_rollback_without_section_is_rejected() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        write_migration(
            &executor,
            "1_t.sql",
            "CREATE TABLE t (id INTEGER);\n\n-- schema rollback\n\n",
        );
        executor.migrate(None).await.unwrap();

        let err = executor.rollback(Some("1_t")).await.unwrap_err();
        assert!(matches!(err, SchemaError::EmptyRollback(f) if f == "1_t.sql"));

        // Checked before any transaction: ledger and schema untouched.
        assert_eq!(executor.ledger().status("1_t.sql").await.unwrap(), Some(true));
        let db = inspect::inspect_schema(executor.pool(), Dialect::Sqlite)
            .await
            .unwrap();
        assert!(db.tables.iter().any(|t| t.name == "t"));
    }

    #[tokio::test]
    async fn test_rollback_with_nothing_applied_is_clean() {
        let (_dir, executor) = test_executor().await;
        // Empty ledger, no target: reports and returns cleanly.
        sqlx::raw_sql(Dialect::Sqlite.template().create_ledger)
            .execute(executor.pool())
            .await
            .unwrap();
        executor.rollback(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_refuses_applied_migration() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        let err = executor.remove(SEED_FILE).await.unwrap_err();
        assert!(matches!(err, SchemaError::LedgerGuard(f) if f == SEED_FILE));
        // Explicit refusal, no mutation.
        assert_eq!(executor.ledger().status(SEED_FILE).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_remove_pending_migration() {
        let (_dir, executor) = test_executor().await;
        let file = executor.ledger().create_migration("scratch").await.unwrap();

        executor.remove(&file).await.unwrap();
        assert_eq!(executor.ledger().status(&file).await.unwrap(), None);
        assert!(!executor.ledger().migrations_dir().join(&file).exists());
    }

    #[tokio::test]
    async fn test_remove_with_missing_file_is_a_warning() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();
        executor.ledger().insert("9_ghost.sql", false).await.unwrap();

        // File never existed on disk; the ledger removal still succeeds.
        executor.remove("9_ghost").await.unwrap();
        assert_eq!(executor.ledger().status("9_ghost.sql").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot_refresh_after_migrate() {
        let (_dir, executor) = test_executor().await;
        executor.ledger().ensure_ready().await.unwrap();

        write_migration(
            &executor,
            "1_users.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);",
        );
        executor.migrate(None).await.unwrap();

        let snapshot = fs::read_to_string(executor.ledger().schema_path()).unwrap();
        assert!(snapshot.contains("table users"));
        assert!(!snapshot.contains("_schema_migrations"));
    }
}

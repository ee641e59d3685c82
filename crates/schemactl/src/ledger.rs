//! Migration ledger.
//!
//! Owns the `_schema_migrations` bookkeeping table: bootstrap creation,
//! reconciliation of on-disk files against recorded rows, status queries
//! and sequence numbering for new files. Rows are owned by the target
//! database; the process only observes and updates them.

use std::fs;
use std::path::PathBuf;

use sqlx::{AnyPool, Row};
use tracing::{debug, info, warn};

use crate::connect::DbHandle;
use crate::ddl::ROLLBACK_MARKER;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::schema::MigrationRecord;
use crate::snapshot;

/// Seed migration written when the ledger table is first bootstrapped.
pub const SEED_FILE: &str = "0_init.sql";

const SELECT_FILES: &str = "SELECT file FROM _schema_migrations";
const SELECT_PENDING: &str =
    "SELECT id, file FROM _schema_migrations WHERE migrated = false ORDER BY id ASC";
const SELECT_LAST_APPLIED: &str =
    "SELECT id, file FROM _schema_migrations WHERE migrated = true ORDER BY id DESC LIMIT 1";

/// Manages the migration ledger of one project root.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: AnyPool,
    dialect: Dialect,
    root: PathBuf,
}

impl Ledger {
    #[must_use]
    pub fn new(handle: &DbHandle, root: impl Into<PathBuf>) -> Self {
        Self {
            pool: handle.pool.clone(),
            dialect: handle.dialect,
            root: root.into(),
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &AnyPool {
        &self.pool
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join("migrations")
    }

    #[must_use]
    pub fn schema_path(&self) -> PathBuf {
        crate::config::schema_path(&self.root)
    }

    /// Bootstraps the ledger if the table does not exist yet: creates
    /// the migrations directory, writes and executes the seed migration,
    /// records it as applied and refreshes the snapshot.
    pub async fn ensure_ready(&self) -> Result<()> {
        let template = self.dialect.template();
        let exists = sqlx::query(template.table_exists)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Ok(());
        }

        let dir = self.migrations_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let seed_path = dir.join(SEED_FILE);
        if !seed_path.exists() {
            let mut content = String::new();
            if self.dialect.family() == crate::dialect::DialectFamily::Sqlite {
                content.push_str("PRAGMA journal_mode=WAL;\n\n");
            }
            content.push_str(template.create_ledger);
            fs::write(&seed_path, content)?;
        }

        let seed_sql = fs::read_to_string(&seed_path)?;
        sqlx::raw_sql(&seed_sql).execute(&self.pool).await?;
        self.insert(SEED_FILE, true).await?;

        snapshot::refresh(&self.pool, self.dialect, &self.schema_path()).await?;
        info!("migration ledger initialized");
        Ok(())
    }

    /// Reconciles the migration directory against the ledger: every
    /// local `.sql` file absent from the ledger is inserted as pending.
    /// Best-effort: a failed insert is a warning, not an error.
    pub async fn reconcile(&self) -> Result<()> {
        let rows = sqlx::query(SELECT_FILES).fetch_all(&self.pool).await?;
        let tracked: Vec<String> = rows
            .iter()
            .map(|r| r.try_get(0))
            .collect::<sqlx::Result<_>>()?;

        for file in self.local_files()? {
            if tracked.contains(&file) {
                continue;
            }
            match self.insert(&file, false).await {
                Ok(()) => info!(file, "added untracked migration file to ledger"),
                Err(e) => warn!(file, error = %e, "could not add migration file to ledger"),
            }
        }
        Ok(())
    }

    /// `.sql` files in the migrations directory, sorted by filename for
    /// deterministic ledger insertion order.
    pub fn local_files(&self) -> Result<Vec<String>> {
        let dir = self.migrations_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".sql") {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Next numeric file prefix: one greater than the maximum prefix in
    /// the directory, so gaps from removed files are respected rather
    /// than reused.
    pub fn next_sequence(&self) -> Result<i64> {
        let mut max_prefix: i64 = -1;
        for file in self.local_files()? {
            if let Some((prefix, _)) = file.split_once('_') {
                if let Ok(n) = prefix.parse::<i64>() {
                    max_prefix = max_prefix.max(n);
                }
            }
        }
        Ok(max_prefix + 1)
    }

    /// Creates a new migration file containing the rollback marker
    /// template and inserts its ledger row as pending. Returns the
    /// filename.
    pub async fn create_migration(&self, name: &str) -> Result<String> {
        self.ensure_ready().await?;
        self.reconcile().await?;

        let dir = self.migrations_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let file = format!("{}_{name}.sql", self.next_sequence()?);
        fs::write(dir.join(&file), format!("\n\n{ROLLBACK_MARKER}\n\n"))?;
        self.insert(&file, false).await?;
        debug!(file, "created migration file");
        Ok(file)
    }

    /// Pending migrations ordered ascending by ledger id.
    pub async fn pending(&self) -> Result<Vec<MigrationRecord>> {
        let rows = sqlx::query(SELECT_PENDING).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(MigrationRecord {
                    id: row.try_get(0)?,
                    file: row.try_get(1)?,
                    migrated: false,
                })
            })
            .collect()
    }

    /// Most recently applied migration by ledger id, if any.
    pub async fn last_applied(&self) -> Result<Option<MigrationRecord>> {
        let row = sqlx::query(SELECT_LAST_APPLIED)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(MigrationRecord {
                id: row.try_get(0)?,
                file: row.try_get(1)?,
                migrated: true,
            })
        })
        .transpose()
    }

    /// Applied/pending status of a file, `None` when untracked.
    pub async fn status(&self, file: &str) -> Result<Option<bool>> {
        let row = sqlx::query(self.dialect.template().select_status)
            .bind(file)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Ok(row.try_get::<i64, _>(0)? != 0)).transpose()
    }

    pub(crate) async fn insert(&self, file: &str, migrated: bool) -> Result<()> {
        sqlx::query(self.dialect.template().insert)
            .bind(file)
            .bind(migrated)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

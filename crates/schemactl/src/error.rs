//! Error types for schema and migration operations.

use std::path::PathBuf;

/// Errors that can occur while introspecting a schema or running migrations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// An unknown dialect tag was passed to the registry or driver selection.
    #[error("unsupported database type: {0}")]
    UnsupportedDialect(String),

    /// The database connection could not be opened.
    #[error("failed to open database connection: {0}")]
    Connection(#[source] sqlx::Error),

    /// A catalog/introspection query failed.
    #[error("catalog query failed for table '{table}': {source}")]
    CatalogQuery {
        /// Table being introspected when the failure occurred.
        table: String,
        /// Underlying database error.
        source: sqlx::Error,
    },

    /// A migration script or its ledger update failed inside a transaction.
    /// The transaction has been rolled back; no partial state persists.
    #[error("migration transaction failed for '{file}' (rolled back): {source}")]
    Transaction {
        /// Migration file being applied or rolled back.
        file: String,
        /// Underlying database error.
        source: sqlx::Error,
    },

    /// Removal was attempted on a migration the ledger marks as applied.
    #[error("cannot remove migration '{0}': it has already been migrated")]
    LedgerGuard(String),

    /// Rollback was requested on a file with no rollback section.
    #[error("no rollback script found in {0}")]
    EmptyRollback(String),

    /// The `db.schema` configuration header is missing or malformed.
    #[error("invalid schema config '{path}': {message}")]
    Config {
        /// Path to the schema file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Database error outside of introspection and transactions.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (migration files, schema snapshot, `.env`).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

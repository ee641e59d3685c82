//! Schema migrations and introspection for SQLite, PostgreSQL and MySQL.
//!
//! `schemactl` keeps a version-controlled, human-readable description of
//! a relational database schema (`db.schema`) synchronized with the live
//! schema, while tracking which migration files have been applied.
//!
//! # Architecture
//!
//! - **Dialect registry** - static SQL templates per database family
//! - **Schema drivers** - one catalog introspector per family, behind a
//!   shared capability trait, producing one normalized model
//! - **Migration ledger** - the `_schema_migrations` bookkeeping table:
//!   bootstrap, reconciliation of on-disk files, status queries
//! - **Migration executor** - transactional apply/rollback/remove of
//!   ordered migration files
//! - **Snapshot writer** - renders the schema back into `db.schema`,
//!   preserving its configuration header
//!
//! # Migration files
//!
//! A migration file is a forward SQL script, optionally followed by the
//! literal line `-- schema rollback` and a reverse script:
//!
//! ```sql
//! CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
//!
//! -- schema rollback
//!
//! DROP TABLE users;
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use schemactl::prelude::*;
//!
//! let handle = connect(Path::new("schema"), None, None).await?;
//! let executor = Executor::new(&handle, "schema");
//! executor.migrate(None).await?;
//! ```

pub mod config;
pub mod connect;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod inspect;
pub mod ledger;
pub mod query;
pub mod schema;
pub mod snapshot;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::SchemaConfig;
    pub use crate::connect::{connect, DbHandle};
    pub use crate::dialect::{Dialect, DialectFamily, DialectTemplate};
    pub use crate::error::{Result, SchemaError};
    pub use crate::executor::Executor;
    pub use crate::inspect::{inspect_schema, SchemaDriver};
    pub use crate::ledger::Ledger;
    pub use crate::query::{run_statement, QueryOutput};
    pub use crate::schema::{
        Column, Constraint, ConstraintKind, Database, Enum, Index, MigrationRecord, Table,
    };
}

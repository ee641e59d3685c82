//! Normalized schema model.
//!
//! All three dialect drivers produce these types, so the rest of the tool
//! never has to care whether the data came from a PRAGMA, from
//! `information_schema` or from parsed `SHOW CREATE TABLE` text. The model
//! is a value tree, rebuilt wholesale on every introspection call; element
//! order is catalog-ordinal and must be preserved for deterministic
//! snapshot diffs.

use serde::{Deserialize, Serialize};

/// Root of a normalized schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub tables: Vec<Table>,
    pub enums: Vec<Enum>,
}

/// A single table with its columns, constraints and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub constraints: Vec<Constraint>,
    pub indexes: Vec<Index>,
}

/// A table column with a dialect-normalized type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub auto_increment: bool,
}

/// Kinds of table constraints the model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
}

/// A table constraint.
///
/// For `ForeignKey`, `columns` and `reference_columns` have the same
/// length and are ordered so that `columns[i]` maps to
/// `reference_columns[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub reference_table: String,
    pub reference_columns: Vec<String>,
    pub check_expression: String,
    pub on_delete: String,
    pub on_update: String,
}

impl Constraint {
    /// Creates a primary-key constraint over the given columns.
    #[must_use]
    pub fn primary_key(columns: Vec<String>) -> Self {
        Self {
            kind: ConstraintKind::PrimaryKey,
            columns,
            ..Self::empty()
        }
    }

    /// Creates a unique constraint.
    #[must_use]
    pub fn unique(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Unique,
            columns,
            ..Self::empty()
        }
    }

    /// Creates a check constraint with the given expression.
    #[must_use]
    pub fn check(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Check,
            check_expression: expression.into(),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            name: String::new(),
            kind: ConstraintKind::Check,
            columns: Vec::new(),
            reference_table: String::new(),
            reference_columns: Vec::new(),
            check_expression: String::new(),
            on_delete: String::new(),
            on_update: String::new(),
        }
    }
}

/// A secondary index.
///
/// Indexes backing a primary key or a unique constraint are excluded;
/// those appear only as [`Constraint`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// An enumerated type.
///
/// Native for Postgres; synthesized for MySQL/MariaDB as
/// `<table>_<column>`, singularized for `status` columns on plural
/// table names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

/// A row of the `_schema_migrations` ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Ledger-assigned monotonic id; apply-all order follows it.
    pub id: i64,
    /// Migration filename, unique within the ledger.
    pub file: String,
    /// Whether the file's forward script has been applied.
    pub migrated: bool,
}

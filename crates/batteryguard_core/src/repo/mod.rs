//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Every mutation is a single guarded statement or one IMMEDIATE
//!   transaction; a failed id chain leaves storage byte-identical.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `Validation`) in addition to DB transport errors.

use crate::db::DbError;
use crate::model::object::ObjectValidationError;
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod group_repo;
pub mod object_repo;
pub mod report_repo;
pub mod sequence_repo;
pub mod settings_repo;
pub mod tree_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Shared repository error for all persistence operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Addressed entity or nested element is absent. Carries the full id
    /// path from the root entity, e.g. `objects/o1/technologies/t1`.
    NotFound(String),
    /// Create attempted with a pre-existing id.
    Conflict { entity: &'static str, id: String },
    /// Rejected before touching storage: unknown collection name, forbidden
    /// field-set key, or an empty field set.
    Validation(String),
    /// Whole-tree invariant violation (duplicate/empty element ids).
    TreeValidation(ObjectValidationError),
    /// Retry budget exhausted on a contended atomic operation.
    Transient { op: &'static str, attempts: u32 },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from an expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(path) => write!(f, "not found: {path}"),
            Self::Conflict { entity, id } => {
                write!(f, "{entity} id `{id}` already exists")
            }
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::TreeValidation(err) => write!(f, "{err}"),
            Self::Transient { op, attempts } => {
                write!(f, "operation `{op}` still contended after {attempts} attempts")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::TreeValidation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ObjectValidationError> for RepoError {
    fn from(value: ObjectValidationError) -> Self {
        Self::TreeValidation(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Maps a constraint violation on insert to `Conflict`, passing everything
/// else through as a transport error.
pub(crate) fn map_insert_error(
    err: rusqlite::Error,
    entity: &'static str,
    id: &str,
) -> RepoError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        return RepoError::Conflict {
            entity,
            id: id.to_string(),
        };
    }
    err.into()
}

/// Returns whether the error is writer contention worth retrying.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// Serializes a unit enum to its stable storage string.
pub(crate) fn enum_to_db<T: Serialize>(value: &T) -> RepoResult<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(text) => Ok(text),
        other => Err(RepoError::InvalidData(format!(
            "expected string-serializable enum, got `{other}`"
        ))),
    }
}

/// Parses a stable storage string back into a unit enum.
pub(crate) fn enum_from_db<T: DeserializeOwned>(text: &str, context: &str) -> RepoResult<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|_| RepoError::InvalidData(format!("invalid {context} value `{text}`")))
}

/// Incrementally built `SET` clause for typed partial updates.
///
/// Callers push only the fields present in the field set; an update with no
/// pushed fields is a caller bug surfaced as `Validation`.
#[derive(Default)]
pub(crate) struct SqlFieldSet {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl SqlFieldSet {
    pub fn push(&mut self, column: &str, value: impl Into<Value>) {
        self.values.push(value.into());
        self.clauses.push(format!("{column} = ?{}", self.values.len()));
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns `(set_clause, bind_values)`; `where` placeholders must
    /// continue numbering after `bind_count()`.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.clauses.join(", "), self.values)
    }

    pub fn bind_count(&self) -> usize {
        self.values.len()
    }
}

/// Table/column pairs each repository needs before serving requests.
pub(crate) struct TableSpec {
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

/// Verifies schema version and required tables/columns on a connection.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required: &[TableSpec],
) -> RepoResult<()> {
    let expected_version = crate::db::migrations::latest_version();
    let actual_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for spec in required {
        if !table_exists(conn, spec.table)? {
            return Err(RepoError::MissingRequiredTable(spec.table));
        }
        for column in spec.columns {
            if !table_has_column(conn, spec.table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: spec.table,
                    column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

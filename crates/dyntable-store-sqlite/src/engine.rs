// crates/dyntable-store-sqlite/src/engine.rs
// ============================================================================
// Module: SQLite Engine
// Description: SqlEngine over one mutex-guarded SQLite connection.
// Purpose: Execute Dyntable statements against a durable database file.
// Dependencies: dyntable-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteEngine`] owns one connection opened with secure defaults (foreign
//! keys on, configured journal and sync modes, busy timeout). All access is
//! serialized through a mutex. Query results are rendered to text column by
//! column; integers and reals use their decimal form.
//!
//! With `atomic_rebuild` enabled, [`SqlEngine::execute_sequence`] runs the
//! whole sequence in one transaction. `SQLite` supports transactional DDL, so a
//! failed rebuild leaves the original table untouched and no temporary table
//! behind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use dyntable_core::ColumnDescriptor;
use dyntable_core::EngineError;
use dyntable_core::ExecOutcome;
use dyntable_core::SequenceError;
use dyntable_core::SqlEngine;
use dyntable_core::SqlStatement;
use dyntable_core::SqlValue;
use dyntable_core::TextRow;
use dyntable_core::execute_each;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Column introspection query; `?1` is the table name.
const TABLE_INFO_SQL: &str =
    "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` engine.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Run rebuild sequences inside a single transaction.
    #[serde(default = "default_atomic_rebuild")]
    pub atomic_rebuild: bool,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with every other field at its default.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            atomic_rebuild: true,
        }
    }

    /// Validates the configuration without opening the database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the path is unusable.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default rebuild atomicity.
const fn default_atomic_rebuild() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` engine setup errors.
///
/// # Invariants
/// - Error messages never embed row values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Filesystem error while preparing the database path.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid configuration.
    #[error("sqlite store invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// `SQLite`-backed storage engine.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Bound parameters are never interpolated into statement text.
#[derive(Clone)]
pub struct SqliteEngine {
    /// Engine configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    /// Opens (or creates) the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid or the database
    /// cannot be opened.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(&config)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.connection
            .lock()
            .map_err(|_| EngineError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }

    /// Runs `statements` inside one transaction.
    fn execute_atomic(&self, statements: &[SqlStatement]) -> Result<(), SequenceError> {
        let mut guard = self.lock().map_err(|error| SequenceError {
            index: 0,
            error,
            rolled_back: false,
        })?;
        let tx = guard.transaction().map_err(|err| SequenceError {
            index: 0,
            error: statement_error(&err),
            rolled_back: false,
        })?;
        for (index, statement) in statements.iter().enumerate() {
            let outcome = tx.execute(&statement.sql, params_from_iter(bind_values(statement)));
            if let Err(err) = outcome {
                let rolled_back = tx.rollback().is_ok();
                return Err(SequenceError {
                    index,
                    error: statement_error(&err),
                    rolled_back,
                });
            }
        }
        tx.commit().map_err(|err| SequenceError {
            index: statements.len(),
            error: statement_error(&err),
            rolled_back: true,
        })
    }
}

impl SqlEngine for SqliteEngine {
    fn execute(&self, statement: &SqlStatement) -> Result<ExecOutcome, EngineError> {
        let guard = self.lock()?;
        let rows_affected = guard
            .execute(&statement.sql, params_from_iter(bind_values(statement)))
            .map_err(|err| statement_error(&err))?;
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: guard.last_insert_rowid(),
        })
    }

    fn query(&self, statement: &SqlStatement) -> Result<Vec<TextRow>, EngineError> {
        let guard = self.lock()?;
        let mut prepared = guard.prepare(&statement.sql).map_err(|err| statement_error(&err))?;
        let width = prepared.column_count();
        let mut rows = prepared
            .query(params_from_iter(bind_values(statement)))
            .map_err(|err| statement_error(&err))?;
        let mut output = Vec::new();
        while let Some(row) = rows.next().map_err(|err| statement_error(&err))? {
            let mut text_row = Vec::with_capacity(width);
            for index in 0 .. width {
                let value = row.get_ref(index).map_err(|err| statement_error(&err))?;
                text_row.push(render_text(value));
            }
            output.push(text_row);
        }
        Ok(output)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, EngineError> {
        let guard = self.lock()?;
        let mut prepared = guard.prepare(TABLE_INFO_SQL).map_err(|err| statement_error(&err))?;
        let columns = prepared
            .query_map([table], |row| {
                Ok(ColumnDescriptor {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    default_value: row.get(3)?,
                    is_primary_key: row.get::<_, i64>(4)? != 0,
                })
            })
            .map_err(|err| statement_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| statement_error(&err))?;
        Ok(columns)
    }

    fn execute_sequence(&self, statements: &[SqlStatement]) -> Result<(), SequenceError> {
        if self.config.atomic_rebuild {
            self.execute_atomic(statements)
        } else {
            execute_each(self, statements)
        }
    }

    fn readiness(&self) -> Result<(), EngineError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|err| EngineError::Unavailable(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts statement parameters to `SQLite` values.
fn bind_values(statement: &SqlStatement) -> Vec<Value> {
    statement
        .params
        .iter()
        .map(|param| match param {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(value) => Value::Integer(*value),
            SqlValue::Text(value) => Value::Text(value.clone()),
        })
        .collect()
}

/// Renders a stored value as text.
fn render_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Maps a `rusqlite` failure to an engine statement error.
fn statement_error(err: &rusqlite::Error) -> EngineError {
    EngineError::Statement(err.to_string())
}

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies connection pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA journal_mode = {}; PRAGMA synchronous = {};",
            config.journal_mode.pragma_value(),
            config.sync_mode.pragma_value()
        ))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

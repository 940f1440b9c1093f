// crates/dyntable-core/src/interfaces/mod.rs
// ============================================================================
// Module: Dyntable Interfaces
// Description: Backend-agnostic storage engine contract.
// Purpose: Define the minimal capability set the core is written against.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The core never opens connections itself. It builds statements and hands
//! them to a [`SqlEngine`], which offers exactly four primitives: execute a
//! statement, query rows as text, introspect a table's columns, and run an
//! ordered statement sequence. Implementations decide whether a sequence is
//! atomic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ColumnDescriptor;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Positional parameter bound into a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// SQL text with positional `?` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    /// Statement text.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a statement with positional parameters.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// Number of rows changed by the statement.
    pub rows_affected: usize,
    /// Rowid of the most recent insert on the executing connection.
    pub last_insert_id: i64,
}

/// Query result row with every column rendered as text.
pub type TextRow = Vec<Option<String>>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage engine failure.
///
/// # Invariants
/// - Messages come from the engine and never include bound parameter values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected or failed a statement.
    #[error("engine statement failed: {0}")]
    Statement(String),
    /// The engine connection is unusable (poisoned lock, closed handle).
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Failure of one statement inside an ordered sequence.
///
/// # Invariants
/// - `index` is zero-based into the submitted sequence.
/// - `rolled_back` is true only when earlier statements were undone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("statement {index} of sequence failed: {error}")]
pub struct SequenceError {
    /// Position of the failing statement.
    pub index: usize,
    /// Underlying engine failure.
    pub error: EngineError,
    /// Whether the engine rolled back the statements before `index`.
    pub rolled_back: bool,
}

// ============================================================================
// SECTION: Engine Trait
// ============================================================================

/// Minimal storage engine capability set.
pub trait SqlEngine {
    /// Executes a write or DDL statement.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine rejects the statement.
    fn execute(&self, statement: &SqlStatement) -> Result<ExecOutcome, EngineError>;

    /// Runs a query and returns every row with values rendered as text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the query fails.
    fn query(&self, statement: &SqlStatement) -> Result<Vec<TextRow>, EngineError>;

    /// Introspects `table` and returns its columns in declaration order.
    /// A missing table yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when introspection fails.
    fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, EngineError>;

    /// Executes statements in order, stopping at the first failure.
    ///
    /// The default commits each statement independently; engines with
    /// transactional DDL may override this to make the sequence atomic.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError`] identifying the failing statement.
    fn execute_sequence(&self, statements: &[SqlStatement]) -> Result<(), SequenceError> {
        execute_each(self, statements)
    }

    /// Reports engine liveness.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine cannot serve statements.
    fn readiness(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Executes statements one by one with independent commits.
///
/// # Errors
///
/// Returns [`SequenceError`] for the first failing statement; earlier
/// statements stay applied (`rolled_back` is false).
pub fn execute_each<E: SqlEngine + ?Sized>(
    engine: &E,
    statements: &[SqlStatement],
) -> Result<(), SequenceError> {
    for (index, statement) in statements.iter().enumerate() {
        engine.execute(statement).map_err(|error| SequenceError {
            index,
            error,
            rolled_back: false,
        })?;
    }
    Ok(())
}

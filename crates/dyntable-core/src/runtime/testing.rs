// crates/dyntable-core/src/runtime/testing.rs
// ============================================================================
// Module: Dyntable Test Engine
// Description: In-memory recording engine for unit tests.
// Purpose: Observe generated statements without a real database.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`RecordingEngine`] answers introspection from a fixed column list, hands
//! out queued query results, and records every successful statement. Failures
//! can be injected per statement text or per sequence index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::ColumnDescriptor;
use crate::core::ID_COLUMN;
use crate::interfaces::EngineError;
use crate::interfaces::ExecOutcome;
use crate::interfaces::SequenceError;
use crate::interfaces::SqlEngine;
use crate::interfaces::SqlStatement;
use crate::interfaces::TextRow;
use crate::runtime::changelog::ChangeLog;
use crate::runtime::engine::SharedEngine;
use crate::runtime::mutator::SchemaMutator;
use crate::runtime::rows::RowStore;
use crate::runtime::service::TableService;

// ============================================================================
// SECTION: Recording Engine
// ============================================================================

/// Mutable state behind the recording engine.
#[derive(Debug)]
struct RecordingState {
    /// Columns returned by introspection.
    columns: Vec<ColumnDescriptor>,
    /// Statements that succeeded, in order.
    executed: Vec<SqlStatement>,
    /// Results handed out to successive queries.
    query_rows: VecDeque<Vec<TextRow>>,
    /// Rows affected reported by every execute.
    rows_affected: usize,
    /// Insert id reported by every execute.
    last_insert_id: i64,
    /// Execute fails when the statement text contains this fragment.
    fail_containing: Option<String>,
    /// Sequence fails at (index, rolled back).
    fail_sequence: Option<(usize, bool)>,
    /// Readiness probe result.
    ready: bool,
}

/// Engine double that records statements instead of running them.
#[derive(Debug, Clone)]
pub struct RecordingEngine {
    /// Shared state so clones observe the same recording.
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingEngine {
    /// Creates an engine whose data table has `columns`.
    pub fn with_columns(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingState {
                columns,
                executed: Vec::new(),
                query_rows: VecDeque::new(),
                rows_affected: 1,
                last_insert_id: 1,
                fail_containing: None,
                fail_sequence: None,
                ready: true,
            })),
        }
    }

    /// Locks the shared state.
    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Fails executes whose text contains `fragment`.
    pub fn fail_execute_containing(&self, fragment: &str) {
        self.lock().fail_containing = Some(fragment.to_string());
    }

    /// Fails the next sequence at `index`.
    pub fn fail_sequence_at(&self, index: usize, rolled_back: bool) {
        self.lock().fail_sequence = Some((index, rolled_back));
    }

    /// Queues the result of the next query.
    pub fn push_query_rows(&self, rows: Vec<TextRow>) {
        self.lock().query_rows.push_back(rows);
    }

    /// Sets the rows-affected count reported by executes.
    pub fn set_rows_affected(&self, rows_affected: usize) {
        self.lock().rows_affected = rows_affected;
    }

    /// Sets the insert id reported by executes.
    pub fn set_last_insert_id(&self, id: i64) {
        self.lock().last_insert_id = id;
    }

    /// Sets the readiness probe result.
    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Returns the text of every successful statement.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.iter().map(|statement| statement.sql.clone()).collect()
    }

    /// Returns every successful statement with its parameters.
    pub fn executed_statements(&self) -> Vec<SqlStatement> {
        self.lock().executed.clone()
    }

    /// Wraps a clone of this engine for components.
    pub fn shared(&self) -> SharedEngine {
        SharedEngine::from_engine(self.clone())
    }

    /// Builds a schema mutator over this engine.
    pub fn mutator(&self) -> SchemaMutator {
        SchemaMutator::new(self.shared())
    }

    /// Builds a change log over this engine.
    pub fn change_log(&self) -> ChangeLog {
        ChangeLog::new(self.shared())
    }

    /// Builds a row store over this engine.
    pub fn rows(&self) -> RowStore {
        RowStore::new(self.shared(), self.change_log())
    }

    /// Builds a table service over this engine without bootstrapping.
    pub fn service(&self) -> TableService {
        TableService::new(self.shared())
    }
}

impl SqlEngine for RecordingEngine {
    fn execute(&self, statement: &SqlStatement) -> Result<ExecOutcome, EngineError> {
        let mut state = self.lock();
        if let Some(fragment) = &state.fail_containing
            && statement.sql.contains(fragment.as_str())
        {
            return Err(EngineError::Statement(format!("injected failure: {fragment}")));
        }
        state.executed.push(statement.clone());
        Ok(ExecOutcome {
            rows_affected: state.rows_affected,
            last_insert_id: state.last_insert_id,
        })
    }

    fn query(&self, _statement: &SqlStatement) -> Result<Vec<TextRow>, EngineError> {
        Ok(self.lock().query_rows.pop_front().unwrap_or_default())
    }

    fn table_columns(&self, _table: &str) -> Result<Vec<ColumnDescriptor>, EngineError> {
        Ok(self.lock().columns.clone())
    }

    fn execute_sequence(&self, statements: &[SqlStatement]) -> Result<(), SequenceError> {
        let failure = self.lock().fail_sequence.take();
        for (index, statement) in statements.iter().enumerate() {
            if let Some((fail_index, rolled_back)) = failure
                && fail_index == index
            {
                return Err(SequenceError {
                    index,
                    error: EngineError::Statement("injected sequence failure".to_string()),
                    rolled_back,
                });
            }
            self.execute(statement).map_err(|error| SequenceError {
                index,
                error,
                rolled_back: false,
            })?;
        }
        Ok(())
    }

    fn readiness(&self) -> Result<(), EngineError> {
        if self.lock().ready {
            Ok(())
        } else {
            Err(EngineError::Unavailable("injected outage".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a plain nullable column descriptor.
pub fn descriptor(name: &str, declared_type: &str) -> ColumnDescriptor {
    ColumnDescriptor {
        name: name.to_string(),
        declared_type: declared_type.to_string(),
        not_null: false,
        default_value: None,
        is_primary_key: false,
    }
}

/// Builds the identifier column descriptor.
pub fn id_descriptor() -> ColumnDescriptor {
    ColumnDescriptor {
        is_primary_key: true,
        ..descriptor(ID_COLUMN, "INTEGER")
    }
}

// crates/dyntable-core/src/runtime/engine.rs
// ============================================================================
// Module: Dyntable Shared Engine
// Description: Clonable, thread-safe handle around a storage engine.
// Purpose: Pass one storage handle by ownership into every component.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`SharedEngine`] wraps an engine in an `Arc` trait object so the catalog,
//! mutator, row store and change log all reuse the single handle constructed
//! at startup. There is no ambient global connection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::ColumnDescriptor;
use crate::interfaces::EngineError;
use crate::interfaces::ExecOutcome;
use crate::interfaces::SequenceError;
use crate::interfaces::SqlEngine;
use crate::interfaces::SqlStatement;
use crate::interfaces::TextRow;

// ============================================================================
// SECTION: Shared Engine
// ============================================================================

/// Shared storage engine backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedEngine {
    /// Inner engine implementation.
    inner: Arc<dyn SqlEngine + Send + Sync>,
}

impl SharedEngine {
    /// Wraps an engine in a shared, clonable wrapper.
    #[must_use]
    pub fn from_engine(engine: impl SqlEngine + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(engine),
        }
    }
}

impl SqlEngine for SharedEngine {
    fn execute(&self, statement: &SqlStatement) -> Result<ExecOutcome, EngineError> {
        self.inner.execute(statement)
    }

    fn query(&self, statement: &SqlStatement) -> Result<Vec<TextRow>, EngineError> {
        self.inner.query(statement)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, EngineError> {
        self.inner.table_columns(table)
    }

    fn execute_sequence(&self, statements: &[SqlStatement]) -> Result<(), SequenceError> {
        self.inner.execute_sequence(statements)
    }

    fn readiness(&self) -> Result<(), EngineError> {
        self.inner.readiness()
    }
}

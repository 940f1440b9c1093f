// crates/dyntable-core/src/runtime/catalog.rs
// ============================================================================
// Module: Dyntable Column Catalog
// Description: On-demand introspection of the data table's columns.
// Purpose: Supply the current column list to every statement builder.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The catalog asks the engine for the live column list every time. Nothing is
//! cached, so results always reflect the latest add/rename/remove.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ColumnDescriptor;
use crate::core::DATA_TABLE;
use crate::interfaces::EngineError;
use crate::interfaces::SqlEngine;
use crate::runtime::engine::SharedEngine;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Column introspection failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The table does not exist.
    #[error("catalog: table {0} does not exist")]
    MissingTable(String),
    /// The introspection query failed.
    #[error("catalog: introspection failed: {0}")]
    Engine(#[from] EngineError),
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Live view over the data table's column definitions.
#[derive(Clone)]
pub struct ColumnCatalog {
    /// Shared storage engine.
    engine: SharedEngine,
}

impl ColumnCatalog {
    /// Creates a catalog over the shared engine.
    #[must_use]
    pub const fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
        }
    }

    /// Lists the data table's columns in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the table is missing or introspection
    /// fails. No partial list is ever returned.
    pub fn list_columns(&self) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        let columns = self.engine.table_columns(DATA_TABLE)?;
        if columns.is_empty() {
            return Err(CatalogError::MissingTable(DATA_TABLE.to_string()));
        }
        Ok(columns)
    }
}

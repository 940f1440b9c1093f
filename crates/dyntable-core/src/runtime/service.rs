// crates/dyntable-core/src/runtime/service.rs
// ============================================================================
// Module: Dyntable Table Service
// Description: Facade bundling catalog, mutator, row store and change log.
// Purpose: Give outer layers one handle per storage engine.
// Dependencies: crate::core, crate::interfaces, crate::runtime, thiserror
// ============================================================================

//! ## Overview
//! [`TableService`] is the entry point used by the server and the CLI. It is
//! built from one [`SharedEngine`]; every component it owns reuses that
//! handle. [`TableService::open`] creates the data and log tables when they
//! are absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ChangeLogEntry;
use crate::core::ColumnDescriptor;
use crate::core::FieldMap;
use crate::core::Row;
use crate::core::RowId;
use crate::interfaces::EngineError;
use crate::interfaces::SqlEngine;
use crate::runtime::catalog::CatalogError;
use crate::runtime::catalog::ColumnCatalog;
use crate::runtime::changelog::ChangeLog;
use crate::runtime::changelog::LogError;
use crate::runtime::engine::SharedEngine;
use crate::runtime::mutator::SchemaError;
use crate::runtime::mutator::SchemaMutator;
use crate::runtime::mutator::SchemaStep;
use crate::runtime::rows::RowStore;
use crate::runtime::rows::StoreError;
use crate::runtime::rows::UpdateOutcome;
use crate::runtime::sql::bootstrap_statements;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Facade failure wrapping the component error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Table creation failed.
    #[error("bootstrap failed: {0}")]
    Bootstrap(EngineError),
    /// The engine failed its readiness probe.
    #[error("engine not ready: {0}")]
    Unavailable(EngineError),
    /// Column introspection failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// A schema change failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A row operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The change log could not be read.
    #[error(transparent)]
    Log(#[from] LogError),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Single-handle facade over the dynamic table.
#[derive(Clone)]
pub struct TableService {
    /// Shared storage engine.
    engine: SharedEngine,
    /// Column introspection.
    catalog: ColumnCatalog,
    /// Schema changes.
    mutator: SchemaMutator,
    /// Row access.
    rows: RowStore,
    /// Update history.
    change_log: ChangeLog,
}

impl TableService {
    /// Builds the service without touching the database.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        let change_log = ChangeLog::new(engine.clone());
        Self {
            catalog: ColumnCatalog::new(engine.clone()),
            mutator: SchemaMutator::new(engine.clone()),
            rows: RowStore::new(engine.clone(), change_log.clone()),
            change_log,
            engine,
        }
    }

    /// Builds the service and creates the tables when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Bootstrap`] when table creation fails.
    pub fn open(engine: SharedEngine) -> Result<Self, ServiceError> {
        for statement in bootstrap_statements() {
            engine.execute(&statement).map_err(ServiceError::Bootstrap)?;
        }
        Ok(Self::new(engine))
    }

    /// Lists the data table's columns.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Catalog`] on introspection failure.
    pub fn list_columns(&self) -> Result<Vec<ColumnDescriptor>, ServiceError> {
        Ok(self.catalog.list_columns()?)
    }

    /// Adds a column.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Schema`] on failure.
    pub fn add_column(&self, name: &str, declared_type: &str) -> Result<(), ServiceError> {
        Ok(self.mutator.add_column(name, declared_type)?)
    }

    /// Renames a column.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Schema`] on failure.
    pub fn rename_column(&self, old_name: &str, new_name: &str) -> Result<(), ServiceError> {
        Ok(self.mutator.rename_column(old_name, new_name)?)
    }

    /// Removes a column.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Schema`] on failure.
    pub fn remove_column(&self, name: &str) -> Result<(), ServiceError> {
        Ok(self.mutator.remove_column(name)?)
    }

    /// Inserts a row.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on failure.
    pub fn insert(&self, fields: &FieldMap) -> Result<RowId, ServiceError> {
        Ok(self.rows.insert(fields)?)
    }

    /// Fetches one row.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on failure, including not found.
    pub fn get(&self, id: RowId) -> Result<Row, ServiceError> {
        Ok(self.rows.get(id)?)
    }

    /// Fetches every row.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on failure.
    pub fn get_all(&self) -> Result<Vec<Row>, ServiceError> {
        Ok(self.rows.get_all()?)
    }

    /// Updates a row and records the change.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on failure.
    pub fn update(&self, id: RowId, fields: &FieldMap) -> Result<UpdateOutcome, ServiceError> {
        Ok(self.rows.update(id, fields)?)
    }

    /// Lists the change log entries recorded for a row.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Log`] when the log cannot be read.
    pub fn changes(&self, id: RowId) -> Result<Vec<ChangeLogEntry>, ServiceError> {
        Ok(self.change_log.entries_for(id)?)
    }

    /// Probes the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unavailable`] when the engine is not usable.
    pub fn readiness(&self) -> Result<(), ServiceError> {
        self.engine.readiness().map_err(ServiceError::Unavailable)
    }
}

impl ServiceError {
    /// Returns true when the failure is a missing row.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound(_)))
    }

    /// Returns true when the failure was caused by the request itself.
    #[must_use]
    pub fn is_invalid_request(&self) -> bool {
        match self {
            Self::Store(StoreError::UnknownColumn(_) | StoreError::Invalid(_)) => true,
            Self::Schema(err) => err.step == SchemaStep::Validate,
            _ => false,
        }
    }

    /// Returns a stable label for the failure category.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bootstrap(_) => "bootstrap",
            Self::Unavailable(_) => "unavailable",
            Self::Catalog(_) => "catalog",
            Self::Schema(_) => "schema",
            Self::Store(StoreError::NotFound(_)) => "not_found",
            Self::Store(StoreError::UnknownColumn(_) | StoreError::Invalid(_)) => "invalid",
            Self::Store(_) => "store",
            Self::Log(_) => "log",
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

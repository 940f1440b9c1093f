// crates/dyntable-core/src/lib.rs
// ============================================================================
// Module: Dyntable Core Library
// Description: Public API surface for the Dyntable core.
// Purpose: Expose core types, the engine contract, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Dyntable keeps one wide SQLite-dialect table whose columns are added,
//! renamed and removed at runtime, with untyped text rows and an append-only
//! log of updates. The core is backend-agnostic: it builds statements and
//! runs them through [`SqlEngine`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::EngineError;
pub use interfaces::ExecOutcome;
pub use interfaces::SequenceError;
pub use interfaces::SqlEngine;
pub use interfaces::SqlStatement;
pub use interfaces::SqlValue;
pub use interfaces::TextRow;
pub use interfaces::execute_each;
pub use runtime::CatalogError;
pub use runtime::ChangeLog;
pub use runtime::ColumnCatalog;
pub use runtime::LogError;
pub use runtime::RowStore;
pub use runtime::SchemaError;
pub use runtime::SchemaMutator;
pub use runtime::SchemaStep;
pub use runtime::ServiceError;
pub use runtime::SharedEngine;
pub use runtime::StoreError;
pub use runtime::TableService;
pub use runtime::UpdateOutcome;

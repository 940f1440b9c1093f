// crates/dyntable-core/src/runtime/mod.rs
// ============================================================================
// Module: Dyntable Runtime
// Description: Catalog, schema mutator, row store, change log and facade.
// Purpose: Implement dynamic-schema table operations over a storage engine.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime components share one [`SharedEngine`] and re-read the live column
//! list before every statement they build. [`TableService`] bundles them for
//! outer layers.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod catalog;
pub mod changelog;
pub mod engine;
pub mod mutator;
pub mod rows;
pub mod service;
pub mod sql;
#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CatalogError;
pub use catalog::ColumnCatalog;
pub use changelog::ChangeLog;
pub use changelog::LogError;
pub use engine::SharedEngine;
pub use mutator::SchemaError;
pub use mutator::SchemaMutator;
pub use mutator::SchemaStep;
pub use rows::RowStore;
pub use rows::StoreError;
pub use rows::UpdateOutcome;
pub use service::ServiceError;
pub use service::TableService;

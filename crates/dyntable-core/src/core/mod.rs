// crates/dyntable-core/src/core/mod.rs
// ============================================================================
// Module: Dyntable Core Types
// Description: Identifiers, schema descriptors, and row structures.
// Purpose: Provide stable, serializable types shared by every Dyntable crate.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types are plain data: row identifiers, column descriptors, rows and
//! change log entries. They carry no storage behavior.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod row;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::IdentifierError;
pub use identifiers::MAX_COLUMN_NAME_LENGTH;
pub use identifiers::MAX_DECLARED_TYPE_LENGTH;
pub use identifiers::RowId;
pub use identifiers::validate_column_name;
pub use identifiers::validate_declared_type;
pub use row::ChangeLogEntry;
pub use row::FieldMap;
pub use row::Row;
pub use schema::ColumnDescriptor;
pub use schema::DATA_TABLE;
pub use schema::ID_COLUMN;
pub use schema::LOG_TABLE;
pub use schema::find_column;

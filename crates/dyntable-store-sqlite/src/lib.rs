// crates/dyntable-store-sqlite/src/lib.rs
// ============================================================================
// Module: Dyntable SQLite Engine
// Description: SqlEngine backend using a single SQLite connection.
// Purpose: Persist the dynamic table and its change log on disk.
// Dependencies: dyntable-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteEngine`], the production [`dyntable_core::SqlEngine`].
//! One connection is opened per engine and shared behind a mutex; rebuild
//! sequences run inside a transaction unless atomic rebuilds are disabled.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::SqliteEngine;
pub use engine::SqliteStoreConfig;
pub use engine::SqliteStoreError;
pub use engine::SqliteStoreMode;
pub use engine::SqliteSyncMode;

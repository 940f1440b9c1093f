// crates/dyntable-config/src/lib.rs
// ============================================================================
// Module: Dyntable Config Library
// Description: Config model, loading, validation, and example generation.
// Purpose: Single source of truth for dyntable.toml semantics.
// Dependencies: dyntable-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `dyntable-config` defines the configuration model for the Dyntable server
//! and CLI. Files are TOML with strict size and path limits; a small set of
//! environment variables overrides the store path and bind address.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;

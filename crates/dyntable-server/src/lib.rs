// crates/dyntable-server/src/lib.rs
// ============================================================================
// Module: Dyntable Server
// Description: HTTP server for the dynamic table service.
// Purpose: Serve columns, entries, and change history as JSON over HTTP.
// Dependencies: dyntable-core, dyntable-config, dyntable-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! `dyntable-server` wraps [`dyntable_core::TableService`] in an axum router.
//! Handlers are thin wrappers: validation, schema rebuilds, and change
//! logging all live in the core crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod audit;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::ApiError;
pub use audit::AuditSink;
pub use audit::ChangeLogWarningEvent;
pub use audit::FileAuditSink;
pub use audit::HttpRequestEvent;
pub use audit::LifecycleEvent;
pub use audit::NoopAuditSink;
pub use audit::SchemaChangeEvent;
pub use audit::StderrAuditSink;
pub use audit::audit_sink_from_config;
pub use server::DyntableServer;
pub use server::ServerError;
pub use server::shutdown_signal;

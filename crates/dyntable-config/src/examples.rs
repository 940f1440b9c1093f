// crates/dyntable-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic starter config for operators and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The example spells out every setting with its default value, so loading
//! it yields the same configuration as having no file at all.

/// Returns a canonical example `dyntable.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 1048576
health_timeout_ms = 1000
shutdown_grace_ms = 5000

[store]
path = "dyntable.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"
# Set to false to run column rebuilds statement by statement.
atomic_rebuild = true

[audit]
sink = "stderr"
# sink = "file"
# path = "dyntable-audit.jsonl"
"#,
    )
}

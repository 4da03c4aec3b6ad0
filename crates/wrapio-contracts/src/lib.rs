//! Shared, version-pinned protocol identifiers.
//!
//! These constants are the single source of truth for schema/version strings that
//! appear in machine-readable output of the `wrapio` tool.

pub const WRAPIO_MARSHAL_REPORT_SCHEMA_VERSION: &str = "wrapio.marshal.report@0.1.0";
pub const WRAPIO_RUN_REPORT_SCHEMA_VERSION: &str = "wrapio.run.report@0.1.0";

pub const WRAPIO_SETTINGS_SCHEMA_VERSION: &str = "wrapio.settings@0.1.0";

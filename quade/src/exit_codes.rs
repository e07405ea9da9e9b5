//! Stable exit codes for quade CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, layout or config, or any other error.
pub const INVALID: i32 = 1;
/// `quade execute` ran the scenario and it failed; the record is `FAILED`.
pub const EXECUTION_FAILED: i32 = 2;

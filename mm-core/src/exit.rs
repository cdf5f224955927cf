//! Process exit codes for the CLI boundary.

/// The command line could not be parsed.
pub const USAGE: i32 = 42;

/// The topology configuration could not be read or parsed.
pub const CONFIG: i32 = 1;

/// The process failed after startup (listener bind, registry conflict, ...).
pub const RUNTIME: i32 = 1;

#![deny(
    // Strict on purpose: exceptions are made with inline allows so they get a second look.
    clippy::nursery,
    clippy::pedantic,
    missing_docs,
    clippy::missing_docs_in_private_items,
)]
//! Shared plumbing for the meshmark binaries: logging setup, the common error type, and the process
//! exit codes used at the CLI boundary.

pub mod errors;
pub mod exit;
pub mod logging;

pub use errors::{
    MeshError,
    MeshResult,
};

//! Error type shared by the meshmark crates.
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type MeshResult<T> = Result<T, MeshError>;

/// Everything that can go wrong outside of the (total) expansion core.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The configuration file could not be read.
    #[error("could not read config {}: {source}", path.display())]
    ConfigRead {
        /// Path we tried to read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was read but is neither valid JSON nor valid YAML.
    #[error("could not parse config {}: {reason}", path.display())]
    ConfigParse {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A metric name was registered twice with different label keys.
    #[error("label set mismatch for {metric}: registered {registered:?}, requested {requested:?}")]
    LabelSetMismatch {
        /// Metric family name.
        metric: String,
        /// Keys the live instrument was created with.
        registered: Vec<String>,
        /// Keys of the offending series.
        requested: Vec<String>,
    },

    /// An observation was routed to an instrument of the wrong kind.
    #[error("observation {observation} cannot be applied to {kind} metric {metric}")]
    ObservationMismatch {
        /// Metric family name.
        metric: String,
        /// Instrument kind.
        kind: &'static str,
        /// Observation kind.
        observation: &'static str,
    },

    /// The backing prometheus registry rejected an operation.
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    /// Writing rendered output failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MeshError {
    /// Whether this error originates from configuration input (as opposed to runtime).
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::ConfigRead { .. } | Self::ConfigParse { .. })
    }

    /// Process exit code to use when this error reaches `main`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_config() {
            crate::exit::CONFIG
        } else {
            crate::exit::RUNTIME
        }
    }
}

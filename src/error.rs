//! Error types for the storage inventory engine

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a storage inventory
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Vendor Tool Errors
    // =========================================================================
    /// Vendor binary is not installed in any of the known locations
    #[error("{tool} is not installed")]
    ToolUnavailable { tool: String },

    /// Vendor tool exited with a non-zero status
    #[error("command '{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Vendor tool did not finish in time
    #[error("command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// Vendor tool output did not match any known format
    #[error("unparseable {tool} output: {reason}")]
    UnparseableOutput { tool: String, reason: String },

    /// The kernel PCI address could not be bound to a vendor controller
    #[error("{family} controller not found for {pci}")]
    ControllerNotFound { family: String, pci: String },

    // =========================================================================
    // Topology Errors
    // =========================================================================
    /// Unexpected sysfs layout under a controller
    #[error("malformed topology at {}: {reason}", path.display())]
    MalformedTopology { path: PathBuf, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON encode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an unparseable-output error
    pub fn unparseable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnparseableOutput {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a malformed-topology error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MalformedTopology {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

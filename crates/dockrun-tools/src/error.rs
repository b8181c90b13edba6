//! Error types for external tool invocation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running an external tool or reading its output.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The process did not exit within the configured timeout.
    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The process exited unsuccessfully.
    #[error("'{program}' exited with code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },

    /// Receptor structure could not be read.
    #[error("Failed to read receptor '{path}': {source}")]
    ReceptorRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Receptor structure holds no usable atom coordinates.
    #[error("Receptor '{0}' contains no ATOM/HETATM coordinates")]
    EmptyReceptor(PathBuf),

    /// Docking output carried no parsable score.
    #[error("Could not parse docking score: {0}")]
    ScoreParse(String),

    /// Docking output carried no pose.
    #[error("Docking engine returned an empty pose")]
    EmptyPose,

    /// Unknown value for a tool option.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem error around a tool invocation.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

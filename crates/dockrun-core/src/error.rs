//! Core domain errors.

use thiserror::Error;

/// Core domain errors for dockrun.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Identifier is not a non-empty run of ASCII digits.
    #[error("Invalid ligand identifier: '{0}'")]
    InvalidIdentifier(String),

    /// No identifier could be extracted from a file name.
    #[error("Could not extract identifier from '{0}'")]
    NoIdentifier(String),
}

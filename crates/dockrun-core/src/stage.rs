//! Stages a docking task passes through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two external format conversions a ligand goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStage {
    /// Source structure (SDF) to intermediate format (MOL2).
    SdfToMol2,
    /// Intermediate format (MOL2) to docking-ready format (PDBQT).
    Mol2ToPdbqt,
}

impl ConversionStage {
    /// Both stages, in the order they must run.
    pub const ALL: [ConversionStage; 2] = [Self::SdfToMol2, Self::Mol2ToPdbqt];

    /// Format the stage reads.
    pub fn input_format(&self) -> &'static str {
        match self {
            Self::SdfToMol2 => "sdf",
            Self::Mol2ToPdbqt => "mol2",
        }
    }

    /// Format the stage writes.
    pub fn output_format(&self) -> &'static str {
        match self {
            Self::SdfToMol2 => "mol2",
            Self::Mol2ToPdbqt => "pdbqt",
        }
    }

    /// Short label used in logs and the error log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SdfToMol2 => "sdf-to-mol2",
            Self::Mol2ToPdbqt => "mol2-to-pdbqt",
        }
    }
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the pipeline a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// File matched the ligand extension but yielded no identifier.
    Identifier,
    /// An external conversion exited unsuccessfully.
    Conversion(ConversionStage),
    /// The docking-ready artifact is structurally malformed.
    Validation,
    /// Pocket computation or the docking engine failed.
    Docking,
    /// The result could not be written to the results table.
    Recording,
}

impl FailureStage {
    /// Short label used in logs and the error log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Conversion(stage) => stage.as_str(),
            Self::Validation => "validation",
            Self::Docking => "docking",
            Self::Recording => "recording",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

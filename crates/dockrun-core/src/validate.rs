//! Structural checks on docking-ready (PDBQT) ligand text.
//!
//! A flexible PDBQT ligand is a torsion tree with exactly one rigid root
//! fragment, opened by a `ROOT` record and closed by `ENDROOT`. Converters
//! occasionally emit several roots for fragmented inputs; the docking engine
//! then fails late and expensively, so we reject such files up front.

use std::fmt;

const ROOT_MARKER: &str = "ROOT";
const END_ROOT_MARKER: &str = "ENDROOT";

/// Why an artifact was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    MissingRoot,
    MultipleRoots(usize),
    MissingEndRoot,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "no {ROOT_MARKER} tag found, expected exactly 1"),
            Self::MultipleRoots(n) => {
                write!(f, "found {n} {ROOT_MARKER} tags, expected exactly 1")
            }
            Self::MissingEndRoot => write!(f, "missing {END_ROOT_MARKER} tag"),
        }
    }
}

/// Result of validating a docking-ready artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validate the full text of a PDBQT ligand.
pub fn validate_text(content: &str) -> ValidationOutcome {
    let roots = content
        .lines()
        .filter(|line| line.trim_start().starts_with(ROOT_MARKER))
        .count();

    match roots {
        0 => ValidationOutcome::Invalid(InvalidReason::MissingRoot),
        1 if content.contains(END_ROOT_MARKER) => ValidationOutcome::Valid,
        1 => ValidationOutcome::Invalid(InvalidReason::MissingEndRoot),
        n => ValidationOutcome::Invalid(InvalidReason::MultipleRoots(n)),
    }
}

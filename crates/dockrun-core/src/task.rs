//! Docking task and output layout types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::LigandId;

/// File name of the results table inside the output directory.
pub const RESULTS_FILE: &str = "docking_results.csv";

/// File name of the error log inside the output directory.
pub const ERROR_LOG_FILE: &str = "error_log.txt";

/// Subdirectory holding intermediate MOL2 files.
pub const MOL2_DIR: &str = "mol2";

/// Subdirectory holding docking-ready and pose PDBQT files.
pub const PDBQT_DIR: &str = "pdbqt";

/// Where a batch writes everything it produces.
///
/// ```text
/// {output_dir}/mol2/{id}.mol2
/// {output_dir}/pdbqt/{id}.pdbqt
/// {output_dir}/pdbqt/{id}_output.pdbqt
/// {output_dir}/docking_results.csv
/// {output_dir}/error_log.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLayout {
    output_dir: PathBuf,
}

impl WorkLayout {
    /// Create a layout rooted at `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn mol2_dir(&self) -> PathBuf {
        self.output_dir.join(MOL2_DIR)
    }

    pub fn pdbqt_dir(&self) -> PathBuf {
        self.output_dir.join(PDBQT_DIR)
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_FILE)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.output_dir.join(ERROR_LOG_FILE)
    }

    pub fn mol2_path(&self, id: &LigandId) -> PathBuf {
        self.mol2_dir().join(format!("{id}.mol2"))
    }

    pub fn pdbqt_path(&self, id: &LigandId) -> PathBuf {
        self.pdbqt_dir().join(format!("{id}.pdbqt"))
    }

    pub fn pose_path(&self, id: &LigandId) -> PathBuf {
        self.pdbqt_dir().join(format!("{id}_output.pdbqt"))
    }
}

/// A single ligand to convert, validate and dock.
///
/// Created by the task source and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingTask {
    /// Identifier extracted from the ligand file name.
    pub id: LigandId,

    /// Source structure file (SDF).
    pub ligand_path: PathBuf,

    /// Fixed receptor structure shared by the whole batch.
    pub receptor_path: PathBuf,

    /// Output layout of the batch.
    pub layout: WorkLayout,
}

impl DockingTask {
    /// Create a new DockingTask.
    pub fn new(
        id: LigandId,
        ligand_path: impl Into<PathBuf>,
        receptor_path: impl Into<PathBuf>,
        layout: WorkLayout,
    ) -> Self {
        Self {
            id,
            ligand_path: ligand_path.into(),
            receptor_path: receptor_path.into(),
            layout,
        }
    }

    /// Intermediate MOL2 path for this ligand.
    pub fn mol2_path(&self) -> PathBuf {
        self.layout.mol2_path(&self.id)
    }

    /// Docking-ready PDBQT path for this ligand.
    pub fn pdbqt_path(&self) -> PathBuf {
        self.layout.pdbqt_path(&self.id)
    }

    /// Pose file the docked conformation is appended to.
    pub fn pose_path(&self) -> PathBuf {
        self.layout.pose_path(&self.id)
    }
}

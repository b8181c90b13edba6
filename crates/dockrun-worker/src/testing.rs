//! In-process stand-ins for obabel and vina, plus a scratch batch directory.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use dockrun_core::{ConversionResult, ConversionStage, WorkLayout};
use dockrun_tools::{Converter, DockRequest, DockingEngine, EngineOutput, ToolError};

use crate::config::Config;

const RECEPTOR: &str = "\
ATOM      1  N   MET A   1      -2.000   0.000  10.000  1.00  0.00    -0.300 N
ATOM      2  CA  MET A   1       4.000   6.000  12.000  1.00  0.00     0.100 C
";

const VALID_PDBQT: &str = "ROOT\nATOM      1  C1  LIG     1       0.000   0.000   0.000\nENDROOT\nTORSDOF 0\n";
const MALFORMED_PDBQT: &str = "ROOT\nENDROOT\nROOT\nENDROOT\n";

/// Id of the ligand a work file belongs to (`{id}.mol2`, `{id}.pdbqt`).
fn id_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Default)]
struct Calls(Mutex<HashMap<String, usize>>);

impl Calls {
    fn bump(&self, id: &str) {
        *self.0.lock().unwrap().entry(id.to_string()).or_default() += 1;
    }

    fn get(&self, id: &str) -> usize {
        self.0.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.0.lock().unwrap().values().sum()
    }
}

/// Converter that writes fixture files instead of running obabel.
#[derive(Default)]
pub struct FakeConverter {
    failures: HashMap<String, ConversionStage>,
    malformed: HashSet<String>,
    calls: Calls,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `stage` fail for ligand `id`.
    pub fn fail_at(mut self, id: &str, stage: ConversionStage) -> Self {
        self.failures.insert(id.to_string(), stage);
        self
    }

    /// Produce a PDBQT file with two ROOT blocks for ligand `id`.
    pub fn malformed(mut self, id: &str) -> Self {
        self.malformed.insert(id.to_string());
        self
    }

    /// Stage invocations for ligand `id`.
    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.get(id)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.total()
    }
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(
        &self,
        stage: ConversionStage,
        _input: &Path,
        output: &Path,
    ) -> ConversionResult {
        let id = id_of(output);
        self.calls.bump(&id);

        if self.failures.get(&id) == Some(&stage) {
            return ConversionResult::failed(stage, "0 molecules converted\n1 errors");
        }

        let content = match stage {
            ConversionStage::SdfToMol2 => "@<TRIPOS>MOLECULE\n",
            ConversionStage::Mol2ToPdbqt if self.malformed.contains(&id) => MALFORMED_PDBQT,
            ConversionStage::Mol2ToPdbqt => VALID_PDBQT,
        };
        match tokio::fs::write(output, content).await {
            Ok(()) => ConversionResult::succeeded(stage),
            Err(e) => ConversionResult::failed(stage, e.to_string()),
        }
    }
}

/// Engine that echoes the ligand back as its pose.
#[derive(Default)]
pub struct FakeEngine {
    failures: HashSet<String>,
    calls: Calls,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make docking fail for ligand `id`.
    pub fn fail_for(mut self, id: &str) -> Self {
        self.failures.insert(id.to_string());
        self
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.get(id)
    }
}

#[async_trait]
impl DockingEngine for FakeEngine {
    async fn dock(&self, request: &DockRequest) -> Result<EngineOutput, ToolError> {
        let id = id_of(&request.ligand);
        self.calls.bump(&id);

        if self.failures.contains(&id) {
            return Err(ToolError::NonZeroExit {
                program: "vina".to_string(),
                code: 1,
                stderr: "ligand outside search space".to_string(),
            });
        }

        let pose_text = tokio::fs::read_to_string(&request.ligand).await?;
        let score = -(id.parse::<f64>().unwrap_or(0.0) / 10.0 + 5.0);
        Ok(EngineOutput { score, pose_text })
    }
}

/// Input tree, receptor and output directory for one test batch.
pub struct Workspace {
    _root: tempfile::TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub receptor: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let input_dir = root.path().join("ligands");
        let output_dir = root.path().join("out");
        let receptor = root.path().join("receptor.pdbqt");
        fs::create_dir_all(&input_dir).unwrap();
        fs::write(&receptor, RECEPTOR).unwrap();
        Self {
            _root: root,
            input_dir,
            output_dir,
            receptor,
        }
    }

    pub fn add_ligands(&self, names: &[&str]) {
        for name in names {
            fs::write(self.input_dir.join(name), "\n  dockrun\n\n$$$$\n").unwrap();
        }
    }

    pub fn layout(&self) -> WorkLayout {
        WorkLayout::new(&self.output_dir)
    }

    pub fn config(&self) -> Config {
        Config {
            input_dir: self.input_dir.clone(),
            receptor: self.receptor.clone(),
            output_dir: self.output_dir.clone(),
            max_workers: 4,
            ..Config::default()
        }
    }
}

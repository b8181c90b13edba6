//! Batch configuration.

use std::path::PathBuf;
use std::time::Duration;

use dockrun_core::WorkLayout;
use dockrun_tools::{
    ExternalTool, ObabelConverter, ScoringFunction, SearchMode, VinaEngine,
    DEFAULT_BUFFER, DEFAULT_EXHAUSTIVENESS,
};

/// Default file name pattern; the first capture group is the ligand id.
pub const DEFAULT_PATTERN: &str = r"^No_(\d+)\.sdf$";

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory tree scanned for ligand files.
    pub input_dir: PathBuf,

    /// Receptor structure shared by every task.
    pub receptor: PathBuf,

    /// Where converted files, poses, results and the error log go.
    pub output_dir: PathBuf,

    /// Size of the worker pool.
    pub max_workers: usize,

    /// File name regex; capture group 1 is the ligand id.
    pub pattern: String,

    /// Extension of candidate ligand files.
    pub extension: String,

    /// Path to the `obabel` executable.
    pub obabel_path: PathBuf,

    /// Path to the `vina` executable.
    pub vina_path: PathBuf,

    pub scoring: ScoringFunction,
    pub mode: SearchMode,
    pub exhaustiveness: u32,

    /// Margin added to the receptor extent on each axis.
    pub buffer: f64,

    /// Per-invocation timeout for external tools (seconds).
    pub tool_timeout_secs: Option<u64>,

    /// Discover and skip-check only; run nothing.
    pub dry_run: bool,
}

impl Config {
    pub fn layout(&self) -> WorkLayout {
        WorkLayout::new(&self.output_dir)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    /// Converter configured from this batch.
    pub fn converter(&self) -> ObabelConverter {
        ObabelConverter::new(ExternalTool::new(&self.obabel_path).with_timeout(self.tool_timeout()))
    }

    /// Docking engine configured from this batch.
    pub fn engine(&self) -> VinaEngine {
        VinaEngine::new(ExternalTool::new(&self.vina_path).with_timeout(self.tool_timeout()))
            .with_scoring(self.scoring)
            .with_mode(self.mode)
            .with_exhaustiveness(self.exhaustiveness)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("ligands"),
            receptor: PathBuf::from("receptor.pdbqt"),
            output_dir: PathBuf::from("docking"),
            max_workers: 64,
            pattern: DEFAULT_PATTERN.to_string(),
            extension: "sdf".to_string(),
            obabel_path: PathBuf::from("obabel"),
            vina_path: PathBuf::from("vina"),
            scoring: ScoringFunction::Vina,
            mode: SearchMode::Dock,
            exhaustiveness: DEFAULT_EXHAUSTIVENESS,
            buffer: DEFAULT_BUFFER,
            tool_timeout_secs: None,
            dry_run: false,
        }
    }
}

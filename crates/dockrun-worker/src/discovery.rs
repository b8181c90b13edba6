//! Task source - turns a directory of ligand files into docking tasks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use dockrun_core::{CoreError, DockingTask, ErrorRecord, FailureStage, LigandId, WorkLayout};

use crate::config::Config;

/// Discovery errors. Any of these aborts the batch before dispatch.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid ligand pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Ligand pattern '{0}' has no capture group for the identifier")]
    NoCaptureGroup(String),

    #[error("Input directory '{0}' does not exist or is not a directory")]
    InputDir(PathBuf),

    #[error("Failed to create '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// File name pattern that yields a ligand identifier.
#[derive(Debug, Clone)]
pub struct LigandPattern {
    regex: Regex,
}

impl LigandPattern {
    /// Compile a pattern; it must have at least one capture group.
    pub fn new(pattern: &str) -> Result<Self, DiscoveryError> {
        let regex = Regex::new(pattern)?;
        if regex.captures_len() < 2 {
            return Err(DiscoveryError::NoCaptureGroup(pattern.to_string()));
        }
        Ok(Self { regex })
    }

    /// Extract the identifier from a file name.
    pub fn extract(&self, file_name: &str) -> Result<LigandId, CoreError> {
        let captured = self
            .regex
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| CoreError::NoIdentifier(file_name.to_string()))?;
        LigandId::new(captured.as_str())
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// What a scan of the input directory produced.
#[derive(Debug, Default)]
pub struct Discovery {
    /// One task per distinct identifier, in path order.
    pub tasks: Vec<DockingTask>,

    /// Candidate files without an extractable identifier.
    pub rejected: Vec<ErrorRecord>,
}

/// Scans an input tree for ligand files.
#[derive(Debug, Clone)]
pub struct TaskSource {
    input_dir: PathBuf,
    receptor: PathBuf,
    layout: WorkLayout,
    pattern: LigandPattern,
    extension: String,
}

impl TaskSource {
    /// Create a new TaskSource.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        receptor: impl Into<PathBuf>,
        layout: WorkLayout,
        pattern: LigandPattern,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            receptor: receptor.into(),
            layout,
            pattern,
            extension: extension.into(),
        }
    }

    /// Build a TaskSource from the batch configuration.
    pub fn from_config(config: &Config) -> Result<Self, DiscoveryError> {
        Ok(Self::new(
            &config.input_dir,
            &config.receptor,
            config.layout(),
            LigandPattern::new(&config.pattern)?,
            config.extension.clone(),
        ))
    }

    /// Walk the input tree and build the task list.
    ///
    /// Candidates are visited in lexicographic path order, so when several
    /// files share an identifier the first path wins on every run.
    pub fn discover(&self) -> Result<Discovery, DiscoveryError> {
        if !self.input_dir.is_dir() {
            return Err(DiscoveryError::InputDir(self.input_dir.clone()));
        }
        prepare_layout(&self.layout)?;

        let mut candidates: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.is_candidate(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        candidates.sort();

        let mut discovery = Discovery::default();
        let mut seen = HashSet::new();

        for path in candidates {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let id = match self.pattern.extract(&file_name) {
                Ok(id) => id,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Rejecting ligand file");
                    discovery.rejected.push(ErrorRecord::new(
                        file_name,
                        &path,
                        FailureStage::Identifier,
                        format!("{e} (pattern '{}')", self.pattern.as_str()),
                    ));
                    continue;
                }
            };

            if !seen.insert(id.clone()) {
                warn!(ligand_id = %id, path = %path.display(), "Duplicate identifier, keeping first file");
                continue;
            }

            debug!(ligand_id = %id, path = %path.display(), "Discovered ligand");
            discovery.tasks.push(DockingTask::new(
                id,
                path,
                &self.receptor,
                self.layout.clone(),
            ));
        }

        info!(
            input_dir = %self.input_dir.display(),
            tasks = discovery.tasks.len(),
            rejected = discovery.rejected.len(),
            "Discovery complete"
        );
        Ok(discovery)
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

/// Create the output directory and its work subdirectories.
///
/// Safe to call repeatedly and from concurrent workers.
pub fn prepare_layout(layout: &WorkLayout) -> Result<(), DiscoveryError> {
    for dir in [layout.mol2_dir(), layout.pdbqt_dir()] {
        std::fs::create_dir_all(&dir)
            .map_err(|e| DiscoveryError::CreateDir { path: dir, source: e })?;
    }
    Ok(())
}

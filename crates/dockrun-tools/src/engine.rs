//! Molecular docking via AutoDock Vina.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::pocket::SearchBox;
use crate::process::ExternalTool;

/// Default search exhaustiveness.
pub const DEFAULT_EXHAUSTIVENESS: u32 = 16;

/// Scoring function the engine evaluates poses with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoringFunction {
    #[default]
    Vina,
    Vinardo,
    Ad4,
}

impl ScoringFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vina => "vina",
            Self::Vinardo => "vinardo",
            Self::Ad4 => "ad4",
        }
    }
}

impl fmt::Display for ScoringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringFunction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vina" => Ok(Self::Vina),
            "vinardo" => Ok(Self::Vinardo),
            "ad4" => Ok(Self::Ad4),
            other => Err(ToolError::InvalidArgument(format!(
                "unknown scoring function '{other}'"
            ))),
        }
    }
}

/// What the engine does with the ligand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Global search for the best pose.
    #[default]
    Dock,
    /// Local optimisation of the input pose only.
    LocalOnly,
    /// Score the input pose without moving it.
    ScoreOnly,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dock => "dock",
            Self::LocalOnly => "local_only",
            Self::ScoreOnly => "score_only",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "dock" => Ok(Self::Dock),
            "local_only" | "minimize" => Ok(Self::LocalOnly),
            "score_only" => Ok(Self::ScoreOnly),
            other => Err(ToolError::InvalidArgument(format!(
                "unknown search mode '{other}'"
            ))),
        }
    }
}

/// One docking job.
#[derive(Debug, Clone)]
pub struct DockRequest {
    /// Validated docking-ready ligand.
    pub ligand: PathBuf,
    pub receptor: PathBuf,
    pub search_box: SearchBox,
    /// Scratch file the engine may write its raw output to.
    pub scratch: PathBuf,
}

/// Best pose reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub score: f64,
    /// Pose records, without MODEL/ENDMDL framing.
    pub pose_text: String,
}

/// Docks a single ligand into the receptor.
#[async_trait]
pub trait DockingEngine: Send + Sync {
    async fn dock(&self, request: &DockRequest) -> Result<EngineOutput, ToolError>;
}

/// Engine backed by the `vina` command line tool.
#[derive(Debug, Clone)]
pub struct VinaEngine {
    tool: ExternalTool,
    scoring: ScoringFunction,
    mode: SearchMode,
    exhaustiveness: u32,
}

impl VinaEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self {
            tool,
            scoring: ScoringFunction::default(),
            mode: SearchMode::default(),
            exhaustiveness: DEFAULT_EXHAUSTIVENESS,
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringFunction) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_exhaustiveness(mut self, exhaustiveness: u32) -> Self {
        self.exhaustiveness = exhaustiveness;
        self
    }

    fn args(&self, request: &DockRequest) -> Vec<String> {
        let SearchBox { center, size } = request.search_box;
        let mut args = vec![
            "--receptor".to_string(),
            request.receptor.display().to_string(),
            "--ligand".to_string(),
            request.ligand.display().to_string(),
            "--scoring".to_string(),
            self.scoring.to_string(),
        ];
        for (axis, (c, s)) in ["x", "y", "z"].iter().zip(center.iter().zip(size.iter())) {
            args.push(format!("--center_{axis}"));
            args.push(format!("{c:.3}"));
            args.push(format!("--size_{axis}"));
            args.push(format!("{s:.3}"));
        }

        match self.mode {
            SearchMode::Dock => {
                args.push("--exhaustiveness".to_string());
                args.push(self.exhaustiveness.to_string());
                args.push("--num_modes".to_string());
                args.push("1".to_string());
            }
            SearchMode::LocalOnly => args.push("--local_only".to_string()),
            SearchMode::ScoreOnly => args.push("--score_only".to_string()),
        }

        if self.mode != SearchMode::ScoreOnly {
            args.push("--out".to_string());
            args.push(request.scratch.display().to_string());
        }
        args
    }

    /// Run vina and read its best pose. Leaves the scratch file behind.
    async fn run_engine(&self, request: &DockRequest) -> Result<EngineOutput, ToolError> {
        let out = self
            .tool
            .run(self.args(request))
            .await?
            .into_success(&self.tool.name())?;

        match self.mode {
            SearchMode::ScoreOnly => {
                let score = parse_score_only(&out.stdout)?;
                let pose_text = tokio::fs::read_to_string(&request.ligand).await?;
                non_empty(EngineOutput { score, pose_text })
            }
            SearchMode::Dock | SearchMode::LocalOnly => {
                let raw = tokio::fs::read_to_string(&request.scratch).await?;
                parse_vina_output(&raw)
            }
        }
    }
}

impl Default for VinaEngine {
    fn default() -> Self {
        Self::new(ExternalTool::new("vina"))
    }
}

#[async_trait]
impl DockingEngine for VinaEngine {
    async fn dock(&self, request: &DockRequest) -> Result<EngineOutput, ToolError> {
        info!(
            ligand = %request.ligand.display(),
            scoring = %self.scoring,
            mode = %self.mode,
            exhaustiveness = self.exhaustiveness,
            "Running docking engine"
        );

        let result = self.run_engine(request).await;
        if self.mode != SearchMode::ScoreOnly {
            remove_scratch(&request.scratch).await;
        }
        let result = result?;

        debug!(score = result.score, pose_len = result.pose_text.len(), "Docking finished");
        Ok(result)
    }
}

async fn remove_scratch(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove engine scratch file");
        }
    }
}

fn non_empty(output: EngineOutput) -> Result<EngineOutput, ToolError> {
    if output.pose_text.trim().is_empty() {
        Err(ToolError::EmptyPose)
    } else {
        Ok(output)
    }
}

/// Best score and pose from a Vina output PDBQT.
///
/// Only the first model is read; Vina orders models best first.
pub fn parse_vina_output(text: &str) -> Result<EngineOutput, ToolError> {
    let mut pose = String::new();
    let mut score = None;
    let mut in_model = false;

    for line in text.lines() {
        if line.starts_with("MODEL") {
            if in_model {
                break;
            }
            in_model = true;
            continue;
        }
        if line.starts_with("ENDMDL") {
            break;
        }
        if score.is_none() {
            if let Some(rest) = line.strip_prefix("REMARK VINA RESULT:") {
                let value = rest.split_whitespace().next().unwrap_or_default();
                score = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| ToolError::ScoreParse(line.trim().to_string()))?,
                );
            }
        }
        pose.push_str(line);
        pose.push('\n');
    }

    let score = score.ok_or_else(|| {
        ToolError::ScoreParse("no 'REMARK VINA RESULT' record in engine output".to_string())
    })?;
    non_empty(EngineOutput {
        score,
        pose_text: pose,
    })
}

/// Score printed by `vina --score_only`.
fn parse_score_only(stdout: &str) -> Result<f64, ToolError> {
    stdout
        .lines()
        .find_map(|line| {
            let (label, rest) = line.split_once(':')?;
            let label = label.trim();
            (label.starts_with("Estimated Free Energy of Binding") || label == "Affinity")
                .then(|| rest.split_whitespace().next())
                .flatten()
                .and_then(|v| v.parse::<f64>().ok())
        })
        .ok_or_else(|| ToolError::ScoreParse("no affinity in score_only output".to_string()))
}

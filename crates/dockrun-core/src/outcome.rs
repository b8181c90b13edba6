//! Per-stage and per-task outcomes, and the batch summary they fold into.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversionStage, FailureStage, LigandId};

/// Result of one external conversion stage. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub stage: ConversionStage,
    pub success: bool,
    pub stderr: String,
}

impl ConversionResult {
    pub fn succeeded(stage: ConversionStage) -> Self {
        Self {
            stage,
            success: true,
            stderr: String::new(),
        }
    }

    pub fn failed(stage: ConversionStage, stderr: impl Into<String>) -> Self {
        Self {
            stage,
            success: false,
            stderr: stderr.into(),
        }
    }
}

/// Best pose returned by the docking engine for one ligand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DockingOutcome {
    pub id: LigandId,
    pub score: f64,
    pub pose_text: String,
    pub pose_path: PathBuf,
}

impl DockingOutcome {
    /// Pose block framed by `MODEL {id}` / `ENDMDL` markers.
    pub fn framed_pose(&self) -> String {
        let mut block = format!("MODEL {}\n", self.id);
        block.push_str(&self.pose_text);
        if !self.pose_text.ends_with('\n') {
            block.push('\n');
        }
        block.push_str("ENDMDL\n");
        block
    }

    /// The row this outcome contributes to the results table.
    pub fn to_row(&self) -> ResultRow {
        ResultRow {
            ligand_id: self.id.clone(),
            score: self.score,
            pdbqt_path: self.pose_path.display().to_string(),
        }
    }
}

/// One row of `docking_results.csv`. `ligand_id` is unique across the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub ligand_id: LigandId,
    pub score: f64,
    pub pdbqt_path: String,
}

impl ResultRow {
    /// Column names, in file order.
    pub const HEADER: [&'static str; 3] = ["ligand_id", "score", "pdbqt_path"];
}

/// One line of `error_log.txt`. Repeated failures across runs all accumulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Ligand identifier, or the raw file name when none could be extracted.
    pub subject: String,
    pub path: PathBuf,
    pub stage: FailureStage,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(
        subject: impl Into<String>,
        path: impl AsRef<Path>,
        stage: FailureStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            path: path.as_ref().to_path_buf(),
            stage,
            message: message.into(),
        }
    }

    /// Render as a single log line, without the trailing newline.
    ///
    /// Embedded line breaks (multi-line stderr) are folded into spaces so that
    /// one failure always occupies exactly one line.
    pub fn to_line(&self) -> String {
        let message = self
            .message
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "Ligand {} [{}] ({}): {}",
            self.subject,
            self.stage,
            self.path.display(),
            message
        )
    }
}

/// Why a task was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub stage: FailureStage,
    /// Path the failing stage was working on.
    pub path: PathBuf,
    pub reason: String,
}

impl TaskFailure {
    pub fn new(stage: FailureStage, path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Error-log record for this failure of ligand `id`.
    pub fn to_record(&self, id: &LigandId) -> ErrorRecord {
        ErrorRecord::new(id.as_str(), &self.path, self.stage, self.reason.clone())
    }
}

/// What happened to a task, as seen by the concurrency manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Identifier already present in the results table; nothing was done.
    Skipped,
    /// Docked and recorded.
    Succeeded(DockingOutcome),
    /// Abandoned at some stage; an error record was written.
    Failed(TaskFailure),
}

/// Counters for a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Tasks produced by the task source.
    pub discovered: usize,
    /// Candidate files rejected for lack of an identifier.
    pub rejected: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchSummary {
    /// Start a summary for `discovered` tasks and `rejected` candidate files.
    pub fn start(discovered: usize, rejected: usize) -> Self {
        Self {
            discovered,
            rejected,
            skipped: 0,
            succeeded: 0,
            failed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Count one task outcome.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Succeeded(_) => self.succeeded += 1,
            TaskOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Tasks that reached a terminal outcome.
    pub fn processed(&self) -> usize {
        self.skipped + self.succeeded + self.failed
    }

    /// Mark the batch as finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

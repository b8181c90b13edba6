//! Per-task pipeline: skip-check, convert, validate, dock, record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use dockrun_core::{
    validate_text, ConversionStage, DockingOutcome, DockingTask, FailureStage, TaskFailure,
    TaskOutcome, ValidationOutcome,
};
use dockrun_tools::{Converter, DockRequest, DockingEngine, SearchBox};

use crate::ledger::Ledger;

/// Runs one task end to end. Never returns an error: every failure is
/// written to the error log and reported as [`TaskOutcome::Failed`].
#[derive(Clone)]
pub struct TaskExecutor {
    converter: Arc<dyn Converter>,
    engine: Arc<dyn DockingEngine>,
    ledger: Arc<Ledger>,
    /// Margin around the receptor for the search box.
    buffer: f64,
}

impl TaskExecutor {
    pub fn new(
        converter: Arc<dyn Converter>,
        engine: Arc<dyn DockingEngine>,
        ledger: Arc<Ledger>,
        buffer: f64,
    ) -> Self {
        Self {
            converter,
            engine,
            ledger,
            buffer,
        }
    }

    /// Process a task.
    pub async fn execute(&self, task: &DockingTask) -> TaskOutcome {
        if self.ledger.contains(&task.id).await {
            info!(ligand_id = %task.id, "Skipping ligand already in docking results");
            return TaskOutcome::Skipped;
        }

        info!(ligand_id = %task.id, ligand = %task.ligand_path.display(), "Preparing ligand");

        let outcome = match self.process(task).await {
            Ok(docked) => match self.ledger.record_success(&docked).await {
                Ok(true) => {
                    info!(
                        ligand_id = %task.id,
                        score = docked.score,
                        pose = %docked.pose_path.display(),
                        "Ligand docked"
                    );
                    return TaskOutcome::Succeeded(docked);
                }
                Ok(false) => {
                    warn!(ligand_id = %task.id, "Result recorded by another worker, dropping duplicate");
                    return TaskOutcome::Skipped;
                }
                Err(e) => TaskFailure::new(
                    FailureStage::Recording,
                    self.ledger.results_path(),
                    format!("failed to record result: {e}"),
                ),
            },
            Err(failure) => failure,
        };

        warn!(
            ligand_id = %task.id,
            stage = %outcome.stage,
            reason = %outcome.reason,
            "Error processing ligand"
        );
        if let Err(e) = self.ledger.record_failure(&outcome.to_record(&task.id)).await {
            error!(ligand_id = %task.id, error = %e, "Failed to write error log");
        }
        TaskOutcome::Failed(outcome)
    }

    async fn process(&self, task: &DockingTask) -> Result<DockingOutcome, TaskFailure> {
        self.convert(task).await?;
        self.check_artifact(task).await?;
        self.dock(task).await
    }

    /// Run both conversion stages; the second only after the first succeeds.
    async fn convert(&self, task: &DockingTask) -> Result<(), TaskFailure> {
        for stage in ConversionStage::ALL {
            let (input, output) = stage_paths(task, stage);
            let result = self.converter.convert(stage, &input, &output).await;

            if !result.success {
                return Err(TaskFailure::new(
                    FailureStage::Conversion(stage),
                    &input,
                    format!(
                        "{} to {} conversion failed: {}",
                        stage.input_format().to_uppercase(),
                        stage.output_format().to_uppercase(),
                        result.stderr
                    ),
                ));
            }
            debug!(ligand_id = %task.id, stage = %stage, "Stage complete");
        }
        Ok(())
    }

    /// Structural check of the docking-ready file.
    async fn check_artifact(&self, task: &DockingTask) -> Result<(), TaskFailure> {
        let path = task.pdbqt_path();
        let outcome = validate(&path).await.map_err(|e| {
            TaskFailure::new(
                FailureStage::Validation,
                &path,
                format!("failed to read PDBQT file: {e}"),
            )
        })?;

        match outcome {
            ValidationOutcome::Valid => Ok(()),
            ValidationOutcome::Invalid(reason) => Err(TaskFailure::new(
                FailureStage::Validation,
                &path,
                format!("Invalid PDBQT file: {reason}"),
            )),
        }
    }

    async fn dock(&self, task: &DockingTask) -> Result<DockingOutcome, TaskFailure> {
        let ligand = task.pdbqt_path();
        let fail = |e: dockrun_tools::ToolError| {
            TaskFailure::new(FailureStage::Docking, &ligand, e.to_string())
        };

        let search_box = SearchBox::from_receptor(&task.receptor_path, self.buffer)
            .await
            .map_err(fail)?;

        let request = DockRequest {
            ligand: ligand.clone(),
            receptor: task.receptor_path.clone(),
            search_box,
            scratch: task.layout.pdbqt_dir().join(format!("{}.vina.pdbqt", task.id)),
        };
        let output = self.engine.dock(&request).await.map_err(fail)?;

        Ok(DockingOutcome {
            id: task.id.clone(),
            score: output.score,
            pose_text: output.pose_text,
            pose_path: task.pose_path(),
        })
    }
}

/// Read a docking-ready artifact and check its root structure.
pub async fn validate(path: &Path) -> std::io::Result<ValidationOutcome> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(validate_text(&content))
}

/// Input and output files of a conversion stage.
fn stage_paths(task: &DockingTask, stage: ConversionStage) -> (PathBuf, PathBuf) {
    match stage {
        ConversionStage::SdfToMol2 => (task.ligand_path.clone(), task.mol2_path()),
        ConversionStage::Mol2ToPdbqt => (task.mol2_path(), task.pdbqt_path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockrun_core::{LigandId, WorkLayout};

    use crate::discovery::prepare_layout;
    use crate::testing::{FakeConverter, FakeEngine, Workspace};

    async fn setup(
        ws: &Workspace,
        converter: Arc<FakeConverter>,
        engine: Arc<FakeEngine>,
    ) -> (TaskExecutor, Arc<Ledger>, WorkLayout) {
        let layout = ws.layout();
        prepare_layout(&layout).unwrap();
        let ledger = Arc::new(Ledger::open(&layout).await.unwrap());
        let executor = TaskExecutor::new(converter, engine, ledger.clone(), 12.0);
        (executor, ledger, layout)
    }

    fn task(ws: &Workspace, id: &str) -> DockingTask {
        ws.add_ligands(&[format!("No_{id}.sdf").as_str()]);
        DockingTask::new(
            LigandId::new(id).unwrap(),
            ws.input_dir.join(format!("No_{id}.sdf")),
            &ws.receptor,
            ws.layout(),
        )
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let ws = Workspace::new();
        let (executor, ledger, layout) =
            setup(&ws, Arc::new(FakeConverter::new()), Arc::new(FakeEngine::new())).await;
        let task = task(&ws, "12");

        let outcome = executor.execute(&task).await;

        let TaskOutcome::Succeeded(docked) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(docked.pose_path, layout.pose_path(&task.id));
        assert!((docked.score + 6.2).abs() < 1e-9);
        assert!(ledger.contains(&task.id).await);
        assert!(layout.mol2_path(&task.id).exists());
    }

    #[tokio::test]
    async fn test_recorded_task_is_skipped_without_invocations() {
        let ws = Workspace::new();
        let converter = Arc::new(FakeConverter::new());
        let engine = Arc::new(FakeEngine::new());
        let (executor, _ledger, _layout) = setup(&ws, converter.clone(), engine.clone()).await;
        let task = task(&ws, "3");

        executor.execute(&task).await;
        let outcome = executor.execute(&task).await;

        assert_eq!(outcome, TaskOutcome::Skipped);
        assert_eq!(converter.calls_for("3"), 2);
        assert_eq!(engine.calls_for("3"), 1);
    }

    #[tokio::test]
    async fn test_first_stage_failure_stops_pipeline() {
        let ws = Workspace::new();
        let converter = Arc::new(FakeConverter::new().fail_at("4", ConversionStage::SdfToMol2));
        let engine = Arc::new(FakeEngine::new());
        let (executor, ledger, _layout) = setup(&ws, converter.clone(), engine.clone()).await;
        let task = task(&ws, "4");

        let TaskOutcome::Failed(failure) = executor.execute(&task).await else {
            panic!("expected failure");
        };

        assert_eq!(failure.stage, FailureStage::Conversion(ConversionStage::SdfToMol2));
        assert_eq!(failure.path, task.ligand_path);
        assert!(failure.reason.starts_with("SDF to MOL2 conversion failed"));
        assert_eq!(converter.calls_for("4"), 1);
        assert_eq!(engine.calls_for("4"), 0);
        assert!(!ledger.contains(&task.id).await);
    }

    #[tokio::test]
    async fn test_validate_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("7.pdbqt");
        std::fs::write(&path, "ROOT\nENDROOT\n").unwrap();
        assert!(validate(&path).await.unwrap().is_valid());

        std::fs::write(&path, "ROOT\n").unwrap();
        assert!(!validate(&path).await.unwrap().is_valid());

        assert!(validate(&dir.path().join("missing.pdbqt")).await.is_err());
    }

    #[tokio::test]
    async fn test_docking_failure_reports_engine_error() {
        let ws = Workspace::new();
        let engine = Arc::new(FakeEngine::new().fail_for("6"));
        let (executor, _ledger, layout) =
            setup(&ws, Arc::new(FakeConverter::new()), engine).await;
        let task = task(&ws, "6");

        let TaskOutcome::Failed(failure) = executor.execute(&task).await else {
            panic!("expected failure");
        };

        assert_eq!(failure.stage, FailureStage::Docking);
        assert!(failure.reason.contains("ligand outside search space"));
        assert!(!layout.pose_path(&task.id).exists());
    }
}

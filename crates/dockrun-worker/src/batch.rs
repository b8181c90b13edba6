//! One full batch: discover, skip-check, dispatch, summarise.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use dockrun_core::{BatchSummary, DockingTask, TaskOutcome};
use dockrun_tools::{Converter, DockingEngine};

use crate::config::Config;
use crate::discovery::{DiscoveryError, TaskSource};
use crate::executor::TaskExecutor;
use crate::json_output;
use crate::ledger::{Ledger, LedgerError};
use crate::scheduler::Scheduler;

/// Errors that stop a batch before any task is dispatched.
///
/// Failures of individual tasks never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Discovery task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run a batch with the external tools named in `config`.
pub async fn run_batch(config: &Config) -> Result<BatchSummary, PipelineError> {
    Batch::new(
        config.clone(),
        Arc::new(config.converter()),
        Arc::new(config.engine()),
    )
    .run()
    .await
}

/// A configured batch.
pub struct Batch {
    config: Config,
    converter: Arc<dyn Converter>,
    engine: Arc<dyn DockingEngine>,
}

impl Batch {
    /// Create a new Batch.
    pub fn new(
        config: Config,
        converter: Arc<dyn Converter>,
        engine: Arc<dyn DockingEngine>,
    ) -> Self {
        Self {
            config,
            converter,
            engine,
        }
    }

    /// Run the batch to completion.
    pub async fn run(&self) -> Result<BatchSummary, PipelineError> {
        let source = TaskSource::from_config(&self.config)?;
        let discovery = tokio::task::spawn_blocking(move || source.discover()).await??;
        let ledger = Arc::new(Ledger::open(&self.config.layout()).await?);

        let mut summary = BatchSummary::start(discovery.tasks.len(), discovery.rejected.len());
        json_output::emit_batch_started(
            discovery.tasks.len(),
            discovery.rejected.len(),
            self.config.max_workers,
        );

        for record in &discovery.rejected {
            json_output::emit_ligand_rejected(record);
            if self.config.dry_run {
                continue;
            }
            if let Err(e) = ledger.record_failure(record).await {
                error!(path = %record.path.display(), error = %e, "Failed to write error log");
            }
        }

        if self.config.dry_run {
            dry_run(&ledger, &discovery.tasks, &mut summary).await;
        } else {
            let executor = TaskExecutor::new(
                self.converter.clone(),
                self.engine.clone(),
                ledger.clone(),
                self.config.buffer,
            );
            Scheduler::new(executor, self.config.max_workers)
                .run(discovery.tasks, &mut summary)
                .await;
        }

        summary.finish();
        info!(
            discovered = summary.discovered,
            rejected = summary.rejected,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            failed = summary.failed,
            workers = self.config.max_workers,
            "All docking tasks completed"
        );
        json_output::emit_batch_completed(&summary);
        Ok(summary)
    }
}

/// Report which tasks a real run would process, touching no files.
async fn dry_run(ledger: &Ledger, tasks: &[DockingTask], summary: &mut BatchSummary) {
    for task in tasks {
        if ledger.contains(&task.id).await {
            summary.record(&TaskOutcome::Skipped);
            json_output::emit_task_outcome(&task.id, &TaskOutcome::Skipped);
        } else {
            info!(ligand_id = %task.id, ligand = %task.ligand_path.display(), "Would dock (dry run)");
            json_output::emit_ligand_pending(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use dockrun_core::{ConversionStage, ResultRow};

    use crate::testing::{FakeConverter, FakeEngine, Workspace};

    fn batch(ws: &Workspace, converter: Arc<FakeConverter>, engine: Arc<FakeEngine>) -> Batch {
        Batch::new(ws.config(), converter, engine)
    }

    fn result_ids(ws: &Workspace) -> Vec<String> {
        let mut reader = csv::Reader::from_path(ws.layout().results_path()).unwrap();
        reader
            .deserialize::<ResultRow>()
            .map(|r| r.unwrap().ligand_id.into_inner())
            .collect()
    }

    fn error_lines(ws: &Workspace) -> Vec<String> {
        fs::read_to_string(ws.layout().error_log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// No_1 succeeds, No_2 fails docking, No_3 fails its first conversion.
    fn mixed_batch(ws: &Workspace) -> (Arc<FakeConverter>, Arc<FakeEngine>) {
        ws.add_ligands(&["No_1.sdf", "No_2.sdf", "No_3.sdf"]);
        let converter = Arc::new(FakeConverter::new().fail_at("3", ConversionStage::SdfToMol2));
        let engine = Arc::new(FakeEngine::new().fail_for("2"));
        (converter, engine)
    }

    #[tokio::test]
    async fn test_mixed_batch_records_success_and_failures() {
        let ws = Workspace::new();
        let (converter, engine) = mixed_batch(&ws);

        let summary = batch(&ws, converter, engine).run().await.unwrap();

        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(result_ids(&ws), ["1"]);

        let errors = error_lines(&ws);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|l| l.starts_with("Ligand 2 [docking]")));
        assert!(errors.iter().any(|l| l.starts_with("Ligand 3 [sdf-to-mol2]")));

        let pose = fs::read_to_string(ws.layout().pose_path(&"1".parse().unwrap())).unwrap();
        assert!(pose.starts_with("MODEL 1\n"));
        assert!(pose.ends_with("ENDMDL\n"));
    }

    #[tokio::test]
    async fn test_rerun_skips_recorded_and_retries_failures() {
        let ws = Workspace::new();
        let (converter, engine) = mixed_batch(&ws);
        batch(&ws, converter.clone(), engine.clone()).run().await.unwrap();

        let before = converter.calls_for("1");
        let summary = batch(&ws, converter.clone(), engine.clone())
            .run()
            .await
            .unwrap();

        // Id 1 is skipped without any external invocation
        assert_eq!(summary.skipped, 1);
        assert_eq!(converter.calls_for("1"), before);
        assert_eq!(engine.calls_for("1"), 1);

        // Ids 2 and 3 are retried and fail again
        assert_eq!(summary.failed, 2);
        assert_eq!(engine.calls_for("2"), 2);
        assert_eq!(converter.calls_for("3"), 2);

        assert_eq!(result_ids(&ws), ["1"]);
        assert_eq!(error_lines(&ws).len(), 4);
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_engine() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_7.sdf", "No_8.sdf"]);
        let converter = Arc::new(FakeConverter::new().malformed("7"));
        let engine = Arc::new(FakeEngine::new());

        let summary = batch(&ws, converter, engine.clone()).run().await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(engine.calls_for("7"), 0);
        assert_eq!(result_ids(&ws), ["8"]);

        let errors = error_lines(&ws);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Ligand 7 [validation]"));
        assert!(errors[0].contains("found 2 ROOT tags"));
    }

    #[tokio::test]
    async fn test_second_stage_failure_is_logged_once() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_5.sdf"]);
        let converter = Arc::new(FakeConverter::new().fail_at("5", ConversionStage::Mol2ToPdbqt));
        let engine = Arc::new(FakeEngine::new());

        let summary = batch(&ws, converter.clone(), engine.clone()).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(converter.calls_for("5"), 2);
        assert_eq!(engine.calls_for("5"), 0);
        assert!(!ws.layout().results_path().exists());

        let errors = error_lines(&ws);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("[mol2-to-pdbqt]"));
        assert!(errors[0].contains("MOL2 to PDBQT conversion failed"));
    }

    #[tokio::test]
    async fn test_missing_receptor_fails_each_task() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_1.sdf", "No_2.sdf"]);
        fs::remove_file(&ws.receptor).unwrap();

        let summary = batch(&ws, Arc::new(FakeConverter::new()), Arc::new(FakeEngine::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        let errors = error_lines(&ws);
        assert!(errors.iter().all(|l| l.contains("[docking]") && l.contains("receptor")));
    }

    #[tokio::test]
    async fn test_unmatched_files_are_rejected_and_logged() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_1.sdf", "ligand_x.sdf"]);

        let summary = batch(&ws, Arc::new(FakeConverter::new()), Arc::new(FakeEngine::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.rejected, 1);
        let errors = error_lines(&ws);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Ligand ligand_x.sdf [identifier]"));
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_1.sdf", "No_2.sdf", "odd.sdf"]);
        let converter = Arc::new(FakeConverter::new());
        let engine = Arc::new(FakeEngine::new());

        let config = Config {
            dry_run: true,
            ..ws.config()
        };
        let summary = Batch::new(config, converter.clone(), engine.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.processed(), 0);
        assert_eq!(converter.total_calls(), 0);
        assert!(!ws.layout().error_log_path().exists());
        assert!(!ws.layout().results_path().exists());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dry_run_reports_pending_at_info() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_1.sdf"]);
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let config = Config {
            dry_run: true,
            ..ws.config()
        };
        Batch::new(config, Arc::new(FakeConverter::new()), Arc::new(FakeEngine::new()))
            .run()
            .await
            .unwrap();

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = text
            .lines()
            .find(|l| l.contains("Would dock"))
            .expect("pending ligand is logged");
        assert!(line.contains(" INFO "));
        assert!(line.contains("ligand_id=1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_many_workers_many_ligands() {
        let ws = Workspace::new();
        let names: Vec<String> = (1..=200).map(|i| format!("No_{i}.sdf")).collect();
        ws.add_ligands(&names.iter().map(String::as_str).collect::<Vec<_>>());
        let engine = Arc::new(FakeEngine::new().fail_for("13").fail_for("101"));

        let config = Config {
            max_workers: 16,
            ..ws.config()
        };
        let summary = Batch::new(config, Arc::new(FakeConverter::new()), engine)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 198);
        assert_eq!(summary.failed, 2);

        let text = fs::read_to_string(ws.layout().results_path()).unwrap();
        assert_eq!(text.matches("ligand_id,score,pdbqt_path").count(), 1);
        let mut ids = result_ids(&ws);
        assert_eq!(ids.len(), 198);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 198);
        assert_eq!(error_lines(&ws).len(), 2);
    }

    #[tokio::test]
    async fn test_bad_pattern_aborts_before_dispatch() {
        let ws = Workspace::new();
        ws.add_ligands(&["No_1.sdf"]);
        let config = Config {
            pattern: "No_(".to_string(),
            ..ws.config()
        };
        let converter = Arc::new(FakeConverter::new());

        let err = Batch::new(config, converter.clone(), Arc::new(FakeEngine::new()))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Discovery(_)));
        assert_eq!(converter.total_calls(), 0);
    }
}

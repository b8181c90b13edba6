//! Concurrency manager - fans tasks out over a fixed pool of workers.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use dockrun_core::{BatchSummary, DockingTask, LigandId, TaskOutcome};

use crate::executor::TaskExecutor;
use crate::json_output;

/// Fixed-size worker pool.
///
/// Tasks are queued on a bounded channel and pulled by `max_workers`
/// workers; each task runs end to end on one worker. Completion order is
/// unspecified.
pub struct Scheduler {
    executor: TaskExecutor,
    max_workers: usize,
}

impl Scheduler {
    /// Create a new Scheduler.
    pub fn new(executor: TaskExecutor, max_workers: usize) -> Self {
        Self {
            executor,
            max_workers: max_workers.max(1),
        }
    }

    /// Run every task and fold the outcomes into `summary`.
    pub async fn run(&self, tasks: Vec<DockingTask>, summary: &mut BatchSummary) {
        if tasks.is_empty() {
            return;
        }
        let workers = self.max_workers.min(tasks.len());
        info!(tasks = tasks.len(), workers, "Dispatching tasks");

        let (task_tx, task_rx) = mpsc::channel::<DockingTask>(workers * 2);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<(LigandId, TaskOutcome)>(workers * 2);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let executor = self.executor.clone();
            let task_rx = task_rx.clone();
            let outcome_tx = outcome_tx.clone();
            pool.spawn(async move {
                run_worker(worker, executor, task_rx, outcome_tx).await;
            });
        }
        drop(outcome_tx);

        // Producer
        pool.spawn(async move {
            for task in tasks {
                if task_tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        while let Some((id, outcome)) = outcome_rx.recv().await {
            json_output::emit_task_outcome(&id, &outcome);
            summary.record(&outcome);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker terminated abnormally");
            }
        }
    }
}

/// Pull tasks until the queue is closed and drained.
async fn run_worker(
    worker: usize,
    executor: TaskExecutor,
    task_rx: Arc<Mutex<mpsc::Receiver<DockingTask>>>,
    outcome_tx: mpsc::Sender<(LigandId, TaskOutcome)>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next task
        let next = task_rx.lock().await.recv().await;
        let Some(task) = next else { break };

        debug!(worker, ligand_id = %task.id, "Worker picked up task");
        let outcome = executor.execute(&task).await;
        if outcome_tx.send((task.id, outcome)).await.is_err() {
            break;
        }
    }
    debug!(worker, "Worker finished");
}

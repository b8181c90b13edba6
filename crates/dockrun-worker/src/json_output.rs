//! JSON output for streaming batch events to stdout.

use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use dockrun_core::{BatchSummary, DockingTask, ErrorRecord, LigandId, TaskOutcome};

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    BatchStarted,
    LigandRejected,
    LigandPending,
    LigandSkipped,
    LigandDocked,
    LigandFailed,
    BatchCompleted,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if !is_json_mode() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

/// Emit a batch_started event.
pub fn emit_batch_started(tasks: usize, rejected: usize, workers: usize) {
    JsonEvent::new(
        JsonEventType::BatchStarted,
        serde_json::json!({
            "tasks": tasks,
            "rejected": rejected,
            "workers": workers,
        }),
    )
    .emit();
}

/// Emit a ligand_rejected event.
pub fn emit_ligand_rejected(record: &ErrorRecord) {
    JsonEvent::new(
        JsonEventType::LigandRejected,
        serde_json::json!({
            "file": record.subject,
            "path": record.path.display().to_string(),
            "message": record.message,
        }),
    )
    .emit();
}

/// Emit a ligand_pending event (dry run).
pub fn emit_ligand_pending(task: &DockingTask) {
    JsonEvent::new(
        JsonEventType::LigandPending,
        serde_json::json!({
            "ligand_id": task.id,
            "ligand_path": task.ligand_path.display().to_string(),
        }),
    )
    .emit();
}

/// Emit the event matching a task outcome.
pub fn emit_task_outcome(id: &LigandId, outcome: &TaskOutcome) {
    let event = match outcome {
        TaskOutcome::Skipped => JsonEvent::new(
            JsonEventType::LigandSkipped,
            serde_json::json!({ "ligand_id": id }),
        ),
        TaskOutcome::Succeeded(docked) => JsonEvent::new(
            JsonEventType::LigandDocked,
            serde_json::json!({
                "ligand_id": id,
                "score": docked.score,
                "pose_path": docked.pose_path.display().to_string(),
            }),
        ),
        TaskOutcome::Failed(failure) => JsonEvent::new(
            JsonEventType::LigandFailed,
            serde_json::json!({
                "ligand_id": id,
                "stage": failure.stage.as_str(),
                "reason": failure.reason,
            }),
        ),
    };
    event.emit();
}

/// Emit a batch_completed event.
pub fn emit_batch_completed(summary: &BatchSummary) {
    JsonEvent::new(
        JsonEventType::BatchCompleted,
        serde_json::to_value(summary).unwrap_or_default(),
    )
    .emit();
}

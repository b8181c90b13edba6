//! dockrun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - External processes
//! - Async runtimes
//! - The filesystem (beyond path arithmetic)
//!
//! All types here describe a docking batch: the tasks it is made of,
//! the stages a task passes through and the outcome of each task.

pub mod error;
pub mod ids;
pub mod outcome;
pub mod stage;
pub mod task;
pub mod validate;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::LigandId;
pub use outcome::{
    BatchSummary, ConversionResult, DockingOutcome, ErrorRecord, ResultRow, TaskFailure,
    TaskOutcome,
};
pub use stage::{ConversionStage, FailureStage};
pub use task::{DockingTask, WorkLayout};
pub use validate::{validate_text, InvalidReason, ValidationOutcome};

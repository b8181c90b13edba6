//! dockrun batch runner
//!
//! Discovers ligand files, converts each one to a docking-ready structure,
//! validates it, docks it against a shared receptor and appends the result
//! to a results table that doubles as the resume checkpoint. Tasks fan out
//! over a fixed pool of workers; a failing ligand is logged and never stops
//! the batch.

pub mod batch;
pub mod config;
pub mod discovery;
pub mod executor;
pub mod json_output;
pub mod ledger;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{run_batch, Batch, PipelineError};
pub use config::{Config, DEFAULT_PATTERN};
pub use discovery::{prepare_layout, Discovery, DiscoveryError, LigandPattern, TaskSource};
pub use executor::{validate, TaskExecutor};
pub use ledger::{Ledger, LedgerError};
pub use scheduler::Scheduler;

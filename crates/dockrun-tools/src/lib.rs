//! External tool runners for dockrun
//!
//! This crate is the process boundary of a docking batch. It wraps the
//! format converter (`obabel`) and the docking engine (`vina`) behind the
//! [`Converter`] and [`DockingEngine`] traits, and computes the search box
//! the engine is pointed at.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use dockrun_tools::{DockRequest, DockingEngine, SearchBox, VinaEngine};
//!
//! async fn dock_one() -> Result<(), Box<dyn std::error::Error>> {
//!     let receptor = Path::new("receptor.pdbqt");
//!     let search_box = SearchBox::from_receptor(receptor, 12.0).await?;
//!
//!     let output = VinaEngine::default()
//!         .dock(&DockRequest {
//!             ligand: PathBuf::from("ligand.pdbqt"),
//!             receptor: receptor.to_path_buf(),
//!             search_box,
//!             scratch: PathBuf::from("ligand.vina.pdbqt"),
//!         })
//!         .await?;
//!
//!     println!("score: {}", output.score);
//!     Ok(())
//! }
//! ```

mod converter;
mod engine;
mod error;
mod pocket;
mod process;

// Re-export main types
pub use converter::{Converter, ObabelConverter};
pub use engine::{
    parse_vina_output, DockRequest, DockingEngine, EngineOutput, ScoringFunction, SearchMode,
    VinaEngine, DEFAULT_EXHAUSTIVENESS,
};
pub use error::ToolError;
pub use pocket::{SearchBox, DEFAULT_BUFFER};
pub use process::{ExternalTool, ProcessOutput};

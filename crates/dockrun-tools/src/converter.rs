//! Structure format conversion via Open Babel.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use dockrun_core::{ConversionResult, ConversionStage};
use tracing::{debug, info, warn};

use crate::process::ExternalTool;

/// Runs one conversion stage for a ligand.
///
/// Implementations never fail with an error: every problem, including a
/// missing executable, is reported as an unsuccessful [`ConversionResult`].
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, stage: ConversionStage, input: &Path, output: &Path)
        -> ConversionResult;
}

/// Converter backed by the `obabel` command line tool.
#[derive(Debug, Clone)]
pub struct ObabelConverter {
    tool: ExternalTool,
}

impl ObabelConverter {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }

    /// Command line for a stage.
    ///
    /// Stage 1 lets obabel infer formats from the extensions; stage 2 names
    /// them explicitly and adds hydrogens (`-xh`) as the docking engine needs.
    fn args(stage: ConversionStage, input: &Path, output: &Path) -> Vec<OsString> {
        match stage {
            ConversionStage::SdfToMol2 => vec![
                input.into(),
                "-O".into(),
                output.into(),
            ],
            ConversionStage::Mol2ToPdbqt => vec![
                format!("-i{}", stage.input_format()).into(),
                input.into(),
                format!("-o{}", stage.output_format()).into(),
                "-O".into(),
                output.into(),
                "-xh".into(),
            ],
        }
    }
}

impl Default for ObabelConverter {
    fn default() -> Self {
        Self::new(ExternalTool::new("obabel"))
    }
}

#[async_trait]
impl Converter for ObabelConverter {
    async fn convert(
        &self,
        stage: ConversionStage,
        input: &Path,
        output: &Path,
    ) -> ConversionResult {
        info!(
            stage = %stage,
            input = %input.display(),
            output = %output.display(),
            "Converting structure"
        );

        // A leftover file from an earlier run must not pass the output check
        if let Err(e) = tokio::fs::remove_file(output).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(output = %output.display(), error = %e, "Failed to remove stale output");
                return ConversionResult::failed(
                    stage,
                    format!("failed to remove stale output '{}': {e}", output.display()),
                );
            }
        }

        let result = match self.tool.run(Self::args(stage, input, output)).await {
            Ok(out) if out.success => ConversionResult::succeeded(stage),
            Ok(out) => ConversionResult::failed(stage, out.stderr.trim()),
            Err(e) => ConversionResult::failed(stage, e.to_string()),
        };

        // obabel reports "0 molecules converted" with a zero exit status
        if result.success && tokio::fs::metadata(output).await.is_err() {
            warn!(stage = %stage, output = %output.display(), "Converter produced no output");
            return ConversionResult::failed(
                stage,
                format!("{} produced no output file", self.tool.name()),
            );
        }

        debug!(stage = %stage, success = result.success, "Conversion finished");
        result
    }
}

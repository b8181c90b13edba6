//! dockrun - resumable batch docking

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dockrun_tools::{ScoringFunction, SearchMode, DEFAULT_BUFFER, DEFAULT_EXHAUSTIVENESS};
use dockrun_worker::{json_output, run_batch, Config, DEFAULT_PATTERN};

/// Convert and dock every ligand in a directory against one receptor.
#[derive(Parser, Debug)]
#[command(name = "dockrun", version, about = "Resumable, concurrent ligand docking")]
struct Args {
    /// Directory scanned (recursively) for ligand files
    #[arg(short, long, env = "DOCKRUN_INPUT_DIR")]
    input_dir: PathBuf,

    /// Receptor structure in PDBQT format
    #[arg(short, long, env = "DOCKRUN_RECEPTOR")]
    receptor: PathBuf,

    /// Output directory for work files, results and the error log
    #[arg(short, long, env = "DOCKRUN_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long, env = "DOCKRUN_WORKERS", default_value = "64")]
    workers: usize,

    /// File name regex; the first capture group is the ligand id
    #[arg(long, env = "DOCKRUN_PATTERN", default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Extension of candidate ligand files
    #[arg(long, env = "DOCKRUN_EXTENSION", default_value = "sdf")]
    extension: String,

    /// Path to the obabel executable
    #[arg(long, env = "DOCKRUN_OBABEL", default_value = "obabel")]
    obabel: PathBuf,

    /// Path to the vina executable
    #[arg(long, env = "DOCKRUN_VINA", default_value = "vina")]
    vina: PathBuf,

    /// Scoring function (vina, vinardo, ad4)
    #[arg(long, env = "DOCKRUN_SCORING", default_value = "vina")]
    scoring: ScoringFunction,

    /// Search mode (dock, local_only, score_only)
    #[arg(long, env = "DOCKRUN_MODE", default_value = "dock")]
    mode: SearchMode,

    /// Search exhaustiveness
    #[arg(long, env = "DOCKRUN_EXHAUSTIVENESS", default_value_t = DEFAULT_EXHAUSTIVENESS)]
    exhaustiveness: u32,

    /// Margin in angstrom added to the receptor extent on each axis
    #[arg(long, env = "DOCKRUN_BUFFER", default_value_t = DEFAULT_BUFFER)]
    buffer: f64,

    /// Kill an external tool after this many seconds
    #[arg(long, env = "DOCKRUN_TOOL_TIMEOUT_SECS")]
    tool_timeout_secs: Option<u64>,

    /// List what would be docked without running anything
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON lines events on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            input_dir: self.input_dir,
            receptor: self.receptor,
            output_dir: self.output_dir,
            max_workers: self.workers,
            pattern: self.pattern,
            extension: self.extension,
            obabel_path: self.obabel,
            vina_path: self.vina,
            scoring: self.scoring,
            mode: self.mode,
            exhaustiveness: self.exhaustiveness,
            buffer: self.buffer,
            tool_timeout_secs: self.tool_timeout_secs,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for JSON events
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dockrun=info".parse()?))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    if args.json {
        json_output::enable_json_mode();
    }

    let config = args.into_config();
    info!(
        input_dir = %config.input_dir.display(),
        receptor = %config.receptor.display(),
        output_dir = %config.output_dir.display(),
        workers = config.max_workers,
        scoring = %config.scoring,
        mode = %config.mode,
        dry_run = config.dry_run,
        "Starting dockrun batch"
    );

    let summary = run_batch(&config).await.map_err(|e| {
        error!(error = %e, "Batch aborted");
        e
    })?;

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        rejected = summary.rejected,
        elapsed_ms = summary.elapsed().map(|d| d.num_milliseconds()).unwrap_or_default(),
        results = %config.layout().results_path().display(),
        "Batch finished"
    );
    Ok(())
}

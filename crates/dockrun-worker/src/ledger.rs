//! Shared results table and error log.
//!
//! The ledger is the only state shared between workers. A single mutex
//! guards the set of recorded identifiers together with every write to
//! `docking_results.csv`, `error_log.txt` and the per-ligand pose files, so
//! appends never interleave and the membership check always sees every row
//! appended before it.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use dockrun_core::{DockingOutcome, ErrorRecord, LigandId, ResultRow, WorkLayout};

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed results table '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

impl LedgerError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Append-only results table plus error log, behind one lock.
pub struct Ledger {
    results_path: PathBuf,
    error_log_path: PathBuf,

    /// Identifiers present in the results table. Guarded together with all
    /// file appends.
    recorded: Mutex<HashSet<LigandId>>,
}

impl Ledger {
    /// Open the ledger for a layout, loading identifiers already recorded.
    ///
    /// A missing results table is an empty ledger.
    pub async fn open(layout: &WorkLayout) -> Result<Self, LedgerError> {
        let results_path = layout.results_path();
        let recorded = load_recorded_ids(&results_path).await?;

        info!(
            results = %results_path.display(),
            recorded = recorded.len(),
            "Opened results ledger"
        );

        Ok(Self {
            results_path,
            error_log_path: layout.error_log_path(),
            recorded: Mutex::new(recorded),
        })
    }

    /// Whether `id` already has a row in the results table.
    pub async fn contains(&self, id: &LigandId) -> bool {
        self.recorded.lock().await.contains(id)
    }

    /// Number of identifiers in the results table.
    pub async fn len(&self) -> usize {
        self.recorded.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Append the pose block and the results row for a docked ligand.
    ///
    /// Returns `false` without writing anything if the identifier was
    /// recorded in the meantime.
    pub async fn record_success(&self, outcome: &DockingOutcome) -> Result<bool, LedgerError> {
        let mut recorded = self.recorded.lock().await;
        if recorded.contains(&outcome.id) {
            debug!(ligand_id = %outcome.id, "Result already recorded");
            return Ok(false);
        }

        let bytes = self.row_bytes(&outcome.to_row()).await?;

        // The pose block and the row land together or not at all
        let pose_len = file_len(&outcome.pose_path).await?;
        let written = match append(&outcome.pose_path, outcome.framed_pose().as_bytes()).await {
            Ok(()) => append(&self.results_path, &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            rollback(&outcome.pose_path, pose_len).await;
            return Err(e);
        }

        recorded.insert(outcome.id.clone());
        Ok(true)
    }

    /// CSV bytes for the next row: the header when the table is empty, and a
    /// line break first when an interrupted run left a partial last line.
    async fn row_bytes(&self, row: &ResultRow) -> Result<Vec<u8>, LedgerError> {
        let path = &self.results_path;
        let size = file_len(path).await?.unwrap_or(0);
        let mut bytes = Vec::new();
        if size > 0 && last_byte(path, size).await? != b'\n' {
            warn!(path = %path.display(), "Results table ends mid-line, starting a new line");
            bytes.push(b'\n');
        }
        let encoded = encode_row(row, size == 0).map_err(|source| LedgerError::Csv {
            path: path.clone(),
            source,
        })?;
        bytes.extend_from_slice(&encoded);
        Ok(bytes)
    }

    /// Append one line to the error log.
    pub async fn record_failure(&self, record: &ErrorRecord) -> Result<(), LedgerError> {
        let _guard = self.recorded.lock().await;
        let mut line = record.to_line();
        line.push('\n');
        append(&self.error_log_path, line.as_bytes()).await
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn error_log_path(&self) -> &Path {
        &self.error_log_path
    }
}

/// Write `bytes` at the end of `path` in a single call, creating the file.
async fn append(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(LedgerError::io(path))?;
    file.write_all(bytes).await.map_err(LedgerError::io(path))?;
    file.flush().await.map_err(LedgerError::io(path))
}

/// Length of `path`, or `None` when it does not exist.
async fn file_len(path: &Path) -> Result<Option<u64>, LedgerError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LedgerError::io(path)(e)),
    }
}

async fn last_byte(path: &Path, size: u64) -> Result<u8, LedgerError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(LedgerError::io(path))?;
    file.seek(SeekFrom::Start(size - 1))
        .await
        .map_err(LedgerError::io(path))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)
        .await
        .map_err(LedgerError::io(path))?;
    Ok(byte[0])
}

/// Undo a pose append, restoring the file to `len` (removing it if it did
/// not exist before).
async fn rollback(path: &Path, len: Option<u64>) {
    let result = match len {
        Some(len) => match OpenOptions::new().write(true).open(path).await {
            Ok(file) => file.set_len(len).await,
            Err(e) => Err(e),
        },
        None => tokio::fs::remove_file(path).await,
    };
    if let Err(e) = result {
        error!(path = %path.display(), error = %e, "Failed to roll back pose file");
    }
}

/// CSV bytes for one row, preceded by the header when `with_header`.
fn encode_row(row: &ResultRow, with_header: bool) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if with_header {
        writer.write_record(ResultRow::HEADER)?;
    }
    writer.serialize(row)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

async fn load_recorded_ids(path: &Path) -> Result<HashSet<LigandId>, LedgerError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(LedgerError::io(path)(e)),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut ids = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(|source| LedgerError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(field) = record.get(0) else { continue };
        match LigandId::new(field.trim()) {
            Ok(id) => {
                ids.insert(id);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable results row"),
        }
    }
    Ok(ids)
}

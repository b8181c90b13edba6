//! Docking search region derived from receptor coordinates.

use std::path::Path;

use tracing::{debug, trace};

use crate::error::ToolError;

/// Default margin added to the receptor extent on each axis.
pub const DEFAULT_BUFFER: f64 = 12.0;

/// Axis-aligned box passed to the docking engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBox {
    pub center: [f64; 3],
    pub size: [f64; 3],
}

impl SearchBox {
    /// Bounding box of the given points, widened by `buffer` on each axis.
    ///
    /// Returns `None` for an empty point set.
    pub fn enclosing<I>(points: I, buffer: f64) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (mut min, mut max) = (first, first);

        for p in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }

        let mut center = [0.0; 3];
        let mut size = [0.0; 3];
        for axis in 0..3 {
            center[axis] = (max[axis] + min[axis]) / 2.0;
            size[axis] = (max[axis] - min[axis]) + buffer;
        }
        Some(Self { center, size })
    }

    /// Box around every atom of a PDB/PDBQT text.
    pub fn from_structure_text(text: &str, buffer: f64) -> Option<Self> {
        Self::enclosing(atom_coordinates(text), buffer)
    }

    /// Read a receptor file and box all of its atoms.
    pub async fn from_receptor(path: &Path, buffer: f64) -> Result<Self, ToolError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::ReceptorRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let search_box = Self::from_structure_text(&text, buffer)
            .ok_or_else(|| ToolError::EmptyReceptor(path.to_path_buf()))?;

        debug!(
            receptor = %path.display(),
            center = ?search_box.center,
            size = ?search_box.size,
            "Computed search box"
        );
        Ok(search_box)
    }
}

/// Coordinates of `ATOM`/`HETATM` records, read from the fixed PDB columns
/// (x: 31-38, y: 39-46, z: 47-54). Records with unreadable columns are skipped.
fn atom_coordinates(text: &str) -> impl Iterator<Item = [f64; 3]> + '_ {
    text.lines()
        .filter(|line| line.starts_with("ATOM") || line.starts_with("HETATM"))
        .filter_map(|line| {
            let coord = |range: std::ops::Range<usize>| {
                line.get(range).and_then(|s| s.trim().parse::<f64>().ok())
            };
            match (coord(30..38), coord(38..46), coord(46..54)) {
                (Some(x), Some(y), Some(z)) => Some([x, y, z]),
                _ => {
                    trace!(line = %line, "Skipping atom record without coordinates");
                    None
                }
            }
        })
}

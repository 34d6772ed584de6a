//! Named output files and the one-at-a-time writer shared by the adapters.

use std::path::{Path, PathBuf};

use crate::codec::write_grid_file;
use crate::container::GridFile;
use crate::error::GridFileError;

/// A grid file with the name it is written under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedGridFile {
    pub name: String,
    pub file: GridFile,
}

/// Writes each file into `dir`, in order. A failure stops the batch;
/// files already written stay.
pub fn write_all(
    files: &[NamedGridFile],
    dir: &Path,
    compress: bool,
) -> Result<Vec<PathBuf>, GridFileError> {
    let mut paths = Vec::with_capacity(files.len());
    for f in files {
        let path = dir.join(&f.name);
        write_grid_file(&path, &f.file, compress)?;
        paths.push(path);
    }
    Ok(paths)
}

/// `value` left-aligned in a field of `width` characters, as I/O-API
/// fixed-width string attributes expect.
pub(crate) fn padded(value: &str, width: usize) -> String {
    format!("{value:<width$}")
}

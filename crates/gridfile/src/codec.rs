//! Grid file encoding: bitcode payload, optional LZ4, checksummed header.

use std::path::Path;

use tracing::info;

use crate::atomic_write::atomic_write;
use crate::container::GridFile;
use crate::error::GridFileError;
use crate::file_header::{unwrap_header, wrap_with_header, FLAG_COMPRESSED};

pub fn encode(file: &GridFile, compress: bool) -> Result<Vec<u8>, GridFileError> {
    file.validate().map_err(GridFileError::Encode)?;
    let payload = bitcode::encode(file);
    if payload.len() > u32::MAX as usize {
        return Err(GridFileError::Encode(format!(
            "payload of {} bytes does not fit the header size field",
            payload.len()
        )));
    }
    if compress {
        let stored = lz4_flex::compress_prepend_size(&payload);
        Ok(wrap_with_header(&stored, payload.len(), FLAG_COMPRESSED))
    } else {
        Ok(wrap_with_header(&payload, payload.len(), 0))
    }
}

pub fn decode(bytes: &[u8]) -> Result<GridFile, GridFileError> {
    let (header, stored) = unwrap_header(bytes)?;
    let decompressed;
    let payload = if header.is_compressed() {
        decompressed = lz4_flex::decompress_size_prepended(stored)
            .map_err(|e| GridFileError::Decode(format!("LZ4: {e}")))?;
        &decompressed[..]
    } else {
        stored
    };
    if payload.len() != header.uncompressed_size as usize {
        return Err(GridFileError::Corrupt(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.uncompressed_size
        )));
    }
    let file: GridFile = bitcode::decode(payload)?;
    file.validate().map_err(GridFileError::Corrupt)?;
    Ok(file)
}

/// Encodes and atomically writes `file`, returning the number of bytes written.
pub fn write_grid_file(path: &Path, file: &GridFile, compress: bool) -> Result<usize, GridFileError> {
    let bytes = encode(file, compress)?;
    atomic_write(path, &bytes)?;
    info!(
        "Wrote {} ({} variables, {} bytes)",
        path.display(),
        file.variables.len(),
        bytes.len()
    );
    Ok(bytes.len())
}

pub fn read_grid_file(path: &Path) -> Result<GridFile, GridFileError> {
    decode(&std::fs::read(path)?)
}

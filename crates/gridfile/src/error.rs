// ---------------------------------------------------------------------------
// GridFileError: failures while building, encoding or writing grid files
// ---------------------------------------------------------------------------

use std::fmt;

use emission::EmissionError;

/// Errors raised by the grid file container and the model adapters.
#[derive(Debug)]
pub enum GridFileError {
    /// The emission engine rejected its inputs.
    Emission(EmissionError),
    /// I/O error (permission denied, disk full, missing GRIDDESC, etc.)
    Io(std::io::Error),
    /// A grid file is internally inconsistent and cannot be encoded.
    Encode(String),
    /// Bitcode or LZ4 decoding failed.
    Decode(String),
    /// Magic bytes, checksum or length check failed.
    Corrupt(String),
    /// Header format version is newer than this build supports.
    VersionMismatch { expected_max: u32, found: u32 },
    /// A GRIDDESC file could not be parsed or lacks the requested grid.
    GridDesc(String),
}

impl GridFileError {
    /// True when the failure comes from inconsistent inputs rather than
    /// storage or a damaged file.
    pub fn is_configuration(&self) -> bool {
        match self {
            GridFileError::Emission(e) => e.is_configuration(),
            GridFileError::GridDesc(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GridFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridFileError::Emission(e) => write!(f, "{e}"),
            GridFileError::Io(e) => write!(f, "I/O error: {e}"),
            GridFileError::Encode(msg) => write!(f, "Encoding error: {msg}"),
            GridFileError::Decode(msg) => write!(f, "Decoding error: {msg}"),
            GridFileError::Corrupt(msg) => write!(f, "Corrupt grid file: {msg}"),
            GridFileError::VersionMismatch {
                expected_max,
                found,
            } => write!(
                f,
                "Version mismatch: file header is v{found}, but this build only supports up to v{expected_max}"
            ),
            GridFileError::GridDesc(msg) => write!(f, "GRIDDESC error: {msg}"),
        }
    }
}

impl std::error::Error for GridFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridFileError::Io(e) => Some(e),
            GridFileError::Emission(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GridFileError {
    fn from(e: std::io::Error) -> Self {
        GridFileError::Io(e)
    }
}

impl From<EmissionError> for GridFileError {
    fn from(e: EmissionError) -> Self {
        GridFileError::Emission(e)
    }
}

impl From<bitcode::Error> for GridFileError {
    fn from(e: bitcode::Error) -> Self {
        GridFileError::Decode(e.to_string())
    }
}

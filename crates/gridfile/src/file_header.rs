// ---------------------------------------------------------------------------
// file_header – Grid file header with magic bytes, version and checksum
// ---------------------------------------------------------------------------
//
// Header format (28 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "EMIS" (0x454D4953)
//   [4..8]   Header format version (u32)
//   [8..12]  Flags (u32: bit 0 = LZ4 compressed payload)
//   [12..20] Timestamp (Unix epoch seconds, u64)
//   [20..24] Uncompressed payload size (u32)
//   [24..28] xxHash32 checksum of the stored payload (everything after the header)

use xxhash_rust::xxh32::xxh32;

use crate::error::GridFileError;

/// Magic bytes identifying a grid file.
pub const MAGIC: [u8; 4] = *b"EMIS";

pub const HEADER_SIZE: usize = 28;

/// Version of the header layout itself.
pub const HEADER_FORMAT_VERSION: u32 = 1;

/// Payload is LZ4 compressed (size-prepended block).
pub const FLAG_COMPRESSED: u32 = 1;

const XXHASH_SEED: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u32,
    pub flags: u32,
    pub timestamp: u64,
    pub uncompressed_size: u32,
    pub checksum: u32,
}

impl FileHeader {
    /// Header for `stored` bytes that decode to `uncompressed_size` bytes.
    pub fn new(stored: &[u8], uncompressed_size: usize, flags: u32) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            format_version: HEADER_FORMAT_VERSION,
            flags,
            timestamp,
            uncompressed_size: uncompressed_size as u32,
            checksum: xxh32(stored, XXHASH_SEED),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Prepends a header to `stored`.
pub fn wrap_with_header(stored: &[u8], uncompressed_size: usize, flags: u32) -> Vec<u8> {
    let header = FileHeader::new(stored, uncompressed_size, flags);
    let mut out = Vec::with_capacity(HEADER_SIZE + stored.len());

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&header.format_version.to_le_bytes());
    out.extend_from_slice(&header.flags.to_le_bytes());
    out.extend_from_slice(&header.timestamp.to_le_bytes());
    out.extend_from_slice(&header.uncompressed_size.to_le_bytes());
    out.extend_from_slice(&header.checksum.to_le_bytes());

    out.extend_from_slice(stored);
    out
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parses and validates the header, returning it with the stored payload.
///
/// # Errors
///
/// - `Corrupt` if the magic bytes are missing, the buffer is shorter than a
///   header or the checksum does not match
/// - `VersionMismatch` if the header comes from a newer format version
pub fn unwrap_header(bytes: &[u8]) -> Result<(FileHeader, &[u8]), GridFileError> {
    if bytes.len() < MAGIC.len() || bytes[..4] != MAGIC {
        return Err(GridFileError::Corrupt(
            "missing EMIS magic bytes".to_string(),
        ));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(GridFileError::Corrupt(format!(
            "file is too short ({} bytes, need at least {HEADER_SIZE} for header)",
            bytes.len()
        )));
    }

    let format_version = le_u32(bytes, 4);
    let flags = le_u32(bytes, 8);
    let timestamp = u64::from_le_bytes([
        bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
    ]);
    let uncompressed_size = le_u32(bytes, 20);
    let checksum = le_u32(bytes, 24);

    if format_version > HEADER_FORMAT_VERSION {
        return Err(GridFileError::VersionMismatch {
            expected_max: HEADER_FORMAT_VERSION,
            found: format_version,
        });
    }

    let payload = &bytes[HEADER_SIZE..];
    let computed = xxh32(payload, XXHASH_SEED);
    if computed != checksum {
        return Err(GridFileError::Corrupt(format!(
            "checksum mismatch (expected {checksum:#010X}, got {computed:#010X})"
        )));
    }

    Ok((
        FileHeader {
            format_version,
            flags,
            timestamp,
            uncompressed_size,
            checksum,
        },
        payload,
    ))
}

//! Model file validation
//!
//! Checks a file is a GGUF model llama.cpp can load before handing it over.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// `GGUF` read as a little-endian u32
pub const GGUF_MAGIC: u32 = 0x4655_4747;

const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 1..=3;

/// Magics of the pre-GGUF formats llama.cpp dropped
const LEGACY_MAGICS: [(&[u8; 4], &str); 4] = [
    (b"lmgg", "GGML"),
    (b"fmgg", "GGMF"),
    (b"tjgg", "GGJT"),
    (b"algg", "GGLA"),
];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("{0} is a legacy {1} file; convert it to GGUF")]
    LegacyFormat(String, &'static str),
    #[error("{0} is not a GGUF file")]
    NotGguf(String),
    #[error("Unsupported GGUF version {1} in {0}")]
    UnsupportedVersion(String, u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Header fields of a GGUF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufMetadata {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// Validate the GGUF header of `path`
pub fn validate_gguf(path: &Path) -> Result<GgufMetadata, ModelError> {
    let display = path.display().to_string();
    if !path.is_file() {
        return Err(ModelError::NotFound(display));
    }

    let mut header = [0u8; 24];
    let mut file = File::open(path)?;
    let read = read_up_to(&mut file, &mut header)?;

    if read < 4 {
        return Err(ModelError::NotGguf(display));
    }

    let magic: [u8; 4] = [header[0], header[1], header[2], header[3]];
    if u32::from_le_bytes(magic) != GGUF_MAGIC {
        if let Some((_, name)) = LEGACY_MAGICS.iter().find(|(m, _)| **m == magic) {
            return Err(ModelError::LegacyFormat(display, name));
        }
        return Err(ModelError::NotGguf(display));
    }

    if read < header.len() {
        return Err(ModelError::NotGguf(display));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ModelError::UnsupportedVersion(display, version));
    }

    // Version 1 used 32-bit counts.
    let (tensor_count, metadata_kv_count) = if version == 1 {
        (
            u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as u64,
            u32::from_le_bytes([header[12], header[13], header[14], header[15]]) as u64,
        )
    } else {
        (
            u64::from_le_bytes(header[8..16].try_into().unwrap_or_default()),
            u64::from_le_bytes(header[16..24].try_into().unwrap_or_default()),
        )
    };

    Ok(GgufMetadata {
        version,
        tensor_count,
        metadata_kv_count,
    })
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

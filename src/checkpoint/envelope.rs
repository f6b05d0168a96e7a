//! Versioned on-disk envelope for checkpoint and result files.
//!
//! ```json
//! { "format": "wordfold.checkpoint", "version": 1, "checksum": 123, "body": { ... } }
//! ```
//!
//! The checksum is a CRC32 of the body's canonical JSON (object keys sorted).
//! A mismatched format, unknown version or bad checksum marks the file corrupt
//! instead of surfacing as an opaque deserialization error.

use crate::models::{Result, WordfoldError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Current envelope version.
pub const FORMAT_VERSION: u32 = 1;

/// What a persisted file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Checkpoint,
    FinalResult,
}

impl ArtifactKind {
    pub fn format_name(self) -> &'static str {
        match self {
            Self::Checkpoint => "wordfold.checkpoint",
            Self::FinalResult => "wordfold.result",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    checksum: u32,
    body: serde_json::Value,
}

fn checksum(body: &serde_json::Value) -> Result<u32> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| WordfoldError::Internal(format!("Serializing envelope body: {e}")))?;
    Ok(crc32fast::hash(&bytes))
}

/// Wrap `value` in a checksummed envelope and render it as JSON.
pub fn seal<T: Serialize>(kind: ArtifactKind, value: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_value(value)
        .map_err(|e| WordfoldError::Internal(format!("Serializing {}: {e}", kind.format_name())))?;
    let envelope = Envelope {
        format: kind.format_name().to_string(),
        version: FORMAT_VERSION,
        checksum: checksum(&body)?,
        body,
    };
    serde_json::to_vec_pretty(&envelope)
        .map_err(|e| WordfoldError::Internal(format!("Serializing envelope: {e}")))
}

/// Verify and unwrap an envelope read from `path`.
pub fn open<T: DeserializeOwned>(kind: ArtifactKind, path: &Path, bytes: &[u8]) -> Result<T> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| WordfoldError::corrupt(path, format!("unreadable envelope: {e}")))?;

    if envelope.format != kind.format_name() {
        return Err(WordfoldError::corrupt(
            path,
            format!(
                "expected format {}, found {}",
                kind.format_name(),
                envelope.format
            ),
        ));
    }
    if envelope.version != FORMAT_VERSION {
        return Err(WordfoldError::corrupt(
            path,
            format!("unsupported version {}", envelope.version),
        ));
    }

    let actual = checksum(&envelope.body)?;
    if actual != envelope.checksum {
        return Err(WordfoldError::corrupt(
            path,
            format!(
                "checksum mismatch (stored {:08x}, computed {actual:08x})",
                envelope.checksum
            ),
        ));
    }

    serde_json::from_value(envelope.body)
        .map_err(|e| WordfoldError::corrupt(path, format!("invalid body: {e}")))
}

/// Write `bytes` to `path` through a synced temp file and rename.
///
/// Readers see either the old file or the new one, never a prefix.
pub fn write_atomic(path: &Path, bytes: &[u8], what: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    {
        let mut file =
            File::create(&temp_path).map_err(|e| WordfoldError::persistence(what, e))?;
        file.write_all(bytes)
            .map_err(|e| WordfoldError::persistence(what, e))?;
        file.sync_all()
            .map_err(|e| WordfoldError::persistence(what, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| WordfoldError::persistence(what, e))?;

    // Make the rename itself durable where the platform allows opening dirs
    if let Some(dir) = path.parent() {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }

    Ok(())
}

//! Versioned binary container for knowledge-base snapshots.
//!
//! # File layout
//! ```text
//! offset  size  field
//! 0       4     magic  b"HKBS"
//! 4       2     format version (u16 LE)
//! 6       2     reserved flags (u16 LE), must be 0
//! 8       8     payload length (u64 LE)
//! 16      32    SHA-256 digest of payload
//! 48      n     payload: UTF-8 JSON encoding of `Snapshot`
//! ```
//!
//! # Invariants
//! - Encoding never reorders entries; decoding preserves the encoded order.
//! - Decoding is all-or-nothing and happens entirely in memory, so a corrupt
//!   file can never partially populate a store.
//! - An unknown format version fails fast before the payload is inspected.

use crate::model::snapshot::Snapshot;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

mod file;

pub use file::{read_snapshot, write_snapshot};

/// Leading bytes of every snapshot file.
pub const MAGIC: [u8; 4] = *b"HKBS";
/// Format version written by this build.
pub const FORMAT_VERSION: u16 = 1;
/// Conventional file extension for snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "bak";
/// Fixed header size preceding the payload.
pub const HEADER_LEN: usize = 48;

const DIGEST_LEN: usize = 32;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors from snapshot encoding, decoding and file access.
#[derive(Debug)]
pub enum SnapshotError {
    /// Bytes are not a well-formed snapshot of a supported version.
    Corrupt(String),
    /// Snapshot was written by a format this build cannot read.
    UnsupportedVersion { found: u16, supported: u16 },
    /// Payload serialization failed.
    Encode(serde_json::Error),
    /// Reading or writing the snapshot file failed.
    Io(io::Error),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corrupt(reason) => write!(f, "corrupt snapshot: {reason}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "unsupported snapshot version {found}; this build reads version {supported}"
            ),
            Self::Encode(err) => write!(f, "cannot encode snapshot: {err}"),
            Self::Io(err) => write!(f, "snapshot file error: {err}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Corrupt(_) | Self::UnsupportedVersion { .. } => None,
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Encodes a snapshot into the versioned container format.
pub fn encode_snapshot(snapshot: &Snapshot) -> SnapshotResult<Vec<u8>> {
    let payload = serde_json::to_vec(snapshot).map_err(SnapshotError::Encode)?;
    let digest = Sha256::digest(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&digest);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decodes and validates a snapshot container.
///
/// # Errors
/// - `UnsupportedVersion` when the magic matches but the version does not.
/// - `Corrupt` for every other structural, integrity or content failure.
pub fn decode_snapshot(bytes: &[u8]) -> SnapshotResult<Snapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(SnapshotError::Corrupt(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[0..4] != MAGIC {
        return Err(SnapshotError::Corrupt(
            "missing snapshot magic; not a knowledge-base backup".to_string(),
        ));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let flags = u16::from_le_bytes([header[6], header[7]]);
    if flags != 0 {
        return Err(SnapshotError::Corrupt(format!(
            "unknown header flags {flags:#06x}"
        )));
    }

    let declared_len = u64::from_le_bytes(read_array(&header[8..16]));
    if declared_len != payload.len() as u64 {
        return Err(SnapshotError::Corrupt(format!(
            "payload length mismatch: header declares {declared_len} bytes, found {}",
            payload.len()
        )));
    }

    let expected_digest: [u8; DIGEST_LEN] = read_array(&header[16..HEADER_LEN]);
    if Sha256::digest(payload).as_slice() != expected_digest.as_slice() {
        return Err(SnapshotError::Corrupt(
            "payload digest mismatch".to_string(),
        ));
    }

    let snapshot: Snapshot = serde_json::from_slice(payload)
        .map_err(|err| SnapshotError::Corrupt(format!("invalid payload: {err}")))?;
    snapshot
        .validate()
        .map_err(|err| SnapshotError::Corrupt(format!("invalid snapshot content: {err}")))?;

    Ok(snapshot)
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

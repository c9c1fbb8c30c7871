//! Snapshot file I/O.
//!
//! # Invariants
//! - `write_snapshot` replaces the destination atomically via a sibling
//!   temporary file and rename; a failed write leaves any previous file as-is.
//! - `read_snapshot` loads the whole file before decoding.

use super::{decode_snapshot, encode_snapshot, SnapshotResult};
use crate::model::snapshot::Snapshot;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Encodes `snapshot` and writes it to `path`, overwriting any existing file.
///
/// Returns the number of bytes written.
pub fn write_snapshot(path: impl AsRef<Path>, snapshot: &Snapshot) -> SnapshotResult<u64> {
    let path = path.as_ref();
    let bytes = encode_snapshot(snapshot)?;
    let tmp_path = temp_path_for(path);

    let written = (|| -> SnapshotResult<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written?;

    Ok(bytes.len() as u64)
}

/// Reads and decodes the snapshot stored at `path`.
pub fn read_snapshot(path: impl AsRef<Path>) -> SnapshotResult<Snapshot> {
    let bytes = fs::read(path)?;
    decode_snapshot(&bytes)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

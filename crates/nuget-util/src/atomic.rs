//! Atomic "tmp + rename" file writes, used by the lock file and cache file
//! writers so a reader never observes a half-written manifest.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::{RestoreError, RestoreResult};

/// Write `contents` to `path` via a sibling `.tmp` file followed by a
/// rename. If the rename fails the `.tmp` file is removed rather than left
/// behind for a future run to trip over.
pub fn write_atomic(path: &Path, contents: &[u8]) -> RestoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, &e))?;
    }
    let tmp_path = tmp_path_for(path);
    let write_result = (|| -> std::io::Result<()> {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(contents)?;
        f.sync_all()
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(&tmp_path, &e));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(path, &e));
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp"))
}

fn io_err(path: &Path, e: &std::io::Error) -> RestoreError {
    RestoreError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

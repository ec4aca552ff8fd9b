//! Destination directory housekeeping

use std::fs;
use std::path::{Path, PathBuf};

/// Temporary sibling path used while a file is being transferred
pub fn tmp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    final_path.with_file_name(name)
}

/// Remove stale .tmp files left by an interrupted transfer.
///
/// Returns the number of files removed.
pub fn cleanup_tmp_files(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

//! Shared persistence utilities: atomic file writes and copies.
//!
//! Every artifact, report and registry entry is written through these
//! helpers: the bytes land in a `.tmp` sibling first and are renamed into
//! place, so a reader never observes a half-written file.

use std::io;
use std::path::{Path, PathBuf};

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling file, then atomically renames to the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    ensure_parent(path)?;
    let tmp = tmp_sibling(path);
    if let Err(e) = std::fs::write(&tmp, data) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)
}

/// Atomically copy `src` to `dst`.
///
/// The copy is staged in a `.tmp` sibling of `dst`; on failure the staging
/// file is removed and `dst` is left untouched.
pub fn atomic_copy(src: &Path, dst: &Path) -> io::Result<u64> {
    ensure_parent(dst)?;
    let tmp = tmp_sibling(dst);
    let copied = match std::fs::copy(src, &tmp) {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    };
    if let Err(e) = std::fs::rename(&tmp, dst) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(copied)
}

/// Create the parent directory of `path` if needed.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

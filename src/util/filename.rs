//! Segment file naming conventions.

use std::path::{Path, PathBuf};

use crate::segment::SegmentId;

/// Generate the path of a segment file: `<dir>/<9-digit id><ext>`.
pub fn segment_file_name(dir_path: &Path, ext: &str, id: SegmentId) -> PathBuf {
    dir_path.join(format!("{:09}{}", id, ext))
}

/// Parse a file name and return its segment id.
///
/// Returns `None` if the file name is not `<digits><ext>`.
pub fn parse_segment_file_name(name: &str, ext: &str) -> Option<SegmentId> {
    let num_str = name.strip_suffix(ext)?;
    if num_str.is_empty() || !num_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    num_str.parse::<SegmentId>().ok()
}

/// List the ids of all segment files with the given extension, ascending.
pub fn list_segment_ids(dir_path: &Path, ext: &str) -> std::io::Result<Vec<SegmentId>> {
    let mut ids = Vec::new();

    for entry in std::fs::read_dir(dir_path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if let Some(id) = parse_segment_file_name(&name, ext) {
            ids.push(id);
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Delete a file, ignoring "not found" errors.
pub fn delete_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Create directory if it doesn't exist.
pub fn create_dir_if_missing(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Sync a directory to ensure file creation and renames are durable.
#[cfg(unix)]
pub fn sync_dir(path: &Path) -> std::io::Result<()> {
    let dir = std::fs::File::open(path)?;
    dir.sync_all()
}

/// Directories cannot be opened for syncing on this platform.
#[cfg(not(unix))]
pub fn sync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

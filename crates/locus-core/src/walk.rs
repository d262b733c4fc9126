//! Directory enumeration for snapshots and created directories.
//!
//! Built on `walkdir` with entries sorted by file name, which keeps the cache
//! order deterministic for a given tree. Links are never followed: a symlink
//! is judged by its own name like any other file, so a link cycle cannot
//! break a walk.

use crate::error::{LocusError, Result};
use crate::types::RootDescriptor;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Enumerate every file under `start` that the descriptor admits.
///
/// Failure to read `start` itself is always an error. Entries that vanish
/// while the walk is in progress are skipped; any other failure inside the
/// tree (e.g. permission denied) aborts the walk.
pub fn enumerate(start: &Path, descriptor: &RootDescriptor) -> Result<Vec<PathBuf>> {
    // A top-level-only index never admits anything below a subdirectory.
    if !descriptor.is_recursive() && start != descriptor.root() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(start).follow_links(false).sort_by_file_name();
    if !descriptor.is_recursive() {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    let mut dirs_scanned = 0u64;

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let vanished = e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound);
                if vanished && e.depth() > 0 {
                    trace!(error = %e, "Entry vanished during walk");
                    continue;
                }
                let path = e.path().unwrap_or(start).to_path_buf();
                return Err(LocusError::enumeration(path, io::Error::from(e)));
            }
        };

        if entry.file_type().is_dir() {
            dirs_scanned += 1;
        } else if descriptor.admits(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(
        start = %start.display(),
        files = files.len(),
        dirs = dirs_scanned,
        "Enumeration complete"
    );

    Ok(files)
}

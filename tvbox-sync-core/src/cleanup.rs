use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ScratchPaths;

/// Removes the scratch directory and scratch archive.
///
/// Never fails: problems are logged and the run carries on. Safe to call
/// repeatedly and after a failure at any stage.
pub fn cleanup(scratch: &ScratchPaths) {
    info!("Cleaning up scratch artifacts");
    remove(&scratch.dir, true);
    remove(&scratch.archive, false);
    info!("Cleanup complete");
}

fn remove(path: &Path, is_dir: bool) {
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed scratch path"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "Failed to remove scratch path"),
    }
}
